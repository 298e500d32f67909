//! Panel Lens - comic page detection and in-place translation for web pages
//!
//! Finds the images on a page that look like comic or manga pages, puts a
//! small translate control over them on hover, and swaps in the translated
//! image returned by a local translation service.
//!
//! The detector only sees the page through the [`page::Page`] trait: the
//! browser build uses `web::WebPage`, tests and `lens-classify` use
//! [`fixture::FixturePage`].

pub mod classify;
pub mod config;
pub mod constants;
pub mod error;
pub mod fixture;
pub mod overlay;
pub mod page;
pub mod signals;
pub mod watcher;

pub use classify::{Rejection, Verdict, classify};
pub use config::LensConfig;
pub use error::LensError;
pub use overlay::{Overlay, RequestState};
pub use page::Page;
pub use watcher::MutationWatcher;

// Browser bindings and exported entry points
#[cfg(target_arch = "wasm32")]
pub mod web;

#[cfg(test)]
mod tests;
