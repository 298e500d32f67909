//! Scenario tests over whole documents.
//!
//! These drive the public API against [`crate::fixture::FixturePage`] the way
//! the browser build drives it against the live page.

mod classify_scenarios;
mod lifecycle_scenarios;
