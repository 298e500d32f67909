//! Browser bindings (wasm32 only).
//!
//! [`WebPage`] implements [`crate::page::Page`] over `web-sys`. The `entry`
//! module holds the exported functions the extension's content script and
//! popup call into.

mod canvas;
mod entry;
mod page;

pub use canvas::capture_png_data_url;
pub use page::WebPage;

use wasm_bindgen::JsValue;

use crate::error::LensError;

fn js_error(context: &str, value: JsValue) -> LensError {
    LensError::dom(format!("{}: {:?}", context, value))
}
