//! Re-encoding an image through a canvas.

use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use crate::error::LensError;

/// Draw `image` at its natural size and export it as a PNG data URI.
///
/// Fails for cross-origin images without CORS headers (the canvas is tainted)
/// and for images that have not decoded yet.
pub fn capture_png_data_url(image: &HtmlImageElement) -> Result<String, LensError> {
    let (width, height) = (image.natural_width(), image.natural_height());
    if width == 0 || height == 0 {
        return Err(LensError::Canvas("image has not decoded".to_string()));
    }

    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or(LensError::MissingGlobal("document"))?;
    let canvas: HtmlCanvasElement = document
        .create_element("canvas")
        .map_err(|e| LensError::Canvas(format!("{:?}", e)))?
        .dyn_into()
        .map_err(|_| LensError::Canvas("not a canvas element".to_string()))?;
    canvas.set_width(width);
    canvas.set_height(height);

    let context: CanvasRenderingContext2d = canvas
        .get_context("2d")
        .map_err(|e| LensError::Canvas(format!("{:?}", e)))?
        .ok_or_else(|| LensError::Canvas("2d context unavailable".to_string()))?
        .dyn_into()
        .map_err(|_| LensError::Canvas("unexpected context type".to_string()))?;
    context
        .draw_image_with_html_image_element(image, 0.0, 0.0)
        .map_err(|e| LensError::Canvas(format!("draw failed: {:?}", e)))?;

    canvas
        .to_data_url_with_type("image/png")
        .map_err(|e| LensError::Canvas(format!("export failed: {:?}", e)))
}
