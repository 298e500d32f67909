//! `fetch()`-backed transport for the browser build.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Headers, Request, RequestInit, RequestMode, Response};

use crate::transport::{HttpReply, HttpRequest, Transport, TransportError};

/// Transport that sends requests with the page's `fetch()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FetchTransport;

impl FetchTransport {
    /// Create a fetch transport.
    pub fn new() -> Self {
        Self
    }
}

fn describe(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{:?}", value))
}

impl Transport for FetchTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpReply, TransportError> {
        let network = |e: JsValue| TransportError::Network(describe(&e));

        let window = web_sys::window()
            .ok_or_else(|| TransportError::Network("no window object available".to_string()))?;

        let init = RequestInit::new();
        init.set_method(request.method.as_str());
        init.set_mode(RequestMode::Cors);

        if let Some(body) = &request.json_body {
            let headers = Headers::new().map_err(network)?;
            headers
                .set("Content-Type", "application/json")
                .map_err(network)?;
            init.set_headers(&headers);
            init.set_body(&JsValue::from_str(body));
        }

        let js_request = Request::new_with_str_and_init(&request.url, &init).map_err(network)?;
        let value = JsFuture::from(window.fetch_with_request(&js_request))
            .await
            .map_err(network)?;
        let response: Response = value
            .dyn_into()
            .map_err(|_| TransportError::Network("fetch did not return a Response".to_string()))?;

        let body_error = |e: JsValue| TransportError::Body(describe(&e));
        let text = JsFuture::from(response.text().map_err(body_error)?)
            .await
            .map_err(body_error)?
            .as_string()
            .unwrap_or_default();

        Ok(HttpReply::new(response.status(), text))
    }
}
