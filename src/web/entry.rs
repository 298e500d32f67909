//! Exported entry points.
//!
//! The content script only needs `start`; the popup drives the settings
//! session through `settings_sync` / `settings_change`, which resolve to a JSON
//! snapshot of the session.

use std::cell::RefCell;
use std::rc::Rc;

use lens_service::{ConfAttr, ConfClient, FetchTransport, SettingsSession};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::HtmlImageElement;

use super::{WebPage, capture_png_data_url};
use crate::config::LensConfig;
use crate::error::LensError;
use crate::overlay::Overlay;
use crate::watcher::MutationWatcher;

struct Running {
    _overlay: Overlay<WebPage, FetchTransport>,
    _watcher: MutationWatcher<WebPage, FetchTransport>,
}

thread_local! {
    static RUNNING: RefCell<Option<Running>> = const { RefCell::new(None) };
    static SESSION: RefCell<Option<Rc<SettingsSession<FetchTransport>>>> = const { RefCell::new(None) };
}

fn to_js(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn load_config() -> LensConfig {
    LensConfig::load_from_local_storage().unwrap_or_default()
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();

    let config = load_config();
    if let Err(e) = console_log::init_with_level(config.log_level.to_level()) {
        web_sys::console::warn_1(&format!("Logger already set: {}", e).into());
    }

    if let Err(e) = launch(config) {
        log::error!("Panel lens failed to start: {}", e);
    }
}

fn launch(config: LensConfig) -> Result<(), LensError> {
    let page = WebPage::new()?;
    let overlay = Overlay::new(page, FetchTransport::new(), config);
    let bound = overlay.scan_document();
    let watcher = MutationWatcher::start(&overlay)?;
    log::info!("Panel lens active, {} image(s) bound", bound);

    RUNNING.with(|running| {
        *running.borrow_mut() = Some(Running {
            _overlay: overlay,
            _watcher: watcher,
        });
    });
    Ok(())
}

/// Validate a configuration JSON and store it for the next page load.
#[wasm_bindgen]
pub fn save_config(json: &str) -> Result<(), JsValue> {
    let config = LensConfig::from_json(json).map_err(LensError::from).map_err(to_js)?;
    config.save_to_local_storage().map_err(to_js)
}

/// The stored configuration as JSON, defaults when nothing is stored.
#[wasm_bindgen]
pub fn current_config() -> Result<String, JsValue> {
    load_config().to_json().map_err(to_js)
}

/// Re-encode an image as a PNG data URI.
#[wasm_bindgen]
pub fn capture_png(image: JsValue) -> Result<String, JsValue> {
    let image: HtmlImageElement = image
        .dyn_into()
        .map_err(|_| JsValue::from_str("expected an <img> element"))?;
    capture_png_data_url(&image).map_err(to_js)
}

fn session() -> Rc<SettingsSession<FetchTransport>> {
    SESSION.with(|slot| {
        Rc::clone(slot.borrow_mut().get_or_insert_with(|| {
            let config = load_config();
            Rc::new(SettingsSession::new(ConfClient::new(
                FetchTransport::new(),
                config.api_base,
            )))
        }))
    })
}

fn snapshot_json(session: &SettingsSession<FetchTransport>) -> Result<String, JsValue> {
    serde_json::to_string(&session.snapshot()).map_err(to_js)
}

/// Load options and current values from the service.
#[wasm_bindgen]
pub async fn settings_sync(need_init: bool) -> Result<String, JsValue> {
    let session = session();
    if let Err(e) = session.sync(need_init).await {
        log::warn!("Settings sync failed: {}", e);
    }
    snapshot_json(&session)
}

/// Change one setting. Unknown attributes are rejected.
#[wasm_bindgen]
pub async fn settings_change(attr: String, value: String) -> Result<String, JsValue> {
    let attr = ConfAttr::from_key(&attr)
        .ok_or_else(|| JsValue::from_str(&format!("unknown setting: {}", attr)))?;
    let session = session();
    if let Err(e) = session.change(attr, &value).await {
        log::warn!("Settings change failed: {}", e);
    }
    snapshot_json(&session)
}
