//! Client side of the local comic translation service.
//!
//! Covers the image translate endpoint and the small set of `/conf/*`
//! endpoints behind the settings surface. All HTTP goes through the
//! [`Transport`] trait so the same clients run in the browser and in tests.

mod conf;
mod error;
mod session;
mod transport;
mod translate;

pub use conf::{
    ConfAttr, ConfClient, CurrentConf, DEFAULT_MODES, DEFAULT_PROVIDERS, TranslateOptions,
    mode_description, mode_label, provider_label,
};
pub use error::{ServiceError, message_field, status_message};
pub use session::{SessionSnapshot, SettingsSession, SyncStatus};
pub use translate::{
    FailureKind, GENERIC_FAILURE, PNG_DATA_URI_PREFIX, TRANSLATE_PATH, TranslateClient,
    TranslateOutcome, TranslateRequest, TranslatedImage, is_structural_mismatch,
};
pub use transport::{HttpReply, HttpRequest, Method, ScriptedTransport, Transport, TransportError};

#[cfg(target_arch = "wasm32")]
mod fetch;

#[cfg(target_arch = "wasm32")]
pub use fetch::FetchTransport;
