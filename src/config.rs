//! Configuration for the content script.
//!
//! Settings are JSON, versioned, and every field has a default so partial or
//! older files keep loading. In the browser they live in `localStorage`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Default base URL of the local translation service.
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

/// Log level setting for the content script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including per-gate rejections
    Trace,
}

impl LogLevel {
    /// Convert to log crate's Level.
    pub fn to_level(&self) -> log::Level {
        match self {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }

    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        self.to_level().to_level_filter()
    }
}

/// Text shown on the floating control in each state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonLabels {
    /// Ready to translate
    pub idle: String,
    /// Request in flight
    pub processing: String,
    /// Image replaced
    pub done: String,
    /// Request failed
    pub failed: String,
    /// Failure that switching translation mode may fix
    pub retry_hint: String,
    /// Activation refused because the image no longer looks like a comic page
    pub comic_only: String,
}

impl Default for ButtonLabels {
    fn default() -> Self {
        Self {
            idle: "Translate".to_string(),
            processing: "Processing...".to_string(),
            done: "Done".to_string(),
            failed: "Failed".to_string(),
            retry_hint: "Retry / switch mode".to_string(),
            comic_only: "Comic images only".to_string(),
        }
    }
}

/// Delays driving the control's timers, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Grace period before hiding, so the pointer can travel from image to control
    pub hide_grace_ms: u32,
    /// How long a done/failed label stays up
    pub result_display_ms: u32,
    /// How long the comic-only notice stays up
    pub notice_display_ms: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            hide_grace_ms: 200,
            result_display_ms: 2000,
            notice_display_ms: 1200,
        }
    }
}

impl Timings {
    /// Hide grace period.
    pub fn hide_grace(&self) -> Duration {
        Duration::from_millis(self.hide_grace_ms.into())
    }

    /// Display window for terminal states.
    pub fn result_display(&self) -> Duration {
        Duration::from_millis(self.result_display_ms.into())
    }

    /// Display window for the comic-only notice.
    pub fn notice_display(&self) -> Duration {
        Duration::from_millis(self.notice_display_ms.into())
    }
}

/// Content script configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensConfig {
    /// Version of the configuration format
    pub version: u32,

    /// Base URL of the translation service
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Control labels
    #[serde(default)]
    pub labels: ButtonLabels,

    /// Timer delays
    #[serde(default)]
    pub timings: Timings,

    /// Offset of the control from the image's top-left corner, in CSS pixels
    #[serde(default = "default_control_offset")]
    pub control_offset_px: f64,

    /// Stacking order of the control
    #[serde(default = "default_z_index")]
    pub control_z_index: i32,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_control_offset() -> f64 {
    3.0
}

fn default_z_index() -> i32 {
    9999
}

impl LensConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            api_base: default_api_base(),
            log_level: LogLevel::default(),
            labels: ButtonLabels::default(),
            timings: Timings::default(),
            control_offset_px: default_control_offset(),
            control_z_index: default_z_index(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// LocalStorage key for WASM config persistence.
    #[cfg(target_arch = "wasm32")]
    const LOCALSTORAGE_KEY: &'static str = "panel-lens-config";

    /// Try to load configuration from localStorage (WASM only).
    /// Returns None if not found or can't be parsed.
    #[cfg(target_arch = "wasm32")]
    pub fn load_from_local_storage() -> Option<Self> {
        let window = web_sys::window()?;
        let storage = window.local_storage().ok()??;

        match storage.get_item(Self::LOCALSTORAGE_KEY) {
            Ok(Some(json)) => match Self::from_json(&json) {
                Ok(config) => {
                    log::info!("Loaded configuration from localStorage");
                    Some(config)
                }
                Err(e) => {
                    log::warn!("Failed to parse config from localStorage: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("Failed to read from localStorage: {:?}", e);
                None
            }
        }
    }

    /// Save configuration to localStorage (WASM only).
    #[cfg(target_arch = "wasm32")]
    pub fn save_to_local_storage(&self) -> Result<(), ConfigError> {
        let window = web_sys::window()
            .ok_or_else(|| ConfigError::StorageError("No window object available".to_string()))?;

        let storage = window
            .local_storage()
            .map_err(|e| ConfigError::StorageError(format!("localStorage access error: {:?}", e)))?
            .ok_or_else(|| ConfigError::StorageError("localStorage not available".to_string()))?;

        storage
            .set_item(Self::LOCALSTORAGE_KEY, &self.to_json()?)
            .map_err(|e| {
                ConfigError::StorageError(format!("Failed to save to localStorage: {:?}", e))
            })?;

        log::info!("Saved configuration to localStorage");
        Ok(())
    }
}

impl Default for LensConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// Storage error (localStorage in WASM)
    #[error("Storage error: {0}")]
    StorageError(String),
}
