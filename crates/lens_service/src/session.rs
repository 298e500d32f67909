//! State behind the settings surface.
//!
//! A [`SettingsSession`] mirrors the service's settings: it syncs the offered
//! choices and current values, and applies single changes with rollback when
//! the service refuses them. Rendering is left to whoever owns the page.

use std::cell::{Cell, RefCell};

use serde::Serialize;
use web_time::SystemTime;

use crate::conf::{
    ConfAttr, ConfClient, CurrentConf, TranslateOptions, mode_description, mode_label,
    provider_label,
};
use crate::error::ServiceError;
use crate::translate::is_structural_mismatch;
use crate::transport::Transport;

/// Hint appended to a failed mode change that looks like a structured-mode mismatch.
const MODE_CHANGE_HINT: &str = "retry or switch to parallel mode";

/// Progress of the last sync or save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing attempted yet
    #[default]
    Idle,
    /// Sync in progress
    Loading,
    /// Last sync succeeded
    Synced,
    /// Last sync failed
    Failed,
    /// Change in progress
    Saving,
    /// Last change succeeded
    Saved,
    /// Last change failed and was rolled back
    SaveFailed,
}

/// Serializable view of a session, for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Offered choices
    pub options: TranslateOptions,
    /// Current values
    pub current: CurrentConf,
    /// Display name of the current provider
    pub provider_label: String,
    /// Display name of the current mode
    pub mode_label: String,
    /// Explanation of the current mode
    pub mode_tip: String,
    /// Progress of the last operation
    pub status: SyncStatus,
    /// Error text of the last failed operation
    pub error: Option<String>,
    /// Seconds since the Unix epoch of the last successful sync or save
    pub last_sync: Option<u64>,
    /// Whether an operation is running
    pub busy: bool,
}

/// Settings state synchronized with the service.
///
/// Methods take `&self` and never hold a borrow across an await, so a session
/// can be shared through an `Rc` with event handlers.
pub struct SettingsSession<T> {
    client: ConfClient<T>,
    options: RefCell<TranslateOptions>,
    current: RefCell<CurrentConf>,
    status: Cell<SyncStatus>,
    error: RefCell<Option<String>>,
    last_sync: Cell<Option<SystemTime>>,
    busy: Cell<bool>,
}

impl<T: Transport> SettingsSession<T> {
    /// Create a session with default choices and values.
    pub fn new(client: ConfClient<T>) -> Self {
        Self {
            client,
            options: RefCell::new(TranslateOptions::default()),
            current: RefCell::new(CurrentConf::default()),
            status: Cell::new(SyncStatus::Idle),
            error: RefCell::new(None),
            last_sync: Cell::new(None),
            busy: Cell::new(false),
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &ConfClient<T> {
        &self.client
    }

    /// Current values.
    pub fn current(&self) -> CurrentConf {
        self.current.borrow().clone()
    }

    /// Offered choices.
    pub fn options(&self) -> TranslateOptions {
        self.options.borrow().clone()
    }

    /// Progress of the last operation.
    pub fn status(&self) -> SyncStatus {
        self.status.get()
    }

    /// Error text of the last failed operation.
    pub fn error(&self) -> Option<String> {
        self.error.borrow().clone()
    }

    /// Whether a sync or change is running.
    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// Pull choices and current values from the service.
    ///
    /// With `need_init`, asks the service to initialize its settings first.
    /// Returns `Ok(false)` without doing anything while another operation runs.
    pub async fn sync(&self, need_init: bool) -> Result<bool, ServiceError> {
        if self.busy.replace(true) {
            log::debug!("Settings sync skipped: another operation is running");
            return Ok(false);
        }
        self.begin(SyncStatus::Loading);

        let result = self.fetch_all(need_init).await;
        match &result {
            Ok((options, current)) => {
                *self.options.borrow_mut() = options.clone();
                *self.current.borrow_mut() = current.clone();
                self.last_sync.set(Some(SystemTime::now()));
                self.status.set(SyncStatus::Synced);
                log::info!(
                    "Settings synced: provider={} mode={}",
                    current.translate_api_type,
                    current.translate_mode
                );
            }
            Err(e) => {
                log::error!("Settings sync failed: {}", e);
                self.status.set(SyncStatus::Failed);
                *self.error.borrow_mut() = Some(e.to_string());
            }
        }

        self.busy.set(false);
        result.map(|_| true)
    }

    /// Change one setting on the service.
    ///
    /// Returns `Ok(false)` when the value is unchanged or another operation
    /// runs. On failure the previous value stays in place.
    pub async fn change(&self, attr: ConfAttr, value: &str) -> Result<bool, ServiceError> {
        if self.busy.get() || self.current.borrow().get(attr) == value {
            return Ok(false);
        }
        self.busy.set(true);
        self.begin(SyncStatus::Saving);

        let result = self.client.update(attr, value).await;
        match &result {
            Ok(_) => {
                self.current.borrow_mut().set(attr, value);
                self.last_sync.set(Some(SystemTime::now()));
                self.status.set(SyncStatus::Saved);
                log::info!("Setting {} changed to {}", attr.key(), value);
            }
            Err(e) => {
                log::error!("Setting {} update failed: {}", attr.key(), e);
                let message = e.to_string();
                let message = if attr == ConfAttr::TranslateMode && is_structural_mismatch(&message)
                {
                    format!("{message}. {MODE_CHANGE_HINT}.")
                } else {
                    message
                };
                self.status.set(SyncStatus::SaveFailed);
                *self.error.borrow_mut() = Some(message);
            }
        }

        self.busy.set(false);
        result.map(|_| true)
    }

    /// Render-ready view of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        let current = self.current();
        SessionSnapshot {
            options: self.options(),
            provider_label: provider_label(&current.translate_api_type).to_string(),
            mode_label: mode_label(&current.translate_mode).to_string(),
            mode_tip: mode_description(&current.translate_mode).to_string(),
            current,
            status: self.status.get(),
            error: self.error(),
            last_sync: self.last_sync.get().and_then(|t| {
                t.duration_since(web_time::UNIX_EPOCH)
                    .ok()
                    .map(|d| d.as_secs())
            }),
            busy: self.busy.get(),
        }
    }

    fn begin(&self, status: SyncStatus) {
        self.status.set(status);
        *self.error.borrow_mut() = None;
    }

    async fn fetch_all(
        &self,
        need_init: bool,
    ) -> Result<(TranslateOptions, CurrentConf), ServiceError> {
        if need_init {
            self.client.init().await?;
        }
        let options = self.client.options().await?;
        let current = self.client.query().await?;
        Ok((options, current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransport;
    use serde_json::json;

    fn session() -> SettingsSession<ScriptedTransport> {
        SettingsSession::new(ConfClient::new(ScriptedTransport::new(), "http://svc"))
    }

    fn script(session: &SettingsSession<ScriptedTransport>) -> &ScriptedTransport {
        session.client().transport()
    }

    #[test]
    fn test_sync_with_init_pulls_options_and_values() {
        let session = session();
        script(&session).push_json(200, &json!({}));
        script(&session).push_json(
            200,
            &json!({"translate_api_type": ["openai", "dashscope", "local"], "translate_mode": []}),
        );
        script(&session).push_json(
            200,
            &json!({"translate_api_type": "local", "translate_mode": "structured"}),
        );

        assert!(pollster::block_on(session.sync(true)).unwrap());
        assert_eq!(session.status(), SyncStatus::Synced);
        assert_eq!(session.options().translate_api_type.len(), 3);
        assert_eq!(session.options().translate_mode, vec!["parallel", "structured"]);
        assert_eq!(session.current().translate_api_type, "local");

        let urls: Vec<_> = script(&session)
            .requests()
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(
            urls,
            vec![
                "http://svc/conf/init",
                "http://svc/conf/options",
                "http://svc/conf/query"
            ]
        );

        let snapshot = session.snapshot();
        assert!(snapshot.last_sync.is_some());
        assert_eq!(snapshot.provider_label, "local");
        assert!(!snapshot.busy);
    }

    #[test]
    fn test_sync_failure_keeps_previous_state() {
        let session = session();
        script(&session).push_json(503, &json!({"detail": "service warming up"}));

        assert!(pollster::block_on(session.sync(false)).is_err());
        assert_eq!(session.status(), SyncStatus::Failed);
        assert_eq!(session.error().as_deref(), Some("service warming up"));
        assert_eq!(session.current(), CurrentConf::default());
        assert!(!session.is_busy());
    }

    #[test]
    fn test_change_unchanged_value_is_noop() {
        let session = session();
        assert!(!pollster::block_on(session.change(ConfAttr::TranslateApiType, "openai")).unwrap());
        assert_eq!(script(&session).request_count(), 0);
    }

    #[test]
    fn test_change_applies_on_success() {
        let session = session();
        script(&session).push_json(200, &json!({"ok": true}));

        assert!(pollster::block_on(session.change(ConfAttr::TranslateApiType, "dashscope")).unwrap());
        assert_eq!(session.current().translate_api_type, "dashscope");
        assert_eq!(session.status(), SyncStatus::Saved);
        assert_eq!(session.snapshot().provider_label, "DashScope");
    }

    #[test]
    fn test_failed_mode_change_rolls_back_with_hint() {
        let session = session();
        script(&session).push_json(400, &json!({"detail": "structured output count mismatch"}));

        let result = pollster::block_on(session.change(ConfAttr::TranslateMode, "structured"));
        assert!(result.is_err());
        assert_eq!(session.current().translate_mode, "parallel");
        assert_eq!(session.status(), SyncStatus::SaveFailed);
        let error = session.error().unwrap();
        assert!(error.starts_with("structured output count mismatch"));
        assert!(error.contains(MODE_CHANGE_HINT));
    }

    #[test]
    fn test_failed_provider_change_has_no_hint() {
        let session = session();
        script(&session).push_json(400, &json!({"detail": "structured nonsense"}));

        let _ = pollster::block_on(session.change(ConfAttr::TranslateApiType, "dashscope"));
        assert_eq!(session.error().as_deref(), Some("structured nonsense"));
        assert_eq!(session.current().translate_api_type, "openai");
    }
}
