//! Configuration endpoints of the translation service.
//!
//! The service keeps two enumerated settings: which translation provider to
//! call and which translation mode to use. These endpoints read and update them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{ServiceError, message_field, status_message};
use crate::transport::{HttpRequest, Transport};

/// Provider choices used when the service does not list any.
pub const DEFAULT_PROVIDERS: &[&str] = &["openai", "dashscope"];

/// Mode choices used when the service does not list any.
pub const DEFAULT_MODES: &[&str] = &["parallel", "structured"];

const DEFAULT_PROVIDER: &str = "openai";
const DEFAULT_MODE: &str = "parallel";

/// A setting stored by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfAttr {
    /// Translation provider
    TranslateApiType,
    /// Translation mode
    TranslateMode,
}

impl ConfAttr {
    /// Key used by the service for this setting.
    pub fn key(&self) -> &'static str {
        match self {
            ConfAttr::TranslateApiType => "translate_api_type",
            ConfAttr::TranslateMode => "translate_mode",
        }
    }

    /// Look a setting up by its service key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::all().iter().copied().find(|attr| attr.key() == key)
    }

    /// All settings.
    pub fn all() -> &'static [ConfAttr] {
        &[ConfAttr::TranslateApiType, ConfAttr::TranslateMode]
    }
}

/// Choices offered for each setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslateOptions {
    /// Provider choices
    pub translate_api_type: Vec<String>,
    /// Mode choices
    pub translate_mode: Vec<String>,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            translate_api_type: owned(DEFAULT_PROVIDERS),
            translate_mode: owned(DEFAULT_MODES),
        }
    }
}

impl TranslateOptions {
    /// Build options from an untrusted payload.
    ///
    /// Keeps only non-blank strings; a list that ends up empty falls back to
    /// its defaults.
    pub fn normalize(payload: &Value) -> Self {
        let pick = |key: &str, fallback: &[&str]| {
            let values: Vec<String> = payload
                .get(key)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .filter(|s| !s.trim().is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            if values.is_empty() {
                owned(fallback)
            } else {
                values
            }
        };

        Self {
            translate_api_type: pick(ConfAttr::TranslateApiType.key(), DEFAULT_PROVIDERS),
            translate_mode: pick(ConfAttr::TranslateMode.key(), DEFAULT_MODES),
        }
    }

    /// Choices for one setting.
    pub fn values(&self, attr: ConfAttr) -> &[String] {
        match attr {
            ConfAttr::TranslateApiType => &self.translate_api_type,
            ConfAttr::TranslateMode => &self.translate_mode,
        }
    }
}

/// Current value of each setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentConf {
    /// Active provider
    pub translate_api_type: String,
    /// Active mode
    pub translate_mode: String,
}

impl Default for CurrentConf {
    fn default() -> Self {
        Self {
            translate_api_type: DEFAULT_PROVIDER.to_string(),
            translate_mode: DEFAULT_MODE.to_string(),
        }
    }
}

impl CurrentConf {
    /// Build from an untrusted payload; non-string fields take defaults.
    pub fn from_payload(payload: &Value) -> Self {
        let field = |attr: ConfAttr, fallback: &str| {
            payload
                .get(attr.key())
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_string()
        };
        Self {
            translate_api_type: field(ConfAttr::TranslateApiType, DEFAULT_PROVIDER),
            translate_mode: field(ConfAttr::TranslateMode, DEFAULT_MODE),
        }
    }

    /// Value of one setting.
    pub fn get(&self, attr: ConfAttr) -> &str {
        match attr {
            ConfAttr::TranslateApiType => &self.translate_api_type,
            ConfAttr::TranslateMode => &self.translate_mode,
        }
    }

    /// Replace the value of one setting.
    pub fn set(&mut self, attr: ConfAttr, value: impl Into<String>) {
        let slot = match attr {
            ConfAttr::TranslateApiType => &mut self.translate_api_type,
            ConfAttr::TranslateMode => &mut self.translate_mode,
        };
        *slot = value.into();
    }
}

/// Display name of a provider. Unknown providers show as-is.
pub fn provider_label(value: &str) -> &str {
    match value {
        "openai" => "OpenAI",
        "dashscope" => "DashScope",
        other => other,
    }
}

/// Display name of a mode. Unknown modes show as-is.
pub fn mode_label(value: &str) -> &str {
    value
}

/// One-line explanation of a mode.
pub fn mode_description(value: &str) -> &'static str {
    match value {
        "parallel" => "parallel: one request per sentence, steadier for long text",
        "structured" => "structured: one request for the whole page, shares context",
        _ => "choose parallel or structured translation",
    }
}

/// Client for the `/conf/*` endpoints.
#[derive(Debug)]
pub struct ConfClient<T> {
    transport: T,
    base_url: String,
}

impl<T: Transport> ConfClient<T> {
    /// Create a client talking to the service at `base_url`.
    pub fn new(transport: T, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `POST /conf/init`: ask the service to create its settings if missing.
    pub async fn init(&self) -> Result<Value, ServiceError> {
        self.request_json(HttpRequest::post(self.url("/conf/init"), None))
            .await
    }

    /// `GET /conf/options`: offered choices, normalized.
    pub async fn options(&self) -> Result<TranslateOptions, ServiceError> {
        let payload = self
            .request_json(HttpRequest::get(self.url("/conf/options")))
            .await?;
        Ok(TranslateOptions::normalize(&payload))
    }

    /// `GET /conf/query`: current values.
    pub async fn query(&self) -> Result<CurrentConf, ServiceError> {
        let payload = self
            .request_json(HttpRequest::get(self.url("/conf/query")))
            .await?;
        Ok(CurrentConf::from_payload(&payload))
    }

    /// `POST /conf/update`: set one value.
    pub async fn update(&self, attr: ConfAttr, value: &str) -> Result<Value, ServiceError> {
        let body = json!({ "attr": attr.key(), "v": value }).to_string();
        self.request_json(HttpRequest::post(self.url("/conf/update"), Some(body)))
            .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request_json(&self, request: HttpRequest) -> Result<Value, ServiceError> {
        let reply = self.transport.send(request).await?;
        let payload = reply.json();

        if !reply.is_success() {
            let message = message_field(payload.as_ref(), &["detail", "info", "message", "error"])
                .or_else(|| {
                    payload
                        .as_ref()
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| status_message(reply.status));
            return Err(ServiceError::Status {
                status: reply.status,
                message,
            });
        }

        Ok(payload
            .filter(|v| !v.is_null())
            .unwrap_or_else(|| Value::Object(Map::new())))
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Method, ScriptedTransport};

    #[test]
    fn test_options_normalize_filters_and_falls_back() {
        let options = TranslateOptions::normalize(&json!({
            "translate_api_type": ["openai", "  ", 3, "claude"],
            "translate_mode": [],
        }));
        assert_eq!(options.translate_api_type, vec!["openai", "claude"]);
        assert_eq!(options.translate_mode, vec!["parallel", "structured"]);

        let options = TranslateOptions::normalize(&Value::Null);
        assert_eq!(options, TranslateOptions::default());
    }

    #[test]
    fn test_current_conf_defaults_for_non_strings() {
        let conf = CurrentConf::from_payload(&json!({
            "translate_api_type": "dashscope",
            "translate_mode": null,
        }));
        assert_eq!(conf.get(ConfAttr::TranslateApiType), "dashscope");
        assert_eq!(conf.get(ConfAttr::TranslateMode), "parallel");
    }

    #[test]
    fn test_attr_keys_round_trip() {
        for attr in ConfAttr::all() {
            assert_eq!(ConfAttr::from_key(attr.key()), Some(*attr));
        }
        assert_eq!(ConfAttr::from_key("theme"), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(provider_label("openai"), "OpenAI");
        assert_eq!(provider_label("local-llm"), "local-llm");
        assert_eq!(mode_label("structured"), "structured");
        assert!(mode_description("parallel").starts_with("parallel"));
    }

    #[test]
    fn test_update_sends_attr_and_value() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, &json!({"ok": true}));
        let client = ConfClient::new(transport, "http://127.0.0.1:8000");

        pollster::block_on(client.update(ConfAttr::TranslateMode, "structured")).unwrap();

        let sent = client.transport().requests();
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].url, "http://127.0.0.1:8000/conf/update");
        let body: Value = serde_json::from_str(sent[0].json_body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"attr": "translate_mode", "v": "structured"}));
    }

    #[test]
    fn test_error_message_resolution() {
        let transport = ScriptedTransport::new();
        transport.push_json(400, &json!({"error": "  bad attr  "}));
        transport.push_json(400, &json!("plain failure"));
        transport.push_reply(500, "");
        let client = ConfClient::new(transport, "http://svc");

        let err = pollster::block_on(client.query()).unwrap_err();
        assert_eq!(err.to_string(), "bad attr");

        let err = pollster::block_on(client.query()).unwrap_err();
        assert_eq!(err.to_string(), "plain failure");

        let err = pollster::block_on(client.query()).unwrap_err();
        assert_eq!(err.to_string(), "request failed (500)");
    }

    #[test]
    fn test_empty_success_body_is_empty_object() {
        let transport = ScriptedTransport::new();
        transport.push_reply(200, "");
        let client = ConfClient::new(transport, "http://svc");

        let payload = pollster::block_on(client.init()).unwrap();
        assert_eq!(payload, json!({}));
    }
}
