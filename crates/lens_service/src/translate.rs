//! The image translation endpoint.
//!
//! Replies from the service are loosely shaped, so they are decoded once, here,
//! into a [`TranslateOutcome`]. Nothing past this module looks at raw JSON.

use serde::Serialize;
use serde_json::Value;

use crate::error::{message_field, status_message};
use crate::transport::{HttpReply, HttpRequest, Transport};

/// Path of the translate endpoint, relative to the service base URL.
pub const TRANSLATE_PATH: &str = "/api/v1/translate/web";

/// Prefix turning the service's bare base64 payload into an image source.
pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Message used when a failed reply carries no usable text.
pub const GENERIC_FAILURE: &str = "translation failed";

/// Words in a failure message that point at a structured-mode mismatch
/// (wrong number of sentences, list shape not as expected).
const STRUCTURAL_VOCABULARY: &[&str] = &[
    "structured",
    "list",
    "mismatch",
    "quantity",
    "格式",
    "数量",
    "不匹配",
    "列表",
];

/// Body of a translate request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslateRequest {
    /// Resolved URL of the image to translate
    pub image_url: String,
    /// Origin of the page the image lives on (`scheme://host`)
    pub referer: String,
}

/// A successfully translated image plus the metadata the service reports.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedImage {
    /// Base64 PNG, without any data-URI prefix
    pub png_base64: String,
    /// Processing time reported by the service
    pub duration: Option<f64>,
    /// Cost reported by the service
    pub price: Option<f64>,
    /// Recognized source text
    pub raw_text: Option<String>,
    /// Translated text
    pub cn_text: Option<String>,
}

impl TranslatedImage {
    /// The payload as an image source, `data:image/png;base64,<payload>`.
    pub fn data_uri(&self) -> String {
        format!("{PNG_DATA_URI_PREFIX}{}", self.png_base64)
    }
}

/// Where a failed translation went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request never completed
    Transport,
    /// The service answered with a non-success status
    Status(u16),
    /// The service answered 2xx but did not report success
    Rejected,
}

/// Decoded result of one translate call.
#[derive(Debug, Clone, PartialEq)]
pub enum TranslateOutcome {
    /// Translation finished and an image came back
    Success(TranslatedImage),
    /// Translation failed
    Failure {
        /// Failure class
        kind: FailureKind,
        /// Most specific message available
        message: String,
    },
}

impl TranslateOutcome {
    /// Decode a reply from the translate endpoint.
    pub fn from_reply(reply: &HttpReply) -> Self {
        let body = reply.json();

        if !reply.is_success() {
            let message = message_field(body.as_ref(), &["detail", "info", "message"])
                .unwrap_or_else(|| status_message(reply.status));
            return Self::failure(FailureKind::Status(reply.status), message);
        }

        let Some(body) = body else {
            return Self::failure(FailureKind::Rejected, "malformed response from service");
        };

        if body.get("status").and_then(Value::as_str) != Some("success") {
            let message = message_field(Some(&body), &["info"])
                .unwrap_or_else(|| GENERIC_FAILURE.to_string());
            return Self::failure(FailureKind::Rejected, message);
        }

        let Some(png_base64) = body.get("res_img").and_then(Value::as_str) else {
            return Self::failure(FailureKind::Rejected, "response missing image data");
        };

        Self::Success(TranslatedImage {
            png_base64: png_base64.to_string(),
            duration: number_field(&body, "duration"),
            price: number_field(&body, "price"),
            raw_text: text_field(&body, "raw_text"),
            cn_text: text_field(&body, "cn_text"),
        })
    }

    /// Shorthand for a failure outcome.
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    /// True for [`TranslateOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// True when a failure message reads like a structural or count mismatch,
/// which switching translation mode usually fixes.
pub fn is_structural_mismatch(message: &str) -> bool {
    let lower = message.to_lowercase();
    STRUCTURAL_VOCABULARY.iter().any(|word| lower.contains(word))
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn number_field(body: &Value, key: &str) -> Option<f64> {
    match body.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text may arrive as a string or a list of strings (one per bubble).
fn text_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        _ => None,
    }
}

/// Client for the translate endpoint.
#[derive(Debug)]
pub struct TranslateClient<T> {
    transport: T,
    base_url: String,
}

impl<T: Transport> TranslateClient<T> {
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

    /// Full URL of the translate endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, TRANSLATE_PATH)
    }

    /// Send one translate request and decode the reply.
    ///
    /// Never errors: transport failures become [`FailureKind::Transport`].
    pub async fn translate(&self, request: &TranslateRequest) -> TranslateOutcome {
        let body = match serde_json::to_string(request) {
            Ok(body) => body,
            Err(e) => return TranslateOutcome::failure(FailureKind::Transport, e.to_string()),
        };

        match self
            .transport
            .send(HttpRequest::post(self.endpoint(), Some(body)))
            .await
        {
            Ok(reply) => TranslateOutcome::from_reply(&reply),
            Err(e) => TranslateOutcome::failure(FailureKind::Transport, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ScriptedTransport, TransportError};
    use serde_json::json;

    fn reply(status: u16, body: Value) -> HttpReply {
        HttpReply::new(status, body.to_string())
    }

    #[test]
    fn test_success_decodes_payload_and_metadata() {
        let outcome = TranslateOutcome::from_reply(&reply(
            200,
            json!({
                "status": "success",
                "res_img": "AAAA",
                "duration": "1.5",
                "price": 0.02,
                "raw_text": ["こんにちは", "さようなら"],
                "cn_text": "你好",
            }),
        ));

        let TranslateOutcome::Success(image) = outcome else {
            panic!("expected success");
        };
        assert_eq!(image.data_uri(), "data:image/png;base64,AAAA");
        assert_eq!(image.duration, Some(1.5));
        assert_eq!(image.price, Some(0.02));
        assert_eq!(image.raw_text.as_deref(), Some("こんにちは\nさようなら"));
        assert_eq!(image.cn_text.as_deref(), Some("你好"));
    }

    #[test]
    fn test_error_status_prefers_detail_then_info_then_message() {
        let outcome = TranslateOutcome::from_reply(&reply(
            422,
            json!({"message": "m", "info": "i", "detail": "quantity mismatch in list"}),
        ));
        assert_eq!(
            outcome,
            TranslateOutcome::failure(FailureKind::Status(422), "quantity mismatch in list")
        );

        let outcome = TranslateOutcome::from_reply(&reply(500, json!({"message": "boom"})));
        assert_eq!(
            outcome,
            TranslateOutcome::failure(FailureKind::Status(500), "boom")
        );
    }

    #[test]
    fn test_error_status_with_unparseable_body() {
        let outcome = TranslateOutcome::from_reply(&HttpReply::new(503, "<html>gateway</html>"));
        assert_eq!(
            outcome,
            TranslateOutcome::failure(FailureKind::Status(503), "request failed (503)")
        );
    }

    #[test]
    fn test_ok_status_but_not_success() {
        let outcome =
            TranslateOutcome::from_reply(&reply(200, json!({"status": "error", "info": "busy"})));
        assert_eq!(
            outcome,
            TranslateOutcome::failure(FailureKind::Rejected, "busy")
        );

        let outcome = TranslateOutcome::from_reply(&reply(200, json!({"status": "error"})));
        assert_eq!(
            outcome,
            TranslateOutcome::failure(FailureKind::Rejected, GENERIC_FAILURE)
        );
    }

    #[test]
    fn test_ok_status_without_image_or_body_is_failure() {
        let outcome = TranslateOutcome::from_reply(&reply(200, json!({"status": "success"})));
        assert!(!outcome.is_success());

        let outcome = TranslateOutcome::from_reply(&HttpReply::new(200, "not json"));
        assert!(matches!(
            outcome,
            TranslateOutcome::Failure {
                kind: FailureKind::Rejected,
                ..
            }
        ));
    }

    #[test]
    fn test_structural_mismatch_vocabulary() {
        assert!(is_structural_mismatch("quantity mismatch in list"));
        assert!(is_structural_mismatch("Structured output invalid"));
        assert!(is_structural_mismatch("翻译数量不匹配"));
        assert!(!is_structural_mismatch("upstream timeout"));
        assert!(!is_structural_mismatch(""));
    }

    #[test]
    fn test_client_posts_json_body() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, &json!({"status": "success", "res_img": "QQ=="}));
        let client = TranslateClient::new(transport, "http://127.0.0.1:8000/");

        let request = TranslateRequest {
            image_url: "https://site.test/ch1/p1.jpg".to_string(),
            referer: "https://site.test".to_string(),
        };
        let outcome = pollster::block_on(client.translate(&request));
        assert!(outcome.is_success());

        let sent = client.transport().requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "http://127.0.0.1:8000/api/v1/translate/web");
        let body: Value = serde_json::from_str(sent[0].json_body.as_deref().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({"image_url": "https://site.test/ch1/p1.jpg", "referer": "https://site.test"})
        );
    }

    #[test]
    fn test_client_maps_transport_error() {
        let transport = ScriptedTransport::new();
        transport.push_error(TransportError::Network("connection refused".to_string()));
        let client = TranslateClient::new(transport, "http://127.0.0.1:8000");

        let request = TranslateRequest {
            image_url: "x".to_string(),
            referer: "y".to_string(),
        };
        let outcome = pollster::block_on(client.translate(&request));
        assert!(matches!(
            outcome,
            TranslateOutcome::Failure {
                kind: FailureKind::Transport,
                ..
            }
        ));
    }
}
