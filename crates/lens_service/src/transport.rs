//! HTTP seam between the service clients and whatever actually sends requests.
//!
//! The browser build plugs in [`crate::FetchTransport`]; tests and offline tools
//! use [`ScriptedTransport`], which replays canned replies and records every
//! request it receives.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;

use thiserror::Error;

/// HTTP method used by the service endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read-only query
    Get,
    /// Request with an optional JSON body
    Post,
}

impl Method {
    /// Method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Serialized JSON body, sent with `Content-Type: application/json`
    pub json_body: Option<String>,
}

impl HttpRequest {
    /// Create a body-less GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            json_body: None,
        }
    }

    /// Create a POST request, optionally carrying a JSON body.
    pub fn post(url: impl Into<String>, json_body: Option<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            json_body,
        }
    }
}

/// A completed HTTP exchange: status plus the raw body text.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl HttpReply {
    /// Create a reply from a status and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON. A body that is not JSON yields `None`.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Failure to complete an HTTP exchange at all.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// The request could not be sent or no response arrived
    #[error("network error: {0}")]
    Network(String),

    /// A response arrived but its body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Something that can perform an HTTP exchange.
pub trait Transport {
    /// Send a request and wait for the complete reply.
    fn send(&self, request: HttpRequest)
    -> impl Future<Output = Result<HttpReply, TransportError>>;
}

/// Transport that replays queued replies in order and records requests.
///
/// When the queue runs dry every further request fails with a network error.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: RefCell<VecDeque<Result<HttpReply, TransportError>>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    /// Create a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply with the given status and body.
    pub fn push_reply(&self, status: u16, body: impl Into<String>) {
        self.replies
            .borrow_mut()
            .push_back(Ok(HttpReply::new(status, body)));
    }

    /// Queue a JSON reply.
    pub fn push_json(&self, status: u16, body: &serde_json::Value) {
        self.push_reply(status, body.to_string());
    }

    /// Queue a transport failure.
    pub fn push_error(&self, error: TransportError) {
        self.replies.borrow_mut().push_back(Err(error));
    }

    /// All requests sent so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    /// Number of requests sent so far.
    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpReply, TransportError> {
        log::trace!("{} {}", request.method.as_str(), request.url);
        self.requests.borrow_mut().push(request);
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("no scripted reply".to_string())))
    }
}

impl<T: Transport> Transport for std::rc::Rc<T> {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpReply, TransportError>> {
        (**self).send(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_success_range() {
        assert!(HttpReply::new(200, "").is_success());
        assert!(HttpReply::new(204, "").is_success());
        assert!(!HttpReply::new(302, "").is_success());
        assert!(!HttpReply::new(500, "").is_success());
    }

    #[test]
    fn test_reply_json_tolerates_garbage() {
        assert!(HttpReply::new(200, "<html>").json().is_none());
        assert!(HttpReply::new(200, "").json().is_none());
        let value = HttpReply::new(200, r#"{"a":1}"#).json().unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_scripted_transport_replays_in_order() {
        let transport = ScriptedTransport::new();
        transport.push_reply(200, "first");
        transport.push_error(TransportError::Network("down".to_string()));

        let first = pollster::block_on(transport.send(HttpRequest::get("http://a/1")));
        assert_eq!(first.unwrap().body, "first");

        let second = pollster::block_on(transport.send(HttpRequest::get("http://a/2")));
        assert!(matches!(second, Err(TransportError::Network(_))));

        let third = pollster::block_on(transport.send(HttpRequest::get("http://a/3")));
        assert!(third.is_err());

        let urls: Vec<_> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec!["http://a/1", "http://a/2", "http://a/3"]);
    }
}
