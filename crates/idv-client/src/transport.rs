//! # Transport
//!
//! One HTTP exchange per call: method, URL and optional JSON body in;
//! response body text or a [`TransportError`] out. The engine only sees
//! the [`Transport`] trait, so tests substitute a scripted transport.
//!
//! Request bodies carry biometric images and are never logged. Response
//! bodies are logged at `trace` level only.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
pub use reqwest::Method;

use crate::config::IdvConfig;

/// One request to the verification backend.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
    /// Whether this request creates the session. Error texts for 403/404
    /// differ between the first request and later ones.
    pub first_step: bool,
}

impl TransportRequest {
    /// A request without body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            first_step: false,
        }
    }

    /// Builder: attach a JSON body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Builder: mark as the session-creating request.
    pub fn first_step(mut self) -> Self {
        self.first_step = true;
        self
    }
}

/// A failed exchange. Every variant renders a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The server could not be reached.
    #[error("Unable to reach the verification server: {message}")]
    Connect {
        /// Underlying error text.
        message: String,
    },
    /// No response within the request timeout.
    #[error("The verification server did not respond in time.")]
    Timeout,
    /// The server answered with a non-2xx status.
    #[error("{}", status_message(.status, .first_step))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as received.
        body: String,
        /// Whether the failing request created the session.
        first_step: bool,
    },
    /// A 2xx response with an empty body.
    #[error("The verification server returned an empty response.")]
    EmptyBody,
    /// The HTTP client or a header could not be built.
    #[error("invalid transport configuration: {0}")]
    Setup(String),
}

fn status_message(status: &u16, first_step: &bool) -> String {
    match (*status, *first_step) {
        (401, _) => "Authentication failed. Check the API token and API key.".to_string(),
        (403 | 404, true) => {
            "The verification service rejected the request. Check the base URL and scenario configuration."
                .to_string()
        }
        (403 | 404, false) => "The verification session is no longer available.".to_string(),
        (other, _) => format!("The verification server returned an error (HTTP {other})."),
    }
}

/// Sends one request to the verification backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the exchange and return the 2xx response body.
    async fn send(&self, request: TransportRequest) -> Result<String, TransportError>;
}

/// [`Transport`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Build the HTTP client with authentication and JSON default headers.
    pub fn new(config: &IdvConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_token.as_str()))
                .map_err(|_| TransportError::Setup("API token is not a valid header value".into()))?,
        );
        if let Some(key) = &config.api_key {
            let name = HeaderName::from_bytes(config.api_key_header.as_bytes())
                .map_err(|e| TransportError::Setup(format!("API key header name: {e}")))?;
            let mut value = HeaderValue::from_str(key.as_str())
                .map_err(|_| TransportError::Setup("API key is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<String, TransportError> {
        let TransportRequest {
            method,
            url,
            body,
            first_step,
        } = request;

        let mut builder = self.http.request(method.clone(), &url);
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(|e| {
            tracing::warn!(%method, %url, error = %e, "verification request failed");
            from_reqwest(e)
        })?;
        let status = resp.status();
        tracing::debug!(%method, %url, status = status.as_u16(), "verification response");

        let text = resp.text().await.map_err(from_reqwest)?;
        tracing::trace!(%url, body = %text, "verification response body");

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
                first_step,
            });
        }
        if text.trim().is_empty() {
            return Err(TransportError::EmptyBody);
        }
        Ok(text)
    }
}

fn from_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connect {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::ProtocolVariant;

    #[test]
    fn unauthorized_message_mentions_credentials() {
        let err = TransportError::Status {
            status: 401,
            body: String::new(),
            first_step: false,
        };
        assert!(err.to_string().contains("Authentication failed"));
    }

    #[test]
    fn not_found_message_depends_on_step() {
        let first = TransportError::Status {
            status: 404,
            body: String::new(),
            first_step: true,
        };
        let later = TransportError::Status {
            status: 404,
            body: String::new(),
            first_step: false,
        };
        assert!(first.to_string().contains("base URL"));
        assert!(later.to_string().contains("no longer available"));
    }

    #[test]
    fn other_statuses_report_code() {
        let err = TransportError::Status {
            status: 502,
            body: "bad gateway".into(),
            first_step: false,
        };
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[test]
    fn bad_api_key_header_name_is_rejected() {
        let mut cfg =
            IdvConfig::local_mock("http://127.0.0.1:9000", ProtocolVariant::polling()).unwrap();
        cfg.api_key_header = "bad header".into();
        assert!(matches!(
            HttpTransport::new(&cfg),
            Err(TransportError::Setup(_))
        ));
    }

    #[tokio::test]
    async fn closed_port_is_a_connect_error() {
        let mut cfg = IdvConfig::local_mock("http://127.0.0.1:1", ProtocolVariant::polling())
            .unwrap();
        cfg.timeout_secs = 1;
        let transport = HttpTransport::new(&cfg).unwrap();
        let err = transport
            .send(TransportRequest::new(Method::GET, "http://127.0.0.1:1/"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Connect { .. } | TransportError::Timeout
        ));
    }
}
