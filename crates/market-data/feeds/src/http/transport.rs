//! Single-attempt HTTP transport

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

use super::error::{HttpError, TransportErrorKind};

/// One outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Request with the given method and URL
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Performs exactly one attempt of a request and returns the parsed JSON body
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send the request. Non-2xx responses must map to [`HttpError::Status`].
    async fn send(&self, request: &HttpRequest) -> Result<Value, HttpError>;
}

/// `reqwest` backed transport holding the pooled session
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a session with a total per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

// reqwest renders the full URL, query included, into its messages. Query
// strings carry API keys, so the URL is stripped and `url` (no query) is kept.
fn transport_error(url: &str, error: reqwest::Error) -> HttpError {
    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Request
    };
    HttpError::transport(kind, url, error.without_url().to_string())
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<Value, HttpError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(&request.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: request.url.clone(),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_decode() {
                HttpError::Decode {
                    url: request.url.clone(),
                    message: e.without_url().to_string(),
                }
            } else {
                transport_error(&request.url, e)
            }
        })
    }
}
