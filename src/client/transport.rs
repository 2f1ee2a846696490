//! HTTP transport for the API client
//!
//! A [`Transport`] sends one request and reports what came back: a status, a
//! parsed body and any cookies the backend set. It knows nothing about
//! tokens, retries or renewal; [`crate::client::ApiClient`] layers those on
//! top. [`HttpTransport`] is the production implementation over a blocking
//! `reqwest` client.

use crate::types::{FinesError, Result};
use reqwest::header::{ACCEPT, COOKIE};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// HTTP methods used against the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outgoing call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the backend base URL, including any query string
    pub path: String,
    pub body: Option<Value>,
    /// Cookies to send (`name`, `value`)
    pub cookies: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, path: &str) -> Self {
        ApiRequest {
            method,
            path: path.to_string(),
            body: None,
            cookies: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    /// Value of the `Cookie` header, if any cookies are attached
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// What the backend answered
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` for an empty body, a string for non-JSON text
    pub body: Value,
    /// Cookies set by the response
    pub cookies: HashMap<String, String>,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        ApiResponse {
            status,
            body,
            cookies: HashMap::new(),
        }
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_string(), value.to_string());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why a request produced no response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request exceeded the configured timeout; eligible for retry
    #[error("request timed out")]
    Timeout,
    /// Anything else: connection refused, TLS failure, unreadable body
    #[error("{0}")]
    Failed(String),
}

/// Sends a single request
pub trait Transport {
    fn send(&mut self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError>;
}

/// Blocking `reqwest` transport
#[derive(Debug)]
pub struct HttpTransport {
    http: reqwest::blocking::Client,
    base_url: String,
    tenant: String,
}

impl HttpTransport {
    /// Build a transport for one backend tenant
    ///
    /// # Arguments
    ///
    /// * `base_url` - Backend root, e.g. `https://okapi.example.edu`
    /// * `tenant` - Value of the `x-okapi-tenant` header sent with every call
    /// * `timeout` - Per-request timeout; expiry surfaces as [`TransportError::Timeout`]
    pub fn new(base_url: &str, tenant: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FinesError::transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(HttpTransport {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tenant: tenant.to_string(),
        })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Failed(error.to_string())
    }
}

impl Transport for HttpTransport {
    fn send(&mut self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = match request.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Delete => self.http.delete(&url),
        };
        builder = builder
            .header("x-okapi-tenant", &self.tenant)
            .header(ACCEPT, "application/json");
        if let Some(cookie) = request.cookie_header() {
            builder = builder.header(COOKIE, cookie);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().map_err(classify)?;
        let status = response.status().as_u16();
        let cookies = response
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        let text = response.text().map_err(classify)?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(ApiResponse {
            status,
            body,
            cookies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cookie_header() {
        let request = ApiRequest::new(Method::Get, "/accounts")
            .with_cookie("folioAccessToken", "abc")
            .with_cookie("other", "1");
        assert_eq!(
            request.cookie_header().as_deref(),
            Some("folioAccessToken=abc; other=1")
        );
        assert_eq!(ApiRequest::new(Method::Get, "/").cookie_header(), None);
    }

    #[test]
    fn test_response_success_range() {
        assert!(ApiResponse::new(201, json!({})).is_success());
        assert!(ApiResponse::new(204, Value::Null).is_success());
        assert!(!ApiResponse::new(401, Value::Null).is_success());
        assert!(!ApiResponse::new(422, Value::Null).is_success());
    }

    #[test]
    fn test_http_transport_trims_base_url() {
        let transport =
            HttpTransport::new("https://okapi.example.edu/", "diku", Duration::from_secs(1))
                .unwrap();
        assert_eq!(transport.base_url, "https://okapi.example.edu");
    }
}
