//! HTTP executor
//!
//! The engine sends exactly one request per call through [`HttpClient`]. A
//! transport failure (connection, TLS, deadline) is a [`TransportError`]; a
//! non-2xx response is data, not an error.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use http_provider_common::crd::{Headers, HttpResponse, RequestDetails};

/// Transport-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be built (bad method, header, or URL)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request failed in flight
    #[error("request failed: {0}")]
    Request(String),

    /// No response before the deadline
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Sends one rendered request and returns the response
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send a request
    ///
    /// # Arguments
    ///
    /// * `request` - Fully rendered request
    /// * `insecure_skip_tls_verify` - Accept invalid TLS certificates
    async fn send(
        &self,
        request: &RequestDetails,
        insecure_skip_tls_verify: bool,
    ) -> Result<HttpResponse, TransportError>;
}

/// [`HttpClient`] backed by reqwest
///
/// Holds one verifying and one non-verifying client so connection pools are
/// reused across calls.
pub struct ReqwestHttpClient {
    secure: reqwest::Client,
    insecure: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Build both underlying clients
    pub fn new() -> Result<Self, TransportError> {
        let secure = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let insecure = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self { secure, insecure })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(
        &self,
        request: &RequestDetails,
        insecure_skip_tls_verify: bool,
    ) -> Result<HttpResponse, TransportError> {
        let client = if insecure_skip_tls_verify {
            &self.insecure
        } else {
            &self.secure
        };

        let method = reqwest::Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("method {}: {}", request.method, e)))?;

        let mut builder = client.request(method, &request.url);
        for (name, values) in &request.headers {
            for value in values {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                TransportError::InvalidRequest(e.to_string())
            } else {
                TransportError::Request(e.to_string())
            }
        })?;

        let status_code = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Request(format!("reading body: {}", e)))?;

        Ok(HttpResponse {
            status_code,
            body,
            headers,
        })
    }
}

/// Response headers keyed by canonical name (`Content-Type`, `X-Request-Id`)
fn collect_headers(map: &reqwest::header::HeaderMap) -> Headers {
    let mut headers: Headers = BTreeMap::new();
    for (name, value) in map {
        headers
            .entry(canonical_header_name(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    headers
}

/// Upper-case the first letter of each hyphen-separated word, lower-case the rest
///
/// Names holding anything but ASCII letters, digits, and hyphens are kept as
/// they are.
fn canonical_header_name(name: &str) -> String {
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return name.to_string();
    }
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() };
            upper = c == '-';
            out
        })
        .collect()
}
