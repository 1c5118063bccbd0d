//! Template context for request rendering
//!
//! Provides the values request templates can reference:
//! - `${payload.baseUrl}`, `${payload.body}` - Static payload from the resource
//! - `${response.statusCode}`, `${response.headers}`, `${response.body}` - Cached response
//! - `${secrets.*}` - Resolved secret values (populated from `${secret.*}` references)
//!
//! JSON bodies are exposed as structured data so templates can reach into
//! them (`${response.body.id}`); anything else is exposed as a plain string.

use std::collections::BTreeMap;

use minijinja::Value;
use serde_json::json;

use crate::crd::{parse_json_or_string, HttpResponse, Payload};

/// Template context containing all values available for placeholder resolution
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    payload: serde_json::Value,
    response: Option<serde_json::Value>,
    secrets: BTreeMap<String, String>,
}

impl TemplateContext {
    /// Create a new builder for TemplateContext
    pub fn builder() -> TemplateContextBuilder {
        TemplateContextBuilder::default()
    }

    /// Convert to minijinja Value for rendering
    ///
    /// `response` is left out entirely when nothing has been cached, so a
    /// template referencing it fails under strict undefined handling.
    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("payload".to_string(), self.payload.clone());
        if let Some(response) = &self.response {
            map.insert("response".to_string(), response.clone());
        }
        map.insert("secrets".to_string(), json!(self.secrets));
        Value::from_serialize(serde_json::Value::Object(map))
    }
}

/// Builder for TemplateContext
#[derive(Debug, Default)]
pub struct TemplateContextBuilder {
    payload: Option<Payload>,
    response: Option<HttpResponse>,
    secrets: BTreeMap<String, String>,
}

impl TemplateContextBuilder {
    /// Set the static payload
    pub fn payload(mut self, payload: &Payload) -> Self {
        self.payload = Some(payload.clone());
        self
    }

    /// Set the cached response; an empty response (status 0) is ignored
    pub fn response(mut self, response: &HttpResponse) -> Self {
        if response.status_code != 0 {
            self.response = Some(response.clone());
        }
        self
    }

    /// Add a resolved secret value under its alias
    pub fn secret(mut self, alias: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(alias.into(), value.into());
        self
    }

    /// Build the TemplateContext
    pub fn build(self) -> TemplateContext {
        let payload = self.payload.unwrap_or_default();
        let payload = json!({
            "baseUrl": payload.base_url.unwrap_or_default(),
            "body": payload
                .body
                .as_deref()
                .map(parse_json_or_string)
                .unwrap_or(serde_json::Value::Null),
        });

        let response = self.response.map(|r| {
            json!({
                "statusCode": r.status_code,
                "headers": r.headers,
                "body": r.parsed_body(),
            })
        });

        TemplateContext {
            payload,
            response,
            secrets: self.secrets,
        }
    }
}
