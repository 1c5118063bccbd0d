//! Request renderer
//!
//! Turns a [`Mapping`] into a concrete [`RequestDetails`]: secret references
//! are resolved through the secret store, then URL, body, and header values
//! are rendered against the payload and the cached response. Any failure is
//! a [`TemplateError`] and the request is never sent.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::Url;

use http_provider_common::crd::{Headers, Mapping, RequestAction, RequestDetails};
use http_provider_common::template::{
    extract_secret_refs, SecretReference, TemplateContext, TemplateEngine, TemplateError,
};

use crate::model::{ResourceSpec, Status};
use crate::secrets::{SecretStore, SecretStoreError};

/// Renders mappings into requests
pub struct RequestRenderer {
    engine: TemplateEngine,
    secrets: Arc<dyn SecretStore>,
}

impl RequestRenderer {
    /// Create a renderer resolving secrets through `secrets`
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            engine: TemplateEngine::new(),
            secrets,
        }
    }

    /// Render `mapping` for `action` against the spec and prior status
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] for an undefined field, a malformed or
    /// missing secret reference, or a URL that is not absolute http(s).
    pub async fn render(
        &self,
        action: RequestAction,
        mapping: &Mapping,
        spec: &ResourceSpec,
        status: &Status,
    ) -> Result<RequestDetails, TemplateError> {
        let mut session = RenderSession {
            renderer: self,
            spec,
            status,
            resolved: BTreeMap::new(),
        };

        let url = session.render(&mapping.url).await?;
        validate_url(&url)?;

        let body = match &mapping.body {
            Some(template) => session.render(template).await?,
            None => String::new(),
        };

        let mut headers: Headers = BTreeMap::new();
        for (name, templates) in merged_headers(&spec.headers, &mapping.headers) {
            let mut values = Vec::with_capacity(templates.len());
            for template in templates {
                values.push(session.render(template).await?);
            }
            headers.insert(name.clone(), values);
        }

        Ok(RequestDetails {
            action: Some(action),
            method: mapping.method.to_ascii_uppercase(),
            url,
            body,
            headers,
        })
    }
}

type SecretKey = (String, String, String);

/// State for one render call; secrets read once are reused across fields
struct RenderSession<'a> {
    renderer: &'a RequestRenderer,
    spec: &'a ResourceSpec,
    status: &'a Status,
    resolved: BTreeMap<SecretKey, String>,
}

impl RenderSession<'_> {
    async fn render(&mut self, template: &str) -> Result<String, TemplateError> {
        if !TemplateEngine::has_template_syntax(template) {
            return Ok(template.to_string());
        }

        let (rewritten, refs) = extract_secret_refs(template)?;

        let mut builder = TemplateContext::builder()
            .payload(&self.spec.payload)
            .response(&self.status.cache.response);
        for reference in &refs {
            let value = self.secret(reference).await?;
            builder = builder.secret(reference.alias.clone(), value);
        }

        self.renderer.engine.render(&rewritten, &builder.build())
    }

    async fn secret(&mut self, reference: &SecretReference) -> Result<String, TemplateError> {
        let namespace = reference
            .namespace
            .clone()
            .or_else(|| self.spec.secret_namespace.clone())
            .ok_or_else(|| {
                TemplateError::InvalidSecretRef(format!(
                    "secret.{}.{} must name a namespace (secret.NAMESPACE/NAME.KEY)",
                    reference.name, reference.key
                ))
            })?;

        let cache_key = (namespace.clone(), reference.name.clone(), reference.key.clone());
        if let Some(value) = self.resolved.get(&cache_key) {
            return Ok(value.clone());
        }

        let timeout = self.spec.wait_timeout;
        let value = tokio::time::timeout(
            timeout,
            self.renderer
                .secrets
                .read(&namespace, &reference.name, &reference.key),
        )
        .await
        .map_err(|_| SecretStoreError::Timeout(timeout))
        .and_then(|r| r)
        .map_err(|e| TemplateError::SecretLookup(e.to_string()))?
        .ok_or_else(|| TemplateError::missing_secret(&namespace, &reference.name, &reference.key))?;

        self.resolved.insert(cache_key, value.clone());
        Ok(value)
    }
}

/// Default headers first, mapping headers replacing them by name
fn merged_headers<'a>(defaults: &'a Headers, overrides: &'a Headers) -> BTreeMap<&'a String, &'a Vec<String>> {
    let mut merged: BTreeMap<&String, &Vec<String>> = defaults.iter().collect();
    merged.extend(overrides.iter());
    merged
}

fn validate_url(raw: &str) -> Result<(), TemplateError> {
    let invalid = |reason: String| TemplateError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}
