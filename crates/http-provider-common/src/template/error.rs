//! Template error types

use std::fmt;

/// Errors that can occur while rendering a request template
#[derive(Debug)]
pub enum TemplateError {
    /// Template rendering failed (syntax, undefined variable, filter failure)
    Render(minijinja::Error),
    /// A `${secret.*}` reference is malformed
    InvalidSecretRef(String),
    /// A referenced secret or key does not exist
    MissingSecret {
        /// Secret namespace
        namespace: String,
        /// Secret name
        name: String,
        /// Key within the secret
        key: String,
    },
    /// A secret could not be read
    SecretLookup(String),
    /// The rendered URL is not an absolute http(s) URL
    InvalidUrl {
        /// The rendered URL
        url: String,
        /// Why it was rejected
        reason: String,
    },
}

impl TemplateError {
    /// Create a missing secret error
    pub fn missing_secret(namespace: &str, name: &str, key: &str) -> Self {
        Self::MissingSecret {
            namespace: namespace.to_string(),
            name: name.to_string(),
            key: key.to_string(),
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(e) => write!(f, "template render error: {}", e),
            Self::InvalidSecretRef(r) => write!(f, "invalid secret reference: {}", r),
            Self::MissingSecret {
                namespace,
                name,
                key,
            } => write!(f, "secret {}/{} has no key '{}'", namespace, name, key),
            Self::SecretLookup(msg) => write!(f, "secret lookup failed: {}", msg),
            Self::InvalidUrl { url, reason } => write!(f, "invalid URL '{}': {}", url, reason),
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(e) => Some(e),
            _ => None,
        }
    }
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        Self::Render(err)
    }
}
