//! Secret reference extraction
//!
//! Templates reference secrets as `${secret.NAME.KEY}` or
//! `${secret.NAMESPACE/NAME.KEY}`, optionally followed by filters
//! (`${secret.creds.password | base64_encode}`). Secret names cannot contain
//! dots, so everything after the first dot is the key.
//!
//! Extraction rewrites each reference into a lookup on the `secrets` context
//! map (`${ secrets.secret_0 }`) so values are resolved before rendering and
//! never appear in the template source.

use super::error::TemplateError;

const SECRET_PREFIX: &str = "secret.";

/// A `${secret.*}` reference found in a template
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretReference {
    /// Explicit namespace, if the reference named one
    pub namespace: Option<String>,
    /// Secret name
    pub name: String,
    /// Key within the secret
    pub key: String,
    /// Identifier the reference was rewritten to under `secrets`
    pub alias: String,
}

/// Extract `${secret.*}` references and rewrite them into `secrets` lookups.
///
/// Escaped references (`$${secret.x.y}`) are left untouched. References are
/// deduplicated: the same secret key always maps to the same alias.
///
/// # Errors
///
/// Returns [`TemplateError::InvalidSecretRef`] when a reference is missing its
/// name or key.
pub fn extract_secret_refs(
    template: &str,
) -> Result<(String, Vec<SecretReference>), TemplateError> {
    let mut result = String::with_capacity(template.len());
    let mut refs: Vec<SecretReference> = Vec::new();
    let mut remaining = template;

    while let Some(start) = remaining.find("${") {
        let escaped = remaining[..start].ends_with('$');
        result.push_str(&remaining[..start + 2]);
        let after_open = &remaining[start + 2..];

        let Some(end) = after_open.find('}') else {
            result.push_str(after_open);
            remaining = "";
            break;
        };

        let inner = &after_open[..end];
        let trimmed = inner.trim_start();
        if escaped || !trimmed.starts_with(SECRET_PREFIX) {
            result.push_str(inner);
            result.push('}');
            remaining = &after_open[end + 1..];
            continue;
        }

        let body = &trimmed[SECRET_PREFIX.len()..];
        let token_end = body
            .find(|c: char| c.is_whitespace() || c == '|')
            .unwrap_or(body.len());
        let (token, filters) = body.split_at(token_end);
        let (namespace, name, key) = parse_secret_ref(token)?;

        let alias = match refs
            .iter()
            .find(|r| r.namespace == namespace && r.name == name && r.key == key)
        {
            Some(existing) => existing.alias.clone(),
            None => {
                let alias = format!("secret_{}", refs.len());
                refs.push(SecretReference {
                    namespace,
                    name,
                    key,
                    alias: alias.clone(),
                });
                alias
            }
        };

        result.push_str(" secrets.");
        result.push_str(&alias);
        result.push_str(filters);
        if !filters.ends_with(char::is_whitespace) {
            result.push(' ');
        }
        result.push('}');
        remaining = &after_open[end + 1..];
    }

    result.push_str(remaining);
    Ok((result, refs))
}

/// Parse `NAME.KEY` or `NAMESPACE/NAME.KEY` into `(namespace, name, key)`.
pub fn parse_secret_ref(
    token: &str,
) -> Result<(Option<String>, String, String), TemplateError> {
    let invalid = || TemplateError::InvalidSecretRef(format!("secret.{}", token));

    let (namespace, rest) = match token.split_once('/') {
        Some((ns, rest)) if !ns.is_empty() && !ns.contains('.') => (Some(ns.to_string()), rest),
        Some(_) => return Err(invalid()),
        None => (None, token),
    };

    let (name, key) = rest.split_once('.').ok_or_else(invalid)?;
    if name.is_empty() || key.is_empty() || name.contains('/') {
        return Err(invalid());
    }

    Ok((namespace, name.to_string(), key.to_string()))
}
