//! Predicate evaluation over HTTP responses
//!
//! Custom response checks are jq-style boolean expressions evaluated against
//! a context built from the response:
//!
//! ```text
//! { "statusCode": 200, "status": 200, "headers": {...}, "body": <JSON or string> }
//! ```
//!
//! Supported: path access (`.body.items[0].id`, `."quoted key"`, `.["key"]`),
//! string/number/boolean/null literals, `==` `!=` `<` `<=` `>` `>=`, `and`,
//! `or`, `| not`, and parentheses. A path that does not exist is an error,
//! not `null`, so a check never silently passes against the wrong shape of
//! response.

mod expr;

use serde_json::{json, Value};
use thiserror::Error;

use http_provider_common::crd::HttpResponse;

/// Errors raised while parsing or evaluating a predicate
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredicateError {
    /// The expression could not be parsed
    #[error("invalid expression '{expression}': {message}")]
    Syntax {
        /// The offending expression
        expression: String,
        /// What went wrong
        message: String,
    },

    /// A referenced path does not exist in the response
    #[error("path {path} does not exist in response")]
    MissingPath {
        /// The missing path
        path: String,
    },

    /// An operator was applied to values of the wrong type
    #[error("type mismatch: {message}")]
    Type {
        /// Description of the mismatch
        message: String,
    },

    /// The expression evaluated to something other than a boolean
    #[error("expression '{expression}' returned {found}, expected a boolean")]
    NotBoolean {
        /// The expression
        expression: String,
        /// JSON type of the result
        found: String,
    },
}

/// Build the evaluation context for a response
pub fn response_context(response: &HttpResponse) -> Value {
    json!({
        "statusCode": response.status_code,
        "status": response.status_code,
        "headers": response.headers,
        "body": response.parsed_body(),
    })
}

/// A parsed boolean predicate
#[derive(Clone, Debug)]
pub struct Predicate {
    source: String,
    expr: expr::Expr,
}

impl Predicate {
    /// Parse a predicate expression
    pub fn parse(source: &str) -> Result<Self, PredicateError> {
        Ok(Self {
            source: source.to_string(),
            expr: expr::parse(source)?,
        })
    }

    /// The expression this predicate was parsed from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a context, requiring a boolean result
    pub fn evaluate(&self, ctx: &Value) -> Result<bool, PredicateError> {
        match expr::evaluate(&self.expr, ctx)? {
            Value::Bool(b) => Ok(b),
            other => Err(PredicateError::NotBoolean {
                expression: self.source.clone(),
                found: expr::type_name(&other).to_string(),
            }),
        }
    }

    /// Evaluate against a response
    pub fn evaluate_response(&self, response: &HttpResponse) -> Result<bool, PredicateError> {
        self.evaluate(&response_context(response))
    }
}

/// Extract the value at `path` from a context
///
/// Returns `Ok(None)` when the path does not exist and an error only when the
/// path itself is malformed.
pub fn extract_path(path: &str, ctx: &Value) -> Result<Option<Value>, PredicateError> {
    let segments = expr::parse_path(path)?;
    Ok(expr::lookup(&segments, ctx).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status_code: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status_code,
            body: body.to_string(),
            headers: [(
                "Content-Type".to_string(),
                vec!["application/json".to_string()],
            )]
            .into_iter()
            .collect(),
        }
    }

    fn check(expression: &str, response: &HttpResponse) -> Result<bool, PredicateError> {
        Predicate::parse(expression)?.evaluate_response(response)
    }

    // =========================================================================
    // Story: job status checks
    // =========================================================================

    #[test]
    fn story_matching_job_status_is_true() {
        let result = check(
            r#".body.job_status == "success""#,
            &response(200, r#"{"job_status":"success"}"#),
        );
        assert_eq!(result, Ok(true));
    }

    #[test]
    fn story_pending_job_status_is_false() {
        let result = check(
            r#".body.job_status == "success""#,
            &response(200, r#"{"job_status":"pending"}"#),
        );
        assert_eq!(result, Ok(false));
    }

    #[test]
    fn story_missing_job_status_is_an_error() {
        let result = check(
            r#".body.job_status == "success""#,
            &response(200, r#"{"other":"x"}"#),
        );
        assert_eq!(
            result,
            Err(PredicateError::MissingPath {
                path: ".body.job_status".to_string()
            })
        );
    }

    // =========================================================================
    // Story: context shape
    // =========================================================================

    #[test]
    fn status_is_an_alias_of_status_code() {
        let resp = response(201, "{}");
        assert_eq!(check(".status == 201", &resp), Ok(true));
        assert_eq!(check(".statusCode == 201", &resp), Ok(true));
    }

    #[test]
    fn headers_are_lists() {
        let resp = response(200, "{}");
        assert_eq!(
            check(r#".headers."Content-Type"[0] == "application/json""#, &resp),
            Ok(true)
        );
    }

    #[test]
    fn non_json_body_is_a_string() {
        let resp = response(200, "ok");
        assert_eq!(check(r#".body == "ok""#, &resp), Ok(true));
    }

    // =========================================================================
    // Story: boolean combination
    // =========================================================================

    #[test]
    fn combines_with_and_or_not() {
        let resp = response(200, r#"{"ready":true,"count":3,"tags":["a","b"]}"#);
        assert_eq!(check(".body.ready and .body.count >= 3", &resp), Ok(true));
        assert_eq!(check(".body.ready and .body.count > 3", &resp), Ok(false));
        assert_eq!(check(".body.count < 1 or .body.tags[1] == \"b\"", &resp), Ok(true));
        assert_eq!(check(".body.ready | not", &resp), Ok(false));
        assert_eq!(check("(.body.count == 3 | not) or .status == 200", &resp), Ok(true));
    }

    #[test]
    fn equality_across_types_is_false() {
        let resp = response(200, r#"{"count":"3"}"#);
        assert_eq!(check(".body.count == 3", &resp), Ok(false));
        assert_eq!(check(".body.count != 3", &resp), Ok(true));
    }

    #[test]
    fn null_literal_matches_null_fields() {
        let resp = response(200, r#"{"deletedAt":null}"#);
        assert_eq!(check(".body.deletedAt == null", &resp), Ok(true));
    }

    // =========================================================================
    // Story: evaluation errors
    // =========================================================================

    #[test]
    fn ordering_mixed_types_is_an_error() {
        let resp = response(200, r#"{"count":"3"}"#);
        assert!(matches!(
            check(".body.count > 1", &resp),
            Err(PredicateError::Type { .. })
        ));
    }

    #[test]
    fn boolean_operators_require_booleans() {
        let resp = response(200, r#"{"name":"x"}"#);
        assert!(matches!(
            check(".body.name and true", &resp),
            Err(PredicateError::Type { .. })
        ));
        assert!(matches!(
            check(".body.name | not", &resp),
            Err(PredicateError::Type { .. })
        ));
    }

    #[test]
    fn non_boolean_result_is_an_error() {
        let resp = response(200, r#"{"name":"x"}"#);
        assert!(matches!(
            check(".body.name", &resp),
            Err(PredicateError::NotBoolean { .. })
        ));
    }

    #[test]
    fn indexing_a_scalar_is_a_missing_path() {
        let resp = response(200, r#"{"name":"x"}"#);
        assert!(matches!(
            check(".body.name.first == \"x\"", &resp),
            Err(PredicateError::MissingPath { .. })
        ));
    }

    #[test]
    fn malformed_expression_is_a_syntax_error() {
        assert!(matches!(
            Predicate::parse(".body.status = \"ready\""),
            Err(PredicateError::Syntax { .. })
        ));
    }

    // =========================================================================
    // Story: path extraction for secret injection
    // =========================================================================

    #[test]
    fn extract_path_returns_value_or_none() {
        let ctx = response_context(&response(200, r#"{"token":"abc","nested":{"n":1}}"#));
        assert_eq!(
            extract_path(".body.token", &ctx),
            Ok(Some(Value::String("abc".to_string())))
        );
        assert_eq!(extract_path(".body.nested", &ctx), Ok(Some(json!({"n": 1}))));
        assert_eq!(extract_path(".body.missing", &ctx), Ok(None));
        assert!(extract_path("body.token", &ctx).is_err());
    }
}
