//! Types shared by every HTTP provider resource kind
//!
//! The request-shaped kinds (`Request`, `NamespacedRequest`,
//! `DisposableRequest`) differ only in scope and in how their parameters are
//! laid out. Everything below is common to all three: mappings, response
//! checks, secret injection targets, and the persisted status record.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Header map: name to ordered list of values
pub type Headers = BTreeMap<String, Vec<String>>;

// =============================================================================
// Actions
// =============================================================================

/// Abstract action a mapping is bound to
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestAction {
    /// Create the external resource
    Create,
    /// Probe the external resource
    Observe,
    /// Bring the external resource up to date
    Update,
    /// Delete the external resource
    #[serde(alias = "DELETE")]
    Remove,
}

impl RequestAction {
    /// Whether this action changes the external resource
    pub fn is_mutating(self) -> bool {
        !matches!(self, Self::Observe)
    }

    /// Action implied by an HTTP method when a mapping names no action
    pub fn implied_by_method(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "POST" => Some(Self::Create),
            "GET" => Some(Self::Observe),
            "PUT" | "PATCH" => Some(Self::Update),
            "DELETE" => Some(Self::Remove),
            _ => None,
        }
    }
}

impl fmt::Display for RequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Observe => write!(f, "OBSERVE"),
            Self::Update => write!(f, "UPDATE"),
            Self::Remove => write!(f, "REMOVE"),
        }
    }
}

// =============================================================================
// Request templates
// =============================================================================

/// One action's request template
///
/// `url`, `body`, and header values are templates rendered against the
/// payload, the cached response, and secret references.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    /// Action this mapping serves; inferred from the method when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RequestAction>,

    /// HTTP method (GET, POST, PUT, PATCH, DELETE, ...)
    pub method: String,

    /// URL template
    pub url: String,

    /// Body template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Header templates, merged over the resource's default headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: Headers,
}

/// Static data made available to templates as `payload`
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    /// Base URL, available as `${ payload.baseUrl }`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Body, available as `${ payload.body }` (parsed when it is JSON)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

// =============================================================================
// Response checks
// =============================================================================

/// Declared response check, validated into a predicate before use
///
/// `type` is `DEFAULT`, `CUSTOM`, or empty (same as `DEFAULT`). Anything else
/// is rejected before a request is sent.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseCheckSpec {
    /// Check kind
    #[serde(rename = "type", default)]
    pub check_type: String,

    /// Predicate expression, required for `CUSTOM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<String>,
}

// =============================================================================
// Secrets
// =============================================================================

/// Reference to a Kubernetes Secret
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    /// Secret name
    pub name: String,

    /// Secret namespace; defaults to the resource's namespace when it has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Copy one response field into a secret key
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretInjectionConfig {
    /// Target secret
    pub secret_ref: SecretRef,

    /// Key within the secret to write
    pub secret_key: String,

    /// Path into the response context, e.g. `.body.token`
    pub response_path: String,
}

// =============================================================================
// Status
// =============================================================================

/// Response received from the external system
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    /// HTTP status code; zero when nothing has been received
    #[serde(default)]
    pub status_code: u16,

    /// Raw body
    #[serde(default)]
    pub body: String,

    /// Response headers
    #[serde(default)]
    pub headers: Headers,
}

impl HttpResponse {
    /// Whether the status code is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Whether the status code is a 4xx or 5xx
    pub fn is_http_error(&self) -> bool {
        self.status_code >= 400
    }

    /// Body as JSON when it parses, otherwise the raw string
    pub fn parsed_body(&self) -> serde_json::Value {
        parse_json_or_string(&self.body)
    }
}

/// Parse a string as JSON, falling back to a JSON string of the input
pub fn parse_json_or_string(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

/// Last response together with the time it was received
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cache {
    /// RFC 3339 timestamp of the cached response
    #[serde(default)]
    pub last_updated: String,

    /// Cached response
    #[serde(default)]
    pub response: HttpResponse,
}

/// Echo of the last request actually dispatched
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    /// Action the request was sent for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RequestAction>,

    /// HTTP method
    #[serde(default)]
    pub method: String,

    /// Rendered URL
    #[serde(default)]
    pub url: String,

    /// Rendered body
    #[serde(default)]
    pub body: String,

    /// Rendered headers
    #[serde(default)]
    pub headers: Headers,
}

/// Persisted status shared by all request kinds
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatus {
    /// Most recent response
    #[serde(default)]
    pub response: HttpResponse,

    /// Most recent successfully received response and its timestamp
    #[serde(default)]
    pub cache: Cache,

    /// Consecutive failed reconciliations
    #[serde(default)]
    pub failed: i32,

    /// Last failure message, empty when clear
    #[serde(default)]
    pub error: String,

    /// Whether the last reconciliation found the resource up to date
    #[serde(default)]
    pub synced: bool,

    /// Last request dispatched
    #[serde(default)]
    pub request_details: RequestDetails,

    /// RFC 3339 timestamp of the last reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconcile_time: Option<String>,
}

impl RequestStatus {
    /// Whether a response has ever been recorded
    pub fn has_response(&self) -> bool {
        self.response.status_code != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_round_trip_on_the_wire() {
        let action: RequestAction = serde_json::from_str("\"CREATE\"").unwrap();
        assert_eq!(action, RequestAction::Create);
        assert_eq!(
            serde_json::to_string(&RequestAction::Remove).unwrap(),
            "\"REMOVE\""
        );
    }

    #[test]
    fn delete_is_an_alias_of_remove() {
        let action: RequestAction = serde_json::from_str("\"DELETE\"").unwrap();
        assert_eq!(action, RequestAction::Remove);
    }

    #[test]
    fn methods_imply_actions_case_insensitively() {
        assert_eq!(RequestAction::implied_by_method("post"), Some(RequestAction::Create));
        assert_eq!(RequestAction::implied_by_method("GET"), Some(RequestAction::Observe));
        assert_eq!(RequestAction::implied_by_method("Put"), Some(RequestAction::Update));
        assert_eq!(RequestAction::implied_by_method("PATCH"), Some(RequestAction::Update));
        assert_eq!(RequestAction::implied_by_method("delete"), Some(RequestAction::Remove));
        assert_eq!(RequestAction::implied_by_method("HEAD"), None);
    }

    #[test]
    fn only_observe_is_non_mutating() {
        assert!(!RequestAction::Observe.is_mutating());
        assert!(RequestAction::Create.is_mutating());
        assert!(RequestAction::Update.is_mutating());
        assert!(RequestAction::Remove.is_mutating());
    }

    #[test]
    fn status_serializes_stable_field_names() {
        let status = RequestStatus {
            failed: 2,
            error: String::new(),
            last_reconcile_time: Some("2024-01-01T00:00:00Z".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["failed"], 2);
        assert_eq!(json["error"], "");
        assert_eq!(json["synced"], false);
        assert!(json["response"].get("statusCode").is_some());
        assert!(json["cache"].get("lastUpdated").is_some());
        assert!(json["requestDetails"].get("url").is_some());
        assert_eq!(json["lastReconcileTime"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn response_classification() {
        let ok = HttpResponse {
            status_code: 204,
            ..Default::default()
        };
        assert!(ok.is_success());
        assert!(!ok.is_http_error());

        let missing = HttpResponse {
            status_code: 404,
            ..Default::default()
        };
        assert!(!missing.is_success());
        assert!(missing.is_http_error());

        let redirect = HttpResponse {
            status_code: 302,
            ..Default::default()
        };
        assert!(!redirect.is_success());
        assert!(!redirect.is_http_error());
    }

    #[test]
    fn parsed_body_falls_back_to_string() {
        let json = HttpResponse {
            body: r#"{"id":"42"}"#.to_string(),
            ..Default::default()
        };
        assert_eq!(json.parsed_body()["id"], "42");

        let text = HttpResponse {
            body: "plain text".to_string(),
            ..Default::default()
        };
        assert_eq!(text.parsed_body(), serde_json::json!("plain text"));
    }

    #[test]
    fn empty_status_has_no_response() {
        assert!(!RequestStatus::default().has_response());
    }
}
