//! Canonical resource model the engine operates on
//!
//! Every resource kind is translated into a [`ResourceSpec`] by an adapter
//! (see [`crate::adapter`]); the engine never looks at CRD types directly.
//! Status needs no translation: all kinds persist the same
//! [`RequestStatus`].

use std::fmt;
use std::time::Duration;

use http_provider_common::crd::{Headers, HttpResponse, Mapping, Payload, ResponseCheckSpec};

use crate::error::ReconcileError;
use crate::predicate::{Predicate, PredicateError};

pub use http_provider_common::crd::RequestStatus as Status;

/// Check kind meaning "use the built-in status code check"
pub const CHECK_DEFAULT: &str = "DEFAULT";
/// Check kind meaning "evaluate the `logic` expression"
pub const CHECK_CUSTOM: &str = "CUSTOM";

/// Desired state of one external resource
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceSpec {
    /// Per-action request templates
    pub mappings: Vec<Mapping>,
    /// Static template data
    pub payload: Payload,
    /// Default headers, overridden per name by mapping headers
    pub headers: Headers,
    /// Decides whether an observed resource is up to date
    pub expected_response_check: ResponseCheck,
    /// Decides whether an observed resource has been removed
    pub is_removed_check: ResponseCheck,
    /// Response fields to copy into secrets
    pub secret_injections: Vec<SecretInjection>,
    /// Namespace for secret references that do not name one
    pub secret_namespace: Option<String>,
    /// Deadline for each request and secret store call
    pub wait_timeout: Duration,
    /// Skip TLS certificate verification
    pub insecure_skip_tls_verify: bool,
    /// Failure count at which the retry limit policy is consulted
    pub rollback_retries_limit: Option<i32>,
    /// Keep dispatching after a successful one-shot request
    pub should_loop_infinitely: bool,
    /// Interval until the next reconciliation
    pub next_reconcile: Option<Duration>,
}

/// A secret injection target with its namespace resolved
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretInjection {
    /// Secret namespace
    pub namespace: String,
    /// Secret name
    pub name: String,
    /// Key to write
    pub key: String,
    /// Path into the response context
    pub response_path: String,
}

impl fmt::Display for SecretInjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}[{}]", self.namespace, self.name, self.key)
    }
}

// =============================================================================
// Response checks
// =============================================================================

/// A validated response check
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseCheck {
    /// Passes on any 2xx status
    StatusSuccess,
    /// Passes on a 404 status
    StatusNotFound,
    /// Passes when the expression evaluates to true
    Custom(String),
}

impl ResponseCheck {
    /// Validate a declared check, using `default` for `DEFAULT` or an unset kind
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Configuration`] for an unknown kind or a
    /// `CUSTOM` check without logic.
    pub fn from_spec(
        spec: Option<&ResponseCheckSpec>,
        default: ResponseCheck,
        field: &str,
    ) -> Result<Self, ReconcileError> {
        let Some(spec) = spec else {
            return Ok(default);
        };

        match spec.check_type.as_str() {
            "" | CHECK_DEFAULT => Ok(default),
            CHECK_CUSTOM => match spec.logic.as_deref().map(str::trim) {
                Some(logic) if !logic.is_empty() => Ok(Self::Custom(logic.to_string())),
                _ => Err(ReconcileError::Configuration(format!(
                    "{} is CUSTOM but has no logic",
                    field
                ))),
            },
            other => Err(ReconcileError::Configuration(format!(
                "{} has unknown type '{}' (expected {} or {})",
                field, other, CHECK_DEFAULT, CHECK_CUSTOM
            ))),
        }
    }

    /// Evaluate the check against a response
    ///
    /// Custom expressions are parsed here, so a malformed expression surfaces
    /// as a [`PredicateError`] on the call that uses it.
    pub fn evaluate(&self, response: &HttpResponse) -> Result<bool, PredicateError> {
        match self {
            Self::StatusSuccess => Ok(response.is_success()),
            Self::StatusNotFound => Ok(response.status_code == 404),
            Self::Custom(logic) => Predicate::parse(logic)?.evaluate_response(response),
        }
    }
}
