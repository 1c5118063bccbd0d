//! Reconciliation error taxonomy

use thiserror::Error;

use http_provider_common::crd::RequestAction;
use http_provider_common::template::TemplateError;

use crate::http::TransportError;
use crate::predicate::PredicateError;

/// Errors returned by a reconcile call
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The resource spec is invalid; raised before any request is sent
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No mapping serves the requested action
    #[error("no mapping for action {0}")]
    NoMapping(RequestAction),

    /// A request template could not be rendered
    #[error("failed to render request: {0}")]
    TemplateRender(#[from] TemplateError),

    /// The request could not be sent or no response arrived in time
    #[error("failed to send request: {0}")]
    Transport(#[from] TransportError),

    /// A mutating request returned a non-2xx status
    #[error("unexpected response status {status_code}")]
    UnexpectedStatus {
        /// Status code received
        status_code: u16,
    },

    /// A response check could not be evaluated
    #[error("failed to evaluate response check: {0}")]
    PredicateEvaluation(#[from] PredicateError),

    /// A disposable request's response did not satisfy its expected response check
    #[error("response does not match expected response")]
    ResponseMismatch,

    /// The retry limit policy refused to send another request
    #[error("retry limit reached after {failed} consecutive failures (limit {limit})")]
    RetriesExhausted {
        /// Current failure count
        failed: i32,
        /// Configured limit
        limit: i32,
    },

    /// Wraps any failure with the action that produced it
    #[error("{action} request failed: {source}")]
    Action {
        /// Action being reconciled
        action: RequestAction,
        /// Underlying failure
        #[source]
        source: Box<ReconcileError>,
    },
}

impl ReconcileError {
    /// Wrap this error with the action that produced it
    pub fn for_action(self, action: RequestAction) -> Self {
        match self {
            wrapped @ Self::Action { .. } => wrapped,
            other => Self::Action {
                action,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping action wrappers
    pub fn cause(&self) -> &ReconcileError {
        match self {
            Self::Action { source, .. } => source.cause(),
            other => other,
        }
    }

    /// Whether the retry limit stopped this call
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self.cause(), Self::RetriesExhausted { .. })
    }

    /// Whether the spec itself is at fault, so retrying without a spec
    /// change cannot help
    pub fn is_configuration(&self) -> bool {
        matches!(self.cause(), Self::Configuration(_))
    }
}
