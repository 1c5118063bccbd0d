//! Drift evaluator
//!
//! Classifies an observed response as removed, up to date, or drifted, and
//! decides whether a resource has ever been created.

use http_provider_common::crd::{HttpResponse, RequestAction};

use crate::model::{ResourceSpec, Status};
use crate::predicate::PredicateError;

/// Outcome of a successful Observe call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Observation {
    /// The resource has not been created yet
    Absent,
    /// The resource existed and the removal check now fires
    Removed,
    /// The resource exists
    Present {
        /// Whether it matches the desired state
        up_to_date: bool,
    },
}

impl Observation {
    /// Whether the caller should run Create next
    pub fn needs_create(self) -> bool {
        matches!(self, Self::Absent | Self::Removed)
    }

    /// Whether the caller should run Update next
    pub fn needs_update(self) -> bool {
        matches!(self, Self::Present { up_to_date: false })
    }
}

/// Whether the resource has never been successfully created
///
/// True when no response was ever recorded, or when the last request was a
/// create that came back with an HTTP error status.
pub fn object_not_created(status: &Status) -> bool {
    if !status.has_response() {
        return true;
    }

    let last_was_create = match status.request_details.action {
        Some(action) => action == RequestAction::Create,
        None => status.request_details.method.eq_ignore_ascii_case("POST"),
    };
    last_was_create && status.response.is_http_error()
}

/// Run the removal check, then the up-to-date check
pub fn evaluate(spec: &ResourceSpec, response: &HttpResponse) -> Result<Observation, PredicateError> {
    if spec.is_removed_check.evaluate(response)? {
        return Ok(Observation::Removed);
    }
    let up_to_date = spec.expected_response_check.evaluate(response)?;
    Ok(Observation::Present { up_to_date })
}
