//! Status tracker
//!
//! The only code that changes [`Status`]. Each reconcile call records at
//! most one [`Outcome`], taking the previous status by value and returning
//! the next one.

use chrono::{DateTime, SecondsFormat, Utc};

use http_provider_common::crd::{Cache, HttpResponse, RequestDetails};

use crate::model::Status;

/// What happened during one reconcile call
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Outcome {
    /// Request that was dispatched, if any
    pub request: Option<RequestDetails>,
    /// Response received, if any
    pub response: Option<HttpResponse>,
    /// Whether the resource is in the desired state
    pub synced: bool,
    /// Failure message when the call ended in error
    pub error: Option<String>,
}

impl Outcome {
    /// A call that received a response without error
    pub fn completed(request: RequestDetails, response: HttpResponse, synced: bool) -> Self {
        Self {
            request: Some(request),
            response: Some(response),
            synced,
            error: None,
        }
    }

    /// A call that ended in error
    pub fn failed(
        request: Option<RequestDetails>,
        response: Option<HttpResponse>,
        error: impl ToString,
    ) -> Self {
        Self {
            request,
            response,
            synced: false,
            error: Some(error.to_string()),
        }
    }
}

/// Applies outcomes to status
pub struct StatusTracker;

impl StatusTracker {
    /// Record `outcome` onto `status` at time `now`
    ///
    /// - `requestDetails` mirrors the dispatched request
    /// - an error increments `failed` and sets `error`
    /// - `synced` resets `failed` to zero and clears `error`, winning over an error
    /// - a received response, of any status code, refreshes `response` and `cache`
    /// - `lastReconcileTime` is always set
    pub fn record(mut status: Status, outcome: Outcome, now: DateTime<Utc>) -> Status {
        let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);

        if let Some(request) = outcome.request {
            status.request_details = request;
        }

        if let Some(message) = outcome.error {
            status.failed = status.failed.saturating_add(1);
            status.error = message;
        }

        status.synced = outcome.synced;
        if outcome.synced {
            status.failed = 0;
            status.error.clear();
        }

        if let Some(response) = outcome.response {
            status.cache = Cache {
                last_updated: timestamp.clone(),
                response: response.clone(),
            };
            status.response = response;
        }

        status.last_reconcile_time = Some(timestamp);
        status
    }
}
