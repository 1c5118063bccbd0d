//! Reconcile orchestrator
//!
//! Entry points the controllers call: [`Reconciler::observe`],
//! [`Reconciler::create`], [`Reconciler::update`], [`Reconciler::delete`],
//! and [`Reconciler::dispatch_disposable`]. Each takes the spec and the
//! current status, makes at most one HTTP request, and hands back the new
//! status (when it changed) next to the call's result. Errors are returned
//! only after the failure has been recorded in that status.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use http_provider_common::crd::{HttpResponse, Mapping, RequestAction, RequestDetails};

use crate::drift::{self, Observation};
use crate::error::ReconcileError;
use crate::http::{HttpClient, TransportError};
use crate::mapping;
use crate::model::{ResourceSpec, Status};
use crate::patcher::SecretPatcher;
use crate::render::RequestRenderer;
use crate::rollback::{limit_reached, HaltOnExhaustion, RetryDecision, RetryLimitPolicy};
use crate::secrets::SecretStore;
use crate::status::{Outcome, StatusTracker};

/// Source of the reconcile timestamp
pub type Clock = fn() -> DateTime<Utc>;

/// Result of one reconcile call
#[derive(Debug)]
#[must_use]
pub struct Reconciled<T> {
    /// New status to persist; `None` when the call left status untouched
    pub status: Option<Status>,
    /// Outcome of the call
    pub result: Result<T, ReconcileError>,
}

impl<T> Reconciled<T> {
    fn unchanged(result: Result<T, ReconcileError>) -> Self {
        Self {
            status: None,
            result,
        }
    }

    fn recorded(status: Status, result: Result<T, ReconcileError>) -> Self {
        Self {
            status: Some(status),
            result,
        }
    }

    fn for_action(mut self, action: RequestAction) -> Self {
        self.result = self.result.map_err(|e| e.for_action(action));
        self
    }
}

/// Outcome of a disposable request call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Already succeeded and not looping; nothing was sent
    AlreadySynced,
    /// A request was sent and its response matched
    Sent,
}

/// Composes mapping, rendering, transport, drift, secrets, and status
pub struct Reconciler {
    client: Arc<dyn HttpClient>,
    renderer: RequestRenderer,
    patcher: SecretPatcher,
    retry_policy: Arc<dyn RetryLimitPolicy>,
    clock: Clock,
}

impl Reconciler {
    /// Create an orchestrator with the halting retry policy
    pub fn new(client: Arc<dyn HttpClient>, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            client,
            renderer: RequestRenderer::new(secrets.clone()),
            patcher: SecretPatcher::new(secrets),
            retry_policy: Arc::new(HaltOnExhaustion),
            clock: Utc::now,
        }
    }

    /// Replace the retry limit policy
    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryLimitPolicy>) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    // =========================================================================
    // Observe
    // =========================================================================

    /// Probe the external resource and classify it
    ///
    /// A resource that was never created comes back [`Observation::Absent`]
    /// when its probe cannot be rendered, fails in transport, or returns a
    /// non-2xx status. Absent and removed observations leave status
    /// untouched; a present resource records the probe with `synced` set to
    /// the up-to-date result.
    pub async fn observe(&self, spec: &ResourceSpec, status: Status) -> Reconciled<Observation> {
        self.observe_inner(spec, status)
            .await
            .for_action(RequestAction::Observe)
    }

    async fn observe_inner(&self, spec: &ResourceSpec, status: Status) -> Reconciled<Observation> {
        let mapping = match mapping::resolve(spec, RequestAction::Observe) {
            Ok(mapping) => mapping,
            Err(e) => return Reconciled::unchanged(Err(e)),
        };
        let not_created = drift::object_not_created(&status);

        let request = match self
            .renderer
            .render(RequestAction::Observe, mapping, spec, &status)
            .await
        {
            Ok(request) => request,
            Err(e) if not_created => {
                debug!(error = %e, "observe request not renderable yet, treating resource as absent");
                return Reconciled::unchanged(Ok(Observation::Absent));
            }
            Err(e) => return self.fail(status, None, None, e.into()),
        };

        let response = match self.send(spec, &request).await {
            Ok(response) => response,
            Err(e) if not_created => {
                debug!(error = %e, "observe request failed before creation, treating resource as absent");
                return Reconciled::unchanged(Ok(Observation::Absent));
            }
            Err(e) => return self.fail(status, Some(request), None, e.into()),
        };

        if not_created && !response.is_success() {
            debug!(
                status_code = response.status_code,
                "resource not found before creation"
            );
            return Reconciled::unchanged(Ok(Observation::Absent));
        }

        self.patcher
            .apply(&response, &spec.secret_injections, spec.wait_timeout)
            .await;

        match drift::evaluate(spec, &response) {
            Ok(Observation::Removed) => {
                info!(status_code = response.status_code, "external resource has been removed");
                Reconciled::unchanged(Ok(Observation::Removed))
            }
            Ok(observation) => {
                let up_to_date = matches!(observation, Observation::Present { up_to_date: true });
                debug!(status_code = response.status_code, up_to_date, "observed external resource");
                let status = StatusTracker::record(
                    status,
                    Outcome::completed(request, response, up_to_date),
                    (self.clock)(),
                );
                Reconciled::recorded(status, Ok(observation))
            }
            Err(e) => self.fail(status, Some(request), Some(response), e.into()),
        }
    }

    // =========================================================================
    // Create / Update / Delete
    // =========================================================================

    /// Send the create request
    pub async fn create(&self, spec: &ResourceSpec, status: Status) -> Reconciled<()> {
        self.deploy(RequestAction::Create, spec, status).await
    }

    /// Send the update request
    pub async fn update(&self, spec: &ResourceSpec, status: Status) -> Reconciled<()> {
        self.deploy(RequestAction::Update, spec, status).await
    }

    /// Send the remove request
    pub async fn delete(&self, spec: &ResourceSpec, status: Status) -> Reconciled<()> {
        self.deploy(RequestAction::Remove, spec, status).await
    }

    /// Run a mutating action; a missing mapping makes it a no-op
    async fn deploy(&self, action: RequestAction, spec: &ResourceSpec, status: Status) -> Reconciled<()> {
        let mapping = match mapping::resolve(spec, action) {
            Ok(mapping) => mapping,
            Err(e) => {
                info!(action = %action, reason = %e, "skipping action without mapping");
                return Reconciled::unchanged(Ok(()));
            }
        };

        let Sent {
            status,
            request,
            response,
        } = match self.dispatch(action, mapping, spec, status).await {
            Ok(sent) => sent,
            Err(failure) => return failure.into_reconciled().for_action(action),
        };

        let reconciled = if response.is_success() {
            info!(action = %action, status_code = response.status_code, "request succeeded");
            let status = StatusTracker::record(
                status,
                Outcome::completed(request, response, true),
                (self.clock)(),
            );
            Reconciled::recorded(status, Ok(()))
        } else {
            let error = ReconcileError::UnexpectedStatus {
                status_code: response.status_code,
            };
            self.fail(status, Some(request), Some(response), error)
        };
        reconciled.for_action(action)
    }

    // =========================================================================
    // Disposable
    // =========================================================================

    /// Send a one-shot request until its response matches
    ///
    /// Nothing is sent once the request has succeeded unless the spec loops
    /// indefinitely. A non-2xx response, a failed check, and a check that
    /// evaluates to false all count as failures.
    pub async fn dispatch_disposable(&self, spec: &ResourceSpec, status: Status) -> Reconciled<Dispatch> {
        let action = RequestAction::Create;
        if status.synced && !spec.should_loop_infinitely {
            debug!("disposable request already succeeded");
            return Reconciled::unchanged(Ok(Dispatch::AlreadySynced));
        }

        let mapping = match mapping::resolve(spec, action) {
            Ok(mapping) => mapping,
            Err(e) => return Reconciled::unchanged(Err(e.for_action(action))),
        };

        let Sent {
            status,
            request,
            response,
        } = match self.dispatch(action, mapping, spec, status).await {
            Ok(sent) => sent,
            Err(failure) => return failure.into_reconciled().for_action(action),
        };

        let verdict = if !response.is_success() {
            Err(ReconcileError::UnexpectedStatus {
                status_code: response.status_code,
            })
        } else {
            match spec.expected_response_check.evaluate(&response) {
                Ok(true) => Ok(()),
                Ok(false) => Err(ReconcileError::ResponseMismatch),
                Err(e) => Err(e.into()),
            }
        };

        let reconciled = match verdict {
            Ok(()) => {
                info!(status_code = response.status_code, "disposable request succeeded");
                let status = StatusTracker::record(
                    status,
                    Outcome::completed(request, response, true),
                    (self.clock)(),
                );
                Reconciled::recorded(status, Ok(Dispatch::Sent))
            }
            Err(error) => self.fail(status, Some(request), Some(response), error),
        };
        reconciled.for_action(action)
    }

    // =========================================================================
    // Shared steps
    // =========================================================================

    /// Enforce the retry limit, render, send, and patch secrets
    ///
    /// A render or transport failure is recorded before it is returned; a
    /// halted retry leaves status untouched.
    async fn dispatch(
        &self,
        action: RequestAction,
        mapping: &Mapping,
        spec: &ResourceSpec,
        status: Status,
    ) -> Result<Sent, Failure> {
        if let Some(limit) = limit_reached(status.failed, spec.rollback_retries_limit) {
            if self.retry_policy.on_limit_reached(status.failed, limit) == RetryDecision::Halt {
                return Err(Failure {
                    status: None,
                    error: ReconcileError::RetriesExhausted {
                        failed: status.failed,
                        limit,
                    },
                });
            }
        }

        let request = match self.renderer.render(action, mapping, spec, &status).await {
            Ok(request) => request,
            Err(e) => {
                warn!(action = %action, error = %e, "failed to render request");
                return Err(self.failure(status, None, None, e.into()));
            }
        };

        let response = match self.send(spec, &request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(action = %action, error = %e, "request failed");
                return Err(self.failure(status, Some(request), None, e.into()));
            }
        };

        self.patcher
            .apply(&response, &spec.secret_injections, spec.wait_timeout)
            .await;

        Ok(Sent {
            status,
            request,
            response,
        })
    }

    async fn send(&self, spec: &ResourceSpec, request: &RequestDetails) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, "sending request");
        tokio::time::timeout(
            spec.wait_timeout,
            self.client.send(request, spec.insecure_skip_tls_verify),
        )
        .await
        .map_err(|_| TransportError::Timeout(spec.wait_timeout))?
    }

    /// Record a failure and return it
    fn fail<T>(
        &self,
        status: Status,
        request: Option<RequestDetails>,
        response: Option<HttpResponse>,
        error: ReconcileError,
    ) -> Reconciled<T> {
        self.failure(status, request, response, error).into_reconciled()
    }

    fn failure(
        &self,
        status: Status,
        request: Option<RequestDetails>,
        response: Option<HttpResponse>,
        error: ReconcileError,
    ) -> Failure {
        let status = StatusTracker::record(
            status,
            Outcome::failed(request, response, &error),
            (self.clock)(),
        );
        Failure {
            status: Some(status),
            error,
        }
    }
}

/// A request that went out and got a response
struct Sent {
    status: Status,
    request: RequestDetails,
    response: HttpResponse,
}

/// A dispatch that stopped before a response arrived
struct Failure {
    status: Option<Status>,
    error: ReconcileError,
}

impl Failure {
    fn into_reconciled<T>(self) -> Reconciled<T> {
        Reconciled {
            status: self.status,
            result: Err(self.error),
        }
    }
}
