//! Reconciliation engine for HTTP-only external resources
//!
//! Drives a resource described purely by HTTP request templates toward its
//! declared state. Each call of the [`Reconciler`] takes a canonical
//! [`ResourceSpec`] and the previous [`Status`], sends at most one request,
//! and returns the next status for the caller to persist.
//!
//! The engine never talks to the Kubernetes API for status. Secrets are read
//! and written through the [`SecretStore`] contract, and requests go out
//! through the [`HttpClient`] contract.

#![deny(missing_docs)]

pub mod adapter;
pub mod drift;
pub mod error;
pub mod http;
pub mod mapping;
pub mod model;
pub mod patcher;
pub mod predicate;
pub mod reconciler;
pub mod render;
pub mod rollback;
pub mod secrets;
pub mod status;

#[cfg(test)]
mod testing;

pub use adapter::ResourceAdapter;
pub use drift::Observation;
pub use error::ReconcileError;
pub use http::{HttpClient, ReqwestHttpClient, TransportError};
pub use model::{ResourceSpec, ResponseCheck, SecretInjection, Status};
pub use reconciler::{Dispatch, Reconciled, Reconciler};
pub use rollback::{HaltOnExhaustion, RetryDecision, RetryLimitPolicy};
pub use secrets::{KubeSecretStore, SecretStore, SecretStoreError};
