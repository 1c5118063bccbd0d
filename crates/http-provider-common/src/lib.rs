//! Common types for the HTTP provider: CRDs, templates, errors, and utilities

#![deny(missing_docs)]

use std::time::Duration;

pub mod crd;
pub mod duration;
pub mod error;
pub mod telemetry;
pub mod template;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group shared by every HTTP provider resource kind
pub const API_GROUP: &str = "http.provider.dev";

/// Field manager used for server-side apply of status and secrets
pub const FIELD_MANAGER: &str = "http-provider-controller";

/// Finalizer that holds managed requests until the remove action has run
pub const FINALIZER: &str = "http.provider.dev/finalizer";

/// Wait timeout applied when a resource does not set `waitTimeout`
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Requeue interval after a failed reconciliation
pub const REQUEUE_ERROR_SECS: u64 = 30;

/// Default poll interval for managed requests
pub const REQUEUE_POLL_SECS: u64 = 60;
