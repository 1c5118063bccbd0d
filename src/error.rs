//! Error types for the HTTP provider controllers

use thiserror::Error;

use http_provider_engine::ReconcileError;

/// Main error type for controller operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// The engine could not reconcile the resource
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// The watched object lacks a field the controller needs
    #[error("object is missing {0}")]
    MissingObjectKey(&'static str),

    /// The HTTP transport could not be built
    #[error("transport setup error: {0}")]
    Transport(String),
}

impl Error {
    /// Create a transport setup error with the given message
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}
