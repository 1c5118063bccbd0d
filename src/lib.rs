//! HTTP provider - drive HTTP-only external resources from Kubernetes
//!
//! Each `Request`, `NamespacedRequest`, or `DisposableRequest` describes an
//! external resource purely through HTTP request templates. The controllers
//! in this crate watch those objects and hand every reconciliation to
//! [`http_provider_engine::Reconciler`], persisting the status it returns.
//!
//! # Modules
//!
//! - [`controller`] - kube-runtime controllers, finalizers, and status persistence
//! - [`error`] - Error types for the controllers

#![deny(missing_docs)]

pub mod controller;
pub mod error;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

pub use http_provider_common::crd;
