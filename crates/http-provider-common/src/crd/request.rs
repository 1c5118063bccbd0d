//! Request CRD types
//!
//! `Request` is the cluster-scoped managed HTTP resource. Its parameters are
//! shared with [`NamespacedRequest`](super::NamespacedRequest); only scope and
//! secret namespace defaulting differ.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{
    Headers, Mapping, Payload, RequestStatus, ResponseCheckSpec, SecretInjectionConfig,
};

// =============================================================================
// Parameters
// =============================================================================

/// Desired state of a managed HTTP resource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestParameters {
    /// Per-action request templates
    #[serde(default)]
    pub mappings: Vec<Mapping>,

    /// Static template data
    #[serde(default)]
    pub payload: Payload,

    /// Default headers, merged under each mapping's headers
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub headers: Headers,

    /// Decides whether an observed resource is up to date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_response_check: Option<ResponseCheckSpec>,

    /// Decides whether an observed resource has been removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_removed_check: Option<ResponseCheckSpec>,

    /// Response fields to copy into secrets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_injection_configs: Vec<SecretInjectionConfig>,

    /// Per-request deadline (e.g. "30s")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout: Option<String>,

    /// Skip TLS certificate verification
    #[serde(default, rename = "insecureSkipTLSVerify")]
    pub insecure_skip_tls_verify: bool,

    /// Consecutive failures after which mutating requests stop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_retries_limit: Option<i32>,

    /// Interval between reconciliations (e.g. "5m")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_reconcile: Option<String>,
}

// =============================================================================
// CRD
// =============================================================================

/// Cluster-scoped HTTP resource driven through per-action requests
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "http.provider.dev",
    version = "v1alpha1",
    kind = "Request",
    plural = "requests",
    shortname = "hreq",
    status = "RequestStatus",
    printcolumn = r#"{"name":"Synced","type":"boolean","jsonPath":".status.synced"}"#,
    printcolumn = r#"{"name":"Failed","type":"integer","jsonPath":".status.failed"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RequestSpec {
    /// Request parameters
    pub for_provider: RequestParameters,
}
