//! DisposableRequest CRD types
//!
//! A disposable request sends one request until its response matches, then
//! stops (or keeps looping when `shouldLoopInfinitely` is set).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Headers, RequestStatus, SecretInjectionConfig};

/// Parameters of a one-shot request
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisposableRequestParameters {
    /// URL template
    pub url: String,

    /// HTTP method
    pub method: String,

    /// Header templates
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub headers: Headers,

    /// Body template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Predicate the response must satisfy; any 2xx when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_response: Option<String>,

    /// Per-request deadline (e.g. "30s")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout: Option<String>,

    /// Skip TLS certificate verification
    #[serde(default, rename = "insecureSkipTLSVerify")]
    pub insecure_skip_tls_verify: bool,

    /// Consecutive failures after which the request is no longer sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_retries_limit: Option<i32>,

    /// Keep sending after a matching response
    #[serde(default)]
    pub should_loop_infinitely: bool,

    /// Interval between sends when looping or retrying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_reconcile: Option<String>,

    /// Response fields to copy into secrets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_injection_configs: Vec<SecretInjectionConfig>,
}

/// One-shot HTTP request
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "http.provider.dev",
    version = "v1alpha1",
    kind = "DisposableRequest",
    plural = "disposablerequests",
    shortname = "dreq",
    namespaced,
    status = "RequestStatus",
    printcolumn = r#"{"name":"Synced","type":"boolean","jsonPath":".status.synced"}"#,
    printcolumn = r#"{"name":"Status","type":"integer","jsonPath":".status.response.statusCode"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DisposableRequestSpec {
    /// Request parameters
    pub for_provider: DisposableRequestParameters,
}
