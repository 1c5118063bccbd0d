//! NamespacedRequest CRD types

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::request::RequestParameters;
use super::types::RequestStatus;

/// Namespaced HTTP resource driven through per-action requests
///
/// Secret references and injection targets without a namespace resolve to
/// the resource's own namespace.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "http.provider.dev",
    version = "v1alpha1",
    kind = "NamespacedRequest",
    plural = "namespacedrequests",
    shortname = "nreq",
    namespaced,
    status = "RequestStatus",
    printcolumn = r#"{"name":"Synced","type":"boolean","jsonPath":".status.synced"}"#,
    printcolumn = r#"{"name":"Failed","type":"integer","jsonPath":".status.failed"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NamespacedRequestSpec {
    /// Request parameters
    pub for_provider: RequestParameters,
}
