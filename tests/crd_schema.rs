//! Integration tests for the generated CRD manifests
//!
//! These run without a cluster: they check the shape of what `--crd` prints
//! and what the controller applies on startup.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, JSONSchemaProps,
};
use kube::CustomResourceExt;

use http_provider::crd::{DisposableRequest, NamespacedRequest, Request};
use http_provider_common::API_GROUP;

// =============================================================================
// Helpers
// =============================================================================

fn schema(crd: &CustomResourceDefinition) -> &JSONSchemaProps {
    crd.spec.versions[0]
        .schema
        .as_ref()
        .and_then(|s| s.open_api_v3_schema.as_ref())
        .expect("CRD should carry an OpenAPI schema")
}

fn property<'a>(props: &'a JSONSchemaProps, path: &[&str]) -> &'a JSONSchemaProps {
    path.iter().fold(props, |current, name| {
        current
            .properties
            .as_ref()
            .and_then(|p| p.get(*name))
            .unwrap_or_else(|| panic!("missing property {name}"))
    })
}

fn has_status_subresource(crd: &CustomResourceDefinition) -> bool {
    crd.spec.versions[0]
        .subresources
        .as_ref()
        .and_then(|s| s.status.as_ref())
        .is_some()
}

// =============================================================================
// Names and scope
// =============================================================================

#[test]
fn request_is_cluster_scoped() {
    let crd = Request::crd();
    assert_eq!(crd.metadata.name.as_deref(), Some("requests.http.provider.dev"));
    assert_eq!(crd.spec.group, API_GROUP);
    assert_eq!(crd.spec.scope, "Cluster");
    assert_eq!(crd.spec.names.kind, "Request");
    assert_eq!(crd.spec.versions[0].name, "v1alpha1");
}

#[test]
fn namespaced_request_is_namespaced() {
    let crd = NamespacedRequest::crd();
    assert_eq!(
        crd.metadata.name.as_deref(),
        Some("namespacedrequests.http.provider.dev")
    );
    assert_eq!(crd.spec.scope, "Namespaced");
    assert_eq!(crd.spec.names.kind, "NamespacedRequest");
}

#[test]
fn disposable_request_is_namespaced() {
    let crd = DisposableRequest::crd();
    assert_eq!(
        crd.metadata.name.as_deref(),
        Some("disposablerequests.http.provider.dev")
    );
    assert_eq!(crd.spec.scope, "Namespaced");
    assert_eq!(crd.spec.names.kind, "DisposableRequest");
}

#[test]
fn every_kind_has_a_status_subresource() {
    for crd in [Request::crd(), NamespacedRequest::crd(), DisposableRequest::crd()] {
        assert!(
            has_status_subresource(&crd),
            "{} should have a status subresource",
            crd.spec.names.kind
        );
    }
}

#[test]
fn short_names_are_distinct() {
    let short = |crd: CustomResourceDefinition| crd.spec.names.short_names.unwrap_or_default();
    assert_eq!(short(Request::crd()), vec!["hreq".to_string()]);
    assert_eq!(short(NamespacedRequest::crd()), vec!["nreq".to_string()]);
    assert_eq!(short(DisposableRequest::crd()), vec!["dreq".to_string()]);
}

// =============================================================================
// Schema fields
// =============================================================================

#[test]
fn managed_kinds_expose_for_provider_fields() {
    for crd in [Request::crd(), NamespacedRequest::crd()] {
        let for_provider = property(schema(&crd), &["spec", "forProvider"]);
        for field in [
            "mappings",
            "payload",
            "headers",
            "expectedResponseCheck",
            "isRemovedCheck",
            "secretInjectionConfigs",
            "waitTimeout",
            "insecureSkipTLSVerify",
            "rollbackRetriesLimit",
            "nextReconcile",
        ] {
            property(for_provider, &[field]);
        }
    }
}

#[test]
fn disposable_exposes_one_shot_fields() {
    let crd = DisposableRequest::crd();
    let for_provider = property(schema(&crd), &["spec", "forProvider"]);
    for field in [
        "url",
        "method",
        "body",
        "expectedResponse",
        "shouldLoopInfinitely",
        "rollbackRetriesLimit",
    ] {
        property(for_provider, &[field]);
    }
}

#[test]
fn status_uses_stable_field_names() {
    for crd in [Request::crd(), NamespacedRequest::crd(), DisposableRequest::crd()] {
        let status = property(schema(&crd), &["status"]);
        property(status, &["response", "statusCode"]);
        property(status, &["cache", "lastUpdated"]);
        property(status, &["cache", "response", "body"]);
        property(status, &["requestDetails", "url"]);
        for field in ["failed", "error", "synced", "lastReconcileTime"] {
            property(status, &[field]);
        }
    }
}

#[test]
fn crds_serialize_to_yaml() {
    let yaml = serde_yaml::to_string(&Request::crd()).expect("CRD should serialize");
    assert!(yaml.contains("kind: CustomResourceDefinition"));
    assert!(yaml.contains("group: http.provider.dev"));
}
