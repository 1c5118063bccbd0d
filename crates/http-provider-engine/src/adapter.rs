//! Front-end adapters
//!
//! `Request`, `NamespacedRequest`, and `DisposableRequest` all reconcile
//! through one engine. Each kind implements [`ResourceAdapter`] to translate
//! its schema into a [`ResourceSpec`]; status is shared and needs no
//! translation.

use std::time::Duration;

use kube::ResourceExt;

use http_provider_common::crd::{
    DisposableRequest, Mapping, NamespacedRequest, Request, RequestAction, RequestParameters,
    SecretInjectionConfig,
};
use http_provider_common::duration::{parse_duration, parse_optional_duration};

use crate::error::ReconcileError;
use crate::model::{ResourceSpec, ResponseCheck, SecretInjection, Status};

/// Translates a resource kind into the engine's canonical model
pub trait ResourceAdapter {
    /// Build the canonical spec
    ///
    /// `default_timeout` applies when the resource sets no `waitTimeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Configuration`] for an unknown check kind,
    /// a `CUSTOM` check without logic, an unparseable duration, or a secret
    /// injection target whose namespace cannot be resolved.
    fn resource_spec(&self, default_timeout: Duration) -> Result<ResourceSpec, ReconcileError>;

    /// Current status, or an empty one when none has been recorded
    fn current_status(&self) -> Status;
}

impl ResourceAdapter for Request {
    fn resource_spec(&self, default_timeout: Duration) -> Result<ResourceSpec, ReconcileError> {
        managed_spec(&self.spec.for_provider, None, default_timeout)
    }

    fn current_status(&self) -> Status {
        self.status.clone().unwrap_or_default()
    }
}

impl ResourceAdapter for NamespacedRequest {
    fn resource_spec(&self, default_timeout: Duration) -> Result<ResourceSpec, ReconcileError> {
        managed_spec(&self.spec.for_provider, self.namespace(), default_timeout)
    }

    fn current_status(&self) -> Status {
        self.status.clone().unwrap_or_default()
    }
}

impl ResourceAdapter for DisposableRequest {
    fn resource_spec(&self, default_timeout: Duration) -> Result<ResourceSpec, ReconcileError> {
        let params = &self.spec.for_provider;
        let namespace = self.namespace();

        let expected_response_check = match params.expected_response.as_deref().map(str::trim) {
            Some(logic) if !logic.is_empty() => ResponseCheck::Custom(logic.to_string()),
            _ => ResponseCheck::StatusSuccess,
        };

        Ok(ResourceSpec {
            mappings: vec![Mapping {
                action: Some(RequestAction::Create),
                method: params.method.clone(),
                url: params.url.clone(),
                body: params.body.clone(),
                headers: Default::default(),
            }],
            payload: Default::default(),
            headers: params.headers.clone(),
            expected_response_check,
            is_removed_check: ResponseCheck::StatusNotFound,
            secret_injections: injections(&params.secret_injection_configs, namespace.as_deref())?,
            secret_namespace: namespace,
            wait_timeout: wait_timeout(params.wait_timeout.as_deref(), default_timeout)?,
            insecure_skip_tls_verify: params.insecure_skip_tls_verify,
            rollback_retries_limit: params.rollback_retries_limit,
            should_loop_infinitely: params.should_loop_infinitely,
            next_reconcile: next_reconcile(params.next_reconcile.as_deref())?,
        })
    }

    fn current_status(&self) -> Status {
        self.status.clone().unwrap_or_default()
    }
}

/// Shared translation for the managed kinds; `namespace` is `None` when
/// cluster-scoped
fn managed_spec(
    params: &RequestParameters,
    namespace: Option<String>,
    default_timeout: Duration,
) -> Result<ResourceSpec, ReconcileError> {
    Ok(ResourceSpec {
        mappings: params.mappings.clone(),
        payload: params.payload.clone(),
        headers: params.headers.clone(),
        expected_response_check: ResponseCheck::from_spec(
            params.expected_response_check.as_ref(),
            ResponseCheck::StatusSuccess,
            "expectedResponseCheck",
        )?,
        is_removed_check: ResponseCheck::from_spec(
            params.is_removed_check.as_ref(),
            ResponseCheck::StatusNotFound,
            "isRemovedCheck",
        )?,
        secret_injections: injections(&params.secret_injection_configs, namespace.as_deref())?,
        secret_namespace: namespace,
        wait_timeout: wait_timeout(params.wait_timeout.as_deref(), default_timeout)?,
        insecure_skip_tls_verify: params.insecure_skip_tls_verify,
        rollback_retries_limit: params.rollback_retries_limit,
        should_loop_infinitely: false,
        next_reconcile: next_reconcile(params.next_reconcile.as_deref())?,
    })
}

fn injections(
    configs: &[SecretInjectionConfig],
    default_namespace: Option<&str>,
) -> Result<Vec<SecretInjection>, ReconcileError> {
    configs
        .iter()
        .map(|config| {
            let namespace = config
                .secret_ref
                .namespace
                .as_deref()
                .or(default_namespace)
                .ok_or_else(|| {
                    ReconcileError::Configuration(format!(
                        "secretInjectionConfigs entry for secret '{}' must set a namespace",
                        config.secret_ref.name
                    ))
                })?;
            Ok(SecretInjection {
                namespace: namespace.to_string(),
                name: config.secret_ref.name.clone(),
                key: config.secret_key.clone(),
                response_path: config.response_path.clone(),
            })
        })
        .collect()
}

fn wait_timeout(raw: Option<&str>, default: Duration) -> Result<Duration, ReconcileError> {
    match raw {
        Some(raw) => parse_duration(raw)
            .map_err(|e| ReconcileError::Configuration(format!("waitTimeout: {}", e))),
        None => Ok(default),
    }
}

fn next_reconcile(raw: Option<&str>) -> Result<Option<Duration>, ReconcileError> {
    parse_optional_duration(raw)
        .map_err(|e| ReconcileError::Configuration(format!("nextReconcile: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use http_provider_common::crd::{
        DisposableRequestParameters, DisposableRequestSpec, NamespacedRequestSpec, RequestSpec,
        ResponseCheckSpec, SecretRef,
    };

    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    fn params() -> RequestParameters {
        RequestParameters {
            mappings: vec![Mapping {
                action: Some(RequestAction::Observe),
                method: "GET".to_string(),
                url: "https://api.example.com/items/1".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn injection_config(namespace: Option<&str>) -> SecretInjectionConfig {
        SecretInjectionConfig {
            secret_ref: SecretRef {
                name: "item-creds".to_string(),
                namespace: namespace.map(str::to_string),
            },
            secret_key: "token".to_string(),
            response_path: ".body.token".to_string(),
        }
    }

    fn namespaced(params: RequestParameters) -> NamespacedRequest {
        let mut resource = NamespacedRequest::new("items", NamespacedRequestSpec { for_provider: params });
        resource.metadata.namespace = Some("team-a".to_string());
        resource
    }

    #[test]
    fn unset_fields_take_defaults() {
        let spec = Request::new("items", RequestSpec { for_provider: params() })
            .resource_spec(DEFAULT_TIMEOUT)
            .expect("valid spec");

        assert_eq!(spec.expected_response_check, ResponseCheck::StatusSuccess);
        assert_eq!(spec.is_removed_check, ResponseCheck::StatusNotFound);
        assert_eq!(spec.wait_timeout, DEFAULT_TIMEOUT);
        assert_eq!(spec.next_reconcile, None);
        assert_eq!(spec.secret_namespace, None);
        assert!(!spec.should_loop_infinitely);
    }

    #[test]
    fn durations_and_custom_checks_are_parsed() {
        let mut p = params();
        p.wait_timeout = Some("1m30s".to_string());
        p.next_reconcile = Some("5m".to_string());
        p.expected_response_check = Some(ResponseCheckSpec {
            check_type: "CUSTOM".to_string(),
            logic: Some(".body.ready == true".to_string()),
        });

        let spec = namespaced(p).resource_spec(DEFAULT_TIMEOUT).expect("valid spec");

        assert_eq!(spec.wait_timeout, Duration::from_secs(90));
        assert_eq!(spec.next_reconcile, Some(Duration::from_secs(300)));
        assert_eq!(
            spec.expected_response_check,
            ResponseCheck::Custom(".body.ready == true".to_string())
        );
    }

    #[test]
    fn unknown_check_kind_is_a_configuration_error() {
        let mut p = params();
        p.is_removed_check = Some(ResponseCheckSpec {
            check_type: "REGEX".to_string(),
            logic: None,
        });

        let err = namespaced(p)
            .resource_spec(DEFAULT_TIMEOUT)
            .expect_err("unknown kind");
        assert!(err.is_configuration());
        assert!(err.to_string().contains("isRemovedCheck"));
    }

    #[test]
    fn bad_duration_is_a_configuration_error() {
        let mut p = params();
        p.wait_timeout = Some("soon".to_string());

        let err = namespaced(p)
            .resource_spec(DEFAULT_TIMEOUT)
            .expect_err("bad duration");
        assert!(err.is_configuration());
        assert!(err.to_string().contains("waitTimeout"));
    }

    #[test]
    fn namespaced_injections_default_to_resource_namespace() {
        let mut p = params();
        p.secret_injection_configs = vec![injection_config(None), injection_config(Some("vault"))];

        let spec = namespaced(p).resource_spec(DEFAULT_TIMEOUT).expect("valid spec");

        assert_eq!(spec.secret_namespace.as_deref(), Some("team-a"));
        assert_eq!(spec.secret_injections[0].namespace, "team-a");
        assert_eq!(spec.secret_injections[1].namespace, "vault");
    }

    #[test]
    fn cluster_scoped_injections_must_name_a_namespace() {
        let mut p = params();
        p.secret_injection_configs = vec![injection_config(None)];

        let err = Request::new("items", RequestSpec { for_provider: p })
            .resource_spec(DEFAULT_TIMEOUT)
            .expect_err("namespace required");
        assert!(err.is_configuration());
    }

    #[test]
    fn disposable_becomes_single_create_mapping() {
        let mut resource = DisposableRequest::new(
            "notify",
            DisposableRequestSpec {
                for_provider: DisposableRequestParameters {
                    url: "https://hooks.example.com/notify".to_string(),
                    method: "post".to_string(),
                    body: Some(r#"{"event":"deployed"}"#.to_string()),
                    expected_response: Some(".body.accepted == true".to_string()),
                    should_loop_infinitely: true,
                    rollback_retries_limit: Some(3),
                    ..Default::default()
                },
            },
        );
        resource.metadata.namespace = Some("team-a".to_string());

        let spec = resource.resource_spec(DEFAULT_TIMEOUT).expect("valid spec");

        assert_eq!(spec.mappings.len(), 1);
        assert_eq!(spec.mappings[0].action, Some(RequestAction::Create));
        assert_eq!(spec.mappings[0].url, "https://hooks.example.com/notify");
        assert_eq!(
            spec.expected_response_check,
            ResponseCheck::Custom(".body.accepted == true".to_string())
        );
        assert!(spec.should_loop_infinitely);
        assert_eq!(spec.rollback_retries_limit, Some(3));
        assert_eq!(spec.secret_namespace.as_deref(), Some("team-a"));
    }

    #[test]
    fn disposable_without_expectation_checks_status() {
        let resource = DisposableRequest::new(
            "notify",
            DisposableRequestSpec {
                for_provider: DisposableRequestParameters {
                    url: "https://hooks.example.com/notify".to_string(),
                    method: "POST".to_string(),
                    ..Default::default()
                },
            },
        );

        let spec = resource.resource_spec(DEFAULT_TIMEOUT).expect("valid spec");
        assert_eq!(spec.expected_response_check, ResponseCheck::StatusSuccess);
    }

    #[test]
    fn missing_status_reads_as_empty() {
        let resource = namespaced(params());
        assert_eq!(resource.current_status(), Status::default());
    }
}
