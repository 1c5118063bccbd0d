//! Controllers for the HTTP provider resource kinds
//!
//! Each controller follows the Kubernetes observe-diff-act loop, but all of
//! the HTTP work happens in [`http_provider_engine::Reconciler`]. The code
//! here only moves objects in and out of the API server: finalizers, status
//! persistence, and requeue decisions.

mod disposable;
mod managed;

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::Stream;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::reflector::{self, Store};
use kube::runtime::{predicates, watcher, WatchStreamExt};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::{error, warn};

#[cfg(test)]
use mockall::automock;

use http_provider_common::crd::{DisposableRequest, NamespacedRequest, Request};
use http_provider_common::{DEFAULT_WAIT_TIMEOUT, FIELD_MANAGER, FINALIZER, REQUEUE_ERROR_SECS, REQUEUE_POLL_SECS};
use http_provider_engine::status::{Outcome, StatusTracker};
use http_provider_engine::{
    KubeSecretStore, ReconcileError, Reconciler, ReqwestHttpClient, ResourceAdapter, Status,
};

use crate::Error;

pub use disposable::reconcile as reconcile_disposable;
pub use managed::reconcile as reconcile_managed;

// =============================================================================
// Resource identity
// =============================================================================

/// Resource kinds served by this provider
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    /// Cluster-scoped managed request
    Request,
    /// Namespaced managed request
    NamespacedRequest,
    /// Namespaced one-shot request
    DisposableRequest,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "Request"),
            Self::NamespacedRequest => write!(f, "NamespacedRequest"),
            Self::DisposableRequest => write!(f, "DisposableRequest"),
        }
    }
}

/// Address of one object on the API server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceKey {
    /// Object kind
    pub kind: ResourceKind,
    /// Object name
    pub name: String,
    /// Object namespace; `None` for cluster-scoped kinds
    pub namespace: Option<String>,
}

impl ResourceKey {
    /// Key of a watched object
    pub fn of<K: RequestKind>(resource: &K) -> Result<Self, Error> {
        let name = resource
            .meta()
            .name
            .clone()
            .ok_or(Error::MissingObjectKey("metadata.name"))?;
        Ok(Self {
            kind: K::KIND,
            name,
            namespace: resource.namespace(),
        })
    }
}

/// A resource kind the controllers can reconcile
pub trait RequestKind:
    Resource<DynamicType = ()> + ResourceAdapter + Clone + DeserializeOwned + Debug + Send + Sync + 'static
{
    /// Kind tag used to address the object
    const KIND: ResourceKind;
}

impl RequestKind for Request {
    const KIND: ResourceKind = ResourceKind::Request;
}

impl RequestKind for NamespacedRequest {
    const KIND: ResourceKind = ResourceKind::NamespacedRequest;
}

impl RequestKind for DisposableRequest {
    const KIND: ResourceKind = ResourceKind::DisposableRequest;
}

// =============================================================================
// Kubernetes client
// =============================================================================

/// Trait abstracting the Kubernetes writes the controllers make
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Replace the status of an object
    ///
    /// # Arguments
    ///
    /// * `key` - Object to update
    /// * `status` - Full status to apply
    async fn patch_status(&self, key: &ResourceKey, status: &Status) -> Result<(), Error>;

    /// Add a finalizer if it is not already present
    async fn add_finalizer(&self, key: &ResourceKey, finalizer: &str) -> Result<(), Error>;

    /// Remove a finalizer if present
    async fn remove_finalizer(&self, key: &ResourceKey, finalizer: &str) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn cluster_api<K>(&self) -> Api<K>
    where
        K: Resource<DynamicType = ()>,
    {
        Api::all(self.client.clone())
    }

    fn namespaced_api<K>(&self, key: &ResourceKey) -> Result<Api<K>, Error>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
    {
        let namespace = key
            .namespace
            .as_deref()
            .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
        Ok(Api::namespaced(self.client.clone(), namespace))
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn patch_status(&self, key: &ResourceKey, status: &Status) -> Result<(), Error> {
        match key.kind {
            ResourceKind::Request => apply_status(&self.cluster_api::<Request>(), &key.name, status).await,
            ResourceKind::NamespacedRequest => {
                apply_status(&self.namespaced_api::<NamespacedRequest>(key)?, &key.name, status).await
            }
            ResourceKind::DisposableRequest => {
                apply_status(&self.namespaced_api::<DisposableRequest>(key)?, &key.name, status).await
            }
        }
    }

    async fn add_finalizer(&self, key: &ResourceKey, finalizer: &str) -> Result<(), Error> {
        match key.kind {
            ResourceKind::Request => {
                set_finalizer(&self.cluster_api::<Request>(), &key.name, finalizer, true).await
            }
            ResourceKind::NamespacedRequest => {
                set_finalizer(&self.namespaced_api::<NamespacedRequest>(key)?, &key.name, finalizer, true).await
            }
            ResourceKind::DisposableRequest => {
                set_finalizer(&self.namespaced_api::<DisposableRequest>(key)?, &key.name, finalizer, true).await
            }
        }
    }

    async fn remove_finalizer(&self, key: &ResourceKey, finalizer: &str) -> Result<(), Error> {
        match key.kind {
            ResourceKind::Request => {
                set_finalizer(&self.cluster_api::<Request>(), &key.name, finalizer, false).await
            }
            ResourceKind::NamespacedRequest => {
                set_finalizer(&self.namespaced_api::<NamespacedRequest>(key)?, &key.name, finalizer, false).await
            }
            ResourceKind::DisposableRequest => {
                set_finalizer(&self.namespaced_api::<DisposableRequest>(key)?, &key.name, finalizer, false).await
            }
        }
    }
}

/// Server-side apply the whole status so stale header keys are dropped
async fn apply_status<K>(api: &Api<K>, name: &str, status: &Status) -> Result<(), Error>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    let patch = serde_json::json!({
        "apiVersion": K::api_version(&()),
        "kind": K::kind(&()),
        "status": status,
    });

    api.patch_status(
        name,
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&patch),
    )
    .await?;

    Ok(())
}

async fn set_finalizer<K>(api: &Api<K>, name: &str, finalizer: &str, present: bool) -> Result<(), Error>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    // Get current object to read existing finalizers
    let object = api.get(name).await?;
    let current = object.meta().finalizers.clone().unwrap_or_default();
    let has = current.iter().any(|f| f == finalizer);
    if has == present {
        return Ok(());
    }

    let finalizers: Vec<String> = if present {
        current.into_iter().chain(std::iter::once(finalizer.to_string())).collect()
    } else {
        current.into_iter().filter(|f| f != finalizer).collect()
    };

    let patch = serde_json::json!({
        "metadata": {
            "finalizers": finalizers
        }
    });

    api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
        .await?;

    Ok(())
}

// =============================================================================
// Context
// =============================================================================

/// Controller settings shared by every kind
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Requeue interval for managed requests without `nextReconcile`
    pub poll_interval: Duration,
    /// Request deadline for resources without `waitTimeout`
    pub default_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(REQUEUE_POLL_SECS),
            default_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

/// Controller context shared across reconciliations
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Reconciliation engine
    pub engine: Reconciler,
    /// Controller settings
    pub config: ControllerConfig,
}

impl Context {
    /// Create a context backed by the given Kubernetes client
    ///
    /// Secrets are read and written through the same client; HTTP requests
    /// go out through reqwest.
    pub fn new(client: Client, config: ControllerConfig) -> Result<Self, Error> {
        let http = ReqwestHttpClient::new().map_err(|e| Error::transport(e.to_string()))?;
        let secrets = KubeSecretStore::new(client.clone());
        Ok(Self::from_parts(
            Arc::new(KubeClientImpl::new(client)),
            Reconciler::new(Arc::new(http), Arc::new(secrets)),
            config,
        ))
    }

    /// Assemble a context from its parts
    pub fn from_parts(kube: Arc<dyn KubeClient>, engine: Reconciler, config: ControllerConfig) -> Self {
        Self { kube, engine, config }
    }
}

// =============================================================================
// Watch streams
// =============================================================================

/// Keep only objects whose `metadata.generation` moved
///
/// Status patches bump `resourceVersion` but not `generation`, so the
/// controller's own writes never trigger another pass. Scheduled requeues
/// still fire.
pub fn spec_changes<K, S>(objects: S) -> impl Stream<Item = Result<K, watcher::Error>> + Send
where
    K: RequestKind,
    S: Stream<Item = Result<K, watcher::Error>> + Send,
{
    objects.predicate_filter(predicates::generation)
}

/// Watch every object of `K`, returning the cache and the spec-change trigger
pub fn watch_spec_changes<K: RequestKind>(
    api: Api<K>,
) -> (Store<K>, impl Stream<Item = Result<K, watcher::Error>> + Send + 'static) {
    let (reader, writer) = reflector::store();
    let objects = watcher(api, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .applied_objects();
    (reader, spec_changes(objects))
}

// =============================================================================
// Shared steps
// =============================================================================

/// Error policy for every controller
///
/// Logs the failure and requeues after a fixed delay. Failures recorded in
/// status already count toward the retry limit.
pub fn error_policy<K: RequestKind>(resource: Arc<K>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        kind = %K::KIND,
        resource = %resource.name_any(),
        "reconciliation failed"
    );
    Action::requeue(Duration::from_secs(REQUEUE_ERROR_SECS))
}

fn has_finalizer<K: Resource>(resource: &K) -> bool {
    resource.finalizers().iter().any(|f| f == FINALIZER)
}

fn is_being_deleted<K: Resource>(resource: &K) -> bool {
    resource.meta().deletion_timestamp.is_some()
}

/// Persist `update` when the engine produced one; returns the status now in effect
async fn persist(ctx: &Context, key: &ResourceKey, update: Option<Status>, current: Status) -> Result<Status, Error> {
    match update {
        Some(status) => {
            ctx.kube.patch_status(key, &status).await?;
            Ok(status)
        }
        None => Ok(current),
    }
}

/// Record a spec that cannot be reconciled; nothing is sent until it changes
async fn reject_spec(ctx: &Context, key: &ResourceKey, status: Status, error: ReconcileError) -> Result<Action, Error> {
    warn!(error = %error, "resource spec is invalid");
    let status = StatusTracker::record(status, Outcome::failed(None, None, &error), Utc::now());
    ctx.kube.patch_status(key, &status).await?;
    Ok(Action::await_change())
}


#[cfg(test)]
mod tests {
    use super::*;

    use futures::StreamExt;

    use http_provider_common::crd::{RequestParameters, RequestSpec};

    use testing::{context, MockHttp};

    #[test]
    fn key_of_cluster_scoped_request_has_no_namespace() {
        let request = Request::new("orders", RequestSpec { for_provider: RequestParameters::default() });
        let key = ResourceKey::of(&request).expect("named object");
        assert_eq!(key.kind, ResourceKind::Request);
        assert_eq!(key.name, "orders");
        assert_eq!(key.namespace, None);
    }

    #[test]
    fn unnamed_object_has_no_key() {
        let mut request = Request::new("orders", RequestSpec { for_provider: RequestParameters::default() });
        request.metadata.name = None;
        assert!(matches!(
            ResourceKey::of(&request),
            Err(Error::MissingObjectKey("metadata.name"))
        ));
    }

    #[test]
    fn default_config_polls_every_minute() {
        let config = ControllerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.default_timeout, Duration::from_secs(30));
    }

    #[test]
    fn error_policy_requeues_after_backoff() {
        let request = Arc::new(Request::new(
            "orders",
            RequestSpec { for_provider: RequestParameters::default() },
        ));
        let ctx = context(MockKubeClient::new(), MockHttp::new());
        let error = Error::MissingObjectKey("metadata.name");

        assert_eq!(
            error_policy(request, &error, ctx),
            Action::requeue(Duration::from_secs(30))
        );
    }

    fn generation_of(name: &str, generation: i64, failed: i32) -> Request {
        let mut resource = Request::new(name, RequestSpec { for_provider: RequestParameters::default() });
        resource.metadata.generation = Some(generation);
        resource.status = Some(Status {
            failed,
            ..Default::default()
        });
        resource
    }

    #[tokio::test]
    async fn status_only_updates_do_not_trigger_reconcile() {
        let events = futures::stream::iter(vec![
            Ok(generation_of("orders", 1, 0)),
            Ok(generation_of("orders", 1, 1)),
            Ok(generation_of("orders", 1, 2)),
            Ok(generation_of("orders", 2, 2)),
            Ok(generation_of("invoices", 1, 0)),
        ]);

        let triggered: Vec<(String, Option<i64>)> = spec_changes(events)
            .map(|event| {
                let resource = event.expect("no watch errors");
                (resource.name_any(), resource.metadata.generation)
            })
            .collect()
            .await;

        assert_eq!(
            triggered,
            vec![
                ("orders".to_string(), Some(1)),
                ("orders".to_string(), Some(2)),
                ("invoices".to_string(), Some(1)),
            ]
        );
    }
}
