//! Managed request controller
//!
//! Serves `Request` and `NamespacedRequest`. A live resource is observed
//! every pass and created or updated when the observation calls for it. A
//! resource being deleted runs its remove action before the finalizer is
//! released.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, info, instrument, warn};

use http_provider_common::FINALIZER;
use http_provider_engine::{drift, Observation, Reconciled, ReconcileError, Status};

use super::{has_finalizer, is_being_deleted, persist, reject_spec, Context, RequestKind, ResourceKey};
use crate::Error;

/// Reconcile a managed request
///
/// Returns the requeue action: `nextReconcile` or the poll interval after a
/// successful pass, or "await change" once the retry limit has halted the
/// resource.
#[instrument(skip(resource, ctx), fields(kind = %K::KIND, resource = %resource.name_any()))]
pub async fn reconcile<K: RequestKind>(resource: Arc<K>, ctx: Arc<Context>) -> Result<Action, Error> {
    let key = ResourceKey::of(resource.as_ref())?;
    let status = resource.current_status();

    if is_being_deleted(resource.as_ref()) {
        return finalize(resource.as_ref(), &key, status, &ctx).await;
    }

    let spec = match resource.resource_spec(ctx.config.default_timeout) {
        Ok(spec) => spec,
        Err(e) => return reject_spec(&ctx, &key, status, e).await,
    };

    if !has_finalizer(resource.as_ref()) {
        ctx.kube.add_finalizer(&key, FINALIZER).await?;
        debug!("added finalizer");
    }

    let observed = ctx.engine.observe(&spec, status.clone()).await;
    let status = persist(&ctx, &key, observed.status, status).await?;
    let observation = observed.result?;

    let next = match observation {
        Observation::Absent | Observation::Removed => {
            info!(?observation, "creating external resource");
            Some(ctx.engine.create(&spec, status.clone()).await)
        }
        Observation::Present { up_to_date: false } => {
            info!("external resource drifted, updating");
            Some(ctx.engine.update(&spec, status.clone()).await)
        }
        Observation::Present { up_to_date: true } => None,
    };

    if let Some(Reconciled { status: update, result }) = next {
        persist(&ctx, &key, update, status).await?;
        if let Err(e) = result {
            return halt_or_fail(e);
        }
    }

    Ok(Action::requeue(spec.next_reconcile.unwrap_or(ctx.config.poll_interval)))
}

/// Run the remove action, then release the finalizer
///
/// The resource is observed first; when it is already absent or removed the
/// finalizer is released without a remove request.
async fn finalize<K: RequestKind>(resource: &K, key: &ResourceKey, status: Status, ctx: &Context) -> Result<Action, Error> {
    if !has_finalizer(resource) {
        return Ok(Action::await_change());
    }

    match resource.resource_spec(ctx.config.default_timeout) {
        Ok(_) if drift::object_not_created(&status) => {
            debug!("external resource was never created, skipping remove");
        }
        Ok(spec) => {
            let observed = ctx.engine.observe(&spec, status.clone()).await;
            let status = persist(ctx, key, observed.status, status).await?;
            match observed.result {
                Ok(observation) if observation.needs_create() => {
                    info!(?observation, "external resource already gone, skipping remove");
                    ctx.kube.remove_finalizer(key, FINALIZER).await?;
                    return Ok(Action::await_change());
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "observe before remove failed, sending remove anyway"),
            }

            let removed = ctx.engine.delete(&spec, status.clone()).await;
            persist(ctx, key, removed.status, status).await?;
            if let Err(e) = removed.result {
                return halt_or_fail(e);
            }
        }
        Err(e) => {
            warn!(error = %e, "resource spec is invalid, releasing without remove");
        }
    }

    ctx.kube.remove_finalizer(key, FINALIZER).await?;
    info!("released finalizer");
    Ok(Action::await_change())
}

/// A halted retry waits for a spec change; anything else goes to the error policy
fn halt_or_fail(error: ReconcileError) -> Result<Action, Error> {
    if error.is_retries_exhausted() {
        warn!(error = %error, "retry limit reached, waiting for a spec change");
        return Ok(Action::await_change());
    }
    Err(error.into())
}
