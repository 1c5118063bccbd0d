//! Disposable request controller
//!
//! Sends a one-shot request until its response matches, then stops. With
//! `shouldLoopInfinitely` the request is re-sent every `nextReconcile` (or
//! poll interval) instead.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, instrument, warn};

use http_provider_common::crd::DisposableRequest;
use http_provider_engine::{Dispatch, ResourceAdapter};

use super::{persist, reject_spec, Context, ResourceKey};
use crate::Error;

/// Reconcile a disposable request
#[instrument(skip(resource, ctx), fields(resource = %resource.name_any()))]
pub async fn reconcile(resource: Arc<DisposableRequest>, ctx: Arc<Context>) -> Result<Action, Error> {
    let key = ResourceKey::of(resource.as_ref())?;
    let status = resource.current_status();

    let spec = match resource.resource_spec(ctx.config.default_timeout) {
        Ok(spec) => spec,
        Err(e) => return reject_spec(&ctx, &key, status, e).await,
    };

    let dispatched = ctx.engine.dispatch_disposable(&spec, status.clone()).await;
    persist(&ctx, &key, dispatched.status, status).await?;

    let interval = spec.next_reconcile.unwrap_or(ctx.config.poll_interval);
    match dispatched.result {
        Ok(Dispatch::AlreadySynced) => {
            debug!("request already delivered");
            Ok(Action::await_change())
        }
        Ok(Dispatch::Sent) if spec.should_loop_infinitely => Ok(Action::requeue(interval)),
        Ok(Dispatch::Sent) => Ok(Action::await_change()),
        Err(e) if e.is_retries_exhausted() => {
            warn!(error = %e, "retry limit reached, waiting for a spec change");
            Ok(Action::await_change())
        }
        Err(e) => match spec.next_reconcile {
            Some(next) => {
                warn!(error = %e, "request failed, retrying at next reconcile");
                Ok(Action::requeue(next))
            }
            None => Err(e.into()),
        },
    }
}
