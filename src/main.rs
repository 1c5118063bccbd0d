//! HTTP provider controller - reconcile HTTP-only external resources

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::runtime::Controller;
use kube::{Api, Client, Config, CustomResourceExt};

use http_provider::controller::{
    error_policy, reconcile_disposable, reconcile_managed, watch_spec_changes, Context,
    ControllerConfig,
};
use http_provider::crd::{DisposableRequest, NamespacedRequest, Request};
use http_provider_common::duration::parse_duration;
use http_provider_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use http_provider_common::FIELD_MANAGER;

/// HTTP provider - Kubernetes controller for HTTP-only external resources
#[derive(Parser, Debug)]
#[command(name = "http-provider", version, about, long_about = None)]
struct Cli {
    /// Print CRD manifests as YAML and exit
    #[arg(long)]
    crd: bool,

    /// Log output format (text or json)
    #[arg(long, env = "HTTP_PROVIDER_LOG_FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(flatten)]
    controller: ControllerArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the controllers (default mode)
    ///
    /// Watches Request, NamespacedRequest, and DisposableRequest objects and
    /// reconciles each against its external HTTP API.
    Controller,
}

/// Controller mode arguments
#[derive(Args, Debug)]
struct ControllerArgs {
    /// Requeue interval for managed requests without nextReconcile
    #[arg(long, env = "HTTP_PROVIDER_POLL_INTERVAL", default_value = "1m", value_parser = duration_arg, global = true)]
    poll_interval: Duration,

    /// Request deadline for resources without waitTimeout
    #[arg(long, env = "HTTP_PROVIDER_DEFAULT_TIMEOUT", default_value = "30s", value_parser = duration_arg, global = true)]
    default_timeout: Duration,

    /// Path to a kubeconfig file; in-cluster or default config when unset
    #[arg(long, env = "KUBECONFIG", global = true)]
    kubeconfig: Option<PathBuf>,
}

fn duration_arg(raw: &str) -> Result<Duration, String> {
    parse_duration(raw).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        for crd in [Request::crd(), NamespacedRequest::crd(), DisposableRequest::crd()] {
            let yaml = serde_yaml::to_string(&crd)
                .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
            println!("---\n{yaml}");
        }
        return Ok(());
    }

    init_telemetry(TelemetryConfig {
        format: cli.log_format,
    })?;

    match cli.command {
        Some(Commands::Controller) | None => run_controller(cli.controller).await,
    }
}

async fn kube_client(kubeconfig: Option<PathBuf>) -> anyhow::Result<Client> {
    let client = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(&path)
                .map_err(|e| anyhow::anyhow!("Failed to read kubeconfig {:?}: {}", path, e))?;
            let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| anyhow::anyhow!("Invalid kubeconfig {:?}: {}", path, e))?;
            Client::try_from(config)?
        }
        None => Client::try_default().await?,
    };
    Ok(client)
}

/// Ensure all HTTP provider CRDs are installed
///
/// The controller installs its own CRDs on startup using server-side apply,
/// so the CRD versions always match the controller version.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    for crd in [Request::crd(), NamespacedRequest::crd(), DisposableRequest::crd()] {
        let name = crd
            .metadata
            .name
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generated CRD has no name"))?;
        tracing::info!(crd = %name, "installing CRD");
        crds.patch(&name, &params, &Patch::Apply(&crd))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to install CRD {}: {}", name, e))?;
    }

    tracing::info!("all HTTP provider CRDs installed/updated");
    Ok(())
}

/// Run the controllers until a shutdown signal arrives
async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    let client = kube_client(args.kubeconfig).await?;
    ensure_crds_installed(&client).await?;

    let config = ControllerConfig {
        poll_interval: args.poll_interval,
        default_timeout: args.default_timeout,
    };
    let ctx = Arc::new(Context::new(client.clone(), config)?);

    // Only spec changes trigger a pass; status writes and requeues do not
    let (requests, request_changes) = watch_spec_changes(Api::<Request>::all(client.clone()));
    let (namespaced, namespaced_changes) =
        watch_spec_changes(Api::<NamespacedRequest>::all(client.clone()));
    let (disposable, disposable_changes) = watch_spec_changes(Api::<DisposableRequest>::all(client));

    tracing::info!(
        poll_interval = ?args.poll_interval,
        default_timeout = ?args.default_timeout,
        "starting HTTP provider controllers"
    );

    let request_controller = Controller::for_stream(request_changes, requests)
        .shutdown_on_signal()
        .run(reconcile_managed::<Request>, error_policy::<Request>, ctx.clone())
        .for_each(|result| async move {
            match result {
                Ok(action) => tracing::debug!(?action, "Request reconciliation completed"),
                Err(e) => tracing::error!(error = ?e, "Request reconciliation error"),
            }
        });

    let namespaced_controller = Controller::for_stream(namespaced_changes, namespaced)
        .shutdown_on_signal()
        .run(
            reconcile_managed::<NamespacedRequest>,
            error_policy::<NamespacedRequest>,
            ctx.clone(),
        )
        .for_each(|result| async move {
            match result {
                Ok(action) => tracing::debug!(?action, "NamespacedRequest reconciliation completed"),
                Err(e) => tracing::error!(error = ?e, "NamespacedRequest reconciliation error"),
            }
        });

    let disposable_controller = Controller::for_stream(disposable_changes, disposable)
        .shutdown_on_signal()
        .run(reconcile_disposable, error_policy::<DisposableRequest>, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => tracing::debug!(?action, "DisposableRequest reconciliation completed"),
                Err(e) => tracing::error!(error = ?e, "DisposableRequest reconciliation error"),
            }
        });

    // All three stop together on SIGTERM/SIGINT
    tokio::join!(request_controller, namespaced_controller, disposable_controller);

    tracing::info!("HTTP provider controller shutting down");
    Ok(())
}
