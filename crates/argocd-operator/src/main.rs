//! Argo CD operator binary

use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};

use argocd_common::crd::{ArgoCD, ArgoCDExport};
use argocd_common::telemetry::init_tracing;
use argocd_operator::{error_policy, reconcile, Context, OperatorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OperatorConfig::parse();

    if config.crd {
        for crd in [ArgoCD::crd(), ArgoCDExport::crd()] {
            let yaml = serde_yaml::to_string(&crd)
                .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
            println!("---\n{yaml}");
        }
        return Ok(());
    }

    init_tracing(config.log_format)?;

    let client = Client::try_default().await?;
    let (argocds, statefulsets): (Api<ArgoCD>, Api<StatefulSet>) = match &config.namespace {
        Some(ns) => (
            Api::namespaced(client.clone(), ns),
            Api::namespaced(client.clone(), ns),
        ),
        None => (Api::all(client.clone()), Api::all(client.clone())),
    };

    tracing::info!(
        namespace = config.namespace.as_deref().unwrap_or("*"),
        field_manager = %config.field_manager,
        "starting ArgoCD controller"
    );

    let ctx = Arc::new(Context::from_client(client, &config));

    Controller::new(argocds, WatcherConfig::default())
        .owns(statefulsets, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "ArgoCD reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "ArgoCD reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("controller stopped");
    Ok(())
}
