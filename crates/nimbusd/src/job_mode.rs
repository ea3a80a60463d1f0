//! `nimbusd create-instance` — one create-instance job attempt.

use std::sync::Arc;

use anyhow::bail;
use nimbus_core::NimbusConfig;
use nimbus_jobs::{CreateInstanceJob, CreateInstanceOptions, JobOutcome};
use nimbus_lifecycle::http::HttpLifecycleConnector;
use tracing::info;

use crate::open_store;

pub fn connector(config: &NimbusConfig) -> HttpLifecycleConnector {
    let lifecycle = &config.lifecycle;
    HttpLifecycleConnector::new(lifecycle.port)
        .with_connect_timeout(lifecycle.connect_timeout())
        .with_request_timeout(lifecycle.request_timeout())
        .with_poll_interval(lifecycle.poll_interval())
        .with_deployment_timeout(lifecycle.deployment_timeout())
}

pub async fn create_instance(config: &NimbusConfig, instance: &str) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let job = CreateInstanceJob::new(
        instance,
        store,
        Arc::new(connector(config)),
        CreateInstanceOptions::from_config(config),
    );

    info!(%instance, "running create-instance job");
    let outcome = nimbus_jobs::run(&job).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if let JobOutcome::Failed(failure) = outcome {
        bail!("{} failed for {}: {}", failure.step, failure.entity, failure.cause);
    }
    Ok(())
}
