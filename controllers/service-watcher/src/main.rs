//! Service Watcher
//!
//! Keeps self-healing watches on Services and Endpoints across the cluster
//! and republishes every change as a normalized event.
//!
//! Watches are reacquired whenever the API server closes them or they fail,
//! so consumers see one live stream per resource type with gaps only during
//! reconnection.

mod cluster;
mod config;
mod error;
mod opener;
mod registry;
mod selector;

use crate::cluster::ClusterObject;
use crate::config::{Config, EventFormat};
use crate::error::ControllerError;
use crate::registry::ClusterRegistry;
use resource_watch::{start_watches, NormalizedEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider was already installed");
    }

    info!("Starting Service Watcher");

    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Retry: {:?} every {:?}", config.watch.retry.strategy, config.watch.retry.interval);
    info!("  Registerable selector: {}", config.selector);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received");
        shutdown.cancel();
    });

    let mut events = start_watches(
        config.watch.clone(),
        ClusterRegistry::connect(config.registry_settings()),
        cancel,
    )
    .await?;

    while let Some(event) = events.recv().await {
        log_event(&event, config.event_format);
    }

    info!("All watches closed, exiting");
    Ok(())
}

fn log_event(event: &NormalizedEvent<ClusterObject>, format: EventFormat) {
    let line = match format {
        EventFormat::Text => event.to_string(),
        EventFormat::Json => match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize {} event: {}", event.resource, e);
                event.to_string()
            }
        },
    };

    if event.registerable {
        info!(resource = %event.resource, "{}", line);
    } else {
        debug!(resource = %event.resource, "{}", line);
    }
}
