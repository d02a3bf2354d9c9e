//! AirCat Server - Clustered gateway for aircat air-quality sensors

use aircat_server::api;
use aircat_server::cluster::{spawn_publisher, ClusterDirectory, EtcdDirectory, RelayClient};
use aircat_server::config::{Cli, GatewayConfig};
use aircat_server::dispatch::{ClusterRoute, ControlDispatcher};
use aircat_server::observability::{init_metrics, init_tracing, shutdown_tracing, TracingConfig};
use aircat_server::registry::spawn_registry;
use aircat_server::server::DeviceServer;
use aircat_server::session::SessionContext;
use aircat_server::telemetry::{spawn_writer, InfluxBackend, MemoryBackend, TelemetryBackend};
use aircat_server::version;
use anyhow::{anyhow, Context};
use clap::Parser;
use kameo::Actor;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from(Cli::parse());

    init_tracing(TracingConfig::from_env())
        .map_err(|e| anyhow!("failed to initialize tracing: {e}"))?;

    let metrics_state = match init_metrics() {
        Ok(state) => Some(state),
        Err(e) => {
            warn!(error = %e, "Metrics disabled");
            None
        }
    };

    info!(
        version = %version::full_version(),
        rustc = version::RUSTC_VERSION,
        target = version::TARGET,
        node_id = %config.node_id,
        cluster = config.cluster.is_some(),
        "Starting AirCat Server"
    );

    if let Some(delay) = config.init_delay {
        info!(delay_secs = delay.as_secs(), "Delaying startup");
        tokio::time::sleep(delay).await;
    }

    let backend: Arc<dyn TelemetryBackend> = match &config.telemetry.influxdb_addr {
        Some(addr) => {
            info!(addr = %addr, db = %config.telemetry.influxdb_db, "Using InfluxDB telemetry sink");
            Arc::new(
                InfluxBackend::new(addr, &config.telemetry)
                    .context("failed to build InfluxDB client")?,
            )
        }
        None => {
            info!("No InfluxDB address, keeping telemetry in memory");
            Arc::new(MemoryBackend::new())
        }
    };

    let (registry, registry_task) = spawn_registry(&config.registry);

    let cluster_route = match &config.cluster {
        Some(cluster) => {
            let directory: Arc<dyn ClusterDirectory> = Arc::new(EtcdDirectory::connect(cluster).await);
            let relay = RelayClient::new(cluster.control_port, cluster.relay_timeout)
                .context("failed to build relay client")?;
            Some(ClusterRoute {
                directory,
                relay,
                lookup_timeout: cluster.relay_timeout,
            })
        }
        None => None,
    };

    let publisher = match (&cluster_route, &config.cluster) {
        (Some(route), Some(cluster)) => {
            Some(spawn_publisher(route.directory.clone(), cluster.publish_queue).0)
        }
        _ => None,
    };

    let (telemetry, _telemetry_task) = spawn_writer(backend.clone(), &config.telemetry);

    let ctx = SessionContext {
        registry: registry.clone(),
        telemetry,
        directory: publisher,
        read_buffer_size: config.read_buffer_size,
    };
    let device_server = DeviceServer::bind(config.device_addr, ctx, config.advertise_addr.clone())
        .await
        .with_context(|| format!("failed to bind device listener on {}", config.device_addr))?;

    let dispatcher = ControlDispatcher::spawn(
        ControlDispatcher::new(registry.clone(), cluster_route)
            .with_write_timeout(config.device_write_timeout),
    );

    let app = api::create_router(api::AppState {
        node_id: config.node_id.clone(),
        dispatcher: dispatcher.clone(),
        registry: registry.clone(),
        telemetry: backend,
        metrics_state,
    });
    let http_listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind control plane on {}", config.http_addr))?;
    info!(addr = %config.http_addr, "Control plane listening");

    tokio::select! {
        _ = device_server.run() => {}
        result = axum::serve(http_listener, app) => {
            result.context("control plane server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    let _ = dispatcher.stop_gracefully().await;
    if let Err(e) = registry.shutdown().await {
        warn!(error = %e, "Registry already stopped");
    }
    let _ = registry_task.await;

    info!("AirCat Server stopped");
    shutdown_tracing();
    Ok(())
}
