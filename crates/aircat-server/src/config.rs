//! Gateway Configuration
//!
//! Command-line flags with environment variable fallbacks, converted once at
//! startup into an immutable [`GatewayConfig`] that is handed to each
//! component.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Command-line interface
#[derive(Debug, Clone, Parser)]
#[command(name = "aircat-server")]
#[command(about = "Clustered TCP gateway for aircat air-quality sensors")]
pub struct Cli {
    /// Address devices connect to
    #[arg(long, env = "AIRCAT_DEVICE_ADDR", default_value = "0.0.0.0:9000")]
    pub device_addr: SocketAddr,

    /// Address of the REST control plane
    #[arg(long, env = "AIRCAT_HTTP_ADDR", default_value = "0.0.0.0:8080")]
    pub http_addr: SocketAddr,

    /// InfluxDB host:port; empty keeps telemetry in memory
    #[arg(long, env = "INFLUXDB_ADDR", default_value = "influxdb:8086")]
    pub influxdb_addr: String,

    /// InfluxDB database name
    #[arg(long, env = "INFLUXDB_DB", default_value = "aircat")]
    pub influxdb_db: String,

    /// Run as a cluster member and redirect commands through etcd
    #[arg(long, env = "AIRCAT_CLUSTER")]
    pub cluster: bool,

    /// etcd endpoints (comma-separated)
    #[arg(
        long,
        env = "ETCD_ENDPOINTS",
        default_value = "http://etcd:2379",
        value_delimiter = ','
    )]
    pub etcd_endpoints: Vec<String>,

    /// Address peers use to reach this node; defaults to the local IP of each
    /// accepted device socket
    #[arg(long, env = "AIRCAT_ADVERTISE_ADDR")]
    pub advertise_addr: Option<String>,

    /// REST port on peer nodes that relayed commands are posted to
    #[arg(long, env = "AIRCAT_CONTROL_PORT", default_value_t = 8080)]
    pub control_port: u16,

    /// Node identifier used in logs
    #[arg(long, env = "NODE_ID")]
    pub node_id: Option<String>,

    /// Seconds to wait before starting (1-59), e.g. for etcd/InfluxDB to come up
    #[arg(long, env = "AIRCAT_INIT_DELAY", default_value_t = 0)]
    pub init_delay: u64,

    /// Maximum pending registry commands
    #[arg(long, default_value_t = 10_000)]
    pub registry_capacity: usize,

    /// Registry lookup timeout in milliseconds
    #[arg(long, default_value_t = 500)]
    pub registry_timeout_ms: u64,

    /// Inter-node relay timeout in milliseconds, also bounding directory lookups
    #[arg(long, default_value_t = 1_000)]
    pub relay_timeout_ms: u64,

    /// Maximum queued directory updates
    #[arg(long, default_value_t = 1_024)]
    pub directory_queue: usize,

    /// Time allowed for writing one control frame to a device, in milliseconds
    #[arg(long, default_value_t = 1_000)]
    pub device_write_timeout_ms: u64,

    /// Maximum queued telemetry measurements
    #[arg(long, default_value_t = 1_024)]
    pub telemetry_queue: usize,

    /// Maximum concurrent telemetry writes
    #[arg(long, default_value_t = 32)]
    pub telemetry_concurrency: usize,
}

/// Registry sizing and timing.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum pending commands in the queue
    pub capacity: usize,
    /// How long `get` waits for the worker before reporting a timeout
    pub lookup_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            lookup_timeout: Duration::from_millis(500),
        }
    }
}

/// Telemetry sink settings.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// InfluxDB host:port (None = in-memory sink)
    pub influxdb_addr: Option<String>,
    pub influxdb_db: String,
    /// HTTP timeout for sink requests
    pub request_timeout: Duration,
    pub queue_capacity: usize,
    pub max_in_flight: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            influxdb_addr: None,
            influxdb_db: "aircat".to_string(),
            request_timeout: Duration::from_secs(2),
            queue_capacity: 1_024,
            max_in_flight: 32,
        }
    }
}

/// Cluster directory and relay settings.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub etcd_endpoints: Vec<String>,
    /// Per-request and connect timeout for etcd
    pub etcd_timeout: Duration,
    pub etcd_backoff_initial: Duration,
    pub etcd_backoff_max: Duration,
    pub etcd_backoff_max_elapsed: Duration,
    /// Pending session registrations waiting to be published
    pub publish_queue: usize,
    /// REST port on peer nodes
    pub control_port: u16,
    pub relay_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            etcd_endpoints: vec!["http://etcd:2379".to_string()],
            etcd_timeout: Duration::from_secs(2),
            etcd_backoff_initial: Duration::from_secs(1),
            etcd_backoff_max: Duration::from_secs(10),
            etcd_backoff_max_elapsed: Duration::from_secs(30),
            publish_queue: 1_024,
            control_port: 8080,
            relay_timeout: Duration::from_secs(1),
        }
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub node_id: String,
    pub device_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub advertise_addr: Option<String>,
    /// Delay before startup; only honored within 1-59 seconds
    pub init_delay: Option<Duration>,
    /// Bytes per device read; one read is one frame
    pub read_buffer_size: usize,
    /// Bound on writing one control frame to a device socket
    pub device_write_timeout: Duration,
    pub registry: RegistryConfig,
    pub telemetry: TelemetryConfig,
    /// Present when running as a cluster member
    pub cluster: Option<ClusterConfig>,
}

impl From<Cli> for GatewayConfig {
    fn from(cli: Cli) -> Self {
        let cluster = cli.cluster.then(|| ClusterConfig {
            etcd_endpoints: cli.etcd_endpoints.clone(),
            control_port: cli.control_port,
            relay_timeout: Duration::from_millis(cli.relay_timeout_ms),
            publish_queue: cli.directory_queue,
            ..ClusterConfig::default()
        });

        Self {
            node_id: cli
                .node_id
                .unwrap_or_else(|| format!("aircat-node-{}", uuid::Uuid::new_v4())),
            device_addr: cli.device_addr,
            http_addr: cli.http_addr,
            advertise_addr: cli.advertise_addr.filter(|s| !s.is_empty()),
            init_delay: (1..60)
                .contains(&cli.init_delay)
                .then(|| Duration::from_secs(cli.init_delay)),
            read_buffer_size: 10_240,
            device_write_timeout: Duration::from_millis(cli.device_write_timeout_ms),
            registry: RegistryConfig {
                capacity: cli.registry_capacity,
                lookup_timeout: Duration::from_millis(cli.registry_timeout_ms),
            },
            telemetry: TelemetryConfig {
                influxdb_addr: Some(cli.influxdb_addr).filter(|s| !s.is_empty()),
                influxdb_db: cli.influxdb_db,
                queue_capacity: cli.telemetry_queue,
                max_in_flight: cli.telemetry_concurrency,
                ..TelemetryConfig::default()
            },
            cluster,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> GatewayConfig {
        let mut argv = vec!["aircat-server"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().into()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--node-id", "node-a"]);
        assert_eq!(config.node_id, "node-a");
        assert_eq!(config.device_addr.port(), 9000);
        assert_eq!(config.http_addr.port(), 8080);
        assert_eq!(config.registry.capacity, 10_000);
        assert_eq!(config.registry.lookup_timeout, Duration::from_millis(500));
        assert_eq!(
            config.telemetry.influxdb_addr.as_deref(),
            Some("influxdb:8086")
        );
        assert_eq!(config.device_write_timeout, Duration::from_secs(1));
        assert!(config.cluster.is_none());
        assert!(config.init_delay.is_none());
    }

    #[test]
    fn test_device_write_timeout_flag() {
        let config = parse(&["--device-write-timeout-ms", "250"]);
        assert_eq!(config.device_write_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_cluster_mode() {
        let config = parse(&[
            "--cluster",
            "--etcd-endpoints",
            "http://etcd-0:2379,http://etcd-1:2379",
            "--control-port",
            "18080",
        ]);
        let cluster = config.cluster.unwrap();
        assert_eq!(cluster.etcd_endpoints.len(), 2);
        assert_eq!(cluster.control_port, 18080);
        assert_eq!(cluster.relay_timeout, Duration::from_secs(1));
        assert_eq!(cluster.publish_queue, 1_024);
        assert!(config.node_id.starts_with("aircat-node-"));
    }

    #[test]
    fn test_empty_influxdb_selects_memory_sink() {
        let config = parse(&["--influxdb-addr", ""]);
        assert!(config.telemetry.influxdb_addr.is_none());
    }

    #[test]
    fn test_init_delay_bounds() {
        assert_eq!(
            parse(&["--init-delay", "5"]).init_delay,
            Some(Duration::from_secs(5))
        );
        assert!(parse(&["--init-delay", "60"]).init_delay.is_none());
    }
}
