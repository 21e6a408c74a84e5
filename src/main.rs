use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use statsd_elastic_relay::config::read_daemon_config;
use statsd_elastic_relay::{ElasticBackend, EventBus, MetricSnapshot};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// One flush handed over by the daemon on stdin.
#[derive(Deserialize)]
struct FlushEvent {
    /// Seconds since the epoch; defaults to the time the line is read.
    timestamp: Option<u64>,
    #[serde(default)]
    metrics: MetricSnapshot,
}

/// Init failure: log and exit.
fn fatal(msg: &str, error: &dyn std::fmt::Display) -> ! {
    error!(%error, "{msg}");
    std::process::exit(1);
}

/// Level comes from `STATSD_ELASTIC_RELAY_LOG_LEVEL` and defaults to WARN.
/// The status report at end of input and the per-request response codes
/// are logged at INFO, so they only show with `STATSD_ELASTIC_RELAY_LOG_LEVEL=info`.
fn setup_logging() {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::prelude::*;

    let level = std::env::var("STATSD_ELASTIC_RELAY_LOG_LEVEL")
        .ok()
        .and_then(|val| {
            val.parse::<LevelFilter>().ok().or_else(|| {
                eprintln!("invalid STATSD_ELASTIC_RELAY_LOG_LEVEL: {val:?}, defaulting to WARN");
                None
            })
        })
        .unwrap_or(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(level)
        .with(tracing_microjson::JsonLayer::new(std::io::stderr).with_target(true))
        .init();
}

fn setup_rustls() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls ring provider");
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() {
    setup_logging();
    setup_rustls();

    let config_path = std::env::var_os("STATSD_ELASTIC_RELAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.json"));
    let daemon_config =
        read_daemon_config(&config_path).unwrap_or_else(|e| fatal("config error", &e));

    let mut events = EventBus::new();
    let backend = ElasticBackend::init(unix_now(), &daemon_config, &mut events)
        .unwrap_or_else(|e| fatal("failed to initialize elasticsearch backend", &e));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match serde_json::from_str::<FlushEvent>(&line) {
                Ok(event) => {
                    let timestamp = event.timestamp.unwrap_or_else(unix_now);
                    events.emit_flush(timestamp, &event.metrics);
                }
                Err(e) => warn!(error = %e, "skipping malformed flush event"),
            },
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "failed to read flush events");
                break;
            }
        }
    }

    events.emit_status(
        &mut |err: Option<&dyn std::error::Error>, backend: &str, stat: &str, value: u64| {
            if let Some(err) = err {
                warn!(backend, stat, error = %err, "backend status error");
            } else {
                info!(backend, stat, value, "backend status");
            }
        },
    );

    backend.wait_idle().await;
}
