use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::bulk::BulkBody;
use crate::config::{BackendConfig, ConfigError};
use crate::events::{EventSource, StatusEmit};
use crate::exporter::{BulkExporter, ExportError, TlsError};
use crate::formatter::{Formatter, FormatterError, FormatterRegistry};
use crate::metrics::MetricSnapshot;
use crate::record::Record;

/// Name this backend reports its status under.
pub const PLUGIN_NAME: &str = "elastic";

#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to load formatter: {0}")]
    Formatter(#[from] FormatterError),

    #[error("failed to set up HTTP client: {0}")]
    Tls(#[from] TlsError),

    #[error("backend must be initialized inside a tokio runtime")]
    NoRuntime,
}

/// Timestamps (seconds) reported through the status callback.
#[derive(Debug, Default)]
pub struct BackendStatus {
    last_flush: AtomicU64,
    last_exception: AtomicU64,
}

impl BackendStatus {
    fn new(startup_time: u64) -> Self {
        Self {
            last_flush: AtomicU64::new(startup_time),
            last_exception: AtomicU64::new(startup_time),
        }
    }

    pub fn last_flush(&self) -> u64 {
        self.last_flush.load(Ordering::Relaxed)
    }

    pub fn last_exception(&self) -> u64 {
        self.last_exception.load(Ordering::Relaxed)
    }

    fn record_flush(&self, timestamp: u64) {
        self.last_flush.store(timestamp, Ordering::Relaxed);
    }

    fn record_exception(&self, timestamp: u64) {
        self.last_exception.store(timestamp, Ordering::Relaxed);
    }
}

/// Records produced by one flush, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushBatch {
    pub counters: Vec<Record>,
    pub timers: Vec<Record>,
    pub timer_data: Vec<Record>,
    pub gauges: Vec<Record>,
    /// Counter, timer and gauge records emitted. timer_data is not counted.
    pub num_stats: usize,
}

impl FlushBatch {
    /// All records in bulk order: counters, timers, timer_data, gauges.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.counters
            .iter()
            .chain(&self.timers)
            .chain(&self.timer_data)
            .chain(&self.gauges)
    }

    pub fn len(&self) -> usize {
        self.counters.len() + self.timers.len() + self.timer_data.len() + self.gauges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Forwards each flushed snapshot to Elasticsearch as one bulk request.
///
/// Requests run on the runtime captured at construction and are not
/// awaited by [`flush`](Self::flush); a failed request is logged and its
/// payload dropped.
pub struct ElasticBackend {
    config: BackendConfig,
    formatter: Box<dyn Formatter>,
    exporter: BulkExporter,
    status: Arc<BackendStatus>,
    tasks: TaskTracker,
    runtime: Handle,
}

impl ElasticBackend {
    /// Resolve config, load the formatter, and subscribe to `events`.
    pub fn init<E: EventSource + ?Sized>(
        startup_time: u64,
        daemon_config: &Value,
        events: &mut E,
    ) -> Result<Arc<Self>, InitError> {
        Self::init_with_registry(
            startup_time,
            daemon_config,
            events,
            &FormatterRegistry::builtin(),
        )
    }

    pub fn init_with_registry<E: EventSource + ?Sized>(
        startup_time: u64,
        daemon_config: &Value,
        events: &mut E,
        registry: &FormatterRegistry,
    ) -> Result<Arc<Self>, InitError> {
        let backend = BackendConfig::from_value(daemon_config)
            .map_err(InitError::from)
            .and_then(|config| Self::new(config, registry, startup_time))
            .inspect_err(|e| error!(error = %e, "elasticsearch backend failed to initialize"))?;
        let backend = Arc::new(backend);

        let flush = Arc::clone(&backend);
        events.on_flush(Box::new(move |timestamp: u64, snapshot: &MetricSnapshot| {
            flush.flush(timestamp, snapshot);
        }));

        let status = Arc::clone(&backend);
        events.on_status(Box::new(move |emit: &mut StatusEmit<'_>| {
            status.report_status(emit);
        }));

        Ok(backend)
    }

    /// Build a backend without subscribing it anywhere.
    pub fn new(
        config: BackendConfig,
        registry: &FormatterRegistry,
        startup_time: u64,
    ) -> Result<Self, InitError> {
        let runtime = Handle::try_current().map_err(|_| InitError::NoRuntime)?;
        let formatter = registry.load(&config)?;
        if config.debug {
            info!(formatter = %config.formatter, "loaded formatter");
        }
        let exporter = BulkExporter::new(&config)?;

        Ok(Self {
            config,
            formatter,
            exporter,
            status: Arc::new(BackendStatus::new(startup_time)),
            tasks: TaskTracker::new(),
            runtime,
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn status(&self) -> &BackendStatus {
        &self.status
    }

    /// Format `snapshot` and dispatch it. `timestamp` is in seconds.
    pub fn flush(&self, timestamp: u64, snapshot: &MetricSnapshot) {
        let batch = self.collect(timestamp, snapshot);

        if self.config.debug {
            match serde_json::to_string(snapshot) {
                Ok(metrics) => info!(%metrics, "metrics snapshot"),
                Err(e) => warn!(error = %e, "failed to render metrics snapshot"),
            }
        }

        self.dispatch(timestamp, &batch);
        self.status.record_flush(timestamp);

        if self.config.debug {
            info!(
                stats = batch.num_stats,
                "flushed {} stats to elasticsearch", batch.num_stats
            );
        }
    }

    /// Run every metric of `snapshot` through the formatter.
    pub fn collect(&self, timestamp: u64, snapshot: &MetricSnapshot) -> FlushBatch {
        let ts = timestamp.saturating_mul(1000);
        let mut batch = FlushBatch::default();

        // A null value is falsy, so it is skipped like a zero.
        for (name, value) in &snapshot.counters {
            let Some(value) = *value else { continue };
            batch.num_stats += self
                .formatter
                .counters(name, value, ts, &mut batch.counters);
        }

        for (name, samples) in &snapshot.timers {
            let samples: Vec<f64> = samples.iter().flatten().copied().collect();
            batch.num_stats += self.formatter.timers(name, &samples, ts, &mut batch.timers);
        }

        // timer_data is only forwarded for windows where some timer sample
        // survived formatting, whatever its key.
        if !batch.timers.is_empty() {
            for (name, stats) in &snapshot.timer_data {
                self.formatter
                    .timer_data(name, stats, ts, &mut batch.timer_data);
            }
        }

        for (name, value) in &snapshot.gauges {
            let Some(value) = *value else { continue };
            batch.num_stats += self.formatter.gauges(name, value, ts, &mut batch.gauges);
        }

        batch
    }

    fn dispatch(&self, timestamp: u64, batch: &FlushBatch) {
        let body = match BulkBody::build(&self.config.index, batch.records()) {
            Ok(Some(body)) => body,
            Ok(None) => return,
            Err(e) => {
                error!(error = %e, "failed to serialize bulk body, no stats flushed");
                self.status.record_exception(timestamp);
                return;
            }
        };

        if self.config.debug {
            info!(payload = body.as_str(), "elasticsearch payload");
        }

        let exporter = self.exporter.clone();
        let status = Arc::clone(&self.status);
        let documents = body.documents();

        self.tasks.spawn_on(
            async move {
                match exporter.send(body).await {
                    Ok(code) => {
                        info!(status = code.as_u16(), documents, "elasticsearch responded with {code}");
                    }
                    Err(ExportError::Rejected { status: code, body }) => {
                        info!(status = code.as_u16(), documents, "elasticsearch responded with {code}");
                        error!(status = code.as_u16(), %body, "HTTP {code}: {body}");
                        status.record_exception(timestamp);
                    }
                    Err(e) => {
                        error!(error = %e, "error with HTTP request, no stats flushed");
                        status.record_exception(timestamp);
                    }
                }
            },
            &self.runtime,
        );
    }

    /// Emit `last_flush` and `last_exception` through the daemon's status sink.
    pub fn report_status(&self, emit: &mut StatusEmit<'_>) {
        emit(None, PLUGIN_NAME, "last_flush", self.status.last_flush());
        emit(None, PLUGIN_NAME, "last_exception", self.status.last_exception());
    }

    /// Requests dispatched and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every in-flight request to finish.
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}
