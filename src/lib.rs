//! StatsD backend that forwards each flushed metrics snapshot to
//! Elasticsearch through the bulk API.
//!
//! The daemon side is modelled by [`events::EventSource`]: a host calls
//! [`ElasticBackend::init`] once, then every flush event turns the snapshot
//! into typed [`record::Record`]s and posts them as one ndjson body.

pub mod backend;
pub mod bulk;
pub mod config;
pub mod events;
pub mod exporter;
pub mod formatter;
pub mod metrics;
pub mod record;

#[cfg(test)]
mod testing;

pub use backend::{BackendStatus, ElasticBackend, FlushBatch, InitError, PLUGIN_NAME};
pub use config::BackendConfig;
pub use events::{EventBus, EventSource};
pub use formatter::{Formatter, FormatterRegistry};
pub use metrics::MetricSnapshot;
pub use record::{Record, RecordKind};
