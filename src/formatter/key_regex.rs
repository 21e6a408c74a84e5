use regex::Regex;
use serde_json::Value;

use crate::config::BackendConfig;
use crate::metrics::TimerStats;
use crate::record::Record;

use super::{DefaultFormatter, Formatter, FormatterError};

/// [`DefaultFormatter`] plus fields extracted from the metric name.
///
/// Every named capture group of `keyRegex` that participates in a match
/// becomes a string field on the record, e.g. `^(?P<host>[^.]+)\.` turns
/// `web01.requests` into `{"host": "web01", ...}`. Names that do not match
/// are forwarded unchanged.
#[derive(Debug, Default)]
pub struct KeyRegexFormatter {
    inner: DefaultFormatter,
    pattern: Option<Regex>,
}

impl KeyRegexFormatter {
    pub fn new(pattern: Regex) -> Self {
        Self {
            inner: DefaultFormatter,
            pattern: Some(pattern),
        }
    }

    fn annotate(&self, name: &str, records: &mut [Record]) {
        let Some(pattern) = &self.pattern else {
            return;
        };
        if records.is_empty() {
            return;
        }
        let Some(captures) = pattern.captures(name) else {
            return;
        };

        for group in pattern.capture_names().flatten() {
            if let Some(m) = captures.name(group) {
                for record in records.iter_mut() {
                    record.insert(group, Value::String(m.as_str().to_owned()));
                }
            }
        }
    }
}

impl Formatter for KeyRegexFormatter {
    fn init(&mut self, config: &BackendConfig) -> Result<(), FormatterError> {
        let raw = config
            .key_regex
            .as_deref()
            .ok_or(FormatterError::MissingOption {
                formatter: "regex",
                option: "keyRegex",
            })?;
        self.pattern = Some(Regex::new(raw)?);
        Ok(())
    }

    fn counters(&self, name: &str, value: f64, timestamp: u64, out: &mut Vec<Record>) -> usize {
        let start = out.len();
        let n = self.inner.counters(name, value, timestamp, out);
        self.annotate(name, &mut out[start..]);
        n
    }

    fn timers(
        &self,
        name: &str,
        samples: &[f64],
        timestamp: u64,
        out: &mut Vec<Record>,
    ) -> usize {
        let start = out.len();
        let n = self.inner.timers(name, samples, timestamp, out);
        self.annotate(name, &mut out[start..]);
        n
    }

    fn timer_data(&self, name: &str, stats: &TimerStats, timestamp: u64, out: &mut Vec<Record>) {
        let start = out.len();
        self.inner.timer_data(name, stats, timestamp, out);
        self.annotate(name, &mut out[start..]);
    }

    fn gauges(&self, name: &str, value: f64, timestamp: u64, out: &mut Vec<Record>) -> usize {
        let start = out.len();
        let n = self.inner.gauges(name, value, timestamp, out);
        self.annotate(name, &mut out[start..]);
        n
    }
}
