//! Per-metric transformation of a snapshot entry into bulk documents.
//!
//! A [`Formatter`] is chosen by name from a [`FormatterRegistry`] when the
//! backend starts. Each operation appends to the caller's output list and
//! never touches the snapshot.

mod default;
mod key_regex;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::config::BackendConfig;
use crate::metrics::TimerStats;
use crate::record::Record;

pub use default::DefaultFormatter;
pub use key_regex::KeyRegexFormatter;

#[derive(Debug, Error)]
pub enum FormatterError {
    #[error("unknown formatter: {0}")]
    Unknown(String),

    #[error("formatter {formatter} requires the {option} option")]
    MissingOption {
        formatter: &'static str,
        option: &'static str,
    },

    #[error("keyRegex is not a valid regular expression: {0}")]
    InvalidRegex(#[from] regex::Error),
}

pub trait Formatter: Send + Sync {
    /// One-time hook run with the resolved config before the first flush.
    fn init(&mut self, _config: &BackendConfig) -> Result<(), FormatterError> {
        Ok(())
    }

    /// Returns the number of records appended (0 or 1).
    fn counters(&self, name: &str, value: f64, timestamp: u64, out: &mut Vec<Record>) -> usize;

    /// Returns the number of records appended, one per truthy sample.
    fn timers(&self, name: &str, samples: &[f64], timestamp: u64, out: &mut Vec<Record>)
    -> usize;

    /// Appends at most one record.
    fn timer_data(&self, name: &str, stats: &TimerStats, timestamp: u64, out: &mut Vec<Record>);

    /// Returns the number of records appended (0 or 1).
    fn gauges(&self, name: &str, value: f64, timestamp: u64, out: &mut Vec<Record>) -> usize;
}

pub type FormatterFactory = fn() -> Box<dyn Formatter>;

/// Name → constructor table used to resolve the `formatter` config key.
pub struct FormatterRegistry {
    factories: BTreeMap<String, FormatterFactory>,
}

impl FormatterRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding the built-in formatters under their short and
    /// `_format` suffixed names.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("default", default_formatter);
        registry.register("default_format", default_formatter);
        registry.register("regex", key_regex_formatter);
        registry.register("regex_format", key_regex_formatter);
        registry
    }

    /// Later registrations replace earlier ones with the same name.
    pub fn register(&mut self, name: &str, factory: FormatterFactory) {
        self.factories.insert(name.to_owned(), factory);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Construct the formatter named in `config` and run its init hook.
    pub fn load(&self, config: &BackendConfig) -> Result<Box<dyn Formatter>, FormatterError> {
        let factory = self
            .factories
            .get(&config.formatter)
            .ok_or_else(|| FormatterError::Unknown(config.formatter.clone()))?;
        let mut formatter = factory();
        formatter.init(config)?;
        Ok(formatter)
    }
}

fn default_formatter() -> Box<dyn Formatter> {
    Box::new(DefaultFormatter)
}

fn key_regex_formatter() -> Box<dyn Formatter> {
    Box::new(KeyRegexFormatter::default())
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
