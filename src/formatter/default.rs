use crate::metrics::{HISTOGRAM_KEY, TimerStats};
use crate::record::{Record, RecordKind, is_truthy, is_truthy_number, json_number};

use super::Formatter;

/// Sparse formatter: zero values are dropped rather than indexed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormatter;

impl Formatter for DefaultFormatter {
    fn counters(&self, name: &str, value: f64, timestamp: u64, out: &mut Vec<Record>) -> usize {
        single_value(name, RecordKind::Counters, value, timestamp, out)
    }

    fn timers(
        &self,
        name: &str,
        samples: &[f64],
        timestamp: u64,
        out: &mut Vec<Record>,
    ) -> usize {
        let before = out.len();
        out.extend(
            samples
                .iter()
                .copied()
                .filter(|sample| is_truthy_number(*sample))
                .map(|sample| {
                    Record::new(name, RecordKind::Timers, timestamp)
                        .with_field("val", json_number(sample))
                }),
        );
        out.len() - before
    }

    fn timer_data(&self, name: &str, stats: &TimerStats, timestamp: u64, out: &mut Vec<Record>) {
        let mut record = Record::new(name, RecordKind::TimerData, timestamp);
        let mut any_truthy = false;

        for (key, value) in stats {
            if key != HISTOGRAM_KEY {
                record.insert(key, value.clone());
            }
        }

        // Buckets land at the top level, after the plain statistics. Only a
        // truthy bucket gets the record emitted.
        if let Some(buckets) = stats.get(HISTOGRAM_KEY).and_then(|h| h.as_object()) {
            for (bucket, count) in buckets {
                any_truthy |= is_truthy(count);
                record.insert(bucket, count.clone());
            }
        }

        if any_truthy {
            out.push(record);
        }
    }

    fn gauges(&self, name: &str, value: f64, timestamp: u64, out: &mut Vec<Record>) -> usize {
        single_value(name, RecordKind::Gauges, value, timestamp, out)
    }
}

fn single_value(
    name: &str,
    kind: RecordKind,
    value: f64,
    timestamp: u64,
    out: &mut Vec<Record>,
) -> usize {
    if !is_truthy_number(value) {
        return 0;
    }
    out.push(Record::new(name, kind, timestamp).with_field("count", json_number(value)));
    1
}
