use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Precomputed statistics for one timer (`mean`, `upper_90`, `histogram`, ...).
pub type TimerStats = Map<String, Value>;

/// Key of the nested bucket map inside [`TimerStats`].
pub const HISTOGRAM_KEY: &str = "histogram";

/// Point-in-time view of the metrics aggregated by the daemon during one
/// flush window.
///
/// Only the four collections the backend forwards are kept; the daemon's
/// other keys (`sets`, `counter_rates`, `pctThreshold`, ...) are ignored on
/// deserialization. Collections keep the daemon's key order, and `null`
/// values are accepted and treated as falsy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    #[serde(default)]
    pub counters: IndexMap<String, Option<f64>>,
    #[serde(default)]
    pub timers: IndexMap<String, Vec<Option<f64>>>,
    #[serde(default)]
    pub timer_data: IndexMap<String, TimerStats>,
    #[serde(default)]
    pub gauges: IndexMap<String, Option<f64>>,
}

impl MetricSnapshot {
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
            && self.timers.is_empty()
            && self.timer_data.is_empty()
            && self.gauges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_daemon_snapshot_and_ignores_unknown_keys() {
        let snapshot: MetricSnapshot = serde_json::from_str(
            r#"{
                "counters": {"hits": 5, "statsd.packets_received": 0},
                "counter_rates": {"hits": 0.5},
                "timers": {"latency": [10, 0, 20]},
                "timer_data": {"latency": {"mean": 15, "histogram": {"bin_10_20": 1}}},
                "gauges": {"mem": 0},
                "sets": {},
                "pctThreshold": [90]
            }"#,
        )
        .unwrap();

        assert_eq!(snapshot.counters["hits"], Some(5.0));
        assert_eq!(snapshot.timers["latency"], vec![Some(10.0), Some(0.0), Some(20.0)]);
        assert_eq!(snapshot.timer_data["latency"]["mean"], 15);
        assert_eq!(snapshot.gauges["mem"], Some(0.0));
    }

    #[test]
    fn keeps_daemon_key_order() {
        let snapshot: MetricSnapshot = serde_json::from_str(
            r#"{"counters": {"zeta": 1, "alpha": 2, "mid": 3}, "gauges": {"b": 1, "a": 2}}"#,
        )
        .unwrap();

        let counters: Vec<&str> = snapshot.counters.keys().map(String::as_str).collect();
        assert_eq!(counters, vec!["zeta", "alpha", "mid"]);
        let gauges: Vec<&str> = snapshot.gauges.keys().map(String::as_str).collect();
        assert_eq!(gauges, vec!["b", "a"]);
    }

    #[test]
    fn null_values_deserialize() {
        let snapshot: MetricSnapshot = serde_json::from_str(
            r#"{"counters": {"hits": null}, "timers": {"latency": [5, null]}, "gauges": {"mem": null}}"#,
        )
        .unwrap();

        assert_eq!(snapshot.counters["hits"], None);
        assert_eq!(snapshot.timers["latency"], vec![Some(5.0), None]);
        assert_eq!(snapshot.gauges["mem"], None);
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let snapshot: MetricSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.is_empty());
    }
}
