// Each integration test compiles this module independently via `mod support;`,
// so items used by one test appear unused in others.
#![allow(unused)]

pub mod collector;

use serde_json::{Value, json};

/// Daemon config pointing the backend at a local collector.
pub fn daemon_config(port: u16, elasticsearch: Value) -> Value {
    let mut section = json!({
        "host": "127.0.0.1",
        "port": port,
        "timeout": 2000,
    });
    if let (Some(base), Value::Object(extra)) = (section.as_object_mut(), elasticsearch) {
        base.extend(extra);
    }
    json!({ "flushInterval": 10000, "elasticsearch": section })
}
