//! # Telemetry sink
//!
//! Write-only key/value publishing. The core never reads anything back from telemetry.

use serde::Serialize;

/// A published telemetry value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TmValue {
    Number(f64),
    Bool(bool),
    String(String),
}

/// Fire-and-forget telemetry output.
pub trait Telemetry: Send + Sync {
    fn put(&self, key: &str, value: TmValue);

    fn put_number(&self, key: &str, value: f64) {
        self.put(key, TmValue::Number(value))
    }

    fn put_bool(&self, key: &str, value: bool) {
        self.put(key, TmValue::Bool(value))
    }

    fn put_string(&self, key: &str, value: &str) {
        self.put(key, TmValue::String(value.to_string()))
    }
}

/// A sink which discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn put(&self, _key: &str, _value: TmValue) {}
}
