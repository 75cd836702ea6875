//! Plugin and pipeline specs.
//!
//! A spec is the control-plane view of a named object: its name (unique in
//! its namespace), its type (immutable for the lifetime of the name) and the
//! raw configuration payload. Type-specific config structs are decoded from
//! the payload on demand with [`PluginSpec::decode`].

use crate::error::{KernelError, KernelResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Pull the mandatory `name` field out of a config payload.
fn name_of(config: &Value) -> KernelResult<String> {
    match config.get("name").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => Ok(name.to_string()),
        _ => Err(KernelError::MissingName),
    }
}

fn decode_as<T: DeserializeOwned>(kind: &str, config: &Value) -> KernelResult<T> {
    serde_json::from_value(config.clone()).map_err(|e| KernelError::invalid_config(kind, e))
}

/// Spec of a named plugin (one stage instance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub config: Value,
}

impl PluginSpec {
    /// Build a spec from a `{type, config}` payload; the name comes from
    /// `config.name`.
    pub fn from_payload(kind: impl Into<String>, config: Value) -> KernelResult<Self> {
        let name = name_of(&config)?;
        Ok(Self {
            name,
            kind: kind.into(),
            config,
        })
    }

    /// Decode the config payload into the type's config struct.
    pub fn decode<T: DeserializeOwned>(&self) -> KernelResult<T> {
        decode_as(&self.kind, &self.config)
    }
}

/// Spec of a named pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub config: Value,
}

impl PipelineSpec {
    pub fn from_payload(kind: impl Into<String>, config: Value) -> KernelResult<Self> {
        let name = name_of(&config)?;
        Ok(Self {
            name,
            kind: kind.into(),
            config,
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> KernelResult<T> {
        decode_as(&self.kind, &self.config)
    }
}

/// Parse a duration string such as `500ms`, `1.5s` or `1m30s`.
///
/// Accepts a sequence of decimal numbers each followed by one of the units
/// `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`.
pub fn parse_duration(input: &str) -> KernelResult<Duration> {
    let invalid = || KernelError::InvalidDuration(input.to_string());
    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total_nanos += value * nanos_per_unit;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(total_nanos as u64))
}
