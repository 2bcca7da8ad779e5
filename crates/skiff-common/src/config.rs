use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MINI_BATCH_ENABLED: &str = "table.exec.mini-batch.enabled";
pub const MINI_BATCH_ALLOW_LATENCY: &str = "table.exec.mini-batch.allow-latency";
pub const MINI_BATCH_SIZE: &str = "table.exec.mini-batch.size";
pub const STATE_TTL: &str = "table.exec.state.ttl";
pub const NATIVE_MAX_PAIRS_PER_PROBE: &str = "native.max-pairs-per-probe";
pub const NATIVE_COMPACTION_THRESHOLD: &str = "native.compaction-threshold";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiniBatchConfig {
    pub enabled: bool,
    pub allow_latency_ms: u64,
    pub size: usize,
}

impl MiniBatchConfig {
    pub fn allow_latency(&self) -> Duration {
        Duration::from_millis(self.allow_latency_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// 0 retains state indefinitely.
    pub ttl_ms: u64,
}

impl StateConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeConfig {
    pub max_pairs_per_probe: usize,
    pub compaction_threshold: f64,
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self {
            max_pairs_per_probe: 8192,
            compaction_threshold: 0.5,
        }
    }
}

/// Options of the join translator and its operators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    pub mini_batch: MiniBatchConfig,
    pub state: StateConfig,
    pub native: NativeConfig,
}

impl JoinConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: JoinConfig =
            toml::from_str(s).map_err(|e| Error::invalid_config(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::invalid_config(e.to_string()))
    }

    pub fn with_mini_batch(mut self, allow_latency_ms: u64, size: usize) -> Self {
        self.mini_batch = MiniBatchConfig {
            enabled: true,
            allow_latency_ms,
            size,
        };
        self
    }

    pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.state.ttl_ms = ttl.as_millis() as u64;
        self
    }

    pub fn is_mini_batch_enabled(&self) -> bool {
        self.mini_batch.enabled
    }

    /// Applies a single runtime option in `key = value` form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            MINI_BATCH_ENABLED => self.mini_batch.enabled = parse_bool(key, value)?,
            MINI_BATCH_ALLOW_LATENCY => {
                self.mini_batch.allow_latency_ms = parse_duration_ms(key, value)?
            }
            MINI_BATCH_SIZE => self.mini_batch.size = parse_number(key, value)?,
            STATE_TTL => self.state.ttl_ms = parse_duration_ms(key, value)?,
            NATIVE_MAX_PAIRS_PER_PROBE => {
                self.native.max_pairs_per_probe = parse_number(key, value)?
            }
            NATIVE_COMPACTION_THRESHOLD => {
                self.native.compaction_threshold = value.parse().map_err(|_| {
                    Error::invalid_config(format!("{}: expected a number, got '{}'", key, value))
                })?
            }
            _ => return Err(Error::invalid_config(format!("unknown option '{}'", key))),
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.mini_batch.enabled {
            if self.mini_batch.allow_latency_ms == 0 {
                return Err(Error::invalid_config(format!(
                    "{} must be greater than 0 when mini-batch is enabled",
                    MINI_BATCH_ALLOW_LATENCY
                )));
            }
            if self.mini_batch.size == 0 {
                return Err(Error::invalid_config(format!(
                    "{} must be greater than 0 when mini-batch is enabled",
                    MINI_BATCH_SIZE
                )));
            }
        }
        if self.native.max_pairs_per_probe == 0 {
            return Err(Error::invalid_config(format!(
                "{} must be greater than 0",
                NATIVE_MAX_PAIRS_PER_PROBE
            )));
        }
        let threshold = self.native.compaction_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::invalid_config(format!(
                "{} must be in (0, 1], got {}",
                NATIVE_COMPACTION_THRESHOLD, threshold
            )));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::invalid_config(format!(
            "{}: expected true or false, got '{}'",
            key, value
        ))),
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize> {
    value.parse().map_err(|_| {
        Error::invalid_config(format!("{}: expected an integer, got '{}'", key, value))
    })
}

/// Accepts `500`, `500 ms`, `5 s`, `5s`, `2 min` and `1 h`; a bare number is milliseconds.
fn parse_duration_ms(key: &str, value: &str) -> Result<u64> {
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u64 = digits.parse().map_err(|_| {
        Error::invalid_config(format!("{}: expected a duration, got '{}'", key, value))
    })?;
    let factor = match unit.trim() {
        "" | "ms" => 1,
        "s" => 1_000,
        "min" => 60_000,
        "h" => 3_600_000,
        other => {
            return Err(Error::invalid_config(format!(
                "{}: unknown duration unit '{}'",
                key, other
            )));
        }
    };
    Ok(amount * factor)
}
