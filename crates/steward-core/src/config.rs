//! Control-loop configuration.
//!
//! A `ControlConfig` is an immutable value for the duration of a cycle:
//! the controller reads it at cycle start and passes it down explicitly.
//! Updates take effect only between cycles.

use serde::{Deserialize, Serialize};

/// Safety invariants the gate enforces before any execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SafetyThresholds {
    /// Maximum projected CPU/memory increase a proposal may carry (percent).
    #[serde(default = "default_max_resource_increase")]
    pub max_resource_increase_percent: f64,
    /// Minimum projected availability after a proposal (percent).
    #[serde(default = "default_min_availability")]
    pub min_availability_percent: f64,
    /// Maximum projected latency increase a proposal may carry (ms).
    #[serde(default = "default_max_latency_increase")]
    pub max_latency_increase_ms: f64,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            max_resource_increase_percent: default_max_resource_increase(),
            min_availability_percent: default_min_availability(),
            max_latency_increase_ms: default_max_latency_increase(),
        }
    }
}

fn default_max_resource_increase() -> f64 {
    20.0
}

fn default_min_availability() -> f64 {
    95.0
}

fn default_max_latency_increase() -> f64 {
    100.0
}

/// Tunables for the whole control loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlConfig {
    /// Interval between automatic cycles, in seconds.
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,
    /// How long to wait after a change before verifying, in milliseconds.
    #[serde(default = "default_stabilization_delay")]
    pub stabilization_delay_ms: u64,
    /// Proposals below this confidence are discarded. The single lever
    /// for loop aggressiveness.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Maximum decisions retained in the ledger (FIFO eviction).
    #[serde(default = "default_ledger_capacity")]
    pub ledger_capacity: usize,
    /// Maximum pre-change snapshots retained (FIFO eviction).
    #[serde(default = "default_snapshot_capacity")]
    pub snapshot_capacity: usize,
    /// How many recent decisions the analyzer sees as history.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default)]
    pub thresholds: SafetyThresholds,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval(),
            stabilization_delay_ms: default_stabilization_delay(),
            confidence_threshold: default_confidence_threshold(),
            ledger_capacity: default_ledger_capacity(),
            snapshot_capacity: default_snapshot_capacity(),
            history_window: default_history_window(),
            thresholds: SafetyThresholds::default(),
        }
    }
}

impl ControlConfig {
    /// Parse a TOML config document, filling absent keys with defaults.
    pub fn from_toml(doc: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(doc)
    }
}

fn default_cycle_interval() -> u64 {
    180
}

fn default_stabilization_delay() -> u64 {
    5_000
}

fn default_confidence_threshold() -> f64 {
    0.7
}

fn default_ledger_capacity() -> usize {
    1_000
}

fn default_snapshot_capacity() -> usize {
    64
}

fn default_history_window() -> usize {
    10
}
