//! steward-analyzer — reduces raw observations to actionable signals.
//!
//! Two stages, both pure and deterministic given identical inputs:
//!
//! 1. [`profile::analyze`] folds metrics + topology + recent decision
//!    history into a compact `WorkloadProfile`.
//! 2. [`detector::detect`] applies independent, composable rules to the
//!    profile and emits a priority-ordered list of `Opportunity` entries.
//!
//! # Detection Rules
//!
//! ```text
//! avg_cpu < 30%                → over_provision_cpu   (HIGH)
//! headroom in use > 85%        → insufficient_scaling (CRITICAL)
//! affinity inefficiency > 20   → node_affinity        (MEDIUM)
//! avg_memory > 75%             → memory_contention    (HIGH, cascade-preventing)
//! cascade risk > 60            → cascade_prevention   (CRITICAL, cascade-preventing)
//! ```
//!
//! Rules are not mutually exclusive; output is sorted ascending by
//! priority (1 = most urgent) with rule order breaking ties.

pub mod detector;
pub mod profile;

pub use detector::detect;
pub use profile::{AnalyzerError, analyze};
