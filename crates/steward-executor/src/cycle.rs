//! Cycle phase — observable position of the control loop.

use serde::{Deserialize, Serialize};

/// Current phase of the optimization cycle.
///
/// Published for status inspection; transitions are driven by the
/// controller and always return to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    #[default]
    Idle,
    Analyzing,
    Proposing,
    Gating,
    Executing,
    Verifying,
    RollingBack,
}

impl CyclePhase {
    /// Whether a cycle is currently in flight.
    pub fn busy(&self) -> bool {
        *self != CyclePhase::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_is_default_and_not_busy() {
        assert_eq!(CyclePhase::default(), CyclePhase::Idle);
        assert!(!CyclePhase::Idle.busy());
        assert!(CyclePhase::Executing.busy());
    }
}
