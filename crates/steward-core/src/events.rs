//! Notification events published by the control loop.
//!
//! Events are genuinely one-to-many notifications (dashboards, alerting);
//! nothing control-flow-critical rides on them and the loop never blocks
//! on subscriber presence or behavior.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Opportunity, Proposal, WorkloadProfile};

/// One observable step of a cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "topic", rename_all = "kebab-case")]
pub enum ControlEvent {
    /// A workload profile was computed.
    Analysis { profile: WorkloadProfile },
    /// A rule fired on the profile.
    OpportunityFound { opportunity: Opportunity },
    /// A proposal was applied and verified.
    OptimizationApplied {
        decision_id: Uuid,
        proposal: Proposal,
    },
    /// The safety gate blocked or deferred a proposal.
    OptimizationBlocked {
        decision_id: Uuid,
        reasons: Vec<String>,
    },
    /// A failed change was restored from its snapshot.
    RollbackCompleted { decision_id: Uuid },
    /// A cycle hit an error (transient aborts, critical rollback failures).
    Error { message: String },
}

impl ControlEvent {
    /// Topic name, matching the serialized `topic` tag.
    pub fn topic(&self) -> &'static str {
        match self {
            ControlEvent::Analysis { .. } => "analysis",
            ControlEvent::OpportunityFound { .. } => "opportunity-found",
            ControlEvent::OptimizationApplied { .. } => "optimization-applied",
            ControlEvent::OptimizationBlocked { .. } => "optimization-blocked",
            ControlEvent::RollbackCompleted { .. } => "rollback-completed",
            ControlEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_matches_serialized_tag() {
        let event = ControlEvent::Error {
            message: "boom".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"topic\":\"error\""));
        assert_eq!(event.topic(), "error");
    }

    #[test]
    fn rollback_event_round_trips() {
        let event = ControlEvent::RollbackCompleted {
            decision_id: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ControlEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.topic(), "rollback-completed");
    }
}
