//! Safety gate — invariant checks that stand between a proposal and the
//! topology mutator.

use tracing::{debug, warn};

use steward_core::{GateState, Proposal, SafetyThresholds};

/// Error rate above which the system is too unstable to judge a change.
const STABILITY_MAX_ERROR_RATE: f64 = 1.0;
/// P99 latency above which the system is too unstable to judge a change.
const STABILITY_MAX_P99_MS: f64 = 500.0;
/// Maximum projected degradation tolerated for critical services.
const CRITICAL_DEGRADATION_MAX_PERCENT: f64 = 5.0;

/// Outcome of gating one proposal.
#[derive(Debug, Clone, PartialEq)]
pub enum GateVerdict {
    /// All checks passed; execution may proceed.
    Approved,
    /// The system is not stable enough to judge the change. Not a
    /// rejection — the proposal is re-evaluated next cycle.
    Deferred { reasons: Vec<String> },
    /// One or more invariants would be violated; execution is blocked.
    Blocked { reasons: Vec<String> },
}

impl GateVerdict {
    pub fn allowed(&self) -> bool {
        matches!(self, GateVerdict::Approved)
    }

    /// Reasons for a non-approved verdict, empty when approved.
    pub fn reasons(&self) -> &[String] {
        match self {
            GateVerdict::Approved => &[],
            GateVerdict::Deferred { reasons } | GateVerdict::Blocked { reasons } => reasons,
        }
    }
}

/// Validate a proposal against the safety invariants.
///
/// Four independent checks; all must pass:
/// 1. Stability — the system must be calm enough to attribute any
///    post-change regression to the change. Failure defers.
/// 2. Resource delta — projected CPU/memory increase within bounds,
///    including the projected latency increase.
/// 3. Availability — projected availability stays above the floor.
/// 4. Critical-service protection — no critical service may see more
///    than 5% projected degradation.
///
/// Every failing check contributes a reason; nothing fails silently.
pub fn validate(
    proposal: &Proposal,
    state: &GateState,
    thresholds: &SafetyThresholds,
) -> GateVerdict {
    // 1. Stability. An unstable system defers rather than rejects: the
    // same proposal may be fine once the error rate settles.
    let mut defer_reasons = Vec::new();
    if state.error_rate >= STABILITY_MAX_ERROR_RATE {
        defer_reasons.push(format!(
            "error rate {:.2}% >= {STABILITY_MAX_ERROR_RATE:.0}% stability bound",
            state.error_rate
        ));
    }
    if state.p99_latency_ms >= STABILITY_MAX_P99_MS {
        defer_reasons.push(format!(
            "p99 latency {:.0}ms >= {STABILITY_MAX_P99_MS:.0}ms stability bound",
            state.p99_latency_ms
        ));
    }
    if !defer_reasons.is_empty() {
        debug!(kind = ?proposal.kind, reasons = ?defer_reasons, "proposal deferred");
        return GateVerdict::Deferred {
            reasons: defer_reasons,
        };
    }

    let mut reasons = Vec::new();

    // 2. Resource delta.
    if proposal.resource_delta_percent > thresholds.max_resource_increase_percent {
        reasons.push(format!(
            "resource increase {:.1}% exceeds cap {:.1}%",
            proposal.resource_delta_percent, thresholds.max_resource_increase_percent
        ));
    }
    if proposal.latency_impact_ms > thresholds.max_latency_increase_ms {
        reasons.push(format!(
            "latency increase {:.0}ms exceeds cap {:.0}ms",
            proposal.latency_impact_ms, thresholds.max_latency_increase_ms
        ));
    }

    // 3. Availability.
    let projected = state.availability_percent + proposal.availability_gain_percent
        - proposal.availability_risk_percent;
    if projected < thresholds.min_availability_percent {
        reasons.push(format!(
            "projected availability {projected:.2}% below floor {:.2}%",
            thresholds.min_availability_percent
        ));
    }

    // 4. Critical-service protection. Cluster-wide actions touch every
    // service, so the presence of any critical service counts.
    let touches_critical = proposal.target == "cluster"
        || state.critical_services.iter().any(|s| *s == proposal.target);
    if touches_critical
        && proposal.performance_impact_percent > CRITICAL_DEGRADATION_MAX_PERCENT
        && !state.critical_services.is_empty()
    {
        reasons.push(format!(
            "projected {:.1}% degradation on critical services exceeds {CRITICAL_DEGRADATION_MAX_PERCENT:.0}%",
            proposal.performance_impact_percent
        ));
    }

    if reasons.is_empty() {
        debug!(kind = ?proposal.kind, target = %proposal.target, "proposal approved");
        GateVerdict::Approved
    } else {
        warn!(kind = ?proposal.kind, reasons = ?reasons, "proposal blocked");
        GateVerdict::Blocked { reasons }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_core::ProposalKind;

    fn stable_state() -> GateState {
        GateState {
            error_rate: 0.3,
            p99_latency_ms: 120.0,
            availability_percent: 99.7,
            critical_services: vec!["checkout".to_string()],
        }
    }

    fn benign_proposal() -> Proposal {
        Proposal {
            kind: ProposalKind::ScaleDown,
            target: "cluster".to_string(),
            action: "scale down".to_string(),
            estimated_cost: None,
            estimated_savings: Some(35.0),
            confidence: 0.8,
            priority: 2,
            resource_delta_percent: -20.0,
            availability_gain_percent: 0.0,
            availability_risk_percent: 1.0,
            performance_impact_percent: 2.0,
            latency_impact_ms: 5.0,
        }
    }

    #[test]
    fn benign_proposal_is_approved() {
        let verdict = validate(&benign_proposal(), &stable_state(), &SafetyThresholds::default());
        assert_eq!(verdict, GateVerdict::Approved);
        assert!(verdict.allowed());
        assert!(verdict.reasons().is_empty());
    }

    #[test]
    fn unstable_error_rate_defers() {
        let mut state = stable_state();
        state.error_rate = 2.5;

        let verdict = validate(&benign_proposal(), &state, &SafetyThresholds::default());
        assert!(matches!(verdict, GateVerdict::Deferred { .. }));
        assert!(verdict.reasons()[0].contains("error rate"));
    }

    #[test]
    fn unstable_latency_defers() {
        let mut state = stable_state();
        state.p99_latency_ms = 800.0;

        let verdict = validate(&benign_proposal(), &state, &SafetyThresholds::default());
        assert!(matches!(verdict, GateVerdict::Deferred { .. }));
    }

    #[test]
    fn oversized_resource_delta_blocks() {
        let mut proposal = benign_proposal();
        proposal.resource_delta_percent = 50.0;

        let verdict = validate(&proposal, &stable_state(), &SafetyThresholds::default());
        assert!(matches!(verdict, GateVerdict::Blocked { .. }));
        assert!(verdict.reasons()[0].contains("resource increase"));
    }

    #[test]
    fn latency_cap_blocks() {
        let mut proposal = benign_proposal();
        proposal.latency_impact_ms = 300.0;

        let verdict = validate(&proposal, &stable_state(), &SafetyThresholds::default());
        assert!(matches!(verdict, GateVerdict::Blocked { .. }));
    }

    #[test]
    fn availability_floor_blocks() {
        let mut proposal = benign_proposal();
        proposal.availability_risk_percent = 6.0;

        let verdict = validate(&proposal, &stable_state(), &SafetyThresholds::default());
        assert!(matches!(verdict, GateVerdict::Blocked { .. }));
        assert!(verdict.reasons()[0].contains("availability"));
    }

    #[test]
    fn critical_service_degradation_blocks() {
        let mut proposal = benign_proposal();
        proposal.performance_impact_percent = 8.0;

        let verdict = validate(&proposal, &stable_state(), &SafetyThresholds::default());
        assert!(matches!(verdict, GateVerdict::Blocked { .. }));
        assert!(verdict.reasons()[0].contains("critical"));
    }

    #[test]
    fn degradation_without_critical_services_passes() {
        let mut proposal = benign_proposal();
        proposal.performance_impact_percent = 8.0;
        let mut state = stable_state();
        state.critical_services.clear();

        let verdict = validate(&proposal, &state, &SafetyThresholds::default());
        assert_eq!(verdict, GateVerdict::Approved);
    }

    #[test]
    fn all_failing_checks_report_all_reasons() {
        let mut proposal = benign_proposal();
        proposal.resource_delta_percent = 50.0;
        proposal.latency_impact_ms = 500.0;
        proposal.availability_risk_percent = 10.0;
        proposal.performance_impact_percent = 9.0;

        let verdict = validate(&proposal, &stable_state(), &SafetyThresholds::default());
        assert_eq!(verdict.reasons().len(), 4);
    }
}
