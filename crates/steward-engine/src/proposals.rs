//! Proposal generation — one typed proposal per opportunity, plus
//! independent error-rate and right-sizing triggers.

use tracing::{debug, warn};

use steward_core::{
    Opportunity, OpportunityKind, Proposal, ProposalKind, WorkloadProfile,
};

/// Error rate above which heal and rate-limit candidates are generated.
const ERROR_RATE_TRIGGER_PERCENT: f64 = 5.0;
/// Rough monthly cost of one replica, for cost/savings estimates.
const REPLICA_MONTHLY_COST: f64 = 35.0;

/// Convert opportunities into confidence-filtered proposals.
///
/// Each opportunity kind maps to exactly one proposal kind. Two further
/// triggers fire independently of the opportunity list: an error rate
/// above 5% produces rate-limit and heal candidates, and a replica
/// recommendation differing from the current count produces a
/// right-sizing candidate. Proposals whose confidence falls below
/// `confidence_threshold` are discarded — that threshold is the single
/// tunable lever for loop aggressiveness.
///
/// When `budget_allowed` is false, cost-bearing proposals are dropped
/// unless they are priority 1 (critical-only downgrade); they are never
/// silently executed.
pub fn generate(
    opportunities: &[Opportunity],
    profile: &WorkloadProfile,
    budget_allowed: bool,
    confidence_threshold: f64,
) -> Vec<Proposal> {
    let mut proposals = Vec::new();

    for opportunity in opportunities {
        proposals.push(from_opportunity(opportunity, profile));
    }

    // Error-rate triggers, independent of the detector's rules.
    if profile.avg_error_rate > ERROR_RATE_TRIGGER_PERCENT {
        let confidence = error_rate_confidence(profile.avg_error_rate);
        proposals.push(Proposal {
            kind: ProposalKind::RateLimit,
            target: "cluster".to_string(),
            action: format!(
                "rate-limit ingress while error rate is {:.1}%",
                profile.avg_error_rate
            ),
            estimated_cost: None,
            estimated_savings: None,
            confidence,
            priority: 1,
            resource_delta_percent: 0.0,
            availability_gain_percent: 3.0,
            availability_risk_percent: 0.5,
            performance_impact_percent: 4.0,
            latency_impact_ms: 0.0,
        });
        proposals.push(Proposal {
            kind: ProposalKind::Heal,
            target: "cluster".to_string(),
            action: "restart failing units".to_string(),
            estimated_cost: None,
            estimated_savings: None,
            confidence,
            priority: 1,
            resource_delta_percent: 0.0,
            availability_gain_percent: 2.0,
            availability_risk_percent: 0.5,
            performance_impact_percent: 1.0,
            latency_impact_ms: 0.0,
        });
    }

    // Right-sizing candidate whenever the recommendation drifts from
    // the current replica count.
    if profile.recommended_replicas != profile.current_replicas {
        proposals.push(right_sizing(profile));
    }

    let before = proposals.len();
    proposals.retain(|p| {
        if p.confidence < confidence_threshold {
            debug!(
                kind = ?p.kind,
                confidence = p.confidence,
                confidence_threshold,
                "proposal below confidence threshold, discarded"
            );
            false
        } else {
            true
        }
    });

    if !budget_allowed {
        proposals.retain(|p| {
            let costs = p.estimated_cost.is_some();
            if costs && p.priority > 1 {
                warn!(kind = ?p.kind, target = %p.target, "budget exhausted, cost-bearing proposal dropped");
                false
            } else {
                true
            }
        });
    }

    debug!(
        generated = before,
        kept = proposals.len(),
        "proposal generation done"
    );
    proposals
}

/// Map one opportunity to its proposal.
fn from_opportunity(opportunity: &Opportunity, profile: &WorkloadProfile) -> Proposal {
    match opportunity.kind {
        OpportunityKind::OverProvisionCpu => {
            let target = steward_analyzer::detector::scale_down_target(profile.current_replicas);
            let freed = profile.current_replicas.saturating_sub(target);
            Proposal {
                kind: ProposalKind::ScaleDown,
                target: "cluster".to_string(),
                action: format!(
                    "scale down from {} to {target} replicas",
                    profile.current_replicas
                ),
                estimated_cost: None,
                estimated_savings: Some(freed as f64 * REPLICA_MONTHLY_COST),
                // The lower the utilization, the safer the shrink.
                confidence: (1.0 - profile.avg_cpu / 100.0).clamp(0.0, 1.0),
                priority: opportunity.priority,
                resource_delta_percent: -(freed as f64
                    / profile.current_replicas.max(1) as f64
                    * 100.0),
                availability_gain_percent: 0.0,
                availability_risk_percent: 1.0,
                performance_impact_percent: 2.0,
                latency_impact_ms: 5.0,
            }
        }
        OpportunityKind::InsufficientScaling => {
            let added = (profile.current_replicas / 2).max(1);
            Proposal {
                kind: ProposalKind::ScaleUp,
                target: "cluster".to_string(),
                action: format!("raise capacity by {added} replicas"),
                estimated_cost: Some(added as f64 * REPLICA_MONTHLY_COST),
                estimated_savings: None,
                confidence: (profile.scaling_headroom_percent / 100.0).clamp(0.0, 1.0),
                priority: opportunity.priority,
                resource_delta_percent: added as f64
                    / profile.current_replicas.max(1) as f64
                    * 100.0,
                availability_gain_percent: 2.0,
                availability_risk_percent: 0.0,
                performance_impact_percent: 0.0,
                latency_impact_ms: 0.0,
            }
        }
        OpportunityKind::NodeAffinity => Proposal {
            kind: ProposalKind::Rebalance,
            target: "cluster".to_string(),
            action: "move spread replicas onto shared nodes".to_string(),
            estimated_cost: None,
            estimated_savings: Some(REPLICA_MONTHLY_COST / 2.0),
            confidence: (0.4 + profile.affinity_inefficiency / 100.0).clamp(0.0, 1.0),
            priority: opportunity.priority,
            resource_delta_percent: 0.0,
            availability_gain_percent: 1.0,
            availability_risk_percent: 1.0,
            performance_impact_percent: 3.0,
            latency_impact_ms: 10.0,
        },
        OpportunityKind::MemoryContention => {
            let added = 1u32;
            Proposal {
                kind: ProposalKind::ScaleUp,
                target: "cluster".to_string(),
                action: format!(
                    "add {added} replica to relieve {:.0}% memory pressure",
                    profile.avg_memory
                ),
                estimated_cost: Some(added as f64 * REPLICA_MONTHLY_COST),
                estimated_savings: None,
                confidence: (profile.avg_memory / 100.0).clamp(0.0, 1.0),
                priority: opportunity.priority,
                resource_delta_percent: added as f64
                    / profile.current_replicas.max(1) as f64
                    * 100.0,
                availability_gain_percent: 2.0,
                availability_risk_percent: 0.0,
                performance_impact_percent: 0.0,
                latency_impact_ms: 0.0,
            }
        }
        OpportunityKind::CascadePrevention => Proposal {
            kind: ProposalKind::RateLimit,
            target: "cluster".to_string(),
            action: format!(
                "rate-limit upstream traffic, cascade risk {:.0}",
                profile.cascade_risk
            ),
            estimated_cost: None,
            estimated_savings: None,
            confidence: (0.2 + profile.cascade_risk / 100.0).clamp(0.0, 1.0),
            priority: opportunity.priority,
            resource_delta_percent: 0.0,
            availability_gain_percent: 3.0,
            availability_risk_percent: 0.5,
            performance_impact_percent: 4.0,
            latency_impact_ms: 0.0,
        },
    }
}

/// Right-sizing candidate toward the analyzer's recommendation.
fn right_sizing(profile: &WorkloadProfile) -> Proposal {
    let current = profile.current_replicas.max(1);
    let target = profile.recommended_replicas;
    let delta_percent = (target as f64 - current as f64) / current as f64 * 100.0;
    let growing = target > current;
    Proposal {
        kind: ProposalKind::Optimize,
        target: "cluster".to_string(),
        action: format!("right-size from {current} to {target} replicas"),
        estimated_cost: growing
            .then(|| (target - current) as f64 * REPLICA_MONTHLY_COST),
        estimated_savings: (!growing)
            .then(|| (current - target) as f64 * REPLICA_MONTHLY_COST),
        confidence: 0.75,
        priority: 4,
        resource_delta_percent: delta_percent,
        availability_gain_percent: if growing { 1.0 } else { 0.0 },
        availability_risk_percent: if growing { 0.0 } else { 1.0 },
        performance_impact_percent: if growing { 0.0 } else { 2.0 },
        latency_impact_ms: 0.0,
    }
}

/// Confidence from error-rate magnitude: 10% errors saturate to 1.0.
fn error_rate_confidence(error_rate: f64) -> f64 {
    (error_rate / 10.0).min(1.0)
}
