//! Opportunity detection — independent rules over a workload profile.

use tracing::debug;

use steward_core::{Opportunity, OpportunityKind, Severity, WorkloadProfile};

/// CPU utilization below which the cluster is over-provisioned.
const CPU_OVER_PROVISION_PERCENT: f64 = 30.0;
/// Share of the scaling ceiling in use that signals surge exhaustion.
const HEADROOM_SURGE_PERCENT: f64 = 85.0;
/// Affinity inefficiency score above which rebalancing pays off.
const AFFINITY_THRESHOLD: f64 = 20.0;
/// Memory utilization above which contention is imminent.
const MEMORY_CONTENTION_PERCENT: f64 = 75.0;
/// Cascade-risk score above which preventive action is warranted.
const CASCADE_RISK_THRESHOLD: f64 = 60.0;

/// Apply all detection rules to a profile.
///
/// Rules are independent and may all fire for the same profile. The
/// result is sorted ascending by priority (1 = most urgent); rule
/// evaluation order breaks ties. An empty result is a normal idle cycle.
pub fn detect(profile: &WorkloadProfile) -> Vec<Opportunity> {
    let mut opportunities = Vec::new();

    if profile.avg_cpu < CPU_OVER_PROVISION_PERCENT {
        let target = scale_down_target(profile.current_replicas);
        opportunities.push(Opportunity {
            kind: OpportunityKind::OverProvisionCpu,
            severity: Severity::High,
            description: format!(
                "average CPU {:.1}% is below the {CPU_OVER_PROVISION_PERCENT:.0}% floor",
                profile.avg_cpu
            ),
            recommendation: format!(
                "scale down from {} to {target} replicas",
                profile.current_replicas
            ),
            estimated_impact: format!(
                "frees ~{:.0}% of allocated CPU",
                (1.0 - target as f64 / profile.current_replicas.max(1) as f64) * 100.0
            ),
            priority: 2,
            cascade_preventing: false,
        });
    }

    if profile.scaling_headroom_percent > HEADROOM_SURGE_PERCENT {
        opportunities.push(Opportunity {
            kind: OpportunityKind::InsufficientScaling,
            severity: Severity::Critical,
            description: format!(
                "{:.0}% of the scaling ceiling is in use; traffic surges cannot be absorbed",
                profile.scaling_headroom_percent
            ),
            recommendation: "raise the scaling ceiling or add capacity".to_string(),
            estimated_impact: "prevents saturation under the next surge".to_string(),
            priority: 1,
            cascade_preventing: false,
        });
    }

    if profile.affinity_inefficiency > AFFINITY_THRESHOLD {
        opportunities.push(Opportunity {
            kind: OpportunityKind::NodeAffinity,
            severity: Severity::Medium,
            description: format!(
                "affinity inefficiency {:.0}: replicas are spread across nodes",
                profile.affinity_inefficiency
            ),
            recommendation: "rebalance replicas onto shared nodes".to_string(),
            estimated_impact: "reduces cross-node traffic".to_string(),
            priority: 3,
            cascade_preventing: false,
        });
    }

    if profile.avg_memory > MEMORY_CONTENTION_PERCENT {
        opportunities.push(Opportunity {
            kind: OpportunityKind::MemoryContention,
            severity: Severity::High,
            description: format!(
                "average memory {:.1}% exceeds the {MEMORY_CONTENTION_PERCENT:.0}% ceiling",
                profile.avg_memory
            ),
            recommendation: "add replicas to spread memory pressure".to_string(),
            estimated_impact: "prevents OOM-driven cascade".to_string(),
            priority: 2,
            cascade_preventing: true,
        });
    }

    if profile.cascade_risk > CASCADE_RISK_THRESHOLD {
        opportunities.push(Opportunity {
            kind: OpportunityKind::CascadePrevention,
            severity: Severity::Critical,
            description: format!(
                "cascade risk {:.0} exceeds the {CASCADE_RISK_THRESHOLD:.0} threshold",
                profile.cascade_risk
            ),
            recommendation: "rate-limit upstream traffic before the failure spreads"
                .to_string(),
            estimated_impact: "contains a likely cascading failure".to_string(),
            priority: 1,
            cascade_preventing: true,
        });
    }

    // Stable sort: insertion (rule) order is the tie-break.
    opportunities.sort_by_key(|o| o.priority);

    debug!(count = opportunities.len(), "opportunity detection done");
    opportunities
}

/// Scale-down target: two thirds of the current replicas, rounded up.
pub fn scale_down_target(current: u32) -> u32 {
    ((current as f64) * 0.67).ceil().max(1.0) as u32
}
