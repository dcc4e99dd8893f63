//! Workload profiling — folds one cycle's observations into a profile.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use steward_core::{ClusterMetrics, Decision, ProposalKind, Topology, WorkloadProfile};

/// CPU utilization the replica recommendation targets.
const TARGET_CPU_PERCENT: f64 = 60.0;

/// Errors from workload analysis.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Metrics or topology are empty; callers defer the cycle and retry
    /// on the next interval.
    #[error("insufficient data: {0}")]
    InsufficientData(&'static str),
}

/// Reduce metrics + topology + recent history into a `WorkloadProfile`.
///
/// Pure and deterministic. The history is used only to damp the replica
/// recommendation while a recent scale action is still settling.
pub fn analyze(
    metrics: &ClusterMetrics,
    topology: &Topology,
    history: &[Decision],
) -> Result<WorkloadProfile, AnalyzerError> {
    if metrics.is_empty() {
        return Err(AnalyzerError::InsufficientData("no metrics samples"));
    }
    if topology.is_empty() {
        return Err(AnalyzerError::InsufficientData("empty topology"));
    }

    let count = metrics.units.len() as f64;
    let avg_cpu = metrics.units.iter().map(|u| u.cpu_percent).sum::<f64>() / count;
    let avg_memory = metrics.units.iter().map(|u| u.memory_percent).sum::<f64>() / count;
    let avg_latency_ms = metrics.avg_latency_ms();
    let avg_error_rate = metrics.avg_error_rate();

    let affinity_inefficiency = affinity_inefficiency(topology);
    let cascade_risk = cascade_risk(avg_error_rate, avg_latency_ms, topology);

    let current_replicas = topology.pod_count() as u32;
    let max_replicas = topology.max_replicas();
    let recommended_replicas =
        recommend_replicas(current_replicas, max_replicas, avg_cpu, history);

    let scaling_headroom_percent = if max_replicas == 0 {
        0.0
    } else {
        current_replicas as f64 / max_replicas as f64 * 100.0
    };

    let profile = WorkloadProfile {
        avg_cpu,
        avg_memory,
        avg_latency_ms,
        avg_error_rate,
        affinity_inefficiency,
        cascade_risk,
        recommended_replicas,
        unit_count: metrics.units.len(),
        current_replicas,
        scaling_headroom_percent,
    };

    debug!(
        avg_cpu,
        avg_error_rate,
        cascade_risk,
        recommended = recommended_replicas,
        "workload profile computed"
    );

    Ok(profile)
}

/// Share of pods (of multi-replica services) running alone on their node,
/// as a percentage. Spread-out replicas cost cross-node traffic.
fn affinity_inefficiency(topology: &Topology) -> f64 {
    // (service, node) → pod count.
    let mut colocation: HashMap<(&str, &str), u32> = HashMap::new();
    for pod in &topology.pods {
        *colocation
            .entry((pod.service.as_str(), pod.node.as_str()))
            .or_insert(0) += 1;
    }

    let multi_replica: Vec<&str> = topology
        .services
        .iter()
        .filter(|s| s.replicas > 1)
        .map(|s| s.name.as_str())
        .collect();

    let mut considered = 0u32;
    let mut isolated = 0u32;
    for pod in &topology.pods {
        if !multi_replica.contains(&pod.service.as_str()) {
            continue;
        }
        considered += 1;
        if colocation[&(pod.service.as_str(), pod.node.as_str())] == 1 {
            isolated += 1;
        }
    }

    if considered == 0 {
        0.0
    } else {
        isolated as f64 / considered as f64 * 100.0
    }
}

/// Weighted blend of error rate, latency, and service fan-out (0–100).
fn cascade_risk(avg_error_rate: f64, avg_latency_ms: f64, topology: &Topology) -> f64 {
    let err_norm = (avg_error_rate * 10.0).min(100.0);
    let lat_norm = (avg_latency_ms / 10.0).min(100.0);

    let fanout: usize = topology.services.iter().map(|s| s.depends_on.len()).sum();
    let avg_fanout = fanout as f64 / topology.services.len() as f64;
    let fanout_norm = (avg_fanout * 25.0).min(100.0);

    (0.5 * err_norm + 0.3 * lat_norm + 0.2 * fanout_norm).clamp(0.0, 100.0)
}

/// Replica count that would bring average CPU to the target, clamped to
/// [1, max]. Holds at the current count while a recently executed scale
/// action is still settling, to avoid flapping.
fn recommend_replicas(current: u32, max: u32, avg_cpu: f64, history: &[Decision]) -> u32 {
    let settling = history.iter().rev().take(3).any(|d| {
        d.executed
            && matches!(
                d.proposal.as_ref().map(|p| p.kind),
                Some(ProposalKind::ScaleUp | ProposalKind::ScaleDown | ProposalKind::Optimize)
            )
    });
    if settling {
        return current;
    }

    let ideal = (current as f64 * avg_cpu / TARGET_CPU_PERCENT).ceil() as u32;
    ideal.clamp(1, max.max(1))
}
