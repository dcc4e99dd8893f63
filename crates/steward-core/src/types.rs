//! Domain types for the Steward control loop.
//!
//! These types carry the state of one optimization cycle: raw observations
//! (`ClusterMetrics`, `Topology`), the derived `WorkloadProfile`, detected
//! `Opportunity` entries, costed `Proposal`s, pre-change `Snapshot`s, and
//! the `Decision` records appended to the ledger. All types are
//! serializable to JSON for persistence and event publication.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a pod (deployment unit).
pub type PodId = String;

/// Unique identifier for a node in the cluster.
pub type NodeId = String;

/// Service name (namespace-scoped, e.g. "default/checkout").
pub type ServiceName = String;

// ── Observations ───────────────────────────────────────────────────

/// Metrics sampled from a single deployment unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitMetrics {
    pub pod: PodId,
    /// CPU utilization as a percentage (0–100).
    pub cpu_percent: f64,
    /// Memory utilization as a percentage (0–100).
    pub memory_percent: f64,
    /// Observed request latency in milliseconds (p99).
    pub latency_ms: f64,
    /// Error rate as a percentage (0–100).
    pub error_rate: f64,
    /// Requests per second served by this unit.
    pub requests_per_sec: f64,
}

/// Point-in-time metrics across all sampled units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterMetrics {
    /// Unix timestamp (seconds) of the sample.
    pub epoch: u64,
    pub units: Vec<UnitMetrics>,
}

impl ClusterMetrics {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Mean error rate across all units (0–100), 0 when empty.
    pub fn avg_error_rate(&self) -> f64 {
        mean(self.units.iter().map(|u| u.error_rate))
    }

    /// Mean p99 latency across all units in milliseconds, 0 when empty.
    pub fn avg_latency_ms(&self) -> f64 {
        mean(self.units.iter().map(|u| u.latency_ms))
    }
}

/// A deployed pod and its placement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PodInfo {
    pub id: PodId,
    pub service: ServiceName,
    pub node: NodeId,
}

/// A service and its deployment constraints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceInfo {
    pub name: ServiceName,
    /// Critical services get extra protection in the safety gate.
    pub critical: bool,
    /// Current desired replica count.
    pub replicas: u32,
    /// Scaling ceiling for this service.
    pub max_replicas: u32,
    /// Downstream services this one calls (fan-out edges).
    pub depends_on: Vec<ServiceName>,
}

/// Current graph of deployed units and their relationships.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topology {
    pub pods: Vec<PodInfo>,
    pub services: Vec<ServiceInfo>,
    pub nodes: Vec<NodeId>,
}

impl Topology {
    pub fn is_empty(&self) -> bool {
        self.pods.is_empty() || self.services.is_empty()
    }

    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Sum of scaling ceilings across all services.
    pub fn max_replicas(&self) -> u32 {
        self.services.iter().map(|s| s.max_replicas).sum()
    }

    /// Names of services marked critical.
    pub fn critical_services(&self) -> Vec<ServiceName> {
        self.services
            .iter()
            .filter(|s| s.critical)
            .map(|s| s.name.clone())
            .collect()
    }
}

// ── Derived profile ────────────────────────────────────────────────

/// Compact reduction of one cycle's observations.
///
/// Created fresh each cycle by the analyzer and never mutated afterwards;
/// owned exclusively by the cycle that created it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkloadProfile {
    /// Mean CPU utilization across sampled units (0–100).
    pub avg_cpu: f64,
    /// Mean memory utilization across sampled units (0–100).
    pub avg_memory: f64,
    /// Mean p99 latency across sampled units (milliseconds).
    pub avg_latency_ms: f64,
    /// Mean error rate across sampled units (0–100).
    pub avg_error_rate: f64,
    /// Node-affinity inefficiency score (0–100): share of pods of
    /// multi-replica services running alone on their node.
    pub affinity_inefficiency: f64,
    /// Cascade-risk score (0–100): weighted error/latency/fan-out blend.
    pub cascade_risk: f64,
    /// Replica count the analyzer recommends for the next cycle.
    pub recommended_replicas: u32,
    /// Number of units sampled this cycle.
    pub unit_count: usize,
    /// Pods currently deployed.
    pub current_replicas: u32,
    /// How much of the scaling ceiling is in use (0–100).
    pub scaling_headroom_percent: f64,
}

// ── Opportunities ──────────────────────────────────────────────────

/// Category of detected inefficiency or stability risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    OverProvisionCpu,
    InsufficientScaling,
    NodeAffinity,
    MemoryContention,
    CascadePrevention,
}

/// Severity of an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A detected inefficiency or stability risk, not yet an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Opportunity {
    pub kind: OpportunityKind,
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
    /// Human-readable estimate of the impact of acting on this.
    pub estimated_impact: String,
    /// 1 = most urgent. Detector output is sorted ascending by priority.
    pub priority: u8,
    /// Whether acting on this prevents a cascading failure.
    pub cascade_preventing: bool,
}

// ── Proposals ──────────────────────────────────────────────────────

/// Concrete corrective action category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    ScaleUp,
    ScaleDown,
    RateLimit,
    Rebalance,
    Heal,
    Optimize,
}

/// A concrete, costed, confidence-scored candidate corrective action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Proposal {
    pub kind: ProposalKind,
    /// What the action targets (service name or "cluster").
    pub target: String,
    /// Human-readable description of the action.
    pub action: String,
    /// Estimated monthly cost of applying this, if it costs anything.
    pub estimated_cost: Option<f64>,
    /// Estimated monthly savings from applying this, if any.
    pub estimated_savings: Option<f64>,
    /// Confidence that this action helps (0–1).
    pub confidence: f64,
    /// 1 = most urgent.
    pub priority: u8,
    /// Projected CPU/memory increase from applying this (percent,
    /// negative for reductions).
    pub resource_delta_percent: f64,
    /// Projected availability gained (risk reduction, percent points).
    pub availability_gain_percent: f64,
    /// Projected availability put at risk (percent points).
    pub availability_risk_percent: f64,
    /// Projected performance degradation for affected services (percent).
    pub performance_impact_percent: f64,
    /// Projected latency increase from applying this (milliseconds).
    pub latency_impact_ms: f64,
}

// ── Snapshots ──────────────────────────────────────────────────────

/// Immutable point-in-time capture of topology and metrics, taken before
/// a proposal is applied and used to restore state on failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub id: Uuid,
    /// The decision this snapshot was captured for.
    pub decision_id: Uuid,
    /// Unix timestamp (seconds) of capture.
    pub timestamp: u64,
    pub topology: Topology,
    pub metrics: ClusterMetrics,
}

// ── Decisions ──────────────────────────────────────────────────────

/// Terminal classification of one cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// Proposal applied and verified.
    Executed,
    /// Safety gate rejected the proposal; state unchanged.
    Blocked { reasons: Vec<String> },
    /// Safety gate deferred the proposal (system not stable enough to
    /// judge); re-evaluated next cycle, state unchanged.
    Deferred { reasons: Vec<String> },
    /// Execution or verification failed and the snapshot was restored.
    RolledBack { reason: String },
    /// Execution failed and restoration could not be confirmed.
    /// Requires operator intervention; never auto-retried.
    Failed { reason: String },
    /// Nothing to do this cycle.
    NoAction,
}

impl DecisionOutcome {
    /// Short label for logging and statistics.
    pub fn label(&self) -> &'static str {
        match self {
            DecisionOutcome::Executed => "executed",
            DecisionOutcome::Blocked { .. } => "blocked",
            DecisionOutcome::Deferred { .. } => "deferred",
            DecisionOutcome::RolledBack { .. } => "rolled_back",
            DecisionOutcome::Failed { .. } => "failed",
            DecisionOutcome::NoAction => "no_action",
        }
    }
}

/// Immutable audit record of one cycle outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub id: Uuid,
    /// Unix timestamp (seconds) when the cycle concluded.
    pub timestamp: u64,
    /// The proposal acted on, if the cycle got that far.
    pub proposal: Option<Proposal>,
    /// Whether a mutation reached the topology mutator.
    pub executed: bool,
    /// Snapshot captured before execution, if any.
    pub snapshot_id: Option<Uuid>,
    pub outcome: DecisionOutcome,
    /// Whether the pre-change snapshot was restored.
    pub rolled_back: bool,
}

impl Decision {
    /// A decision for a cycle that produced no actionable proposal.
    pub fn no_action(id: Uuid, timestamp: u64) -> Self {
        Self {
            id,
            timestamp,
            proposal: None,
            executed: false,
            snapshot_id: None,
            outcome: DecisionOutcome::NoAction,
            rolled_back: false,
        }
    }
}

// ── Safety gate inputs ─────────────────────────────────────────────

/// System state the safety gate judges proposals against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateState {
    /// Current mean error rate (0–100).
    pub error_rate: f64,
    /// Current mean p99 latency (milliseconds).
    pub p99_latency_ms: f64,
    /// Current availability (0–100).
    pub availability_percent: f64,
    /// Services that must not be degraded.
    pub critical_services: Vec<ServiceName>,
}

impl GateState {
    /// Derive gate inputs from the current observations.
    ///
    /// Availability is approximated as the complement of the error rate.
    pub fn observe(metrics: &ClusterMetrics, topology: &Topology) -> Self {
        let error_rate = metrics.avg_error_rate();
        Self {
            error_rate,
            p99_latency_ms: metrics.avg_latency_ms(),
            availability_percent: (100.0 - error_rate).clamp(0.0, 100.0),
            critical_services: topology.critical_services(),
        }
    }
}

/// Mean of an iterator of f64 samples, 0.0 when empty.
pub(crate) fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 { 0.0 } else { sum / count as f64 }
}
