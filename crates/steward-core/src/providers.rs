//! Collaborator contracts consumed by the control loop.
//!
//! The loop drives a running system only through these traits; the real
//! metrics backend, topology provider, and mutation surface live outside
//! this repository. Request/response needs are explicit typed calls here,
//! never routed through the notification bus.

use async_trait::async_trait;

use crate::error::ProviderResult;
use crate::types::{ClusterMetrics, Proposal, Snapshot, Topology};

/// Result of applying a proposal to the live system.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyReport {
    /// How many deployment units the change touched.
    pub changed_units: u32,
    /// Mutator-supplied detail for the audit trail.
    pub detail: String,
}

/// Result of restoring a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreReport {
    /// Pod count after restoration.
    pub pod_count: usize,
    /// Service count after restoration.
    pub service_count: usize,
}

/// Budget headroom as reported by the accounting collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStatus {
    Ok,
    Warning,
    Critical,
}

/// Read-only source of current resource metrics.
///
/// `fetch_current` is idempotent and side-effect-free.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    async fn fetch_current(&self) -> ProviderResult<ClusterMetrics>;
}

/// Read-only source of the current deployment topology.
#[async_trait]
pub trait TopologyProvider: Send + Sync {
    async fn current_topology(&self) -> ProviderResult<Topology>;
}

/// Mutation surface: applies proposals and restores snapshots.
#[async_trait]
pub trait TopologyMutator: Send + Sync {
    async fn apply_proposal(&self, proposal: &Proposal) -> ProviderResult<ApplyReport>;

    async fn restore_topology(&self, snapshot: &Snapshot) -> ProviderResult<RestoreReport>;
}

/// Spending/resource constraint that can veto cost-bearing proposals.
#[async_trait]
pub trait BudgetProvider: Send + Sync {
    async fn status(&self) -> ProviderResult<BudgetStatus>;

    async fn can_afford(&self, cost: f64) -> ProviderResult<bool>;
}
