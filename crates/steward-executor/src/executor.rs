//! Executor — snapshot capture and the execute/verify/rollback sequence.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};
use uuid::Uuid;

use steward_core::{
    ApplyReport, ClusterMetrics, MetricsProvider, Proposal, Snapshot, Topology, TopologyMutator,
    TopologyProvider,
};

use crate::cycle::CyclePhase;
use crate::rollback::RollbackManager;
use crate::verifier::{Verifier, VerifyOutcome};

/// Callback invoked as execution moves between phases, so callers can
/// surface live status while a change is in flight.
pub type PhaseHook = Box<dyn Fn(CyclePhase) + Send + Sync>;

/// Terminal result of executing one approved proposal.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeResult {
    /// The change was applied and verified.
    Executed { report: ApplyReport },
    /// The change failed and the snapshot was restored successfully.
    RolledBack { reason: String },
    /// The change failed and restoration could not be confirmed.
    /// Critical: requires operator intervention, never auto-retried.
    RollbackFailed { reason: String },
}

/// Applies approved proposals through the external mutator, bracketed by
/// snapshot capture and post-change verification.
pub struct Executor {
    mutator: Arc<dyn TopologyMutator>,
    verifier: Verifier,
    rollback: RollbackManager,
    phase_hook: Option<PhaseHook>,
}

impl Executor {
    pub fn new(
        topology: Arc<dyn TopologyProvider>,
        metrics: Arc<dyn MetricsProvider>,
        mutator: Arc<dyn TopologyMutator>,
        stabilization_delay: Duration,
    ) -> Self {
        Self {
            mutator: mutator.clone(),
            verifier: Verifier::new(topology.clone(), metrics, stabilization_delay),
            rollback: RollbackManager::new(mutator, topology, stabilization_delay),
            phase_hook: None,
        }
    }

    /// Report phase transitions through `hook` while a change is in
    /// flight.
    pub fn with_phase_hook(mut self, hook: PhaseHook) -> Self {
        self.phase_hook = Some(hook);
        self
    }

    fn note_phase(&self, phase: CyclePhase) {
        if let Some(hook) = &self.phase_hook {
            hook(phase);
        }
    }

    /// Deep-copy the current observations into a snapshot keyed by the
    /// decision id. The snapshot is immutable from here on.
    pub fn capture_snapshot(
        decision_id: Uuid,
        topology: &Topology,
        metrics: &ClusterMetrics,
    ) -> Snapshot {
        Snapshot {
            id: Uuid::new_v4(),
            decision_id,
            timestamp: epoch_secs(),
            topology: topology.clone(),
            metrics: metrics.clone(),
        }
    }

    /// Apply the proposal, verify it after stabilization, and roll back
    /// on any failure. Exactly one `ChangeResult` per call; the caller
    /// owns ledger bookkeeping and event publication.
    pub async fn apply_and_verify(
        &self,
        snapshot: &Snapshot,
        proposal: &Proposal,
    ) -> ChangeResult {
        let report = match self.mutator.apply_proposal(proposal).await {
            Ok(report) => report,
            Err(e) => {
                warn!(kind = ?proposal.kind, error = %e, "apply failed, rolling back");
                return self.roll_back(snapshot, format!("apply failed: {e}")).await;
            }
        };
        info!(
            kind = ?proposal.kind,
            changed_units = report.changed_units,
            "proposal applied, verifying"
        );
        self.note_phase(CyclePhase::Verifying);

        match self.verifier.verify().await {
            VerifyOutcome::Passed => ChangeResult::Executed { report },
            VerifyOutcome::Failed { reason } => {
                warn!(kind = ?proposal.kind, %reason, "verification failed, rolling back");
                self.roll_back(snapshot, reason).await
            }
        }
    }

    async fn roll_back(&self, snapshot: &Snapshot, reason: String) -> ChangeResult {
        self.note_phase(CyclePhase::RollingBack);
        match self.rollback.restore(snapshot).await {
            Ok(()) => ChangeResult::RolledBack { reason },
            Err(e) => ChangeResult::RollbackFailed {
                reason: format!("{reason}; {e}"),
            },
        }
    }
}

/// Current Unix epoch in seconds.
fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use steward_core::{
        PodInfo, ProposalKind, ProviderError, ProviderResult, RestoreReport, ServiceInfo,
        UnitMetrics,
    };

    fn test_topology(pods: u32) -> Topology {
        Topology {
            pods: (0..pods)
                .map(|i| PodInfo {
                    id: format!("api-{i}"),
                    service: "api".to_string(),
                    node: format!("node-{}", i % 2),
                })
                .collect(),
            services: vec![ServiceInfo {
                name: "api".to_string(),
                critical: false,
                replicas: pods,
                max_replicas: 10,
                depends_on: vec![],
            }],
            nodes: vec!["node-0".to_string(), "node-1".to_string()],
        }
    }

    fn test_metrics(error_rate: f64) -> ClusterMetrics {
        ClusterMetrics {
            epoch: 1000,
            units: vec![UnitMetrics {
                pod: "api-0".to_string(),
                cpu_percent: 40.0,
                memory_percent: 40.0,
                latency_ms: 80.0,
                error_rate,
                requests_per_sec: 100.0,
            }],
        }
    }

    fn test_proposal() -> Proposal {
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

    /// Shared fake cluster: topology mutated by apply/restore, metrics fixed.
    struct FakeCluster {
        topology: Mutex<Topology>,
        metrics: Mutex<ClusterMetrics>,
        fail_apply: AtomicBool,
        fail_restore: AtomicBool,
        restore_short: AtomicBool,
    }

    impl FakeCluster {
        fn new(topology: Topology, metrics: ClusterMetrics) -> Arc<Self> {
            Arc::new(Self {
                topology: Mutex::new(topology),
                metrics: Mutex::new(metrics),
                fail_apply: AtomicBool::new(false),
                fail_restore: AtomicBool::new(false),
                restore_short: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl TopologyProvider for FakeCluster {
        async fn current_topology(&self) -> ProviderResult<Topology> {
            Ok(self.topology.lock().unwrap().clone())
        }
    }

    #[async_trait]
    impl MetricsProvider for FakeCluster {
        async fn fetch_current(&self) -> ProviderResult<ClusterMetrics> {
            Ok(self.metrics.lock().unwrap().clone())
        }
    }

    #[async_trait]
    impl TopologyMutator for FakeCluster {
        async fn apply_proposal(&self, _proposal: &Proposal) -> ProviderResult<ApplyReport> {
            if self.fail_apply.load(Ordering::SeqCst) {
                return Err(ProviderError::Mutation("mutator exploded".to_string()));
            }
            let mut topology = self.topology.lock().unwrap();
            topology.pods.pop();
            Ok(ApplyReport {
                changed_units: 1,
                detail: "removed one pod".to_string(),
            })
        }

        async fn restore_topology(&self, snapshot: &Snapshot) -> ProviderResult<RestoreReport> {
            if self.fail_restore.load(Ordering::SeqCst) {
                return Err(ProviderError::Mutation("restore exploded".to_string()));
            }
            let mut topology = self.topology.lock().unwrap();
            *topology = snapshot.topology.clone();
            if self.restore_short.load(Ordering::SeqCst) {
                topology.pods.pop();
            }
            Ok(RestoreReport {
                pod_count: topology.pod_count(),
                service_count: topology.service_count(),
            })
        }
    }

    fn executor_for(cluster: &Arc<FakeCluster>) -> Executor {
        Executor::new(
            cluster.clone(),
            cluster.clone(),
            cluster.clone(),
            Duration::ZERO,
        )
    }

    #[test]
    fn snapshot_is_a_deep_copy() {
        let topology = test_topology(3);
        let metrics = test_metrics(0.5);
        let decision_id = Uuid::new_v4();

        let snapshot = Executor::capture_snapshot(decision_id, &topology, &metrics);
        assert_eq!(snapshot.decision_id, decision_id);
        assert_eq!(snapshot.topology, topology);
        assert_eq!(snapshot.metrics, metrics);
    }

    #[tokio::test]
    async fn healthy_change_executes() {
        let cluster = FakeCluster::new(test_topology(3), test_metrics(0.5));
        let executor = executor_for(&cluster);

        let snapshot =
            Executor::capture_snapshot(Uuid::new_v4(), &test_topology(3), &test_metrics(0.5));
        let result = executor.apply_and_verify(&snapshot, &test_proposal()).await;

        assert!(matches!(result, ChangeResult::Executed { .. }));
        // Change kept: pod removed by the fake mutator.
        assert_eq!(cluster.topology.lock().unwrap().pod_count(), 2);
    }

    #[tokio::test]
    async fn apply_failure_rolls_back_to_snapshot() {
        let cluster = FakeCluster::new(test_topology(3), test_metrics(0.5));
        cluster.fail_apply.store(true, Ordering::SeqCst);
        let executor = executor_for(&cluster);

        let snapshot =
            Executor::capture_snapshot(Uuid::new_v4(), &test_topology(3), &test_metrics(0.5));
        let result = executor.apply_and_verify(&snapshot, &test_proposal()).await;

        match result {
            ChangeResult::RolledBack { reason } => assert!(reason.contains("apply failed")),
            other => panic!("expected rollback, got {other:?}"),
        }
        // Topology matches the snapshot's counts.
        let topology = cluster.topology.lock().unwrap();
        assert_eq!(topology.pod_count(), snapshot.topology.pod_count());
        assert_eq!(topology.service_count(), snapshot.topology.service_count());
    }

    #[tokio::test]
    async fn bad_post_change_error_rate_rolls_back() {
        let cluster = FakeCluster::new(test_topology(3), test_metrics(6.0));
        let executor = executor_for(&cluster);

        let snapshot =
            Executor::capture_snapshot(Uuid::new_v4(), &test_topology(3), &test_metrics(0.5));
        let result = executor.apply_and_verify(&snapshot, &test_proposal()).await;

        match result {
            ChangeResult::RolledBack { reason } => {
                assert!(reason.contains("error rate"));
            }
            other => panic!("expected rollback, got {other:?}"),
        }
        assert_eq!(cluster.topology.lock().unwrap().pod_count(), 3);
    }

    #[tokio::test]
    async fn failed_restore_is_critical_not_retried() {
        let cluster = FakeCluster::new(test_topology(3), test_metrics(6.0));
        cluster.fail_restore.store(true, Ordering::SeqCst);
        let executor = executor_for(&cluster);

        let snapshot =
            Executor::capture_snapshot(Uuid::new_v4(), &test_topology(3), &test_metrics(0.5));
        let result = executor.apply_and_verify(&snapshot, &test_proposal()).await;

        match result {
            ChangeResult::RollbackFailed { reason } => {
                assert!(reason.contains("restore failed"));
            }
            other => panic!("expected rollback failure, got {other:?}"),
        }
        // The broken topology is left as-is for the operator.
        assert_eq!(cluster.topology.lock().unwrap().pod_count(), 2);
    }

    fn recording_hook(seen: &Arc<Mutex<Vec<CyclePhase>>>) -> PhaseHook {
        let seen = seen.clone();
        Box::new(move |phase| seen.lock().unwrap().push(phase))
    }

    #[tokio::test]
    async fn verifying_is_reported_only_after_a_successful_apply() {
        let cluster = FakeCluster::new(test_topology(3), test_metrics(0.5));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let executor = executor_for(&cluster).with_phase_hook(recording_hook(&seen));

        let snapshot =
            Executor::capture_snapshot(Uuid::new_v4(), &test_topology(3), &test_metrics(0.5));
        let result = executor.apply_and_verify(&snapshot, &test_proposal()).await;

        assert!(matches!(result, ChangeResult::Executed { .. }));
        assert_eq!(*seen.lock().unwrap(), vec![CyclePhase::Verifying]);
    }

    #[tokio::test]
    async fn failed_apply_reports_rolling_back_without_verifying() {
        let cluster = FakeCluster::new(test_topology(3), test_metrics(0.5));
        cluster.fail_apply.store(true, Ordering::SeqCst);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let executor = executor_for(&cluster).with_phase_hook(recording_hook(&seen));

        let snapshot =
            Executor::capture_snapshot(Uuid::new_v4(), &test_topology(3), &test_metrics(0.5));
        executor.apply_and_verify(&snapshot, &test_proposal()).await;

        assert_eq!(*seen.lock().unwrap(), vec![CyclePhase::RollingBack]);
    }

    #[tokio::test]
    async fn failed_verification_reports_verifying_then_rolling_back() {
        let cluster = FakeCluster::new(test_topology(3), test_metrics(6.0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let executor = executor_for(&cluster).with_phase_hook(recording_hook(&seen));

        let snapshot =
            Executor::capture_snapshot(Uuid::new_v4(), &test_topology(3), &test_metrics(0.5));
        executor.apply_and_verify(&snapshot, &test_proposal()).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![CyclePhase::Verifying, CyclePhase::RollingBack]
        );
    }

    #[tokio::test]
    async fn unconfirmed_restore_is_critical() {
        let cluster = FakeCluster::new(test_topology(3), test_metrics(6.0));
        // Restore comes back one pod short of the snapshot.
        cluster.restore_short.store(true, Ordering::SeqCst);
        let executor = executor_for(&cluster);

        let snapshot =
            Executor::capture_snapshot(Uuid::new_v4(), &test_topology(3), &test_metrics(0.5));
        let result = executor.apply_and_verify(&snapshot, &test_proposal()).await;

        match result {
            ChangeResult::RollbackFailed { reason } => {
                assert!(reason.contains("unconfirmed"));
            }
            other => panic!("expected unconfirmed rollback, got {other:?}"),
        }
    }
}
