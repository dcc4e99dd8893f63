//! Rollback manager — restores the pre-change snapshot after a failure.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info};

use steward_core::{Snapshot, TopologyMutator, TopologyProvider};

/// Errors during snapshot restoration. All variants are critical: the
/// loop never retries a failed rollback (a second automatic restore of
/// a broken system risks flapping it further), so these surface to the
/// operator via the error event.
#[derive(Debug, Error)]
pub enum RollbackError {
    #[error("restore failed: {0}")]
    Restore(String),

    #[error("could not re-observe topology after restore: {0}")]
    Fetch(String),

    #[error(
        "restoration unconfirmed: expected {expected_pods} pods / {expected_services} services, \
         observed {actual_pods} pods / {actual_services} services"
    )]
    Unconfirmed {
        expected_pods: usize,
        expected_services: usize,
        actual_pods: usize,
        actual_services: usize,
    },
}

/// Restores a pre-change snapshot and confirms the restoration took.
pub struct RollbackManager {
    mutator: Arc<dyn TopologyMutator>,
    topology: Arc<dyn TopologyProvider>,
    stabilization_delay: Duration,
}

impl RollbackManager {
    pub fn new(
        mutator: Arc<dyn TopologyMutator>,
        topology: Arc<dyn TopologyProvider>,
        stabilization_delay: Duration,
    ) -> Self {
        Self {
            mutator,
            topology,
            stabilization_delay,
        }
    }

    /// Restore the snapshot, wait for re-stabilization, and confirm the
    /// restored topology matches the snapshot's pod and service counts.
    pub async fn restore(&self, snapshot: &Snapshot) -> Result<(), RollbackError> {
        info!(
            decision_id = %snapshot.decision_id,
            pods = snapshot.topology.pod_count(),
            "restoring pre-change snapshot"
        );

        self.mutator
            .restore_topology(snapshot)
            .await
            .map_err(|e| RollbackError::Restore(e.to_string()))?;

        tokio::time::sleep(self.stabilization_delay).await;

        let restored = self
            .topology
            .current_topology()
            .await
            .map_err(|e| RollbackError::Fetch(e.to_string()))?;

        let expected_pods = snapshot.topology.pod_count();
        let expected_services = snapshot.topology.service_count();
        if restored.pod_count() != expected_pods
            || restored.service_count() != expected_services
        {
            error!(
                decision_id = %snapshot.decision_id,
                expected_pods,
                actual_pods = restored.pod_count(),
                "rollback restoration unconfirmed"
            );
            return Err(RollbackError::Unconfirmed {
                expected_pods,
                expected_services,
                actual_pods: restored.pod_count(),
                actual_services: restored.service_count(),
            });
        }

        info!(decision_id = %snapshot.decision_id, "rollback confirmed");
        Ok(())
    }
}
