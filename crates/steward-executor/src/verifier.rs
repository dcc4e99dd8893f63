//! Verifier — re-observes the system after a change settles.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use steward_core::{MetricsProvider, TopologyProvider};

/// Post-change error rate above which a change is judged a failure.
const POST_CHANGE_MAX_ERROR_RATE: f64 = 2.0;

/// Result of verifying an applied change.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    Passed,
    Failed { reason: String },
}

/// Re-fetches topology and metrics after the stabilization delay and
/// classifies the change as successful or failed.
pub struct Verifier {
    topology: Arc<dyn TopologyProvider>,
    metrics: Arc<dyn MetricsProvider>,
    stabilization_delay: Duration,
}

impl Verifier {
    pub fn new(
        topology: Arc<dyn TopologyProvider>,
        metrics: Arc<dyn MetricsProvider>,
        stabilization_delay: Duration,
    ) -> Self {
        Self {
            topology,
            metrics,
            stabilization_delay,
        }
    }

    /// Wait for stabilization, then judge the change.
    ///
    /// Success requires a valid (non-empty) topology and a post-change
    /// error rate at or below 2%. A fetch failure during verification
    /// counts as failure: if we cannot observe the system, we cannot
    /// keep the change.
    pub async fn verify(&self) -> VerifyOutcome {
        tokio::time::sleep(self.stabilization_delay).await;

        let topology = match self.topology.current_topology().await {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "topology fetch failed during verification");
                return VerifyOutcome::Failed {
                    reason: format!("topology fetch failed: {e}"),
                };
            }
        };
        if topology.is_empty() {
            return VerifyOutcome::Failed {
                reason: "post-change topology is empty".to_string(),
            };
        }

        let metrics = match self.metrics.fetch_current().await {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "metrics fetch failed during verification");
                return VerifyOutcome::Failed {
                    reason: format!("metrics fetch failed: {e}"),
                };
            }
        };

        let error_rate = metrics.avg_error_rate();
        if error_rate > POST_CHANGE_MAX_ERROR_RATE {
            return VerifyOutcome::Failed {
                reason: format!(
                    "post-change error rate {error_rate:.2}% exceeds {POST_CHANGE_MAX_ERROR_RATE:.0}%"
                ),
            };
        }

        debug!(error_rate, "change verified");
        VerifyOutcome::Passed
    }
}
