//! Controller — drives the analyze / propose / gate / execute cycle.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use steward_core::{
    BudgetProvider, BudgetStatus, ControlConfig, ControlEvent, Decision, DecisionOutcome,
    GateState, MetricsProvider, Proposal, TopologyMutator, TopologyProvider,
};
use steward_engine::gate::GateVerdict;
use steward_executor::{ChangeResult, CyclePhase, Executor};
use steward_ledger::{DecisionLedger, LedgerError, LedgerStats};

use crate::events::EventBus;

/// Controller construction and ledger errors.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// A required collaborator was not supplied to the builder.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Terminal outcome of one triggered cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The cycle ran to completion and recorded a decision.
    Completed(Decision),
    /// A cycle was already in flight; nothing happened.
    Skipped,
    /// Observations were insufficient to analyze; retried next interval.
    Deferred { reason: String },
    /// A collaborator failed before any mutation; no decision recorded.
    Aborted { reason: String },
}

/// Point-in-time controller status for inspection.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub running: bool,
    pub phase: CyclePhase,
    /// Label of the most recent decision, if any cycle has completed.
    pub last_outcome: Option<String>,
    /// Gate inputs observed during the most recent cycle.
    pub stability: Option<GateState>,
}

/// Builder collecting the controller's collaborators.
///
/// Construction fails fast: a controller with a missing collaborator is
/// unusable and must not silently no-op at cycle time.
#[derive(Default)]
pub struct ControllerBuilder {
    metrics: Option<Arc<dyn MetricsProvider>>,
    topology: Option<Arc<dyn TopologyProvider>>,
    mutator: Option<Arc<dyn TopologyMutator>>,
    budget: Option<Arc<dyn BudgetProvider>>,
    ledger: Option<DecisionLedger>,
    config: ControlConfig,
}

impl ControllerBuilder {
    pub fn metrics(mut self, provider: Arc<dyn MetricsProvider>) -> Self {
        self.metrics = Some(provider);
        self
    }

    pub fn topology(mut self, provider: Arc<dyn TopologyProvider>) -> Self {
        self.topology = Some(provider);
        self
    }

    pub fn mutator(mut self, mutator: Arc<dyn TopologyMutator>) -> Self {
        self.mutator = Some(mutator);
        self
    }

    pub fn budget(mut self, provider: Arc<dyn BudgetProvider>) -> Self {
        self.budget = Some(provider);
        self
    }

    pub fn ledger(mut self, ledger: DecisionLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn config(mut self, config: ControlConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Controller, ControllerError> {
        let metrics = self
            .metrics
            .ok_or(ControllerError::MissingCollaborator("metrics provider"))?;
        let topology = self
            .topology
            .ok_or(ControllerError::MissingCollaborator("topology provider"))?;
        let mutator = self
            .mutator
            .ok_or(ControllerError::MissingCollaborator("topology mutator"))?;
        let budget = self
            .budget
            .ok_or(ControllerError::MissingCollaborator("budget provider"))?;
        let ledger = self
            .ledger
            .ok_or(ControllerError::MissingCollaborator("decision ledger"))?;

        // The executor reports Verifying/RollingBack itself, so status
        // reflects the change actually in flight rather than intent.
        let phase = Arc::new(RwLock::new(CyclePhase::Idle));
        let hook_phase = phase.clone();
        let executor = Executor::new(
            topology.clone(),
            metrics.clone(),
            mutator.clone(),
            Duration::from_millis(self.config.stabilization_delay_ms),
        )
        .with_phase_hook(Box::new(move |p| {
            *hook_phase.write().unwrap() = p;
        }));

        Ok(Controller {
            metrics,
            topology,
            budget,
            ledger,
            executor,
            config: self.config,
            bus: EventBus::new(),
            cycle_guard: Mutex::new(()),
            running: AtomicBool::new(false),
            phase,
            last_decision: RwLock::new(None),
            stability: RwLock::new(None),
        })
    }
}

/// Handle to a started controller loop.
pub struct ControllerHandle {
    shutdown: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl ControllerHandle {
    /// Stop the interval timer and wait for the loop to exit. An
    /// in-flight cycle runs to completion first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// The control loop. One cycle at a time; every completed cycle appends
/// exactly one decision to the ledger.
pub struct Controller {
    metrics: Arc<dyn MetricsProvider>,
    topology: Arc<dyn TopologyProvider>,
    budget: Arc<dyn BudgetProvider>,
    ledger: DecisionLedger,
    executor: Executor,
    config: ControlConfig,
    bus: EventBus,
    /// Held for the duration of a cycle; `try_lock` failure means skip.
    cycle_guard: Mutex<()>,
    running: AtomicBool,
    /// Shared with the executor's phase hook.
    phase: Arc<RwLock<CyclePhase>>,
    last_decision: RwLock<Option<Decision>>,
    stability: RwLock<Option<GateState>>,
}

impl Controller {
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::default()
    }

    /// Subscribe to cycle notifications.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ControlEvent> {
        self.bus.subscribe()
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            running: self.running.load(AtomicOrdering::SeqCst),
            phase: *self.phase.read().unwrap(),
            last_outcome: self
                .last_decision
                .read()
                .unwrap()
                .as_ref()
                .map(|d| d.outcome.label().to_string()),
            stability: self.stability.read().unwrap().clone(),
        }
    }

    /// Most recent decisions, oldest first.
    pub fn decision_history(&self, limit: usize) -> Result<Vec<Decision>, ControllerError> {
        Ok(self.ledger.decisions(limit)?)
    }

    pub fn statistics(&self) -> Result<LedgerStats, ControllerError> {
        Ok(self.ledger.statistics()?)
    }

    /// Spawn the interval loop on the runtime; stop it via the handle.
    pub fn start(self: &Arc<Self>) -> ControllerHandle {
        let (shutdown, rx) = watch::channel(false);
        let controller = self.clone();
        let task = tokio::spawn(async move {
            controller.run(rx).await;
        });
        ControllerHandle { shutdown, task }
    }

    /// Run cycles on the configured interval until `shutdown` fires.
    ///
    /// Shutdown stops the timer only: a cycle already in flight runs to
    /// completion, so the ledger never records a half-finished cycle.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.config.cycle_interval_secs);
        self.running.store(true, AtomicOrdering::SeqCst);
        info!(interval_secs = interval.as_secs(), "controller started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let outcome = self.trigger_cycle().await;
                    debug!(?outcome, "scheduled cycle finished");
                }
                _ = shutdown.changed() => {
                    info!("controller shutting down");
                    break;
                }
            }
        }

        self.running.store(false, AtomicOrdering::SeqCst);
    }

    /// Run one cycle now. Returns `Skipped` when a cycle is already in
    /// flight; concurrent triggers never interleave.
    pub async fn trigger_cycle(&self) -> CycleOutcome {
        let guard = self.cycle_guard.try_lock();
        let _guard = match guard {
            Ok(g) => g,
            Err(_) => {
                debug!("cycle already in flight, skipping trigger");
                return CycleOutcome::Skipped;
            }
        };

        let outcome = self.run_cycle().await;
        self.set_phase(CyclePhase::Idle);
        if let CycleOutcome::Completed(decision) = &outcome {
            *self.last_decision.write().unwrap() = Some(decision.clone());
        }
        outcome
    }

    async fn run_cycle(&self) -> CycleOutcome {
        self.set_phase(CyclePhase::Analyzing);

        let (metrics, topology) = match tokio::join!(
            self.metrics.fetch_current(),
            self.topology.current_topology(),
        ) {
            (Ok(metrics), Ok(topology)) => (metrics, topology),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "observation failed, aborting cycle");
                self.bus.publish(ControlEvent::Error {
                    message: format!("observation failed: {e}"),
                });
                return CycleOutcome::Aborted {
                    reason: e.to_string(),
                };
            }
        };

        let history = match self.ledger.decisions(self.config.history_window) {
            Ok(history) => history,
            Err(e) => {
                error!(error = %e, "ledger read failed, aborting cycle");
                self.bus.publish(ControlEvent::Error {
                    message: format!("ledger read failed: {e}"),
                });
                return CycleOutcome::Aborted {
                    reason: e.to_string(),
                };
            }
        };

        let profile = match steward_analyzer::profile::analyze(&metrics, &topology, &history) {
            Ok(profile) => profile,
            Err(e) => {
                debug!(reason = %e, "cycle deferred");
                return CycleOutcome::Deferred {
                    reason: e.to_string(),
                };
            }
        };
        self.bus.publish(ControlEvent::Analysis {
            profile: profile.clone(),
        });

        let opportunities = steward_analyzer::detector::detect(&profile);
        for opportunity in &opportunities {
            self.bus.publish(ControlEvent::OpportunityFound {
                opportunity: opportunity.clone(),
            });
        }

        let budget_allowed = match self.budget.status().await {
            Ok(BudgetStatus::Ok) => true,
            Ok(BudgetStatus::Warning) => {
                warn!("budget near its limit");
                true
            }
            Ok(BudgetStatus::Critical) => {
                warn!("budget exhausted, cost-bearing proposals constrained");
                false
            }
            Err(e) => {
                warn!(error = %e, "budget status unavailable, assuming constrained");
                false
            }
        };

        self.set_phase(CyclePhase::Proposing);
        let proposals = steward_engine::proposals::generate(
            &opportunities,
            &profile,
            budget_allowed,
            self.config.confidence_threshold,
        );

        let decision_id = Uuid::new_v4();
        let Some(proposal) = pick_top(proposals) else {
            debug!("no actionable proposal this cycle");
            let decision = Decision::no_action(decision_id, epoch_secs());
            return self.record(decision);
        };

        self.set_phase(CyclePhase::Gating);
        let state = GateState::observe(&metrics, &topology);
        *self.stability.write().unwrap() = Some(state.clone());
        let verdict = steward_engine::gate::validate(&proposal, &state, &self.config.thresholds);

        let decision = match verdict {
            GateVerdict::Blocked { reasons } => {
                self.bus.publish(ControlEvent::OptimizationBlocked {
                    decision_id,
                    reasons: reasons.clone(),
                });
                Decision {
                    id: decision_id,
                    timestamp: epoch_secs(),
                    proposal: Some(proposal),
                    executed: false,
                    snapshot_id: None,
                    outcome: DecisionOutcome::Blocked { reasons },
                    rolled_back: false,
                }
            }
            GateVerdict::Deferred { reasons } => {
                self.bus.publish(ControlEvent::OptimizationBlocked {
                    decision_id,
                    reasons: reasons.clone(),
                });
                Decision {
                    id: decision_id,
                    timestamp: epoch_secs(),
                    proposal: Some(proposal),
                    executed: false,
                    snapshot_id: None,
                    outcome: DecisionOutcome::Deferred { reasons },
                    rolled_back: false,
                }
            }
            GateVerdict::Approved => self.execute(decision_id, proposal, &metrics, &topology).await,
        };

        self.record(decision)
    }

    /// Snapshot, apply, verify, and map the result onto a decision.
    /// The snapshot is persisted before any mutation reaches the system.
    async fn execute(
        &self,
        decision_id: Uuid,
        proposal: Proposal,
        metrics: &steward_core::ClusterMetrics,
        topology: &steward_core::Topology,
    ) -> Decision {
        self.set_phase(CyclePhase::Executing);

        let snapshot = Executor::capture_snapshot(decision_id, topology, metrics);
        let snapshot_id = snapshot.id;
        if let Err(e) = self.ledger.put_snapshot(&snapshot) {
            error!(error = %e, "snapshot persist failed, refusing to execute");
            self.bus.publish(ControlEvent::Error {
                message: format!("snapshot persist failed: {e}"),
            });
            return Decision {
                id: decision_id,
                timestamp: epoch_secs(),
                proposal: Some(proposal),
                executed: false,
                snapshot_id: None,
                outcome: DecisionOutcome::Deferred {
                    reasons: vec![format!("snapshot persist failed: {e}")],
                },
                rolled_back: false,
            };
        }

        let result = self.executor.apply_and_verify(&snapshot, &proposal).await;

        let (outcome, rolled_back) = match result {
            ChangeResult::Executed { report } => {
                info!(
                    %decision_id,
                    changed_units = report.changed_units,
                    detail = %report.detail,
                    "optimization applied"
                );
                self.bus.publish(ControlEvent::OptimizationApplied {
                    decision_id,
                    proposal: proposal.clone(),
                });
                (DecisionOutcome::Executed, false)
            }
            ChangeResult::RolledBack { reason } => {
                warn!(%decision_id, %reason, "change rolled back");
                self.bus
                    .publish(ControlEvent::RollbackCompleted { decision_id });
                (DecisionOutcome::RolledBack { reason }, true)
            }
            ChangeResult::RollbackFailed { reason } => {
                error!(%decision_id, %reason, "rollback failed, operator attention required");
                self.bus.publish(ControlEvent::Error {
                    message: format!("rollback failed for decision {decision_id}: {reason}"),
                });
                (DecisionOutcome::Failed { reason }, false)
            }
        };

        Decision {
            id: decision_id,
            timestamp: epoch_secs(),
            proposal: Some(proposal),
            executed: true,
            snapshot_id: Some(snapshot_id),
            outcome,
            rolled_back,
        }
    }

    /// Append the cycle's decision. An append failure after an executed
    /// change is reported but does not undo the change.
    fn record(&self, decision: Decision) -> CycleOutcome {
        if let Err(e) = self.ledger.append(&decision) {
            error!(error = %e, decision_id = %decision.id, "decision append failed");
            self.bus.publish(ControlEvent::Error {
                message: format!("decision append failed: {e}"),
            });
        }
        debug!(
            decision_id = %decision.id,
            outcome = decision.outcome.label(),
            "cycle recorded"
        );
        CycleOutcome::Completed(decision)
    }

    fn set_phase(&self, phase: CyclePhase) {
        *self.phase.write().unwrap() = phase;
    }
}

/// Highest-priority proposal, confidence breaking ties. Priority 1 is
/// the most urgent.
fn pick_top(mut proposals: Vec<Proposal>) -> Option<Proposal> {
    if proposals.is_empty() {
        return None;
    }
    proposals.sort_by(|a, b| {
        a.priority.cmp(&b.priority).then(
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal),
        )
    });
    Some(proposals.remove(0))
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
    use steward_core::ProposalKind;

    fn proposal(kind: ProposalKind, priority: u8, confidence: f64) -> Proposal {
        Proposal {
            kind,
            target: "cluster".to_string(),
            action: String::new(),
            estimated_cost: None,
            estimated_savings: None,
            confidence,
            priority,
            resource_delta_percent: 0.0,
            availability_gain_percent: 0.0,
            availability_risk_percent: 0.0,
            performance_impact_percent: 0.0,
            latency_impact_ms: 0.0,
        }
    }

    #[test]
    fn pick_top_prefers_low_priority_number() {
        let picked = pick_top(vec![
            proposal(ProposalKind::Optimize, 4, 0.9),
            proposal(ProposalKind::RateLimit, 1, 0.7),
            proposal(ProposalKind::ScaleDown, 2, 0.8),
        ])
        .unwrap();
        assert_eq!(picked.kind, ProposalKind::RateLimit);
    }

    #[test]
    fn pick_top_breaks_priority_ties_by_confidence() {
        let picked = pick_top(vec![
            proposal(ProposalKind::Heal, 1, 0.72),
            proposal(ProposalKind::RateLimit, 1, 0.95),
        ])
        .unwrap();
        assert_eq!(picked.kind, ProposalKind::RateLimit);
    }

    #[test]
    fn pick_top_of_nothing_is_none() {
        assert_eq!(pick_top(Vec::new()), None);
    }
}
