//! Simulated cluster — an in-process stand-in for the real collaborators.
//!
//! Demand is a fixed pool of CPU work spread across however many pods
//! exist, so scaling decisions visibly move per-pod utilization and the
//! loop's feedback is observable end to end without external systems.

use std::sync::Mutex;

use async_trait::async_trait;

use steward_core::{
    ApplyReport, BudgetProvider, BudgetStatus, ClusterMetrics, MetricsProvider, PodInfo, Proposal,
    ProposalKind, ProviderError, ProviderResult, RestoreReport, ServiceInfo, Snapshot, Topology,
    TopologyMutator, TopologyProvider, UnitMetrics,
};

/// Rough monthly cost of one replica, mirrored by the budget check.
const REPLICA_MONTHLY_COST: f64 = 35.0;

struct SimState {
    topology: Topology,
    /// Total CPU demand (percent-units) shared across all pods.
    demand: f64,
    monthly_budget: f64,
}

/// One fake cluster implementing every collaborator trait.
pub struct SimCluster {
    state: Mutex<SimState>,
}

impl SimCluster {
    /// Six over-provisioned pods across three nodes, one critical service.
    pub fn over_provisioned() -> Self {
        let nodes: Vec<String> = (0..3).map(|i| format!("node-{i}")).collect();
        let pods = (0..6)
            .map(|i| PodInfo {
                id: format!("api-{i}"),
                service: "api".to_string(),
                node: nodes[i % 3].clone(),
            })
            .collect();
        let services = vec![
            ServiceInfo {
                name: "api".to_string(),
                critical: false,
                replicas: 6,
                max_replicas: 12,
                depends_on: vec!["billing".to_string()],
            },
            ServiceInfo {
                name: "billing".to_string(),
                critical: true,
                replicas: 0,
                max_replicas: 1,
                depends_on: vec![],
            },
        ];
        Self {
            state: Mutex::new(SimState {
                topology: Topology {
                    pods,
                    services,
                    nodes,
                },
                // ~20% per pod at six pods.
                demand: 120.0,
                monthly_budget: 500.0,
            }),
        }
    }

    fn per_pod_cpu(state: &SimState) -> f64 {
        let pods = state.topology.pods.len().max(1) as f64;
        (state.demand / pods).clamp(1.0, 100.0)
    }

    fn monthly_spend(state: &SimState) -> f64 {
        state.topology.pods.len() as f64 * REPLICA_MONTHLY_COST
    }

    fn set_replica_count(state: &mut SimState, target: usize) {
        let nodes = state.topology.nodes.clone();
        let pods = &mut state.topology.pods;
        while pods.len() > target {
            pods.pop();
        }
        let mut next = pods.len();
        while pods.len() < target {
            pods.push(PodInfo {
                id: format!("api-{next}"),
                service: "api".to_string(),
                node: nodes[next % nodes.len()].clone(),
            });
            next += 1;
        }
        if let Some(service) = state
            .topology
            .services
            .iter_mut()
            .find(|s| s.name == "api")
        {
            service.replicas = target as u32;
        }
    }
}

#[async_trait]
impl MetricsProvider for SimCluster {
    async fn fetch_current(&self) -> ProviderResult<ClusterMetrics> {
        let state = self.state.lock().unwrap();
        let cpu = Self::per_pod_cpu(&state);
        let error_rate = if cpu > 90.0 { 4.0 } else { 0.3 };
        let units = state
            .topology
            .pods
            .iter()
            .map(|pod| UnitMetrics {
                pod: pod.id.clone(),
                cpu_percent: cpu,
                memory_percent: cpu * 0.8,
                latency_ms: 40.0 + cpu,
                error_rate,
                requests_per_sec: state.demand,
            })
            .collect();
        Ok(ClusterMetrics {
            epoch: epoch_secs(),
            units,
        })
    }
}

#[async_trait]
impl TopologyProvider for SimCluster {
    async fn current_topology(&self) -> ProviderResult<Topology> {
        Ok(self.state.lock().unwrap().topology.clone())
    }
}

#[async_trait]
impl TopologyMutator for SimCluster {
    async fn apply_proposal(&self, proposal: &Proposal) -> ProviderResult<ApplyReport> {
        let mut state = self.state.lock().unwrap();
        let current = state.topology.pods.len();
        match proposal.kind {
            ProposalKind::ScaleDown | ProposalKind::ScaleUp | ProposalKind::Optimize => {
                let target = (current as f64
                    * (1.0 + proposal.resource_delta_percent / 100.0))
                    .round()
                    .max(1.0) as usize;
                if target == current {
                    return Err(ProviderError::Mutation(
                        "scaling proposal with no replica change".to_string(),
                    ));
                }
                Self::set_replica_count(&mut state, target);
                Ok(ApplyReport {
                    changed_units: current.abs_diff(target) as u32,
                    detail: format!("replicas {current} -> {target}"),
                })
            }
            ProposalKind::Rebalance => {
                let first = state.topology.nodes[0].clone();
                let mut moved = 0u32;
                for pod in &mut state.topology.pods {
                    if pod.node != first {
                        pod.node = first.clone();
                        moved += 1;
                    }
                }
                Ok(ApplyReport {
                    changed_units: moved,
                    detail: format!("co-located {moved} pods on {first}"),
                })
            }
            ProposalKind::RateLimit | ProposalKind::Heal => {
                state.demand *= 0.9;
                Ok(ApplyReport {
                    changed_units: 0,
                    detail: "shed 10% of demand".to_string(),
                })
            }
        }
    }

    async fn restore_topology(&self, snapshot: &Snapshot) -> ProviderResult<RestoreReport> {
        let mut state = self.state.lock().unwrap();
        state.topology = snapshot.topology.clone();
        Ok(RestoreReport {
            pod_count: state.topology.pod_count(),
            service_count: state.topology.service_count(),
        })
    }
}

#[async_trait]
impl BudgetProvider for SimCluster {
    async fn status(&self) -> ProviderResult<BudgetStatus> {
        let state = self.state.lock().unwrap();
        let spend = Self::monthly_spend(&state);
        let status = if spend < state.monthly_budget * 0.8 {
            BudgetStatus::Ok
        } else if spend < state.monthly_budget {
            BudgetStatus::Warning
        } else {
            BudgetStatus::Critical
        };
        Ok(status)
    }

    async fn can_afford(&self, cost: f64) -> ProviderResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(Self::monthly_spend(&state) + cost <= state.monthly_budget)
    }
}

fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
