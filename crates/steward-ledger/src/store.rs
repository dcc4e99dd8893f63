//! DecisionLedger — redb-backed, bounded audit trail.
//!
//! Appends `Decision` records under monotonically increasing sequence
//! keys and evicts the oldest entries once the configured capacity is
//! exceeded. The same discipline bounds the snapshot table. Supports
//! both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata};
use tracing::debug;
use uuid::Uuid;

use steward_core::{Decision, DecisionOutcome, Snapshot};

use crate::error::{LedgerError, LedgerResult};
use crate::tables::{DECISIONS, SNAPSHOTS, seq_key};

/// Convert any `Display` error into a `LedgerError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| LedgerError::$variant(e.to_string())
    };
}

/// Derived statistics over the retained decision history.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerStats {
    pub total: usize,
    pub executed: usize,
    pub blocked: usize,
    pub deferred: usize,
    pub rolled_back: usize,
    pub failed: usize,
    pub no_action: usize,
    /// Share of mutation attempts that ended in a rollback (0–1).
    pub rollback_rate: f64,
    /// Sum of estimated savings across successfully executed decisions.
    pub cumulative_savings: f64,
}

/// Thread-safe decision ledger backed by redb.
#[derive(Clone)]
pub struct DecisionLedger {
    db: Arc<Database>,
    /// Maximum retained decisions (FIFO eviction beyond this).
    capacity: usize,
    /// Maximum retained snapshots.
    snapshot_capacity: usize,
    next_decision_seq: Arc<AtomicU64>,
    next_snapshot_seq: Arc<AtomicU64>,
}

impl DecisionLedger {
    /// Open (or create) a persistent ledger at the given path.
    pub fn open(path: &Path, capacity: usize, snapshot_capacity: usize) -> LedgerResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let ledger = Self::init(Arc::new(db), capacity, snapshot_capacity)?;
        debug!(?path, capacity, "decision ledger opened");
        Ok(ledger)
    }

    /// Create an ephemeral in-memory ledger (for testing).
    pub fn open_in_memory(capacity: usize, snapshot_capacity: usize) -> LedgerResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let ledger = Self::init(Arc::new(db), capacity, snapshot_capacity)?;
        debug!("in-memory decision ledger opened");
        Ok(ledger)
    }

    fn init(db: Arc<Database>, capacity: usize, snapshot_capacity: usize) -> LedgerResult<Self> {
        // Opening a table in a write transaction creates it if absent.
        let txn = db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(DECISIONS).map_err(map_err!(Table))?;
        txn.open_table(SNAPSHOTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;

        let ledger = Self {
            db,
            capacity: capacity.max(1),
            snapshot_capacity: snapshot_capacity.max(1),
            next_decision_seq: Arc::new(AtomicU64::new(0)),
            next_snapshot_seq: Arc::new(AtomicU64::new(0)),
        };
        ledger
            .next_decision_seq
            .store(ledger.last_seq(DECISIONS)?.map_or(0, |s| s + 1), Ordering::SeqCst);
        ledger
            .next_snapshot_seq
            .store(ledger.last_seq(SNAPSHOTS)?.map_or(0, |s| s + 1), Ordering::SeqCst);
        Ok(ledger)
    }

    /// Highest sequence number present in a table, if any.
    fn last_seq(&self, table: redb::TableDefinition<&str, &[u8]>) -> LedgerResult<Option<u64>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.iter().map_err(map_err!(Read))?.next_back() {
            Some(entry) => {
                let (key, _) = entry.map_err(map_err!(Read))?;
                Ok(key.value().parse::<u64>().ok())
            }
            None => Ok(None),
        }
    }

    // ── Decisions ──────────────────────────────────────────────────

    /// Append a decision. Returns its sequence number.
    ///
    /// Evicts the oldest entries if the ledger would exceed its capacity.
    /// Appends happen in cycle-start order since cycles are serialized.
    pub fn append(&self, decision: &Decision) -> LedgerResult<u64> {
        let seq = self.next_decision_seq.fetch_add(1, Ordering::SeqCst);
        let key = seq_key(seq);
        let value = serde_json::to_vec(decision).map_err(map_err!(Serialize))?;

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(DECISIONS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            evict_oldest(&mut table, self.capacity)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, outcome = decision.outcome.label(), "decision appended");
        Ok(seq)
    }

    /// The most recent `limit` decisions, oldest first.
    pub fn decisions(&self, limit: usize) -> LedgerResult<Vec<Decision>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DECISIONS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))?.rev().take(limit) {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let decision: Decision =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(decision);
        }
        results.reverse();
        Ok(results)
    }

    /// Number of retained decisions.
    pub fn len(&self) -> LedgerResult<usize> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DECISIONS).map_err(map_err!(Table))?;
        Ok(table.len().map_err(map_err!(Read))? as usize)
    }

    pub fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Tally outcomes across the retained history.
    pub fn statistics(&self) -> LedgerResult<LedgerStats> {
        let mut stats = LedgerStats {
            total: 0,
            executed: 0,
            blocked: 0,
            deferred: 0,
            rolled_back: 0,
            failed: 0,
            no_action: 0,
            rollback_rate: 0.0,
            cumulative_savings: 0.0,
        };

        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DECISIONS).map_err(map_err!(Table))?;
        let mut attempts = 0usize;
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let decision: Decision =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            stats.total += 1;
            if decision.executed {
                attempts += 1;
            }
            match &decision.outcome {
                DecisionOutcome::Executed => {
                    stats.executed += 1;
                    if let Some(savings) =
                        decision.proposal.as_ref().and_then(|p| p.estimated_savings)
                    {
                        stats.cumulative_savings += savings;
                    }
                }
                DecisionOutcome::Blocked { .. } => stats.blocked += 1,
                DecisionOutcome::Deferred { .. } => stats.deferred += 1,
                DecisionOutcome::RolledBack { .. } => stats.rolled_back += 1,
                DecisionOutcome::Failed { .. } => stats.failed += 1,
                DecisionOutcome::NoAction => stats.no_action += 1,
            }
        }

        if attempts > 0 {
            stats.rollback_rate = stats.rolled_back as f64 / attempts as f64;
        }
        Ok(stats)
    }

    // ── Snapshots ──────────────────────────────────────────────────

    /// Store a pre-change snapshot, evicting the oldest beyond capacity.
    pub fn put_snapshot(&self, snapshot: &Snapshot) -> LedgerResult<()> {
        let seq = self.next_snapshot_seq.fetch_add(1, Ordering::SeqCst);
        let key = seq_key(seq);
        let value = serde_json::to_vec(snapshot).map_err(map_err!(Serialize))?;

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SNAPSHOTS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            evict_oldest(&mut table, self.snapshot_capacity)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(snapshot_id = %snapshot.id, decision_id = %snapshot.decision_id, "snapshot stored");
        Ok(())
    }

    /// Look up the snapshot captured for a decision, if still retained.
    pub fn snapshot_for_decision(&self, decision_id: Uuid) -> LedgerResult<Option<Snapshot>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SNAPSHOTS).map_err(map_err!(Table))?;
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let snapshot: Snapshot =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if snapshot.decision_id == decision_id {
                return Ok(Some(snapshot));
            }
        }
        Ok(None)
    }
}

/// Remove smallest-keyed entries until the table holds at most `capacity`.
fn evict_oldest(
    table: &mut redb::Table<'_, &str, &[u8]>,
    capacity: usize,
) -> LedgerResult<()> {
    loop {
        let len = table.len().map_err(map_err!(Read))? as usize;
        if len <= capacity {
            return Ok(());
        }
        let oldest = {
            let mut iter = table.iter().map_err(map_err!(Read))?;
            match iter.next() {
                Some(entry) => {
                    let (key, _) = entry.map_err(map_err!(Read))?;
                    key.value().to_string()
                }
                None => return Ok(()),
            }
        };
        table.remove(oldest.as_str()).map_err(map_err!(Write))?;
        debug!(key = %oldest, "evicted oldest ledger entry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_core::{ClusterMetrics, Proposal, ProposalKind, Topology};

    fn decision_with_outcome(outcome: DecisionOutcome, executed: bool) -> Decision {
        Decision {
            id: Uuid::new_v4(),
            timestamp: 1000,
            proposal: None,
            executed,
            snapshot_id: None,
            outcome,
            rolled_back: false,
        }
    }

    fn executed_decision(savings: f64) -> Decision {
        Decision {
            id: Uuid::new_v4(),
            timestamp: 1000,
            proposal: Some(Proposal {
                kind: ProposalKind::ScaleDown,
                target: "api".to_string(),
                action: "scale down".to_string(),
                estimated_cost: None,
                estimated_savings: Some(savings),
                confidence: 0.9,
                priority: 2,
                resource_delta_percent: -30.0,
                availability_gain_percent: 0.0,
                availability_risk_percent: 1.0,
                performance_impact_percent: 2.0,
                latency_impact_ms: 5.0,
            }),
            executed: true,
            snapshot_id: Some(Uuid::new_v4()),
            outcome: DecisionOutcome::Executed,
            rolled_back: false,
        }
    }

    fn test_snapshot(decision_id: Uuid) -> Snapshot {
        Snapshot {
            id: Uuid::new_v4(),
            decision_id,
            timestamp: 1000,
            topology: Topology {
                pods: vec![],
                services: vec![],
                nodes: vec![],
            },
            metrics: ClusterMetrics {
                epoch: 1000,
                units: vec![],
            },
        }
    }

    #[test]
    fn append_and_read_back() {
        let ledger = DecisionLedger::open_in_memory(10, 4).unwrap();
        let decision = executed_decision(100.0);
        ledger.append(&decision).unwrap();

        let decisions = ledger.decisions(10).unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0], decision);
    }

    #[test]
    fn eviction_is_strictly_fifo() {
        let ledger = DecisionLedger::open_in_memory(3, 4).unwrap();
        let mut ids = Vec::new();
        for _ in 0..5 {
            let d = decision_with_outcome(DecisionOutcome::NoAction, false);
            ids.push(d.id);
            ledger.append(&d).unwrap();
        }

        assert_eq!(ledger.len().unwrap(), 3);
        let retained: Vec<Uuid> = ledger
            .decisions(10)
            .unwrap()
            .iter()
            .map(|d| d.id)
            .collect();
        // The two oldest were evicted; order of the rest is preserved.
        assert_eq!(retained, ids[2..].to_vec());
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let ledger = DecisionLedger::open_in_memory(5, 4).unwrap();
        for _ in 0..20 {
            ledger
                .append(&decision_with_outcome(DecisionOutcome::NoAction, false))
                .unwrap();
            assert!(ledger.len().unwrap() <= 5);
        }
    }

    #[test]
    fn decisions_limit_returns_most_recent_oldest_first() {
        let ledger = DecisionLedger::open_in_memory(10, 4).unwrap();
        let mut ids = Vec::new();
        for _ in 0..6 {
            let d = decision_with_outcome(DecisionOutcome::NoAction, false);
            ids.push(d.id);
            ledger.append(&d).unwrap();
        }

        let recent: Vec<Uuid> = ledger.decisions(2).unwrap().iter().map(|d| d.id).collect();
        assert_eq!(recent, ids[4..].to_vec());
    }

    #[test]
    fn statistics_tally_outcomes() {
        let ledger = DecisionLedger::open_in_memory(100, 4).unwrap();
        ledger.append(&executed_decision(50.0)).unwrap();
        ledger.append(&executed_decision(25.0)).unwrap();
        ledger
            .append(&decision_with_outcome(
                DecisionOutcome::Blocked {
                    reasons: vec!["availability".to_string()],
                },
                false,
            ))
            .unwrap();
        let mut rb = decision_with_outcome(
            DecisionOutcome::RolledBack {
                reason: "verification failed".to_string(),
            },
            true,
        );
        rb.rolled_back = true;
        ledger.append(&rb).unwrap();
        ledger
            .append(&decision_with_outcome(DecisionOutcome::NoAction, false))
            .unwrap();

        let stats = ledger.statistics().unwrap();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.executed, 2);
        assert_eq!(stats.blocked, 1);
        assert_eq!(stats.rolled_back, 1);
        assert_eq!(stats.no_action, 1);
        assert_eq!(stats.cumulative_savings, 75.0);
        // 3 mutation attempts (2 executed + 1 rolled back), 1 rollback.
        assert!((stats.rollback_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot_store_and_lookup() {
        let ledger = DecisionLedger::open_in_memory(10, 4).unwrap();
        let decision_id = Uuid::new_v4();
        let snapshot = test_snapshot(decision_id);
        ledger.put_snapshot(&snapshot).unwrap();

        let found = ledger.snapshot_for_decision(decision_id).unwrap();
        assert_eq!(found, Some(snapshot));
        assert_eq!(
            ledger.snapshot_for_decision(Uuid::new_v4()).unwrap(),
            None
        );
    }

    #[test]
    fn snapshots_are_bounded_fifo() {
        let ledger = DecisionLedger::open_in_memory(10, 2).unwrap();
        let first = Uuid::new_v4();
        ledger.put_snapshot(&test_snapshot(first)).unwrap();
        let second = Uuid::new_v4();
        ledger.put_snapshot(&test_snapshot(second)).unwrap();
        let third = Uuid::new_v4();
        ledger.put_snapshot(&test_snapshot(third)).unwrap();

        // First snapshot superseded.
        assert_eq!(ledger.snapshot_for_decision(first).unwrap(), None);
        assert!(ledger.snapshot_for_decision(second).unwrap().is_some());
        assert!(ledger.snapshot_for_decision(third).unwrap().is_some());
    }

    #[test]
    fn persistent_ledger_resumes_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.redb");

        let first_id;
        {
            let ledger = DecisionLedger::open(&path, 10, 4).unwrap();
            let d = decision_with_outcome(DecisionOutcome::NoAction, false);
            first_id = d.id;
            ledger.append(&d).unwrap();
        }

        let ledger = DecisionLedger::open(&path, 10, 4).unwrap();
        let d = decision_with_outcome(DecisionOutcome::NoAction, false);
        ledger.append(&d).unwrap();

        let decisions = ledger.decisions(10).unwrap();
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].id, first_id);
    }
}
