//! steward-ledger — bounded, append-only audit trail for cycle decisions.
//!
//! Backed by [redb](https://docs.rs/redb). Decisions are JSON-serialized
//! into `&[u8]` value columns under zero-padded sequence keys, so lexical
//! key order is append order and FIFO eviction is "remove the smallest
//! key". Pre-change snapshots live in a second, smaller table with the
//! same eviction discipline.
//!
//! The `DecisionLedger` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across async tasks. Entries are
//! never retroactively edited.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{LedgerError, LedgerResult};
pub use store::{DecisionLedger, LedgerStats};
