//! redb table definitions for the decision ledger.
//!
//! Both tables use `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). Keys are zero-padded sequence numbers so lexical order equals
//! append order.

use redb::TableDefinition;

/// Decisions keyed by `{seq:020}`.
pub const DECISIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("decisions");

/// Pre-change snapshots keyed by `{seq:020}`.
pub const SNAPSHOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

/// Format a sequence number as a table key.
pub fn seq_key(seq: u64) -> String {
    format!("{seq:020}")
}
