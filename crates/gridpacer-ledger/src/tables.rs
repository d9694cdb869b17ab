//! redb table definitions for the job ledger.

use redb::TableDefinition;

/// Job ledger entries keyed by job id, JSON-serialized values.
pub const JOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("jobs");
