//! gridpacer-ledger — durable cross-cycle memory for the control loop.
//!
//! Backed by [redb](https://docs.rs/redb), keyed by job id. Each entry
//! records what the last cycle saw (completed count, stall counter) and
//! what the governor did (pre-scale-down restore points, VIP grant count).
//!
//! # Architecture
//!
//! Entries are JSON-serialized into redb's `&[u8]` value column. Every put
//! commits independently, so a crash between two jobs' updates never loses
//! or corrupts a committed entry. The `LedgerStore` is `Clone` + `Send` +
//! `Sync` (backed by `Arc<Database>`). No locking beyond redb's own: only
//! one instance of the loop runs at a time.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{LedgerError, LedgerResult};
pub use store::LedgerStore;
pub use types::JobLedgerEntry;
