//! gridpacer-core — domain types and static configuration.
//!
//! Everything the control loop reasons about lives here: per-job and
//! cluster-wide snapshots rebuilt every cycle, per-user usage aggregates,
//! and the immutable `PacerConfig` loaded once at startup (slot budget,
//! pressure thresholds, quota table, VIP list, policy knobs).

pub mod config;
pub mod types;

pub use config::PacerConfig;
pub use types::*;
