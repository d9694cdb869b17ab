//! The persisted per-job ledger entry.

use gridpacer_core::Phase;
use serde::{Deserialize, Serialize};

/// Cross-cycle memory for one job, keyed by job id.
///
/// Created on first observation of a job, updated every cycle the job is
/// observed, deleted when the job is killed or disappears from the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLedgerEntry {
    /// Completed-task count observed at the previous cycle.
    pub last_completed: u64,
    /// Consecutive cycles with no change in `last_completed`.
    pub stall_count: u32,
    /// Map capacity at the moment a pressure scale-down first hit this job.
    /// `Some` iff the phase carries an unrestored reduction.
    pub pre_scaledown_map: Option<u32>,
    /// Reduce-phase restore point, tracked independently of the map phase.
    pub pre_scaledown_reduce: Option<u32>,
    /// Cycles this job has been sacrificed to relieve VIP starvation.
    pub vip_grant_count: u32,
}

impl JobLedgerEntry {
    /// The recorded restore point for a phase, if any.
    pub fn pre_scaledown(&self, phase: Phase) -> Option<u32> {
        match phase {
            Phase::Map => self.pre_scaledown_map,
            Phase::Reduce => self.pre_scaledown_reduce,
        }
    }

    /// Record the restore point for a phase. First write wins: the restore
    /// point is the capacity before the *first* reduction, not the latest.
    pub fn record_pre_scaledown(&mut self, phase: Phase, capacity: u32) {
        let slot = match phase {
            Phase::Map => &mut self.pre_scaledown_map,
            Phase::Reduce => &mut self.pre_scaledown_reduce,
        };
        if slot.is_none() {
            *slot = Some(capacity);
        }
    }

    /// Clear the restore point once the phase is fully restored.
    pub fn clear_pre_scaledown(&mut self, phase: Phase) {
        match phase {
            Phase::Map => self.pre_scaledown_map = None,
            Phase::Reduce => self.pre_scaledown_reduce = None,
        }
    }
}
