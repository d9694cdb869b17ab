//! Domain types for the gridpacer control loop.
//!
//! All snapshot types are rebuilt from live cluster state every cycle and
//! are immutable for the duration of that cycle. Only the ledger entry
//! (see `gridpacer-ledger`) outlives a cycle.

use serde::{Deserialize, Serialize};

/// Unique identifier for a job on the cluster.
pub type JobId = String;

/// User identity derived from a job name.
pub type UserName = String;

/// One of the two task categories composing a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Map,
    Reduce,
}

impl Phase {
    /// Both phases, in evaluation order.
    pub const ALL: [Phase; 2] = [Phase::Map, Phase::Reduce];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Map => "map",
            Phase::Reduce => "reduce",
        }
    }
}

/// Task counts for a single phase of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCounts {
    pub running: u64,
    pub pending: u64,
    pub completed: u64,
}

impl PhaseCounts {
    /// Outstanding work: tasks running or still queued.
    pub fn todo(&self) -> u64 {
        self.running + self.pending
    }
}

/// Point-in-time view of a single running job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub name: String,
    /// Concurrency ceiling currently set for the map phase.
    pub map_capacity: u32,
    /// Concurrency ceiling currently set for the reduce phase.
    pub reduce_capacity: u32,
    pub map: PhaseCounts,
    pub reduce: PhaseCounts,
}

impl JobSnapshot {
    pub fn capacity(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Map => self.map_capacity,
            Phase::Reduce => self.reduce_capacity,
        }
    }

    pub fn counts(&self, phase: Phase) -> &PhaseCounts {
        match phase {
            Phase::Map => &self.map,
            Phase::Reduce => &self.reduce,
        }
    }

    /// Completed tasks across both phases; the stall detector's progress signal.
    pub fn completed_total(&self) -> u64 {
        self.map.completed + self.reduce.completed
    }

    /// Running tasks across both phases (slots this job holds right now).
    pub fn running_total(&self) -> u64 {
        self.map.running + self.reduce.running
    }

    /// User identity derived from the job name: the leading segment before
    /// the first `_` or `-`, lowercased. Jobs without a separator belong to
    /// a user named after the whole job name.
    pub fn user(&self) -> UserName {
        let head = self
            .name
            .split(['_', '-'])
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.name);
        head.to_ascii_lowercase()
    }
}

/// Cluster-wide view for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    /// CPU utilization in [0, 1].
    pub cpu_ratio: f64,
    /// Memory utilization in [0, 1] (normalized from permille if needed).
    pub mem_ratio: f64,
    /// Total running task-slots across all jobs.
    pub running_total: u64,
    pub jobs: Vec<JobSnapshot>,
}

/// Per-user usage aggregated for one cycle. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UserUsage {
    /// Slots in use per the cluster view, with reduce slots weighted to
    /// reflect their heavier cost.
    pub weighted_slots: f64,
    /// Slots granted by the underlying node scheduler.
    pub granted: u64,
    /// Queued, unscheduled demand per the node scheduler.
    pub pending: u64,
}
