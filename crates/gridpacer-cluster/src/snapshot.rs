//! Snapshot builder — turns a raw status report into validated per-cycle
//! domain state.
//!
//! Cluster-wide failures are fatal to the cycle (fail-closed): a status
//! report with non-finite or out-of-range utilization after normalization
//! produces an error, and the driver aborts without actuating anything.
//! Per-job gaps are not fatal: a job with incomplete data is dropped from
//! the snapshot with a warning and simply not acted on this cycle.

use std::collections::HashMap;

use tracing::warn;

use gridpacer_core::{ClusterSnapshot, JobId, JobSnapshot, PhaseCounts, UserName, UserUsage};

use crate::api::{StatusReport, TaskCounts};
use crate::error::{ClusterError, ClusterResult};

/// Everything the policy engine needs for one cycle.
#[derive(Debug, Clone)]
pub struct SnapshotBundle {
    pub cluster: ClusterSnapshot,
    pub usage: HashMap<UserName, UserUsage>,
    /// Jobs present on the cluster but dropped from the snapshot for
    /// incomplete data. Still alive: their ledger entries must survive.
    pub skipped: Vec<JobId>,
}

/// Validate and normalize a raw status report.
///
/// `reduce_slot_weight` is the cost multiplier for reduce-phase slots in
/// per-user usage accounting.
pub fn build_snapshot(report: StatusReport, reduce_slot_weight: f64) -> ClusterResult<SnapshotBundle> {
    let cpu_ratio = check_ratio("cpu_ratio", report.cpu_ratio)?;
    // Some masters report memory in permille; normalize to a ratio.
    let mem_raw = if report.mem_ratio > 1.0 {
        report.mem_ratio / 1000.0
    } else {
        report.mem_ratio
    };
    let mem_ratio = check_ratio("mem_ratio", mem_raw)?;

    let mut jobs = Vec::with_capacity(report.jobs.len());
    let mut skipped = Vec::new();
    for raw in report.jobs {
        match (raw.map_capacity, raw.reduce_capacity, raw.map, raw.reduce) {
            (Some(map_capacity), Some(reduce_capacity), Some(map), Some(reduce)) => {
                jobs.push(JobSnapshot {
                    id: raw.id,
                    name: raw.name,
                    map_capacity,
                    reduce_capacity,
                    map: counts(map),
                    reduce: counts(reduce),
                });
            }
            _ => {
                // Present in one data source but not another; skip rather
                // than act on partial data.
                warn!(job_id = %raw.id, name = %raw.name, "incomplete job record, skipping");
                skipped.push(raw.id);
            }
        }
    }

    let running_total = jobs.iter().map(JobSnapshot::running_total).sum();

    let mut usage: HashMap<UserName, UserUsage> = HashMap::new();
    for job in &jobs {
        let slot = usage.entry(job.user()).or_default();
        slot.weighted_slots +=
            job.map.running as f64 + job.reduce.running as f64 * reduce_slot_weight;
    }
    for user in report.users {
        let slot = usage.entry(user.user.to_ascii_lowercase()).or_default();
        slot.granted = user.granted;
        slot.pending = user.pending;
    }

    Ok(SnapshotBundle {
        cluster: ClusterSnapshot {
            cpu_ratio,
            mem_ratio,
            running_total,
            jobs,
        },
        usage,
        skipped,
    })
}

fn check_ratio(field: &str, value: f64) -> ClusterResult<f64> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ClusterError::Malformed(format!(
            "{field} out of range: {value}"
        )));
    }
    Ok(value)
}

fn counts(raw: TaskCounts) -> PhaseCounts {
    PhaseCounts {
        running: raw.running,
        pending: raw.pending,
        completed: raw.completed,
    }
}
