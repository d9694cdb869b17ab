//! The `ClusterApi` seam and the master's wire-level report types.
//!
//! The status query is read-only and side-effect free; mutations are
//! fire-and-forget with no synchronous confirmation. Per-job fields are
//! optional on the wire so that a job missing from one underlying data
//! source arrives as a partial record and can be skipped, never
//! half-evaluated.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use gridpacer_core::Phase;

use crate::error::ClusterResult;

/// Typed client for the cluster master.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fetch the full status report: cluster utilization, per-job task
    /// counts and capacities, per-user scheduler state.
    async fn fetch_status(&self) -> ClusterResult<StatusReport>;

    /// Set a job's capacity for one phase. Fire-and-forget.
    async fn set_capacity(&self, job_id: &str, phase: Phase, capacity: u32) -> ClusterResult<()>;

    /// Terminate a job. Fire-and-forget.
    async fn kill_job(&self, job_id: &str) -> ClusterResult<()>;
}

/// Raw status report as returned by `GET /v1/status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusReport {
    /// Cluster CPU utilization ratio.
    pub cpu_ratio: f64,
    /// Cluster memory utilization; some masters report permille (> 1).
    pub mem_ratio: f64,
    #[serde(default)]
    pub jobs: Vec<JobStatus>,
    /// Per-user view from the lower-level node scheduler.
    #[serde(default)]
    pub users: Vec<UserSchedulerStatus>,
}

/// Raw per-job record. All phase-level fields are optional on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub map_capacity: Option<u32>,
    #[serde(default)]
    pub reduce_capacity: Option<u32>,
    #[serde(default)]
    pub map: Option<TaskCounts>,
    #[serde(default)]
    pub reduce: Option<TaskCounts>,
}

/// Raw per-phase task counts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskCounts {
    pub running: u64,
    pub pending: u64,
    pub completed: u64,
}

/// Per-user aggregate from the node scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSchedulerStatus {
    pub user: String,
    /// Slots currently granted to this user.
    pub granted: u64,
    /// Queued, unscheduled slot demand.
    pub pending: u64,
}

/// Request body for `POST /v1/jobs/{id}/capacity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityRequest {
    pub phase: Phase,
    pub capacity: u32,
}
