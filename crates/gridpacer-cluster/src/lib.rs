//! gridpacer-cluster — the control loop's view of the outside world.
//!
//! Three pieces:
//! - [`api`]: the typed `ClusterApi` seam (status query, capacity mutation,
//!   job kill) plus the wire-level report types.
//! - [`snapshot`]: validation and normalization of a raw status report into
//!   the per-cycle `ClusterSnapshot` and per-user usage aggregates.
//! - [`actuator`]: floor-enforcing, fire-and-forget application of policy
//!   decisions through the `ClusterApi`.
//!
//! The production `HttpClusterApi` speaks JSON over HTTP/1 to the cluster
//! master with a bounded per-request timeout. Nothing here retries: a
//! failed query aborts the cycle, a failed mutation is logged and
//! re-derived from a fresh snapshot next cycle.

pub mod actuator;
pub mod api;
pub mod error;
pub mod http;
pub mod snapshot;

pub use actuator::Actuator;
pub use api::{ClusterApi, JobStatus, StatusReport, TaskCounts, UserSchedulerStatus};
pub use error::{ClusterError, ClusterResult};
pub use http::HttpClusterApi;
pub use snapshot::{SnapshotBundle, build_snapshot};
