//! Capacity actuator — applies policy decisions through the cluster API.
//!
//! Enforces the non-negotiable capacity floor, skips no-op mutations, and
//! never retries: a failed mutation is logged and the cluster is simply
//! re-evaluated from a fresh snapshot next cycle.

use tracing::{debug, info, warn};

use gridpacer_core::Phase;

use crate::api::ClusterApi;

pub struct Actuator<'a> {
    api: &'a dyn ClusterApi,
    /// Minimum capacity a phase is ever set to.
    floor: u32,
}

impl<'a> Actuator<'a> {
    pub fn new(api: &'a dyn ClusterApi, floor: u32) -> Self {
        Self { api, floor }
    }

    /// Set a phase's capacity, floored. Returns the value actually applied,
    /// or `None` if the mutation was a no-op or failed.
    pub async fn set_capacity(
        &self,
        job_id: &str,
        phase: Phase,
        target: u32,
        current: u32,
    ) -> Option<u32> {
        let target = target.max(self.floor);
        if target == current {
            debug!(%job_id, phase = phase.as_str(), target, "capacity unchanged, skipping");
            return None;
        }
        match self.api.set_capacity(job_id, phase, target).await {
            Ok(()) => {
                info!(
                    %job_id,
                    phase = phase.as_str(),
                    from = current,
                    to = target,
                    "capacity updated"
                );
                Some(target)
            }
            Err(e) => {
                // Not retried; next cycle re-derives from a fresh snapshot.
                warn!(%job_id, phase = phase.as_str(), target, error = %e, "capacity mutation failed");
                None
            }
        }
    }

    /// Terminate a job.
    pub async fn kill(&self, job_id: &str) {
        match self.api.kill_job(job_id).await {
            Ok(()) => info!(%job_id, "kill issued"),
            Err(e) => warn!(%job_id, error = %e, "kill failed"),
        }
    }
}
