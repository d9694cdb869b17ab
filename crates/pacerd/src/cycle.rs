//! Cycle driver — one pass of the observe / decide / act loop.
//!
//! A cycle is: fetch the cluster status, normalize it into a snapshot,
//! derive the cycle context, evaluate every job through the policy
//! engine, apply the decisions through the actuator, persist ledger
//! entries, and prune entries for jobs that no longer exist.
//!
//! Any failure before actuation starts aborts the whole cycle: the
//! ledger keeps its previous state and no mutation reaches the cluster.
//! The next cycle starts from a fresh snapshot.

use std::collections::HashSet;

use anyhow::Context as _;
use tracing::info;

use gridpacer_cluster::{Actuator, ClusterApi, build_snapshot};
use gridpacer_core::PacerConfig;
use gridpacer_ledger::LedgerStore;
use gridpacer_policy::{CycleContext, JobDecision, PolicyEngine};

/// Counters from one completed cycle, logged for operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub jobs_seen: usize,
    pub kills: u32,
    pub adjustments: u32,
    pub pruned: u32,
}

pub struct CycleDriver<C: ClusterApi> {
    api: C,
    ledger: LedgerStore,
    engine: PolicyEngine,
    cfg: PacerConfig,
}

impl<C: ClusterApi> CycleDriver<C> {
    pub fn new(api: C, ledger: LedgerStore, cfg: PacerConfig) -> Self {
        let engine = PolicyEngine::new(
            cfg.budget.clone(),
            cfg.policy.clone(),
            cfg.quotas.clone(),
        );
        Self {
            api,
            ledger,
            engine,
            cfg,
        }
    }

    /// Run a single control cycle against the cluster.
    pub async fn run_cycle(&self) -> anyhow::Result<CycleOutcome> {
        let report = self
            .api
            .fetch_status()
            .await
            .context("cluster status query failed, skipping cycle")?;
        let bundle = build_snapshot(report, self.cfg.policy.reduce_slot_weight)
            .context("malformed cluster status, skipping cycle")?;
        let ctx = CycleContext::build(
            &bundle.cluster,
            bundle.usage,
            &self.cfg.budget,
            &self.cfg.policy,
            &self.cfg.quotas,
        );

        let actuator = Actuator::new(&self.api, self.cfg.policy.capacity_floor);
        let mut outcome = CycleOutcome {
            jobs_seen: bundle.cluster.jobs.len(),
            ..CycleOutcome::default()
        };
        // Jobs skipped for incomplete data are still alive on the cluster;
        // their ledger entries (stall counters, restore points) must not be
        // pruned for a transient data gap.
        let mut live: HashSet<_> = bundle.skipped.iter().cloned().collect();

        for job in &bundle.cluster.jobs {
            live.insert(job.id.clone());
            let mut entry = self.ledger.get(&job.id)?.unwrap_or_default();
            match self.engine.evaluate(job, &mut entry, &ctx) {
                JobDecision::Kill => {
                    actuator.kill(&job.id).await;
                    self.ledger.delete(&job.id)?;
                    outcome.kills += 1;
                }
                JobDecision::Adjust(changes) => {
                    for change in &changes {
                        // Only mutations that actually reached the master
                        // count as applied.
                        let applied = actuator
                            .set_capacity(
                                &job.id,
                                change.phase,
                                change.target,
                                job.capacity(change.phase),
                            )
                            .await;
                        if applied.is_some() {
                            outcome.adjustments += 1;
                        }
                    }
                    self.ledger.put(&job.id, &entry)?;
                }
                // Stall counters and last-completed marks still moved.
                JobDecision::NoChange => self.ledger.put(&job.id, &entry)?,
            }
        }

        outcome.pruned = self.ledger.retain_jobs(&live)?;

        info!(
            jobs = outcome.jobs_seen,
            kills = outcome.kills,
            adjustments = outcome.adjustments,
            pruned = outcome.pruned,
            "cycle complete"
        );
        Ok(outcome)
    }
}
