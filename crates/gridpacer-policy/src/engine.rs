//! Policy engine — per-job decision pipeline.
//!
//! For each job, in order: stall detection (kill takes absolute precedence
//! and suppresses everything else), abuse clamp, pressure scale-down, and
//! scale-up restoration once pressure is relieved. Map and reduce phases
//! are decided independently but share the job's user-quota and pressure
//! context.

use tracing::{debug, info};

use gridpacer_core::config::{BudgetConfig, PolicyConfig, QuotaConfig};
use gridpacer_core::{JobSnapshot, Phase};
use gridpacer_ledger::JobLedgerEntry;

use crate::context::CycleContext;

/// Desired capacity for one phase of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTarget {
    pub phase: Phase,
    pub target: u32,
}

/// Outcome of evaluating one job for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobDecision {
    /// Terminate the job and drop its ledger entry.
    Kill,
    /// Apply the listed capacity changes.
    Adjust(Vec<PhaseTarget>),
    /// Leave the job alone this cycle.
    NoChange,
}

/// The decision engine. Holds only immutable configuration; all per-cycle
/// state arrives through the context and the job's ledger entry.
pub struct PolicyEngine {
    budget: BudgetConfig,
    policy: PolicyConfig,
    quotas: QuotaConfig,
}

impl PolicyEngine {
    pub fn new(budget: BudgetConfig, policy: PolicyConfig, quotas: QuotaConfig) -> Self {
        Self {
            budget,
            policy,
            quotas,
        }
    }

    /// Evaluate one job. Mutates the ledger entry in place (stall counter,
    /// restore points, VIP grant count); the caller persists it — or
    /// deletes it on `Kill`.
    pub fn evaluate(
        &self,
        job: &JobSnapshot,
        entry: &mut JobLedgerEntry,
        ctx: &CycleContext,
    ) -> JobDecision {
        // 1. Stall detection. Kill suppresses all further policy.
        let completed = job.completed_total();
        if completed == entry.last_completed {
            entry.stall_count += 1;
        } else {
            entry.stall_count = 0;
            entry.last_completed = completed;
        }
        if entry.stall_count > self.policy.stall_kill_threshold {
            info!(
                job_id = %job.id,
                stalls = entry.stall_count,
                threshold = self.policy.stall_kill_threshold,
                "no completion progress past threshold, killing job"
            );
            return JobDecision::Kill;
        }

        let user = job.user();
        let quota = self.quotas.quota_for(&user);
        let floor = self.policy.capacity_floor;
        let mut target = [job.map_capacity, job.reduce_capacity];

        // 2. Abuse clamp: once CPU crosses the abuse-sensitive threshold,
        // no job may hold capacity beyond its user's quota, regardless of
        // global pressure.
        if ctx.cpu_ratio > self.budget.cpu_abuse_ratio {
            for (slot, phase) in target.iter_mut().zip(Phase::ALL) {
                if *slot > quota {
                    let clamped = quota.max(floor);
                    debug!(
                        job_id = %job.id,
                        %user,
                        phase = phase.as_str(),
                        from = *slot,
                        to = clamped,
                        "abuse clamp"
                    );
                    *slot = clamped;
                }
            }
        }

        if ctx.under_pressure {
            self.scale_down(job, entry, ctx, &user, quota, &mut target);
        } else {
            self.scale_up(job, entry, ctx, quota, &mut target);
        }

        let changes: Vec<PhaseTarget> = Phase::ALL
            .iter()
            .zip(target)
            .filter(|(phase, t)| *t != job.capacity(**phase))
            .map(|(phase, t)| PhaseTarget {
                phase: *phase,
                target: t,
            })
            .collect();

        if changes.is_empty() {
            JobDecision::NoChange
        } else {
            JobDecision::Adjust(changes)
        }
    }

    /// 3. Global-pressure scale-down.
    fn scale_down(
        &self,
        job: &JobSnapshot,
        entry: &mut JobLedgerEntry,
        ctx: &CycleContext,
        user: &str,
        quota: u32,
        target: &mut [u32; 2],
    ) {
        let mut beyond_quota = !ctx.within_quota(user, quota);
        let mut vip_relief = false;

        // A hungry VIP can force an over-average non-VIP job to donate,
        // but only a bounded number of times per job.
        if ctx.vip_hungry
            && !self.quotas.is_vip(user)
            && ctx.usage_for(user).weighted_slots > ctx.fair_share as f64
            && entry.vip_grant_count < self.policy.vip_grant_cap
        {
            beyond_quota = true;
            vip_relief = true;
            entry.vip_grant_count += 1;
            debug!(
                job_id = %job.id,
                %user,
                grants = entry.vip_grant_count,
                "forcing scale-down to relieve VIP starvation"
            );
        }

        if !beyond_quota {
            return;
        }

        let ratio = if vip_relief {
            self.policy.vip_scale_down_ratio
        } else {
            self.policy.scale_down_ratio
        };

        for (slot, phase) in target.iter_mut().zip(Phase::ALL) {
            let capped = (*slot).min(quota);
            let mut next = capped;
            // Only phases beyond the fair average share shrink further.
            if next > ctx.fair_share {
                next = (next as f64 * ratio) as u32;
            }
            // No point reducing below actual need, and never below floor.
            let todo = job.counts(phase).todo().min(u64::from(u32::MAX)) as u32;
            next = next.max(todo.min(capped)).max(floor(&self.policy));
            if next < *slot {
                // Restore point: the capacity the job had at cycle start,
                // recorded once per active scale-down episode.
                entry.record_pre_scaledown(phase, job.capacity(phase));
                info!(
                    job_id = %job.id,
                    %user,
                    phase = phase.as_str(),
                    from = *slot,
                    to = next,
                    vip_relief,
                    "pressure scale-down"
                );
                *slot = next;
            }
        }
    }

    /// 4. Scale-up once pressure is relieved: restore toward the recorded
    /// pre-scale-down capacity, bounded by fair share, only when pending
    /// demand justifies it. While CPU sits in the abuse band the bound
    /// tightens to the user's quota, or the restore would fight the next
    /// cycle's abuse clamp forever.
    fn scale_up(
        &self,
        job: &JobSnapshot,
        entry: &mut JobLedgerEntry,
        ctx: &CycleContext,
        quota: u32,
        target: &mut [u32; 2],
    ) {
        let mut bound = ctx.fair_share.max(floor(&self.policy));
        if ctx.cpu_ratio > self.budget.cpu_abuse_ratio {
            bound = bound.min(quota.max(floor(&self.policy)));
        }
        for (slot, phase) in target.iter_mut().zip(Phase::ALL) {
            let Some(recorded) = entry.pre_scaledown(phase) else {
                continue;
            };
            let current = job.capacity(phase);
            if current >= ctx.fair_share || current >= recorded {
                continue;
            }
            if job.counts(phase).pending == 0 {
                continue;
            }
            let restored = recorded.min(bound);
            if restored <= current {
                continue;
            }
            if restored >= recorded {
                // Fully restored; the scale-down episode is over.
                entry.clear_pre_scaledown(phase);
            }
            info!(
                job_id = %job.id,
                phase = phase.as_str(),
                from = current,
                to = restored,
                recorded,
                "pressure relieved, restoring capacity"
            );
            *slot = restored;
        }
    }
}

fn floor(policy: &PolicyConfig) -> u32 {
    policy.capacity_floor
}
