//! Per-cycle decision context, computed once and shared by every job's
//! evaluation.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use gridpacer_core::config::{BudgetConfig, FairShareBasis, PolicyConfig, QuotaConfig};
use gridpacer_core::{ClusterSnapshot, UserName, UserUsage};

/// Cross-job context for one policy pass.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub cpu_ratio: f64,
    pub mem_ratio: f64,
    pub running_total: u64,
    /// Any VIP user's queued demand exceeds the starvation threshold.
    pub vip_hungry: bool,
    /// Budget overrun, high CPU/memory, or VIP hunger.
    pub under_pressure: bool,
    /// Fair average share of the slot budget, per the configured basis.
    pub fair_share: u32,
    usage: HashMap<UserName, UserUsage>,
}

impl CycleContext {
    pub fn build(
        cluster: &ClusterSnapshot,
        usage: HashMap<UserName, UserUsage>,
        budget: &BudgetConfig,
        policy: &PolicyConfig,
        quotas: &QuotaConfig,
    ) -> Self {
        let vip_hungry = quotas.vips.iter().any(|vip| {
            usage
                .get(vip)
                .is_some_and(|u| u.pending > policy.vip_hunger_threshold)
        });

        let under_pressure = cluster.running_total > budget.slot_total
            || cluster.cpu_ratio > budget.cpu_high_ratio
            || cluster.mem_ratio > budget.mem_high_ratio
            || vip_hungry;

        let denominator = match policy.fair_share_basis {
            FairShareBasis::PerUser => {
                let users: HashSet<UserName> =
                    cluster.jobs.iter().map(|j| j.user()).collect();
                users.len()
            }
            FairShareBasis::PerJob => cluster.jobs.len(),
        };
        let fair_share = (budget.slot_total / denominator.max(1) as u64).min(u32::MAX as u64) as u32;

        debug!(
            cpu = cluster.cpu_ratio,
            mem = cluster.mem_ratio,
            running_total = cluster.running_total,
            under_pressure,
            vip_hungry,
            fair_share,
            "cycle context built"
        );

        Self {
            cpu_ratio: cluster.cpu_ratio,
            mem_ratio: cluster.mem_ratio,
            running_total: cluster.running_total,
            vip_hungry,
            under_pressure,
            fair_share,
            usage,
        }
    }

    /// Usage for a user; users with no recorded usage use nothing.
    pub fn usage_for(&self, user: &str) -> UserUsage {
        self.usage.get(user).copied().unwrap_or_default()
    }

    /// Whether both the scheduler-reported and cluster-reported usage for
    /// this user fit inside the quota.
    pub fn within_quota(&self, user: &str, quota: u32) -> bool {
        let usage = self.usage_for(user);
        usage.granted <= quota as u64 && usage.weighted_slots <= quota as f64
    }
}
