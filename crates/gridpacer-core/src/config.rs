//! pacerd.toml configuration parser.
//!
//! Loaded once at startup and passed explicitly into the policy engine;
//! nothing here mutates after load. Unknown users resolve to the default
//! quota at lookup time rather than growing the table.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacerConfig {
    pub cluster: ClusterConfig,
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub quotas: QuotaConfig,
}

/// Where the cluster master lives and how long to wait for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Master address as `host:port`.
    pub master: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Path of the redb ledger file.
    pub db_path: PathBuf,
}

/// Global resource budget and pressure thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Total slot budget across all jobs.
    #[serde(default = "default_slot_total")]
    pub slot_total: u64,
    /// CPU ratio above which the abuse clamp applies.
    #[serde(default = "default_cpu_abuse_ratio")]
    pub cpu_abuse_ratio: f64,
    /// CPU ratio above which the cluster counts as under pressure.
    #[serde(default = "default_cpu_high_ratio")]
    pub cpu_high_ratio: f64,
    /// Memory ratio above which the cluster counts as under pressure.
    #[serde(default = "default_mem_high_ratio")]
    pub mem_high_ratio: f64,
}

/// Named, versionable policy parameters for the decision engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Consecutive no-progress cycles after which a job is killed.
    #[serde(default = "default_stall_kill_threshold")]
    pub stall_kill_threshold: u32,
    /// Capacity multiplier for ordinary pressure scale-down.
    #[serde(default = "default_scale_down_ratio")]
    pub scale_down_ratio: f64,
    /// Steeper multiplier used when relieving VIP starvation.
    #[serde(default = "default_vip_scale_down_ratio")]
    pub vip_scale_down_ratio: f64,
    /// Non-negotiable minimum capacity per phase.
    #[serde(default = "default_capacity_floor")]
    pub capacity_floor: u32,
    /// Maximum number of cycles a single job can be sacrificed for VIPs.
    #[serde(default = "default_vip_grant_cap")]
    pub vip_grant_cap: u32,
    /// Pending slots above which a VIP user counts as starving.
    #[serde(default = "default_vip_hunger_threshold")]
    pub vip_hunger_threshold: u64,
    /// Cost weight applied to reduce-phase slots in usage accounting.
    #[serde(default = "default_reduce_slot_weight")]
    pub reduce_slot_weight: f64,
    /// Denominator for the fair average share.
    #[serde(default)]
    pub fair_share_basis: FairShareBasis,
}

/// What the slot budget is averaged over when computing fair share.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FairShareBasis {
    #[default]
    PerUser,
    PerJob,
}

/// Static per-user slot quotas and the VIP set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Quota applied to users not listed in `users`.
    #[serde(default = "default_quota")]
    pub default_quota: u32,
    #[serde(default)]
    pub users: HashMap<String, u32>,
    #[serde(default)]
    pub vips: HashSet<String>,
}

impl PacerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PacerConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

impl QuotaConfig {
    /// Slot quota for a user; unlisted users get the default quota.
    pub fn quota_for(&self, user: &str) -> u32 {
        self.users.get(user).copied().unwrap_or(self.default_quota)
    }

    pub fn is_vip(&self, user: &str) -> bool {
        self.vips.contains(user)
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            slot_total: default_slot_total(),
            cpu_abuse_ratio: default_cpu_abuse_ratio(),
            cpu_high_ratio: default_cpu_high_ratio(),
            mem_high_ratio: default_mem_high_ratio(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            stall_kill_threshold: default_stall_kill_threshold(),
            scale_down_ratio: default_scale_down_ratio(),
            vip_scale_down_ratio: default_vip_scale_down_ratio(),
            capacity_floor: default_capacity_floor(),
            vip_grant_cap: default_vip_grant_cap(),
            vip_hunger_threshold: default_vip_hunger_threshold(),
            reduce_slot_weight: default_reduce_slot_weight(),
            fair_share_basis: FairShareBasis::default(),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_quota: default_quota(),
            users: HashMap::new(),
            vips: HashSet::new(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_slot_total() -> u64 {
    4500
}

fn default_cpu_abuse_ratio() -> f64 {
    0.35
}

fn default_cpu_high_ratio() -> f64 {
    0.75
}

fn default_mem_high_ratio() -> f64 {
    0.8
}

fn default_stall_kill_threshold() -> u32 {
    80
}

fn default_scale_down_ratio() -> f64 {
    0.8
}

fn default_vip_scale_down_ratio() -> f64 {
    0.5
}

fn default_capacity_floor() -> u32 {
    10
}

fn default_vip_grant_cap() -> u32 {
    20
}

fn default_vip_hunger_threshold() -> u64 {
    500
}

fn default_reduce_slot_weight() -> f64 {
    1.5
}

fn default_quota() -> u32 {
    1000
}
