//! End-to-end cycle tests: a mock cluster API and an in-memory ledger,
//! full cycles driven through [`pacerd::CycleDriver`].

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use gridpacer_cluster::{
    ClusterApi, ClusterError, ClusterResult, JobStatus, StatusReport, TaskCounts,
    UserSchedulerStatus,
};
use gridpacer_core::config::{
    BudgetConfig, ClusterConfig, LedgerConfig, PolicyConfig, QuotaConfig,
};
use gridpacer_core::{PacerConfig, Phase};
use gridpacer_ledger::{JobLedgerEntry, LedgerStore};
use pacerd::CycleDriver;

#[derive(Clone, Default)]
struct MockClusterApi {
    inner: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    report: Mutex<StatusReport>,
    fail_fetch: AtomicBool,
    fail_capacity: AtomicBool,
    capacity_calls: Mutex<Vec<(String, Phase, u32)>>,
    kills: Mutex<Vec<String>>,
}

impl MockClusterApi {
    fn set_report(&self, report: StatusReport) {
        *self.inner.report.lock().unwrap() = report;
    }

    fn fail_fetch(&self) {
        self.inner.fail_fetch.store(true, Ordering::SeqCst);
    }

    fn fail_capacity(&self) {
        self.inner.fail_capacity.store(true, Ordering::SeqCst);
    }

    fn capacity_calls(&self) -> Vec<(String, Phase, u32)> {
        self.inner.capacity_calls.lock().unwrap().clone()
    }

    fn kills(&self) -> Vec<String> {
        self.inner.kills.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterApi for MockClusterApi {
    async fn fetch_status(&self) -> ClusterResult<StatusReport> {
        if self.inner.fail_fetch.load(Ordering::SeqCst) {
            return Err(ClusterError::Connect("connection refused".to_string()));
        }
        Ok(self.inner.report.lock().unwrap().clone())
    }

    async fn set_capacity(&self, job_id: &str, phase: Phase, capacity: u32) -> ClusterResult<()> {
        self.inner
            .capacity_calls
            .lock()
            .unwrap()
            .push((job_id.to_string(), phase, capacity));
        if self.inner.fail_capacity.load(Ordering::SeqCst) {
            return Err(ClusterError::Timeout);
        }
        Ok(())
    }

    async fn kill_job(&self, job_id: &str) -> ClusterResult<()> {
        self.inner.kills.lock().unwrap().push(job_id.to_string());
        Ok(())
    }
}

fn test_config() -> PacerConfig {
    PacerConfig {
        cluster: ClusterConfig {
            master: "127.0.0.1:7800".to_string(),
            request_timeout_secs: 5,
        },
        ledger: LedgerConfig {
            db_path: PathBuf::from("unused.redb"),
        },
        budget: BudgetConfig::default(),
        policy: PolicyConfig::default(),
        quotas: QuotaConfig {
            default_quota: 1000,
            users: HashMap::from([("online".to_string(), 2500)]),
            vips: HashSet::from(["vip".to_string()]),
        },
    }
}

fn driver_with(
    api: &MockClusterApi,
    ledger: &LedgerStore,
) -> CycleDriver<MockClusterApi> {
    CycleDriver::new(api.clone(), ledger.clone(), test_config())
}

fn counts(running: u64, pending: u64, completed: u64) -> TaskCounts {
    TaskCounts {
        running,
        pending,
        completed,
    }
}

fn raw_job(
    id: &str,
    name: &str,
    map_capacity: u32,
    reduce_capacity: u32,
    map: TaskCounts,
    reduce: TaskCounts,
) -> JobStatus {
    JobStatus {
        id: id.to_string(),
        name: name.to_string(),
        map_capacity: Some(map_capacity),
        reduce_capacity: Some(reduce_capacity),
        map: Some(map),
        reduce: Some(reduce),
    }
}

fn scheduler_user(user: &str, granted: u64, pending: u64) -> UserSchedulerStatus {
    UserSchedulerStatus {
        user: user.to_string(),
        granted,
        pending,
    }
}

/// High CPU trips both the abuse clamp (slots capped at quota) and
/// pressure scale-down (ratio applied above fair share). With three
/// users the fair share is 4500 / 3 = 1500, so the over-quota job goes
/// 3000 -> 2500 (clamp) -> 2000 (ratio, floored at its remaining
/// demand), with the original 3000 recorded as the restore point.
#[tokio::test]
async fn abuse_and_pressure_clamp_over_quota_job() {
    let api = MockClusterApi::default();
    api.set_report(StatusReport {
        cpu_ratio: 0.9,
        mem_ratio: 0.5,
        jobs: vec![
            raw_job(
                "j1",
                "online_sort_hourly",
                3000,
                10,
                counts(1500, 500, 5),
                counts(10, 0, 5),
            ),
            raw_job("j2", "batch_etl", 20, 10, counts(5, 5, 1), counts(0, 0, 0)),
            raw_job("j3", "vip_rank", 20, 10, counts(5, 5, 1), counts(0, 0, 0)),
        ],
        users: vec![scheduler_user("online", 2600, 0)],
    });
    let ledger = LedgerStore::open_in_memory().unwrap();
    let driver = driver_with(&api, &ledger);

    let outcome = driver.run_cycle().await.unwrap();

    assert_eq!(
        api.capacity_calls(),
        vec![("j1".to_string(), Phase::Map, 2000)]
    );
    assert!(api.kills().is_empty());
    assert_eq!(outcome.adjustments, 1);
    assert_eq!(outcome.kills, 0);

    let entry = ledger.get("j1").unwrap().unwrap();
    assert_eq!(entry.pre_scaledown(Phase::Map), Some(3000));
    assert_eq!(entry.pre_scaledown(Phase::Reduce), None);
}

/// A job whose completed count never moves survives exactly the
/// threshold number of cycles, then is killed and forgotten.
#[tokio::test]
async fn stalled_job_is_killed_past_threshold() {
    let api = MockClusterApi::default();
    api.set_report(StatusReport {
        cpu_ratio: 0.2,
        mem_ratio: 0.3,
        jobs: vec![raw_job(
            "j1",
            "batch_stuck",
            50,
            20,
            counts(5, 3, 40),
            counts(0, 0, 0),
        )],
        users: vec![],
    });
    let ledger = LedgerStore::open_in_memory().unwrap();
    let driver = driver_with(&api, &ledger);

    ledger
        .put(
            "j1",
            &JobLedgerEntry {
                last_completed: 40,
                ..JobLedgerEntry::default()
            },
        )
        .unwrap();

    let threshold = PolicyConfig::default().stall_kill_threshold;
    for _ in 0..threshold {
        let outcome = driver.run_cycle().await.unwrap();
        assert_eq!(outcome.kills, 0);
    }
    assert!(api.kills().is_empty());
    assert_eq!(ledger.get("j1").unwrap().unwrap().stall_count, threshold);

    let outcome = driver.run_cycle().await.unwrap();
    assert_eq!(outcome.kills, 1);
    assert_eq!(api.kills(), vec!["j1".to_string()]);
    assert!(ledger.get("j1").unwrap().is_none());
    assert!(api.capacity_calls().is_empty());
}

/// Once pressure is gone, a previously squeezed job with pending demand
/// is restored to its recorded capacities and the restore points clear.
#[tokio::test]
async fn relief_restores_recorded_capacities() {
    let api = MockClusterApi::default();
    api.set_report(StatusReport {
        cpu_ratio: 0.2,
        mem_ratio: 0.3,
        jobs: vec![raw_job(
            "j9",
            "online_sort",
            400,
            300,
            counts(100, 50, 7),
            counts(10, 20, 3),
        )],
        users: vec![],
    });
    let ledger = LedgerStore::open_in_memory().unwrap();
    let driver = driver_with(&api, &ledger);

    ledger
        .put(
            "j9",
            &JobLedgerEntry {
                pre_scaledown_map: Some(1000),
                pre_scaledown_reduce: Some(800),
                ..JobLedgerEntry::default()
            },
        )
        .unwrap();

    let outcome = driver.run_cycle().await.unwrap();

    assert_eq!(
        api.capacity_calls(),
        vec![
            ("j9".to_string(), Phase::Map, 1000),
            ("j9".to_string(), Phase::Reduce, 800),
        ]
    );
    assert_eq!(outcome.adjustments, 2);

    let entry = ledger.get("j9").unwrap().unwrap();
    assert_eq!(entry.pre_scaledown(Phase::Map), None);
    assert_eq!(entry.pre_scaledown(Phase::Reduce), None);
}

/// VIP starvation forces an over-average non-VIP job to donate at the
/// steeper ratio, bounded below by its remaining demand.
#[tokio::test]
async fn vip_hunger_forces_donation_end_to_end() {
    let api = MockClusterApi::default();
    api.set_report(StatusReport {
        cpu_ratio: 0.2,
        mem_ratio: 0.3,
        jobs: vec![
            raw_job(
                "d1",
                "online_sort",
                2400,
                10,
                counts(1600, 0, 5),
                counts(0, 0, 0),
            ),
            raw_job("v1", "vip_rank", 20, 10, counts(5, 5, 1), counts(0, 0, 0)),
            raw_job("b1", "batch_etl", 20, 10, counts(5, 5, 1), counts(0, 0, 0)),
        ],
        users: vec![
            scheduler_user("online", 1600, 0),
            scheduler_user("vip", 100, 2000),
        ],
    });
    let ledger = LedgerStore::open_in_memory().unwrap();
    let driver = driver_with(&api, &ledger);

    driver.run_cycle().await.unwrap();

    // Fair share 1500; donor weighted usage 1600 exceeds it while staying
    // within quota. Steeper ratio gives 2400 * 0.5 = 1200, raised back to
    // the 1600 tasks still to run.
    assert_eq!(
        api.capacity_calls(),
        vec![("d1".to_string(), Phase::Map, 1600)]
    );

    let entry = ledger.get("d1").unwrap().unwrap();
    assert_eq!(entry.vip_grant_count, 1);
    assert_eq!(entry.pre_scaledown(Phase::Map), Some(2400));
}

/// A failed status query aborts the whole cycle: nothing is actuated and
/// the ledger keeps its previous state.
#[tokio::test]
async fn failed_status_query_aborts_cycle() {
    let api = MockClusterApi::default();
    api.fail_fetch();
    let ledger = LedgerStore::open_in_memory().unwrap();
    let driver = driver_with(&api, &ledger);

    let seeded = JobLedgerEntry {
        last_completed: 40,
        stall_count: 5,
        ..JobLedgerEntry::default()
    };
    ledger.put("j1", &seeded).unwrap();

    assert!(driver.run_cycle().await.is_err());
    assert!(api.capacity_calls().is_empty());
    assert!(api.kills().is_empty());
    assert_eq!(ledger.get("j1").unwrap().unwrap(), seeded);
}

/// An out-of-range utilization ratio is treated the same as an
/// unreachable master: fail closed, touch nothing.
#[tokio::test]
async fn malformed_report_aborts_cycle() {
    let api = MockClusterApi::default();
    api.set_report(StatusReport {
        cpu_ratio: 1.5,
        mem_ratio: 0.3,
        jobs: vec![],
        users: vec![],
    });
    let ledger = LedgerStore::open_in_memory().unwrap();
    let driver = driver_with(&api, &ledger);

    ledger.put("j1", &JobLedgerEntry::default()).unwrap();

    assert!(driver.run_cycle().await.is_err());
    assert!(api.capacity_calls().is_empty());
    assert!(ledger.get("j1").unwrap().is_some());
}

/// A job reported with incomplete data is skipped for the cycle, not
/// treated as gone: its stall counter and restore points must survive
/// the end-of-cycle prune.
#[tokio::test]
async fn incomplete_job_keeps_its_ledger_entry() {
    let api = MockClusterApi::default();
    let mut broken = raw_job("j1", "batch_etl", 50, 20, counts(5, 3, 40), counts(0, 0, 0));
    broken.reduce = None;
    api.set_report(StatusReport {
        cpu_ratio: 0.2,
        mem_ratio: 0.3,
        jobs: vec![broken],
        users: vec![],
    });
    let ledger = LedgerStore::open_in_memory().unwrap();
    let driver = driver_with(&api, &ledger);

    let seeded = JobLedgerEntry {
        last_completed: 40,
        stall_count: 50,
        pre_scaledown_map: Some(1000),
        ..JobLedgerEntry::default()
    };
    ledger.put("j1", &seeded).unwrap();

    let outcome = driver.run_cycle().await.unwrap();

    assert_eq!(outcome.jobs_seen, 0);
    assert_eq!(outcome.pruned, 0);
    assert_eq!(ledger.get("j1").unwrap().unwrap(), seeded);
    assert!(api.capacity_calls().is_empty());
    assert!(api.kills().is_empty());
}

/// Capacity sends that fail at the master are attempted once and never
/// counted as applied adjustments.
#[tokio::test]
async fn failed_mutations_are_not_counted_as_adjustments() {
    let api = MockClusterApi::default();
    api.fail_capacity();
    api.set_report(StatusReport {
        cpu_ratio: 0.2,
        mem_ratio: 0.3,
        jobs: vec![raw_job(
            "j9",
            "online_sort",
            400,
            300,
            counts(100, 50, 7),
            counts(10, 20, 3),
        )],
        users: vec![],
    });
    let ledger = LedgerStore::open_in_memory().unwrap();
    let driver = driver_with(&api, &ledger);

    ledger
        .put(
            "j9",
            &JobLedgerEntry {
                pre_scaledown_map: Some(1000),
                pre_scaledown_reduce: Some(800),
                ..JobLedgerEntry::default()
            },
        )
        .unwrap();

    let outcome = driver.run_cycle().await.unwrap();

    // Both sends were attempted, neither landed.
    assert_eq!(api.capacity_calls().len(), 2);
    assert_eq!(outcome.adjustments, 0);
}

/// Ledger entries for jobs no longer reported are pruned; an empty
/// cluster is a clean no-op otherwise.
#[tokio::test]
async fn vanished_jobs_are_pruned() {
    let api = MockClusterApi::default();
    api.set_report(StatusReport {
        cpu_ratio: 0.1,
        mem_ratio: 0.1,
        jobs: vec![],
        users: vec![],
    });
    let ledger = LedgerStore::open_in_memory().unwrap();
    let driver = driver_with(&api, &ledger);

    ledger.put("gone", &JobLedgerEntry::default()).unwrap();

    let outcome = driver.run_cycle().await.unwrap();
    assert_eq!(outcome.jobs_seen, 0);
    assert_eq!(outcome.pruned, 1);
    assert!(ledger.get("gone").unwrap().is_none());
    assert!(api.capacity_calls().is_empty());
    assert!(api.kills().is_empty());
}
