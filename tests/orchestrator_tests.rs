// Copyright (c) 2025 - Cowboy AI, Inc.

//! Batch orchestration behavior with mock collaborators

use async_trait::async_trait;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cim_provisioning::adapters::{DnsAdapter, IpamAdapter};
use cim_provisioning::deploy::DeploymentTrigger;
use cim_provisioning::dhcp::ReservationStore;
use cim_provisioning::domain::{HostRecord, Hostname};
use cim_provisioning::errors::{ProvisioningError, ProvisioningResult};
use cim_provisioning::hostvars::HostVarsGenerator;
use cim_provisioning::orchestrator::{RecordStatus, StepOutcome};
use cim_provisioning::{Action, ProvisioningOrchestrator, RetryPolicy, Step, StepSet};

const SEED: &str = "\
# farm reservations
host existing.macfarm.example.com {
  hardware ethernet aa:bb:cc:dd:ee:ff;
  fixed-address 10.0.0.100;
}
";

#[derive(Default)]
struct MockDns {
    calls: Mutex<Vec<String>>,
    /// Hostnames whose operations fail permanently
    fail_for: Vec<String>,
    /// Number of leading calls that fail transiently
    transient_failures: AtomicU32,
}

impl MockDns {
    fn failing_for(hostname: &str) -> Self {
        Self {
            fail_for: vec![hostname.to_string()],
            ..Default::default()
        }
    }

    fn flaky(failures: u32) -> Self {
        Self {
            transient_failures: AtomicU32::new(failures),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn check(&self, hostname: &Hostname) -> ProvisioningResult<()> {
        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ProvisioningError::Transient("connection reset".into()));
        }
        if self.fail_for.iter().any(|h| h == hostname.as_str()) {
            return Err(ProvisioningError::Permanent("HTTP 422".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DnsAdapter for MockDns {
    async fn upsert(&self, hostname: &Hostname, ip: Ipv4Addr) -> ProvisioningResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("upsert {} {}", hostname, ip));
        self.check(hostname)
    }

    async fn delete(&self, hostname: &Hostname) -> ProvisioningResult<()> {
        self.calls.lock().unwrap().push(format!("delete {}", hostname));
        self.check(hostname)
    }
}

#[derive(Default)]
struct MockIpam {
    calls: Mutex<Vec<String>>,
    fail: bool,
}

impl MockIpam {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IpamAdapter for MockIpam {
    async fn allocate(&self, ip: Ipv4Addr, hostname: &Hostname) -> ProvisioningResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("allocate {} {}", ip, hostname));
        if self.fail {
            return Err(ProvisioningError::Permanent("HTTP 403".into()));
        }
        Ok(())
    }

    async fn release(&self, ip: Ipv4Addr) -> ProvisioningResult<()> {
        self.calls.lock().unwrap().push(format!("release {}", ip));
        Ok(())
    }
}

#[derive(Default)]
struct MockDeployer {
    calls: AtomicU32,
    fail: bool,
}

impl MockDeployer {
    fn failing() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: true,
        }
    }
}

#[async_trait]
impl DeploymentTrigger for MockDeployer {
    async fn deploy(&self) -> ProvisioningResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(ProvisioningError::Deployment("playbook failed".into()))
        } else {
            Ok(())
        }
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    dns: Arc<MockDns>,
    ipam: Arc<MockIpam>,
    deployer: Arc<MockDeployer>,
}

impl Fixture {
    fn new(dns: MockDns, deployer: MockDeployer) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("dhcpd.conf"), SEED).unwrap();
        Self {
            dir,
            dns: Arc::new(dns),
            ipam: Arc::new(MockIpam::default()),
            deployer: Arc::new(deployer),
        }
    }

    fn with_failing_ipam(mut self) -> Self {
        self.ipam = Arc::new(MockIpam {
            calls: Mutex::new(Vec::new()),
            fail: true,
        });
        self
    }

    fn conf_path(&self) -> std::path::PathBuf {
        self.dir.path().join("dhcpd.conf")
    }

    fn host_vars_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("host_vars")
    }

    fn orchestrator(&self) -> ProvisioningOrchestrator {
        let store = ReservationStore::open(self.conf_path()).without_backup();
        let host_vars = HostVarsGenerator::new(self.host_vars_dir());
        ProvisioningOrchestrator::new(store, host_vars, self.deployer.clone())
            .with_dns(self.dns.clone())
            .with_ipam(self.ipam.clone())
            .with_retry(RetryPolicy::none())
    }
}

fn record(hostname: &str, mac: &str, ip: &str) -> HostRecord {
    HostRecord::parse(hostname, mac, ip).unwrap()
}

fn conf_contents(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn add_runs_steps_in_order_and_deploys_once() {
    let fx = Fixture::new(MockDns::default(), MockDeployer::default());
    let records = vec![
        record("a.macfarm.example.com", "aa:bb:cc:dd:ee:01", "10.0.0.1"),
        record("b.macfarm.example.com", "aa:bb:cc:dd:ee:02", "10.0.0.2"),
    ];

    let report = fx
        .orchestrator()
        .run(Action::Add, records, Vec::new())
        .await;

    assert!(report.is_success());
    assert_eq!(report.succeeded_count(), 2);
    assert_eq!(fx.dns.calls().len(), 2);
    assert_eq!(fx.deployer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.deploy, Some(StepOutcome::Succeeded));

    let conf = conf_contents(&fx.conf_path());
    assert!(conf.contains("host a.macfarm.example.com {"));
    assert!(conf.contains("host b.macfarm.example.com {"));

    assert!(fx.host_vars_dir().join("a.macfarm.example.com.yml").exists());
    assert!(fx.host_vars_dir().join("b.macfarm.example.com.yml").exists());
}

#[tokio::test]
async fn dry_run_touches_nothing() {
    let fx = Fixture::new(MockDns::default(), MockDeployer::default());
    let records = vec![record("a.macfarm.example.com", "aa:bb:cc:dd:ee:01", "10.0.0.1")];

    let report = fx
        .orchestrator()
        .with_dry_run(true)
        .with_steps(StepSet::all())
        .run(Action::Add, records, Vec::new())
        .await;

    assert!(report.is_success());
    assert!(fx.dns.calls().is_empty());
    assert!(fx.ipam.calls().is_empty());
    assert_eq!(fx.deployer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(conf_contents(&fx.conf_path()), SEED);
    assert!(!fx.host_vars_dir().exists());

    let steps = &report.records[0].steps;
    assert!(steps
        .iter()
        .all(|(_, o)| *o == StepOutcome::Skipped("dry-run".into())));
    assert_eq!(report.deploy, Some(StepOutcome::Skipped("dry-run".into())));
}

#[tokio::test]
async fn record_failure_does_not_abort_the_batch() {
    let fx = Fixture::new(
        MockDns::failing_for("b.macfarm.example.com"),
        MockDeployer::default(),
    );
    let records = vec![
        record("a.macfarm.example.com", "aa:bb:cc:dd:ee:01", "10.0.0.1"),
        record("b.macfarm.example.com", "aa:bb:cc:dd:ee:02", "10.0.0.2"),
        record("c.macfarm.example.com", "aa:bb:cc:dd:ee:03", "10.0.0.3"),
    ];

    let report = fx
        .orchestrator()
        .run(Action::Add, records, Vec::new())
        .await;

    assert!(!report.is_success());
    assert_eq!(report.succeeded_count(), 2);
    assert_eq!(report.failed_count(), 1);

    let failed = &report.records[1];
    assert_eq!(failed.status, RecordStatus::Failed);
    assert!(matches!(
        failed.outcome_of(Step::Dns),
        Some(StepOutcome::Failed(_))
    ));
    // Later steps are skipped for the failed record, not attempted
    assert_eq!(
        failed.outcome_of(Step::DhcpStore),
        Some(&StepOutcome::Skipped("earlier step failed".into()))
    );
    assert_eq!(
        failed.outcome_of(Step::HostVars),
        Some(&StepOutcome::Skipped("earlier step failed".into()))
    );

    // The survivors still made it all the way through
    let conf = conf_contents(&fx.conf_path());
    assert!(conf.contains("host a.macfarm.example.com {"));
    assert!(!conf.contains("host b.macfarm.example.com {"));
    assert!(conf.contains("host c.macfarm.example.com {"));
    assert_eq!(fx.deployer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn remove_never_generates_host_vars() {
    let fx = Fixture::new(MockDns::default(), MockDeployer::default());
    let records = vec![record(
        "existing.macfarm.example.com",
        "aa:bb:cc:dd:ee:ff",
        "10.0.0.100",
    )];

    let report = fx
        .orchestrator()
        .run(Action::Remove, records, Vec::new())
        .await;

    assert!(report.is_success());
    assert_eq!(fx.dns.calls(), vec!["delete existing.macfarm.example.com"]);
    assert!(report.records[0].outcome_of(Step::HostVars).is_none());
    assert!(!conf_contents(&fx.conf_path()).contains("existing.macfarm.example.com"));
    assert_eq!(fx.deployer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn remove_of_absent_host_skips_deploy() {
    let fx = Fixture::new(MockDns::default(), MockDeployer::default());
    let records = vec![record("ghost.macfarm.example.com", "aa:bb:cc:dd:ee:09", "10.0.0.9")];

    let report = fx
        .orchestrator()
        .run(Action::Remove, records, Vec::new())
        .await;

    assert!(report.is_success());
    assert_eq!(
        report.records[0].outcome_of(Step::DhcpStore),
        Some(&StepOutcome::Succeeded)
    );
    assert_eq!(fx.deployer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        report.deploy,
        Some(StepOutcome::Skipped("no reservation changes".into()))
    );
    assert_eq!(conf_contents(&fx.conf_path()), SEED);
}

#[tokio::test]
async fn transient_dns_failure_is_retried() {
    let fx = Fixture::new(MockDns::flaky(1), MockDeployer::default());
    let records = vec![record("a.macfarm.example.com", "aa:bb:cc:dd:ee:01", "10.0.0.1")];

    let report = fx
        .orchestrator()
        .with_retry(RetryPolicy::new(3, Duration::from_millis(1)))
        .run(Action::Add, records, Vec::new())
        .await;

    assert!(report.is_success());
    assert_eq!(fx.dns.calls().len(), 2);
}

#[tokio::test]
async fn exhausted_retries_fail_the_record() {
    let fx = Fixture::new(MockDns::flaky(10), MockDeployer::default());
    let records = vec![record("a.macfarm.example.com", "aa:bb:cc:dd:ee:01", "10.0.0.1")];

    let report = fx
        .orchestrator()
        .with_retry(RetryPolicy::new(2, Duration::from_millis(1)))
        .run(Action::Add, records, Vec::new())
        .await;

    assert!(!report.is_success());
    assert_eq!(fx.dns.calls().len(), 2);
    assert_eq!(report.records[0].status, RecordStatus::Failed);
}

#[tokio::test]
async fn ipam_is_disabled_by_default() {
    let fx = Fixture::new(MockDns::default(), MockDeployer::default());
    let records = vec![record("a.macfarm.example.com", "aa:bb:cc:dd:ee:01", "10.0.0.1")];

    let report = fx
        .orchestrator()
        .run(Action::Add, records.clone(), Vec::new())
        .await;
    assert!(fx.ipam.calls().is_empty());
    assert_eq!(
        report.records[0].outcome_of(Step::Ipam),
        Some(&StepOutcome::Skipped("step disabled".into()))
    );

    // Opting in runs the allocation
    let fx = Fixture::new(MockDns::default(), MockDeployer::default());
    let report = fx
        .orchestrator()
        .with_steps(StepSet::default().set(Step::Ipam, true))
        .run(Action::Add, records, Vec::new())
        .await;
    assert!(report.is_success());
    assert_eq!(
        fx.ipam.calls(),
        vec!["allocate 10.0.0.1 a.macfarm.example.com"]
    );
}

#[tokio::test]
async fn ipam_failure_leaves_record_partially_applied() {
    let fx = Fixture::new(MockDns::default(), MockDeployer::default()).with_failing_ipam();
    let records = vec![record("a.macfarm.example.com", "aa:bb:cc:dd:ee:01", "10.0.0.1")];

    let report = fx
        .orchestrator()
        .with_steps(StepSet::default().set(Step::Ipam, true))
        .run(Action::Add, records, Vec::new())
        .await;

    assert!(!report.is_success());
    let rec = &report.records[0];
    assert_eq!(rec.status, RecordStatus::PartiallyApplied);
    assert_eq!(rec.outcome_of(Step::Dns), Some(&StepOutcome::Succeeded));
    assert!(matches!(
        rec.outcome_of(Step::Ipam),
        Some(StepOutcome::Failed(_))
    ));
    assert_eq!(
        rec.outcome_of(Step::DhcpStore),
        Some(&StepOutcome::Skipped("earlier step failed".into()))
    );

    // Nothing landed in the file, so the deploy never ran
    assert_eq!(conf_contents(&fx.conf_path()), SEED);
    assert_eq!(
        report.deploy,
        Some(StepOutcome::Skipped("no reservation changes".into()))
    );
}

#[tokio::test]
async fn deploy_failure_fails_the_batch_but_not_the_records() {
    let fx = Fixture::new(MockDns::default(), MockDeployer::failing());
    let records = vec![record("a.macfarm.example.com", "aa:bb:cc:dd:ee:01", "10.0.0.1")];

    let report = fx
        .orchestrator()
        .run(Action::Add, records, Vec::new())
        .await;

    assert!(!report.is_success());
    assert_eq!(report.records[0].status, RecordStatus::Succeeded);
    assert!(matches!(report.deploy, Some(StepOutcome::Failed(_))));
}

#[tokio::test]
async fn duplicate_rows_are_reported_and_survivor_processed() {
    let fx = Fixture::new(MockDns::default(), MockDeployer::default());
    let outcome = cim_provisioning::domain::parse_batch_reader(
        "a.macfarm.example.com,aa:bb:cc:dd:ee:01,10.0.0.1\n\
         a.macfarm.example.com,aa:bb:cc:dd:ee:02,10.0.0.2\n"
            .as_bytes(),
    );
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.errors.len(), 1);

    let report = fx
        .orchestrator()
        .run(Action::Add, outcome.records, outcome.errors)
        .await;

    // The surviving record processed fine; the rejected row fails the run
    assert!(!report.is_success());
    assert_eq!(report.succeeded_count(), 1);
    assert_eq!(report.row_errors.len(), 1);
    assert_eq!(fx.dns.calls().len(), 1);
}
