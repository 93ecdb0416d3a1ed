// Copyright (c) 2025 - Cowboy AI, Inc.

//! Batch Provisioning Orchestrator
//!
//! Drives a batch of host records through the provisioning steps in a fixed
//! order:
//!
//! ```text
//! Dns -> Ipam -> DhcpStore -> DhcpDeploy -> HostVars
//! ```
//!
//! Steps sweep the whole batch before the next step starts, so the expensive
//! batch-level deployment runs once no matter how many hosts changed. A
//! record that fails a step is dropped from later sweeps but never aborts
//! the rest of the batch.
//!
//! Dry-run is structural: mutating collaborators are never invoked, every
//! would-be mutation is reported as skipped.

pub mod report;

pub use report::{BatchReport, RecordReport, RecordStatus, StepOutcome};

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::{DnsAdapter, IpamAdapter};
use crate::deploy::DeploymentTrigger;
use crate::dhcp::{DhcpReservation, ReservationStore};
use crate::domain::{HostRecord, RowError};
use crate::hostvars::HostVarsGenerator;
use crate::retry::RetryPolicy;

/// What a batch run does to its records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Add,
    Remove,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Add => write!(f, "add"),
            Action::Remove => write!(f, "remove"),
        }
    }
}

/// Provisioning steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Dns,
    Ipam,
    DhcpStore,
    DhcpDeploy,
    HostVars,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Dns => "dns",
            Step::Ipam => "ipam",
            Step::DhcpStore => "dhcp-store",
            Step::DhcpDeploy => "dhcp-deploy",
            Step::HostVars => "host-vars",
        };
        write!(f, "{}", name)
    }
}

/// Which steps a run executes.
///
/// IPAM is off by default: most farm deployments track addresses in the
/// reservation file alone and opt into Nautobot explicitly. Every other
/// step defaults on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSet {
    pub dns: bool,
    pub ipam: bool,
    pub dhcp_store: bool,
    pub dhcp_deploy: bool,
    pub host_vars: bool,
}

impl Default for StepSet {
    fn default() -> Self {
        Self {
            dns: true,
            ipam: false,
            dhcp_store: true,
            dhcp_deploy: true,
            host_vars: true,
        }
    }
}

impl StepSet {
    pub fn all() -> Self {
        Self {
            dns: true,
            ipam: true,
            dhcp_store: true,
            dhcp_deploy: true,
            host_vars: true,
        }
    }

    pub fn contains(&self, step: Step) -> bool {
        match step {
            Step::Dns => self.dns,
            Step::Ipam => self.ipam,
            Step::DhcpStore => self.dhcp_store,
            Step::DhcpDeploy => self.dhcp_deploy,
            Step::HostVars => self.host_vars,
        }
    }

    pub fn set(mut self, step: Step, enabled: bool) -> Self {
        match step {
            Step::Dns => self.dns = enabled,
            Step::Ipam => self.ipam = enabled,
            Step::DhcpStore => self.dhcp_store = enabled,
            Step::DhcpDeploy => self.dhcp_deploy = enabled,
            Step::HostVars => self.host_vars = enabled,
        }
        self
    }
}

/// Runs batches of host records through the provisioning steps
pub struct ProvisioningOrchestrator {
    dns: Option<Arc<dyn DnsAdapter>>,
    ipam: Option<Arc<dyn IpamAdapter>>,
    store: ReservationStore,
    host_vars: HostVarsGenerator,
    deployer: Arc<dyn DeploymentTrigger>,
    retry: RetryPolicy,
    steps: StepSet,
    dry_run: bool,
    cancel: Arc<AtomicBool>,
}

impl ProvisioningOrchestrator {
    /// Adapters are attached separately so a run with a step disabled never
    /// needs that step's credentials.
    pub fn new(
        store: ReservationStore,
        host_vars: HostVarsGenerator,
        deployer: Arc<dyn DeploymentTrigger>,
    ) -> Self {
        Self {
            dns: None,
            ipam: None,
            store,
            host_vars,
            deployer,
            retry: RetryPolicy::default(),
            steps: StepSet::default(),
            dry_run: false,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_dns(mut self, dns: Arc<dyn DnsAdapter>) -> Self {
        self.dns = Some(dns);
        self
    }

    pub fn with_ipam(mut self, ipam: Arc<dyn IpamAdapter>) -> Self {
        self.ipam = Some(ipam);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_steps(mut self, steps: StepSet) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// External cancellation flag. When it flips, no further steps start;
    /// completed work is reported as-is.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Run the batch. Row-level errors are carried into the report; only the
    /// valid records are swept.
    pub async fn run(
        &mut self,
        action: Action,
        records: Vec<HostRecord>,
        row_errors: Vec<RowError>,
    ) -> BatchReport {
        let mut batch = BatchReport::new(action, self.dry_run);
        batch.row_errors = row_errors;
        batch.records = records.iter().map(RecordReport::new).collect();

        info!(
            run_id = %batch.run_id,
            %action,
            records = records.len(),
            rejected_rows = batch.row_errors.len(),
            dry_run = self.dry_run,
            "starting batch run"
        );

        self.sweep_dns(action, &records, &mut batch).await;
        self.sweep_ipam(action, &records, &mut batch).await;
        let store_changed = self.sweep_store(action, &records, &mut batch);
        self.run_deploy(store_changed, &mut batch).await;
        if action == Action::Add {
            self.sweep_host_vars(&records, &mut batch);
        }

        batch.finish();
        info!(
            run_id = %batch.run_id,
            succeeded = batch.succeeded_count(),
            failed = batch.failed_count(),
            "batch run finished"
        );
        batch
    }

    /// Decide whether a record participates in a step, recording the skip
    /// when it does not. Returns true when the real operation should run.
    fn gate(&self, step: Step, report: &mut RecordReport) -> bool {
        if !report.is_viable() {
            report.record_step(step, StepOutcome::skipped("earlier step failed"));
            return false;
        }
        if self.cancelled() {
            report.record_step(step, StepOutcome::skipped("cancelled"));
            return false;
        }
        if !self.steps.contains(step) {
            report.record_step(step, StepOutcome::skipped("step disabled"));
            return false;
        }
        if self.dry_run {
            report.record_step(step, StepOutcome::skipped("dry-run"));
            return false;
        }
        true
    }

    async fn sweep_dns(&self, action: Action, records: &[HostRecord], batch: &mut BatchReport) {
        for (record, report) in records.iter().zip(batch.records.iter_mut()) {
            if !self.gate(Step::Dns, report) {
                continue;
            }
            let dns = match &self.dns {
                Some(dns) => dns,
                None => {
                    report.record_step(
                        Step::Dns,
                        StepOutcome::skipped("no DNS endpoint configured"),
                    );
                    continue;
                }
            };
            let result = match action {
                Action::Add => {
                    self.retry
                        .run("dns upsert", || dns.upsert(&record.hostname, record.ip))
                        .await
                }
                Action::Remove => {
                    self.retry
                        .run("dns delete", || dns.delete(&record.hostname))
                        .await
                }
            };
            match result {
                Ok(()) => report.record_step(Step::Dns, StepOutcome::Succeeded),
                Err(err) => {
                    warn!("dns step failed for {}: {}", record.hostname, err);
                    report.record_step(Step::Dns, StepOutcome::Failed(err.to_string()));
                }
            }
        }
    }

    async fn sweep_ipam(&self, action: Action, records: &[HostRecord], batch: &mut BatchReport) {
        for (record, report) in records.iter().zip(batch.records.iter_mut()) {
            if !self.gate(Step::Ipam, report) {
                continue;
            }
            let ipam = match &self.ipam {
                Some(ipam) => ipam,
                None => {
                    report.record_step(
                        Step::Ipam,
                        StepOutcome::skipped("no IPAM endpoint configured"),
                    );
                    continue;
                }
            };
            let result = match action {
                Action::Add => {
                    self.retry
                        .run("ipam allocate", || {
                            ipam.allocate(record.ip, &record.hostname)
                        })
                        .await
                }
                Action::Remove => {
                    self.retry
                        .run("ipam release", || ipam.release(record.ip))
                        .await
                }
            };
            match result {
                Ok(()) => report.record_step(Step::Ipam, StepOutcome::Succeeded),
                Err(err) => {
                    warn!("ipam step failed for {}: {}", record.hostname, err);
                    report.record_step(Step::Ipam, StepOutcome::Failed(err.to_string()));
                }
            }
        }
    }

    /// Returns whether any record actually changed the reservation file
    fn sweep_store(
        &mut self,
        action: Action,
        records: &[HostRecord],
        batch: &mut BatchReport,
    ) -> bool {
        let mut changed = false;
        for (record, report) in records.iter().zip(batch.records.iter_mut()) {
            if !self.gate(Step::DhcpStore, report) {
                continue;
            }
            let result = match action {
                Action::Add => self.store.add(&DhcpReservation {
                    hostname: record.hostname.clone(),
                    mac: record.mac,
                    ip: record.ip,
                }),
                Action::Remove => self.store.remove(&record.hostname, Some(&record.mac)),
            };
            match result {
                Ok(wrote) => {
                    changed |= wrote;
                    report.record_step(Step::DhcpStore, StepOutcome::Succeeded);
                }
                Err(err) => {
                    warn!("dhcp store step failed for {}: {}", record.hostname, err);
                    report.record_step(Step::DhcpStore, StepOutcome::Failed(err.to_string()));
                }
            }
        }
        changed
    }

    /// Batch-level: runs at most once, and only when the file changed
    async fn run_deploy(&self, store_changed: bool, batch: &mut BatchReport) {
        if !self.steps.contains(Step::DhcpDeploy) {
            batch.deploy = Some(StepOutcome::skipped("step disabled"));
            return;
        }
        if self.dry_run {
            batch.deploy = Some(StepOutcome::skipped("dry-run"));
            return;
        }
        if self.cancelled() {
            batch.deploy = Some(StepOutcome::skipped("cancelled"));
            return;
        }
        if !store_changed {
            batch.deploy = Some(StepOutcome::skipped("no reservation changes"));
            return;
        }
        batch.deploy = Some(match self.deployer.deploy().await {
            Ok(()) => StepOutcome::Succeeded,
            Err(err) => {
                warn!("deployment failed: {}", err);
                StepOutcome::Failed(err.to_string())
            }
        });
    }

    fn sweep_host_vars(&self, records: &[HostRecord], batch: &mut BatchReport) {
        for (record, report) in records.iter().zip(batch.records.iter_mut()) {
            if !self.gate(Step::HostVars, report) {
                continue;
            }
            match self.host_vars.generate(record) {
                Ok(_) => report.record_step(Step::HostVars, StepOutcome::Succeeded),
                Err(err) => {
                    warn!("host vars step failed for {}: {}", record.hostname, err);
                    report.record_step(Step::HostVars, StepOutcome::Failed(err.to_string()));
                }
            }
        }
    }
}
