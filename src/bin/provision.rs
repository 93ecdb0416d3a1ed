// Copyright (c) 2025 - Cowboy AI, Inc.

//! Build farm provisioning CLI
//!
//! Adds or removes farm machines across DNS, IPAM, the DHCP reservation
//! file, and configuration management variables. Records come from a batch
//! file or from `--hostname/--mac/--ip` for a single host.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cim_provisioning::adapters::{NautobotClient, PowerDnsClient};
use cim_provisioning::deploy::AnsibleDeployer;
use cim_provisioning::dhcp::ReservationStore;
use cim_provisioning::domain::{parse_batch_file, BatchParseOutcome, HostRecord, RowError};
use cim_provisioning::hostvars::HostVarsGenerator;
use cim_provisioning::orchestrator::{RecordStatus, StepOutcome};
use cim_provisioning::{
    Action, BatchReport, ProvisioningConfig, ProvisioningOrchestrator, Step, StepSet,
};

const EXIT_FAILURE: i32 = 1;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "provision", version, about = "Build farm host provisioning")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Provision hosts: DNS record, reservation, deploy, host vars
    Add(RunArgs),
    /// Retire hosts: remove DNS record and reservation
    Remove(RunArgs),
    /// Export current reservations as `hostname,mac,ip` rows
    Export {
        /// Write rows to this path instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Batch file of `hostname,mac,ip` rows (header optional)
    #[arg(long, short, conflicts_with_all = ["hostname", "mac", "ip"])]
    file: Option<PathBuf>,

    /// Single host: hostname (short or fully qualified)
    #[arg(long, requires = "mac", requires = "ip")]
    hostname: Option<String>,

    /// Single host: hardware address
    #[arg(long)]
    mac: Option<String>,

    /// Single host: fixed IPv4 address
    #[arg(long)]
    ip: Option<String>,

    /// Domain suffix for unqualified hostnames
    #[arg(long, env = "DHCPD_DOMAIN")]
    domain: Option<String>,

    /// Report what would change without touching anything
    #[arg(long)]
    dry_run: bool,

    /// Skip the DNS step
    #[arg(long)]
    skip_dns: bool,

    /// Skip the IPAM step (on by default; pass --skip-ipam=false to enable IPAM)
    #[arg(long, num_args = 0..=1, require_equals = true, default_value_t = true,
          default_missing_value = "true", action = ArgAction::Set)]
    skip_ipam: bool,

    /// Skip the reservation file step
    #[arg(long)]
    skip_dhcp: bool,

    /// Skip the batch-level deployment playbook
    #[arg(long)]
    skip_deploy: bool,

    /// Skip host vars generation
    #[arg(long)]
    skip_hostvars: bool,

    /// Do not keep a timestamped backup of the reservation file
    #[arg(long)]
    no_backup: bool,

    /// Overwrite host vars files whose content differs
    #[arg(long)]
    force: bool,

    /// Write the JSON run report to this path
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl RunArgs {
    fn step_set(&self) -> StepSet {
        StepSet::default()
            .set(Step::Dns, !self.skip_dns)
            .set(Step::Ipam, !self.skip_ipam)
            .set(Step::DhcpStore, !self.skip_dhcp)
            .set(Step::DhcpDeploy, !self.skip_deploy)
            .set(Step::HostVars, !self.skip_hostvars)
    }

    /// Load records from the batch file or the single-host flags
    fn load_records(&self, domain: &str) -> Result<(Vec<HostRecord>, Vec<RowError>)> {
        let outcome: BatchParseOutcome = match (&self.file, &self.hostname) {
            (Some(path), _) => parse_batch_file(path)
                .with_context(|| format!("failed to read batch file {}", path.display()))?,
            (None, Some(hostname)) => {
                // clap guarantees mac and ip are present alongside hostname
                let mac = self.mac.as_deref().unwrap_or_default();
                let ip = self.ip.as_deref().unwrap_or_default();
                let record = HostRecord::parse(hostname, mac, ip)
                    .with_context(|| format!("invalid host record for {}", hostname))?;
                BatchParseOutcome {
                    records: vec![record],
                    errors: Vec::new(),
                }
            }
            (None, None) => bail!("either --file or --hostname/--mac/--ip is required"),
        };

        let records = outcome
            .records
            .into_iter()
            .map(|record| record.qualified(domain))
            .collect();
        Ok((records, outcome.errors))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cancel = Arc::new(AtomicBool::new(false));
    spawn_cancel_handler(cancel.clone());

    let (action, args) = match cli.command {
        Command::Add(args) => (Action::Add, args),
        Command::Remove(args) => (Action::Remove, args),
        Command::Export { output } => {
            let code = match export(output.as_deref()) {
                Ok(()) => 0,
                Err(err) => {
                    error!("{:#}", err);
                    EXIT_FAILURE
                }
            };
            std::process::exit(code);
        }
    };

    let code = match run(action, &args, cancel.clone()).await {
        Ok(report) => {
            if cancel.load(Ordering::Relaxed) {
                EXIT_INTERRUPTED
            } else if report.is_success() {
                0
            } else {
                EXIT_FAILURE
            }
        }
        Err(err) => {
            error!("{:#}", err);
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}

fn spawn_cancel_handler(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current step and stopping");
            cancel.store(true, Ordering::Relaxed);
        }
    });
}

fn export(output: Option<&Path>) -> Result<()> {
    let config = ProvisioningConfig::from_env().context("failed to load configuration")?;
    let store = ReservationStore::new(&config.dhcp);
    let reservations = store.export()?;

    let writer: Box<dyn std::io::Write> = match output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["hostname", "mac", "ip"])?;
    for r in &reservations {
        csv.write_record([r.hostname.as_str(), &r.mac.canonical(), &r.ip.to_string()])?;
    }
    csv.flush()?;
    Ok(())
}

async fn run(action: Action, args: &RunArgs, cancel: Arc<AtomicBool>) -> Result<BatchReport> {
    let mut config = ProvisioningConfig::from_env().context("failed to load configuration")?;
    if let Some(domain) = &args.domain {
        config = config.with_domain(domain.clone());
    }

    let (records, row_errors) = args.load_records(&config.domain)?;
    if records.is_empty() && row_errors.is_empty() {
        bail!("no host records to process");
    }
    for err in &row_errors {
        warn!("rejected row: {}", err);
    }

    let steps = args.step_set();
    let mut store = ReservationStore::new(&config.dhcp);
    if args.no_backup {
        store = store.without_backup();
    }
    let host_vars = HostVarsGenerator::new(&config.host_vars_dir).with_force(args.force);
    let deployer = Arc::new(AnsibleDeployer::new(&config.dhcp));

    let mut orchestrator = ProvisioningOrchestrator::new(store, host_vars, deployer)
        .with_steps(steps)
        .with_dry_run(args.dry_run)
        .with_cancel_flag(cancel);

    // Adapters are only built (and their credentials only required) for
    // steps that will run
    if steps.contains(Step::Dns) {
        let dns = PowerDnsClient::new(config.powerdns.clone(), config.domain.clone())?;
        orchestrator = orchestrator.with_dns(Arc::new(dns));
    }
    if steps.contains(Step::Ipam) {
        let ipam = NautobotClient::new(config.nautobot.clone())?;
        orchestrator = orchestrator.with_ipam(Arc::new(ipam));
    }

    let report = orchestrator.run(action, records, row_errors).await;
    print_summary(&report);

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        info!("report written to {}", path.display());
    }

    Ok(report)
}

fn print_summary(report: &BatchReport) {
    for record in &report.records {
        let status = match record.status {
            RecordStatus::Succeeded => "ok",
            RecordStatus::PartiallyApplied => "PARTIAL",
            RecordStatus::Failed => "FAILED",
        };
        println!("{:8} {} ({}, {})", status, record.hostname, record.mac, record.ip);
        for (step, outcome) in &record.steps {
            match outcome {
                StepOutcome::Succeeded => {}
                StepOutcome::Failed(reason) => {
                    println!("         {} failed: {}", step, reason)
                }
                StepOutcome::Skipped(reason) => {
                    println!("         {} skipped: {}", step, reason)
                }
            }
        }
    }
    for err in &report.row_errors {
        println!("{:8} {}", "REJECTED", err);
    }
    if let Some(deploy) = &report.deploy {
        match deploy {
            StepOutcome::Succeeded => println!("deploy   ok"),
            StepOutcome::Failed(reason) => println!("deploy   FAILED: {}", reason),
            StepOutcome::Skipped(reason) => println!("deploy   skipped: {}", reason),
        }
    }
    println!(
        "{} succeeded, {} failed, {} rejected",
        report.succeeded_count(),
        report.failed_count(),
        report.row_errors.len()
    );
}
