// Copyright (c) 2025 - Cowboy AI, Inc.

//! Batch Run Reports
//!
//! Every run produces one report describing what happened to each record at
//! each step. The report is the operator's audit trail and serializes to
//! JSON for downstream tooling.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::Ipv4Addr;
use uuid::Uuid;

use super::{Action, Step};
use crate::domain::{HostRecord, RowError};

/// What a single step did for a single record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed(String),
    Skipped(String),
}

impl StepOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        StepOutcome::Skipped(reason.into())
    }
}

/// Aggregate status of one record across all steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Every attempted step succeeded
    Succeeded,
    /// Some steps succeeded before one failed
    PartiallyApplied,
    /// The first attempted step failed
    Failed,
}

/// Per-record step trail
#[derive(Debug, Clone, Serialize)]
pub struct RecordReport {
    pub hostname: String,
    pub mac: String,
    pub ip: Ipv4Addr,
    pub status: RecordStatus,
    pub steps: Vec<(Step, StepOutcome)>,
}

impl RecordReport {
    pub fn new(record: &HostRecord) -> Self {
        Self {
            hostname: record.hostname.as_str().to_string(),
            mac: record.mac.canonical(),
            ip: record.ip,
            status: RecordStatus::Succeeded,
            steps: Vec::new(),
        }
    }

    /// Record a step outcome and fold it into the aggregate status
    pub fn record_step(&mut self, step: Step, outcome: StepOutcome) {
        if matches!(outcome, StepOutcome::Failed(_)) {
            let any_succeeded = self
                .steps
                .iter()
                .any(|(_, o)| matches!(o, StepOutcome::Succeeded));
            self.status = if any_succeeded {
                RecordStatus::PartiallyApplied
            } else {
                RecordStatus::Failed
            };
        }
        self.steps.push((step, outcome));
    }

    /// Whether later steps should still run for this record
    pub fn is_viable(&self) -> bool {
        !self
            .steps
            .iter()
            .any(|(_, o)| matches!(o, StepOutcome::Failed(_)))
    }

    pub fn outcome_of(&self, step: Step) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, o)| o)
    }
}

/// Full report for one batch run
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub action: Action,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Rows rejected during batch parsing, before any step ran
    pub row_errors: Vec<RowError>,
    pub records: Vec<RecordReport>,
    /// Batch-level deployment outcome, None when the step never ran
    pub deploy: Option<StepOutcome>,
}

impl BatchReport {
    pub fn new(action: Action, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            action,
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            row_errors: Vec::new(),
            records: Vec::new(),
            deploy: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Whether the whole run succeeded (drives the process exit code)
    pub fn is_success(&self) -> bool {
        self.row_errors.is_empty()
            && self
                .records
                .iter()
                .all(|r| r.status == RecordStatus::Succeeded)
            && !matches!(self.deploy, Some(StepOutcome::Failed(_)))
    }

    pub fn succeeded_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == RecordStatus::Succeeded)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status != RecordStatus::Succeeded)
            .count()
    }
}
