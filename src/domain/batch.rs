// Copyright (c) 2025 - Cowboy AI, Inc.
//! Batch input parsing and validation
//!
//! Turns delimited `hostname,mac,ip` rows into typed [`HostRecord`]s with a
//! structured error per malformed row. A bad row never aborts the batch:
//! it is excluded and reported, and the caller decides whether failures
//! abort the run.
//!
//! Header detection: a first row whose mac/ip fields fail their syntactic
//! checks is treated as a header. This works for single-row files, where
//! sniffing heuristics misfire.

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::network::{parse_ipv4, MacAddress};
use super::record::{HostRecord, RecordFieldError};

/// Structured validation error for one input row
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowError {
    /// Wrong column count
    #[error("line {line}: expected {expected} columns, found {found}")]
    Format {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// hostname/mac/ip failed its syntactic check
    #[error("line {line}: {reason}")]
    Field { line: usize, reason: String },

    /// hostname, mac, or ip repeats within the batch; first occurrence wins
    #[error("line {line}: duplicate {field} '{value}' (first seen on line {first_line})")]
    Duplicate {
        line: usize,
        field: &'static str,
        value: String,
        first_line: usize,
    },
}

/// Result of parsing a batch: valid records plus per-row errors
#[derive(Debug, Clone, Default)]
pub struct BatchParseOutcome {
    pub records: Vec<HostRecord>,
    pub errors: Vec<RowError>,
}

impl BatchParseOutcome {
    /// True when at least one row was rejected
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

const EXPECTED_COLUMNS: usize = 3;

/// Parse a delimited batch file of `hostname,mac,ip` rows
pub fn parse_batch_file(path: impl AsRef<Path>) -> std::io::Result<BatchParseOutcome> {
    let file = std::fs::File::open(path)?;
    Ok(parse_batch_reader(file))
}

/// Parse delimited batch input from any reader
pub fn parse_batch_reader<R: Read>(input: R) -> BatchParseOutcome {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut rows: Vec<(usize, Vec<String>)> = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 1;
        match result {
            Ok(record) => {
                let fields: Vec<String> = record.iter().map(|f| f.to_string()).collect();
                if fields.iter().all(|f| f.is_empty()) {
                    continue;
                }
                rows.push((line, fields));
            }
            Err(err) => {
                warn!("batch line {}: unreadable row: {}", line, err);
                rows.push((line, Vec::new()));
            }
        }
    }

    // Header detection on the first non-empty row
    if let Some((line, first)) = rows.first() {
        if looks_like_header(first) {
            debug!("batch line {}: header row detected, skipping", line);
            rows.remove(0);
        }
    }

    validate_rows(rows)
}

/// A row is a header when its mac/ip columns fail field-level validation
fn looks_like_header(fields: &[String]) -> bool {
    if fields.len() < EXPECTED_COLUMNS {
        return false;
    }
    MacAddress::new(&fields[1]).is_err() && parse_ipv4(&fields[2]).is_err()
}

fn validate_rows(rows: Vec<(usize, Vec<String>)>) -> BatchParseOutcome {
    let mut outcome = BatchParseOutcome::default();

    // (value, line of first occurrence) per identity field
    let mut seen_hostnames: Vec<(String, usize)> = Vec::new();
    let mut seen_macs: Vec<(MacAddress, usize)> = Vec::new();
    let mut seen_ips: Vec<(std::net::Ipv4Addr, usize)> = Vec::new();

    for (line, fields) in rows {
        if fields.len() != EXPECTED_COLUMNS {
            outcome.errors.push(RowError::Format {
                line,
                expected: EXPECTED_COLUMNS,
                found: fields.len(),
            });
            continue;
        }

        let record = match HostRecord::parse(&fields[0], &fields[1], &fields[2]) {
            Ok(record) => record,
            Err(err) => {
                outcome.errors.push(RowError::Field {
                    line,
                    reason: field_reason(&err),
                });
                continue;
            }
        };

        if let Some((_, first_line)) = seen_hostnames
            .iter()
            .find(|(name, _)| name == record.hostname.as_str())
        {
            outcome.errors.push(RowError::Duplicate {
                line,
                field: "hostname",
                value: record.hostname.to_string(),
                first_line: *first_line,
            });
            continue;
        }
        if let Some((_, first_line)) = seen_macs.iter().find(|(mac, _)| *mac == record.mac) {
            outcome.errors.push(RowError::Duplicate {
                line,
                field: "mac",
                value: record.mac.canonical(),
                first_line: *first_line,
            });
            continue;
        }
        if let Some((_, first_line)) = seen_ips.iter().find(|(ip, _)| *ip == record.ip) {
            outcome.errors.push(RowError::Duplicate {
                line,
                field: "ip",
                value: record.ip.to_string(),
                first_line: *first_line,
            });
            continue;
        }

        seen_hostnames.push((record.hostname.as_str().to_string(), line));
        seen_macs.push((record.mac, line));
        seen_ips.push((record.ip, line));
        outcome.records.push(record);
    }

    outcome
}

fn field_reason(err: &RecordFieldError) -> String {
    err.to_string()
}
