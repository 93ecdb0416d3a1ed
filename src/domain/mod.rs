// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning Domain Models
//!
//! Value objects with validation invariants for build-farm host records:
//!
//! - [`Hostname`] - DNS-validated hostnames (RFC 1123), FQDN qualification
//! - [`MacAddress`] - 48-bit hardware address, canonical colon form
//! - [`HostRecord`] - validated `{hostname, mac, ip}` unit of work
//!
//! Batch parsing ([`parse_batch_file`]) turns tabular input into records
//! with per-row structured errors and in-batch duplicate detection.

pub mod batch;
pub mod hostname;
pub mod network;
pub mod record;

pub use batch::{parse_batch_file, parse_batch_reader, BatchParseOutcome, RowError};
pub use hostname::{Hostname, HostnameError};
pub use network::{parse_ipv4, MacAddress, NetworkError};
pub use record::{HostRecord, RecordFieldError};
