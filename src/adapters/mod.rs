// Copyright (c) 2025 - Cowboy AI, Inc.

//! Remote collaborator adapters
//!
//! The orchestrator drives DNS and IPAM through these traits; the concrete
//! clients talk to PowerDNS and Nautobot. Both contracts are idempotent:
//! calling an operation twice with the same arguments succeeds, which the
//! orchestrator relies on for retry and for `add`-on-existing semantics.
//!
//! Adapter errors carry the transient/permanent classification from
//! [`crate::errors`]: connect failures, timeouts, and 429/5xx responses are
//! `Transient` (eligible for bounded retry); other rejections are
//! `Permanent` and surface immediately.

use async_trait::async_trait;
use std::net::Ipv4Addr;

use crate::domain::Hostname;
use crate::errors::ProvisioningResult;

pub mod nautobot;
pub mod powerdns;

pub use nautobot::NautobotClient;
pub use powerdns::PowerDnsClient;

/// Name-to-address mapping in a remote zone
#[async_trait]
pub trait DnsAdapter: Send + Sync {
    /// Create or replace the A record for `hostname`
    async fn upsert(&self, hostname: &Hostname, ip: Ipv4Addr) -> ProvisioningResult<()>;

    /// Delete the A record for `hostname`; absent record is success
    async fn delete(&self, hostname: &Hostname) -> ProvisioningResult<()>;
}

/// Address allocation in a remote inventory
#[async_trait]
pub trait IpamAdapter: Send + Sync {
    /// Register `ip` as allocated, annotated with its hostname
    async fn allocate(&self, ip: Ipv4Addr, hostname: &Hostname) -> ProvisioningResult<()>;

    /// Release the allocation for `ip`; absent allocation is success
    async fn release(&self, ip: Ipv4Addr) -> ProvisioningResult<()>;
}
