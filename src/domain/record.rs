// Copyright (c) 2025 - Cowboy AI, Inc.
//! Typed host record produced by batch validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use super::hostname::{Hostname, HostnameError};
use super::network::{parse_ipv4, MacAddress, NetworkError};

/// A validated machine record: the unit of work for one provisioning pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Fully or partially qualified hostname (qualified against the
    /// configured domain before any collaborator sees it)
    pub hostname: Hostname,

    /// Hardware address, canonical colon-separated form
    pub mac: MacAddress,

    /// Fixed IPv4 address for the reservation and A record
    pub ip: Ipv4Addr,
}

impl HostRecord {
    /// Build a record from raw field strings, validating each field
    pub fn parse(
        hostname: &str,
        mac: &str,
        ip: &str,
    ) -> Result<Self, RecordFieldError> {
        let hostname = Hostname::new(hostname).map_err(RecordFieldError::Hostname)?;
        let mac = MacAddress::new(mac).map_err(RecordFieldError::Mac)?;
        let ip = parse_ipv4(ip).map_err(RecordFieldError::Ip)?;
        Ok(Self { hostname, mac, ip })
    }

    /// Return the record with its hostname qualified against `domain`
    pub fn qualified(&self, domain: &str) -> Self {
        Self {
            hostname: self.hostname.qualify(domain),
            mac: self.mac,
            ip: self.ip,
        }
    }
}

impl fmt::Display for HostRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} -> {}", self.hostname, self.mac, self.ip)
    }
}

/// Which field of a row failed its syntactic check
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordFieldError {
    #[error("invalid hostname: {0}")]
    Hostname(#[from] HostnameError),

    #[error("invalid mac: {0}")]
    Mac(NetworkError),

    #[error("invalid ip: {0}")]
    Ip(NetworkError),
}
