// Copyright (c) 2025 - Cowboy AI, Inc.

//! PowerDNS Zone API Adapter
//!
//! Manages A records through the PowerDNS REST API. Record changes ride on
//! the rrset PATCH endpoint with `changetype: REPLACE` / `DELETE`, the same
//! calls the server's own tooling uses:
//!
//! ```text
//! GET   /api/v1/servers/{server_id}/zones/{zone}      read rrsets
//! PATCH /api/v1/servers/{server_id}/zones/{zone}      mutate rrsets
//! ```
//!
//! Zone-internal names are absolute (trailing dot). Authentication is the
//! `X-API-Key` header.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, info};

use super::DnsAdapter;
use crate::config::PowerDnsConfig;
use crate::domain::Hostname;
use crate::errors::{classify_status, ProvisioningError, ProvisioningResult};

/// PowerDNS rrset as returned by the zone endpoint
#[derive(Debug, Clone, Deserialize)]
struct Rrset {
    name: String,
    #[serde(rename = "type")]
    rrset_type: String,
    #[serde(default)]
    records: Vec<RrsetRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct RrsetRecord {
    content: String,
    disabled: bool,
}

#[derive(Debug, Deserialize)]
struct Zone {
    #[serde(default)]
    rrsets: Vec<Rrset>,
}

/// Rrset change sent with PATCH
#[derive(Debug, Serialize)]
struct RrsetChange {
    name: String,
    #[serde(rename = "type")]
    rrset_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
    changetype: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    records: Vec<RrsetRecord>,
}

#[derive(Debug, Serialize)]
struct RrsetPatch {
    rrsets: Vec<RrsetChange>,
}

/// PowerDNS zone API client scoped to one zone
pub struct PowerDnsClient {
    config: PowerDnsConfig,
    zone: String,
    client: Client,
}

impl PowerDnsClient {
    /// Create a client for the given zone (the configured domain)
    pub fn new(config: PowerDnsConfig, zone: impl Into<String>) -> ProvisioningResult<Self> {
        if config.api_key.is_empty() {
            return Err(ProvisioningError::Configuration(
                "PowerDNS API key not set (POWERDNS_API_KEY)".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    "X-API-Key",
                    config.api_key.parse().map_err(|e| {
                        ProvisioningError::Configuration(format!("Invalid API key: {}", e))
                    })?,
                );
                headers
            })
            .build()
            .map_err(|e| {
                ProvisioningError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            config,
            zone: zone.into(),
            client,
        })
    }

    fn zone_url(&self) -> String {
        format!(
            "{}/api/v1/servers/{}/zones/{}",
            self.config.server_url.trim_end_matches('/'),
            self.config.server_id,
            self.zone
        )
    }

    /// Current A records for an absolute name, empty when none exist
    async fn existing_a_records(&self, fqdn: &str) -> ProvisioningResult<Vec<RrsetRecord>> {
        let response = self.client.get(self.zone_url()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }
        let zone: Zone = response
            .json()
            .await
            .map_err(|e| ProvisioningError::Permanent(format!("bad zone payload: {}", e)))?;

        Ok(zone
            .rrsets
            .into_iter()
            .find(|rrset| rrset.name == fqdn && rrset.rrset_type == "A")
            .map(|rrset| rrset.records)
            .unwrap_or_default())
    }

    async fn patch(&self, change: RrsetChange) -> ProvisioningResult<()> {
        let payload = RrsetPatch {
            rrsets: vec![change],
        };
        let response = self
            .client
            .patch(self.zone_url())
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }
        Ok(())
    }
}

#[async_trait]
impl DnsAdapter for PowerDnsClient {
    async fn upsert(&self, hostname: &Hostname, ip: Ipv4Addr) -> ProvisioningResult<()> {
        let fqdn = hostname.to_absolute();
        let desired = vec![RrsetRecord {
            content: ip.to_string(),
            disabled: false,
        }];

        let existing = self.existing_a_records(&fqdn).await?;
        if existing == desired {
            debug!("A record {} -> {} already present", fqdn, ip);
            return Ok(());
        }

        self.patch(RrsetChange {
            name: fqdn.clone(),
            rrset_type: "A",
            ttl: Some(self.config.record_ttl),
            changetype: "REPLACE",
            records: desired,
        })
        .await?;

        info!("upserted A record: {} -> {}", fqdn, ip);
        Ok(())
    }

    async fn delete(&self, hostname: &Hostname) -> ProvisioningResult<()> {
        let fqdn = hostname.to_absolute();

        let existing = self.existing_a_records(&fqdn).await?;
        if existing.is_empty() {
            debug!("no A records for {}, nothing to delete", fqdn);
            return Ok(());
        }

        self.patch(RrsetChange {
            name: fqdn.clone(),
            rrset_type: "A",
            ttl: None,
            changetype: "DELETE",
            records: Vec::new(),
        })
        .await?;

        info!("deleted A records for {}", fqdn);
        Ok(())
    }
}
