// Copyright (c) 2025 - Cowboy AI, Inc.

//! Nautobot IPAM Adapter
//!
//! Records address ownership in Nautobot so the IPAM source of truth stays in
//! step with DNS and DHCP. Addresses are stored as /32 host entries:
//!
//! ```text
//! GET    /api/ipam/ip-addresses/?address={ip}/32     lookup
//! POST   /api/ipam/ip-addresses/                     create
//! PATCH  /api/ipam/ip-addresses/{id}/                update dns_name
//! DELETE /api/ipam/ip-addresses/{id}/                release
//! ```
//!
//! Authentication is the `Authorization: Token <..>` header.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::IpamAdapter;
use crate::config::NautobotConfig;
use crate::domain::Hostname;
use crate::errors::{classify_status, ProvisioningError, ProvisioningResult};

#[derive(Debug, Clone, Deserialize)]
struct IpAddress {
    id: String,
    #[serde(default)]
    dns_name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct IpAddressList {
    #[serde(default)]
    results: Vec<IpAddress>,
}

#[derive(Debug, Serialize)]
struct IpAddressUpdate<'a> {
    dns_name: &'a str,
    description: &'a str,
}

/// Nautobot REST API client
pub struct NautobotClient {
    config: NautobotConfig,
    client: Client,
}

impl NautobotClient {
    pub fn new(config: NautobotConfig) -> ProvisioningResult<Self> {
        if config.url.is_empty() {
            return Err(ProvisioningError::Configuration(
                "Nautobot URL not set (NAUTOBOT_URL)".to_string(),
            ));
        }
        if config.token.is_empty() {
            return Err(ProvisioningError::Configuration(
                "Nautobot token not set (NAUTOBOT_TOKEN)".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                let auth = format!("Token {}", config.token);
                headers.insert(
                    reqwest::header::AUTHORIZATION,
                    auth.parse().map_err(|e| {
                        ProvisioningError::Configuration(format!("Invalid token: {}", e))
                    })?,
                );
                headers
            })
            .build()
            .map_err(|e| {
                ProvisioningError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        if !config.verify_ssl {
            warn!("TLS certificate verification disabled for Nautobot");
        }

        Ok(Self { config, client })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    /// Look up the /32 host entry for an address, None when absent
    async fn find_address(&self, ip: Ipv4Addr) -> ProvisioningResult<Option<IpAddress>> {
        let url = self.api_url("/api/ipam/ip-addresses/");
        let response = self
            .client
            .get(&url)
            .query(&[("address", format!("{}/32", ip))])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }
        let list: IpAddressList = response
            .json()
            .await
            .map_err(|e| ProvisioningError::Permanent(format!("bad IPAM payload: {}", e)))?;
        Ok(list.results.into_iter().next())
    }

    async fn check(&self, response: reqwest::Response) -> ProvisioningResult<()> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }
        Ok(())
    }
}

fn description_for(hostname: &Hostname) -> String {
    format!("Build farm host {}", hostname.short_name())
}

#[async_trait]
impl IpamAdapter for NautobotClient {
    async fn allocate(&self, ip: Ipv4Addr, hostname: &Hostname) -> ProvisioningResult<()> {
        let dns_name = hostname.as_str();
        let description = description_for(hostname);

        match self.find_address(ip).await? {
            Some(existing) => {
                if existing.dns_name == dns_name && existing.description == description {
                    debug!("IPAM entry for {} already up to date", ip);
                    return Ok(());
                }
                let url = self.api_url(&format!("/api/ipam/ip-addresses/{}/", existing.id));
                let response = self
                    .client
                    .patch(&url)
                    .json(&IpAddressUpdate {
                        dns_name,
                        description: &description,
                    })
                    .send()
                    .await?;
                self.check(response).await?;
                info!("updated IPAM entry {} -> {}", ip, dns_name);
            }
            None => {
                let url = self.api_url("/api/ipam/ip-addresses/");
                let response = self
                    .client
                    .post(&url)
                    .json(&json!({
                        "address": format!("{}/32", ip),
                        "status": "active",
                        "dns_name": dns_name,
                        "description": description,
                    }))
                    .send()
                    .await?;
                self.check(response).await?;
                info!("created IPAM entry {} -> {}", ip, dns_name);
            }
        }
        Ok(())
    }

    async fn release(&self, ip: Ipv4Addr) -> ProvisioningResult<()> {
        match self.find_address(ip).await? {
            Some(existing) => {
                let url = self.api_url(&format!("/api/ipam/ip-addresses/{}/", existing.id));
                let response = self.client.delete(&url).send().await?;
                self.check(response).await?;
                info!("released IPAM entry {}", ip);
            }
            None => {
                debug!("no IPAM entry for {}, nothing to release", ip);
            }
        }
        Ok(())
    }
}
