// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning Configuration
//!
//! Immutable configuration loaded once at process start and threaded through
//! every component at construction time. Components never read the
//! environment ad hoc.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{ProvisioningError, ProvisioningResult};

fn default_timeout() -> u64 {
    30
}

fn default_ttl() -> u32 {
    3600
}

/// PowerDNS zone API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerDnsConfig {
    /// API base URL (e.g., "http://localhost:8084")
    pub server_url: String,

    /// API key sent as `X-API-Key`
    pub api_key: String,

    /// PowerDNS server id (almost always "localhost")
    pub server_id: String,

    /// TTL for created A records
    #[serde(default = "default_ttl")]
    pub record_ttl: u32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for PowerDnsConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8084".to_string(),
            api_key: String::new(),
            server_id: "localhost".to_string(),
            record_ttl: 3600,
            timeout_secs: 30,
        }
    }
}

/// Nautobot IPAM API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NautobotConfig {
    /// Nautobot base URL
    pub url: String,

    /// API token sent as `Authorization: Token <..>`
    pub token: String,

    /// Verify TLS certificates (internal servers often use self-signed certs)
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_verify_ssl() -> bool {
    true
}

impl Default for NautobotConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            token: String::new(),
            verify_ssl: true,
            timeout_secs: 30,
        }
    }
}

/// Reservation file and deployment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DhcpConfig {
    /// Path to the shared reservation file (dhcpd.conf)
    pub conf_path: PathBuf,

    /// Keep a timestamped backup before every successful replace
    #[serde(default = "default_backup")]
    pub backup: bool,

    /// Playbook that pushes the reservation file to the DHCP service
    pub deploy_playbook: PathBuf,

    /// Inventory passed to the deployment run
    pub inventory: PathBuf,
}

fn default_backup() -> bool {
    true
}

impl Default for DhcpConfig {
    fn default() -> Self {
        Self {
            conf_path: PathBuf::from("dhcpd.conf"),
            backup: true,
            deploy_playbook: PathBuf::from("dhcpd_deploy.yml"),
            inventory: PathBuf::from("hosts.ini"),
        }
    }
}

/// Top-level provisioning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    pub powerdns: PowerDnsConfig,
    pub nautobot: NautobotConfig,
    pub dhcp: DhcpConfig,

    /// Domain suffix appended to unqualified hostnames
    pub domain: String,

    /// Directory receiving per-host variable files
    pub host_vars_dir: PathBuf,
}

impl ProvisioningConfig {
    /// Load configuration from environment variables.
    ///
    /// Credentials are required only when the step that needs them is
    /// enabled; this loader therefore tolerates missing keys and lets the
    /// adapters fail with a `Configuration` error at construction if their
    /// credential is absent.
    pub fn from_env() -> ProvisioningResult<Self> {
        let powerdns = PowerDnsConfig {
            server_url: std::env::var("POWERDNS_SERVER_URL")
                .unwrap_or_else(|_| "http://localhost:8084".to_string()),
            api_key: std::env::var("POWERDNS_API_KEY").unwrap_or_default(),
            server_id: std::env::var("POWERDNS_SERVER_ID")
                .unwrap_or_else(|_| "localhost".to_string()),
            record_ttl: 3600,
            timeout_secs: default_timeout(),
        };

        let nautobot = NautobotConfig {
            url: std::env::var("NAUTOBOT_URL").unwrap_or_default(),
            token: std::env::var("NAUTOBOT_TOKEN").unwrap_or_default(),
            verify_ssl: std::env::var("NAUTOBOT_VERIFY_SSL")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            timeout_secs: default_timeout(),
        };

        let dhcp = DhcpConfig {
            conf_path: std::env::var("DHCPD_CONF_PATH")
                .map(PathBuf::from)
                .map_err(|_| {
                    ProvisioningError::Configuration("DHCPD_CONF_PATH not set".to_string())
                })?,
            backup: true,
            deploy_playbook: std::env::var("DHCP_DEPLOY_PLAYBOOK")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("dhcpd_deploy.yml")),
            inventory: std::env::var("ANSIBLE_INVENTORY")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("hosts.ini")),
        };

        let domain =
            std::env::var("DHCPD_DOMAIN").unwrap_or_else(|_| "macfarm.example.com".to_string());

        let host_vars_dir = std::env::var("HOST_VARS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("host_vars"));

        Ok(Self {
            powerdns,
            nautobot,
            dhcp,
            domain,
            host_vars_dir,
        })
    }

    /// Set the domain suffix
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Request timeout for DNS API calls
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.powerdns.timeout_secs)
    }

    /// Request timeout for IPAM API calls
    pub fn ipam_timeout(&self) -> Duration {
        Duration::from_secs(self.nautobot.timeout_secs)
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            powerdns: PowerDnsConfig::default(),
            nautobot: NautobotConfig::default(),
            dhcp: DhcpConfig::default(),
            domain: "macfarm.example.com".to_string(),
            host_vars_dir: PathBuf::from("host_vars"),
        }
    }
}
