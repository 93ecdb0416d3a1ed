// Copyright (c) 2025 - Cowboy AI, Inc.

//! Deployment Trigger
//!
//! Pushes the mutated reservation file out to the DHCP service. The batch
//! runs this once, after all reservation changes have landed, not per host.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::DhcpConfig;
use crate::errors::{ProvisioningError, ProvisioningResult};

/// Batch-level deployment hook
#[async_trait]
pub trait DeploymentTrigger: Send + Sync {
    async fn deploy(&self) -> ProvisioningResult<()>;
}

/// Runs the deployment playbook against the configured inventory
pub struct AnsibleDeployer {
    program: String,
    playbook: PathBuf,
    inventory: PathBuf,
}

impl AnsibleDeployer {
    pub fn new(config: &DhcpConfig) -> Self {
        Self {
            program: "ansible-playbook".to_string(),
            playbook: config.deploy_playbook.clone(),
            inventory: config.inventory.clone(),
        }
    }

    /// Override the playbook runner binary
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl DeploymentTrigger for AnsibleDeployer {
    async fn deploy(&self) -> ProvisioningResult<()> {
        info!(
            "deploying reservation file via {} (inventory {})",
            self.playbook.display(),
            self.inventory.display()
        );

        let output = Command::new(&self.program)
            .arg(&self.playbook)
            .arg("-i")
            .arg(&self.inventory)
            .output()
            .await
            .map_err(|err| {
                ProvisioningError::Deployment(format!(
                    "failed to launch {}: {}",
                    self.program, err
                ))
            })?;

        if output.status.success() {
            info!("deployment playbook completed");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("deployment playbook failed: {}", stderr.trim());
            Err(ProvisioningError::Deployment(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )))
        }
    }
}
