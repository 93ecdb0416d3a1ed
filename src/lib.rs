//! Build farm provisioning orchestration
//!
//! This crate coordinates the systems a build farm host touches when it is
//! added or retired: DNS records, IPAM ownership, the DHCP reservation file,
//! the deployment playbook that pushes that file out, and per-host variable
//! files for configuration management.

pub mod adapters;
pub mod config;
pub mod deploy;
pub mod dhcp;
pub mod domain;
pub mod errors;
pub mod hostvars;
pub mod orchestrator;
pub mod retry;

// Re-export commonly used types
pub use config::ProvisioningConfig;
pub use errors::{ProvisioningError, ProvisioningResult};
pub use orchestrator::{Action, BatchReport, ProvisioningOrchestrator, Step, StepSet};
pub use retry::RetryPolicy;
