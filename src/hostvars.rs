// Copyright (c) 2025 - Cowboy AI, Inc.

//! Per-Host Variable File Generation
//!
//! Writes one YAML file per provisioned host into the configuration
//! management variable directory. Files are named `<fqdn>.yml` and carry the
//! identity facts later playbook runs expect.

use serde::Serialize;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::domain::HostRecord;
use crate::errors::{ProvisioningError, ProvisioningResult};

/// Variables emitted for one host
#[derive(Debug, Serialize)]
pub struct HostVars<'a> {
    pub my_hostname: &'a str,
    pub my_shortname: &'a str,
    pub static_ip: Ipv4Addr,
}

/// Writes `<dir>/<fqdn>.yml` variable files
pub struct HostVarsGenerator {
    dir: PathBuf,
    /// Overwrite files whose content differs from what would be written
    pub force: bool,
}

impl HostVarsGenerator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            force: false,
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Path the file for a record lands at
    pub fn path_for(&self, record: &HostRecord) -> PathBuf {
        self.dir.join(format!("{}.yml", record.hostname.as_str()))
    }

    /// Write the variable file for one record.
    ///
    /// Returns `Ok(true)` when the file was written, `Ok(false)` when an
    /// identical file already exists. A file with different content fails
    /// with `AlreadyExists` unless `force` is set.
    pub fn generate(&self, record: &HostRecord) -> ProvisioningResult<bool> {
        let vars = HostVars {
            my_hostname: record.hostname.as_str(),
            my_shortname: record.hostname.short_name(),
            static_ip: record.ip,
        };
        let content = serde_yaml::to_string(&vars)
            .map_err(|e| ProvisioningError::Serialization(e.to_string()))?;

        let path = self.path_for(record);
        if path.exists() {
            let existing = fs::read_to_string(&path)?;
            if existing == content {
                debug!("host vars for {} already current", record.hostname);
                return Ok(false);
            }
            if !self.force {
                return Err(ProvisioningError::AlreadyExists(format!(
                    "host vars file {} exists with different content",
                    path.display()
                )));
            }
        }

        fs::create_dir_all(&self.dir)?;
        write_atomic(&self.dir, &path, &content)?;
        info!("wrote host vars: {}", path.display());
        Ok(true)
    }
}

/// Write through a temp file in the same directory so readers never observe
/// a partial file
fn write_atomic(dir: &Path, path: &Path, content: &str) -> ProvisioningResult<()> {
    let temp = tempfile::NamedTempFile::new_in(dir)?;
    fs::write(temp.path(), content)?;
    temp.persist(path)
        .map_err(|e| ProvisioningError::from(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> HostRecord {
        HostRecord::parse(
            "build-mac-01.macfarm.example.com",
            "aa:bb:cc:dd:ee:01",
            "10.0.0.11",
        )
        .unwrap()
    }

    #[test]
    fn test_generate_writes_expected_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let gen = HostVarsGenerator::new(dir.path());

        assert!(gen.generate(&record()).unwrap());

        let path = dir
            .path()
            .join("build-mac-01.macfarm.example.com.yml");
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("my_hostname: build-mac-01.macfarm.example.com"));
        assert!(content.contains("my_shortname: build-mac-01"));
        assert!(content.contains("static_ip: 10.0.0.11"));
    }

    #[test]
    fn test_generate_identical_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let gen = HostVarsGenerator::new(dir.path());

        assert!(gen.generate(&record()).unwrap());
        assert!(!gen.generate(&record()).unwrap());
    }

    #[test]
    fn test_generate_conflicting_fails_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let gen = HostVarsGenerator::new(dir.path());
        let path = dir
            .path()
            .join("build-mac-01.macfarm.example.com.yml");
        fs::write(&path, "my_hostname: something-else\n").unwrap();

        let err = gen.generate(&record()).unwrap_err();
        assert!(matches!(err, ProvisioningError::AlreadyExists(_)));

        let forced = gen.with_force(true);
        assert!(forced.generate(&record()).unwrap());
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("static_ip: 10.0.0.11"));
    }
}
