// Copyright (c) 2025 - Cowboy AI, Inc.
//! DHCP Reservation Store
//!
//! Owns the single shared reservation file. All mutation goes through this
//! type, which holds the only write path:
//!
//! read current file → apply in-memory mutation → validate the mutated
//! content → write a temp file in the same directory → take a timestamped
//! backup of the pre-mutation file → atomically replace the original.
//!
//! On validation failure the temp content is discarded and the original is
//! left untouched. Mutations that change nothing skip the write entirely,
//! so no backup churn and the file stays byte-identical.
//!
//! Concurrency: mutation takes `&mut self`; callers serialize access to one
//! store per file path. The read-modify-write sequence is not safe under
//! concurrent writers.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info};

use super::parser::{DhcpReservation, ReservationFile, ReservationParseError};
use crate::config::DhcpConfig;
use crate::domain::{Hostname, MacAddress};
use crate::errors::{ProvisioningError, ProvisioningResult};

/// Sole owner of the reservation file's write path
#[derive(Debug)]
pub struct ReservationStore {
    path: PathBuf,
    backup: bool,
}

impl ReservationStore {
    pub fn new(config: &DhcpConfig) -> Self {
        Self {
            path: config.conf_path.clone(),
            backup: config.backup,
        }
    }

    /// Open a store over an explicit path, with backups enabled
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup: true,
        }
    }

    /// Disable pre-replace backups
    pub fn without_backup(mut self) -> Self {
        self.backup = false;
        self
    }

    /// Path of the reservation file this store owns
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add or update a reservation keyed by its MAC address.
    ///
    /// An existing block with the same MAC is replaced in place, preserving
    /// its position and all surrounding text; otherwise a canonical block
    /// is appended. Returns whether the file changed.
    pub fn add(&mut self, reservation: &DhcpReservation) -> ProvisioningResult<bool> {
        let (original, mut file) = self.load()?;

        if !file.upsert(reservation.clone()) {
            debug!("reservation {} already present, no change", reservation);
            return Ok(false);
        }

        self.persist(&original, file.render())?;
        info!("added reservation: {}", reservation);
        Ok(true)
    }

    /// Remove the reservation declared for `hostname`, falling back to a
    /// lookup by `mac`. Removing a non-existent entry is a no-op success
    /// and leaves the file byte-identical.
    pub fn remove(
        &mut self,
        hostname: &Hostname,
        mac: Option<&MacAddress>,
    ) -> ProvisioningResult<bool> {
        let (original, mut file) = self.load()?;

        let removed = file.remove_by_hostname(hostname)
            || mac.map(|mac| file.remove_by_mac(mac)).unwrap_or(false);

        if !removed {
            debug!("no reservation for {}, nothing to remove", hostname);
            return Ok(false);
        }

        self.persist(&original, file.render())?;
        info!("removed reservation for {}", hostname);
        Ok(true)
    }

    /// List all currently declared reservations, in file order
    pub fn export(&self) -> ProvisioningResult<Vec<DhcpReservation>> {
        let (_, file) = self.load()?;
        Ok(file.reservations())
    }

    /// Structural check: balanced declaration blocks, exactly one
    /// `hardware ethernet` / `fixed-address` pair each, unique MAC keys
    pub fn validate(content: &str) -> ProvisioningResult<()> {
        ReservationFile::parse(content)
            .map(|_| ())
            .map_err(classify_parse_error)
    }

    fn load(&self) -> ProvisioningResult<(String, ReservationFile)> {
        let content = std::fs::read_to_string(&self.path).map_err(|err| {
            ProvisioningError::Io(format!(
                "failed reading {}: {}",
                self.path.display(),
                err
            ))
        })?;
        let file = ReservationFile::parse(&content).map_err(classify_parse_error)?;
        Ok((content, file))
    }

    /// Validate-then-atomic-replace. The temp file lives in the same
    /// directory so the final rename cannot cross filesystems.
    fn persist(&self, original: &str, mutated: String) -> ProvisioningResult<()> {
        Self::validate(&mutated)?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|err| {
            ProvisioningError::Io(format!("failed creating temp file: {}", err))
        })?;
        std::io::Write::write_all(&mut temp, mutated.as_bytes())
            .map_err(|err| ProvisioningError::Io(format!("failed writing temp file: {}", err)))?;

        if self.backup {
            let backup_path = self.backup_path();
            std::fs::write(&backup_path, original).map_err(|err| {
                ProvisioningError::Io(format!(
                    "failed writing backup {}: {}",
                    backup_path.display(),
                    err
                ))
            })?;
            debug!("backup created: {}", backup_path.display());
        }

        temp.persist(&self.path).map_err(|err| {
            ProvisioningError::Io(format!(
                "failed replacing {}: {}",
                self.path.display(),
                err
            ))
        })?;
        Ok(())
    }

    fn backup_path(&self) -> PathBuf {
        let ts = Local::now().format("%Y%m%d-%H%M%S");
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}.bak", ts));
        PathBuf::from(name)
    }
}

/// One MAC claimed by two blocks is a conflict; every other structural
/// defect is an invalid file
fn classify_parse_error(err: ReservationParseError) -> ProvisioningError {
    match err {
        ReservationParseError::DuplicateMac(..) => ProvisioningError::Conflict(err.to_string()),
        _ => ProvisioningError::InvalidConfig(err.to_string()),
    }
}
