// Copyright (c) 2025 - Cowboy AI, Inc.
//! Hostname Value Object with DNS Validation Invariants

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Hostname validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostnameError {
    #[error("Hostname is empty")]
    Empty,

    #[error("Hostname exceeds maximum length of 253 characters: {0}")]
    TooLong(usize),

    #[error("Label exceeds maximum length of 63 characters: {0}")]
    LabelTooLong(String),

    #[error("Invalid character in hostname: {0}")]
    InvalidCharacter(char),

    #[error("Label cannot start or end with hyphen: {0}")]
    InvalidLabelFormat(String),
}

/// Hostname value object
///
/// Represents a valid DNS hostname following RFC 1123 with invariants:
/// - Total length ≤ 253 characters
/// - Each label ≤ 63 characters
/// - Labels contain only alphanumeric and hyphens
/// - Labels cannot start or end with hyphens
///
/// Stored lowercase so two spellings of the same host compare equal.
///
/// # Examples
///
/// ```rust
/// use cim_provisioning::domain::Hostname;
///
/// let host = Hostname::new("build-mac-01").unwrap();
/// let fqdn = host.qualify("macfarm.example.com");
/// assert_eq!(fqdn.as_str(), "build-mac-01.macfarm.example.com");
///
/// // Already-qualified names are left alone
/// assert_eq!(fqdn.qualify("macfarm.example.com").as_str(), fqdn.as_str());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hostname(String);

impl Hostname {
    /// Maximum total length for FQDN (RFC 1123)
    pub const MAX_LENGTH: usize = 253;

    /// Maximum length for a single label (RFC 1123)
    pub const MAX_LABEL_LENGTH: usize = 63;

    /// Create a new hostname with validation
    pub fn new(hostname: impl Into<String>) -> Result<Self, HostnameError> {
        let hostname = hostname.into().to_lowercase();

        if hostname.is_empty() {
            return Err(HostnameError::Empty);
        }

        if hostname.len() > Self::MAX_LENGTH {
            return Err(HostnameError::TooLong(hostname.len()));
        }

        for label in hostname.split('.') {
            Self::validate_label(label)?;
        }

        Ok(Self(hostname))
    }

    fn validate_label(label: &str) -> Result<(), HostnameError> {
        if label.is_empty() {
            return Err(HostnameError::Empty);
        }

        if label.len() > Self::MAX_LABEL_LENGTH {
            return Err(HostnameError::LabelTooLong(label.to_string()));
        }

        for ch in label.chars() {
            if !ch.is_ascii_alphanumeric() && ch != '-' {
                return Err(HostnameError::InvalidCharacter(ch));
            }
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(HostnameError::InvalidLabelFormat(label.to_string()));
        }

        Ok(())
    }

    /// Get the hostname as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the short name (first label before first dot)
    pub fn short_name(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// Check if this is a fully qualified domain name (contains dots)
    pub fn is_fqdn(&self) -> bool {
        self.0.contains('.')
    }

    /// Append the domain suffix unless the name already carries it.
    ///
    /// Exactly one fully-qualified form results: qualifying an
    /// already-qualified name is the identity.
    pub fn qualify(&self, domain: &str) -> Self {
        let domain = domain.trim_end_matches('.').to_lowercase();
        if domain.is_empty()
            || self.0 == domain
            || self.0.ends_with(&format!(".{}", domain))
        {
            self.clone()
        } else {
            Self(format!("{}.{}", self.0, domain))
        }
    }

    /// Zone-API form: fully qualified name with a trailing dot
    pub fn to_absolute(&self) -> String {
        format!("{}.", self.0)
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Hostname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Hostname {
    type Error = HostnameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
