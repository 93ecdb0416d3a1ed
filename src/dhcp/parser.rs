// Copyright (c) 2025 - Cowboy AI, Inc.
//! Reservation file parser
//!
//! The reservation file is an ordered sequence of opaque text segments
//! interleaved with recognized `host` declaration blocks:
//!
//! ```text
//! host build-mac-01.macfarm.example.com {
//!   hardware ethernet 00:11:22:33:44:55;
//!   fixed-address 10.0.0.100;
//! }
//! ```
//!
//! Everything the scanner does not recognize (global options, subnet
//! declarations, comments) is carried as opaque text and rendered back
//! byte-for-byte. Untouched blocks keep their original text too, so a
//! mutation only rewrites the block it targets.

use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;
use thiserror::Error;

use crate::domain::{Hostname, MacAddress};

/// A DHCP host reservation: static binding of a hardware address to a
/// fixed IP, keyed by `mac`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DhcpReservation {
    pub hostname: Hostname,
    pub mac: MacAddress,
    pub ip: Ipv4Addr,
}

impl fmt::Display for DhcpReservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} -> {}", self.hostname, self.mac, self.ip)
    }
}

/// Structural errors in the reservation file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReservationParseError {
    #[error("unterminated host block '{0}'")]
    Unterminated(String),

    #[error("host block '{0}' has no 'hardware ethernet' statement")]
    MissingHardware(String),

    #[error("host block '{0}' has no 'fixed-address' statement")]
    MissingAddress(String),

    #[error("host block '{0}' declares '{1}' more than once")]
    DuplicateStatement(String, &'static str),

    #[error("host block '{0}': invalid {1} '{2}'")]
    InvalidValue(String, &'static str, String),

    #[error("duplicate MAC key {0} (blocks '{1}' and '{2}')")]
    DuplicateMac(String, String, String),
}

/// One segment of the parsed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Unrecognized text, preserved verbatim
    Opaque(String),
    /// A recognized host declaration block
    Block(ReservationBlock),
}

/// A recognized host block together with its original text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationBlock {
    pub reservation: DhcpReservation,
    /// Raw block text including the trailing newline; regenerated only
    /// when the block is updated in place
    pub raw: String,
}

impl ReservationBlock {
    /// Canonical block text for a reservation
    pub fn render(reservation: &DhcpReservation) -> String {
        format!(
            "host {} {{\n  hardware ethernet {};\n  fixed-address {};\n}}\n",
            reservation.hostname, reservation.mac, reservation.ip
        )
    }

    /// Build a block with canonical text
    pub fn canonical(reservation: DhcpReservation) -> Self {
        let raw = Self::render(&reservation);
        Self { reservation, raw }
    }
}

/// Parsed reservation file: ordered segments, render() reproduces the
/// input byte-for-byte as long as nothing was mutated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationFile {
    pub segments: Vec<Segment>,
}

impl ReservationFile {
    /// Parse file content into segments, failing on structurally broken
    /// host blocks. A parse failure doubles as validation failure.
    pub fn parse(content: &str) -> Result<Self, ReservationParseError> {
        let mut segments = Vec::new();
        let mut opaque = String::new();
        let mut lines = split_keep_ends(content).into_iter();

        while let Some(line) = lines.next() {
            match block_opener(&line).map(str::to_owned) {
                Some(name) => {
                    if !opaque.is_empty() {
                        segments.push(Segment::Opaque(std::mem::take(&mut opaque)));
                    }
                    let block = parse_block(&name, line, &mut lines)?;
                    segments.push(Segment::Block(block));
                }
                None => opaque.push_str(&line),
            }
        }

        if !opaque.is_empty() {
            segments.push(Segment::Opaque(opaque));
        }

        let file = Self { segments };
        file.check_unique_macs()?;
        Ok(file)
    }

    /// Render the file back to text
    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Opaque(text) => out.push_str(text),
                Segment::Block(block) => out.push_str(&block.raw),
            }
        }
        out
    }

    /// All declared reservations, in file order
    pub fn reservations(&self) -> Vec<DhcpReservation> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Block(block) => Some(block.reservation.clone()),
                Segment::Opaque(_) => None,
            })
            .collect()
    }

    /// Find the block index holding `mac`
    pub fn position_by_mac(&self, mac: &MacAddress) -> Option<usize> {
        self.segments.iter().position(|segment| {
            matches!(segment, Segment::Block(block) if block.reservation.mac == *mac)
        })
    }

    /// Find the block index declaring `hostname`
    pub fn position_by_hostname(&self, hostname: &Hostname) -> Option<usize> {
        self.segments.iter().position(|segment| {
            matches!(segment, Segment::Block(block) if block.reservation.hostname == *hostname)
        })
    }

    /// Insert or update a reservation keyed by MAC; returns true when the
    /// rendered content changed.
    ///
    /// A block already holding the MAC is replaced in place (its position
    /// and all surrounding text preserved); otherwise a canonical block is
    /// appended at the end of the file.
    pub fn upsert(&mut self, reservation: DhcpReservation) -> bool {
        if let Some(idx) = self.position_by_mac(&reservation.mac) {
            let new_block = ReservationBlock::canonical(reservation);
            if let Segment::Block(existing) = &self.segments[idx] {
                if existing.reservation == new_block.reservation {
                    return false;
                }
            }
            self.segments[idx] = Segment::Block(new_block);
            return true;
        }

        // Separate the appended block from a file that doesn't end in a
        // newline
        if let Some(Segment::Opaque(text)) = self.segments.last_mut() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
        }
        self.segments
            .push(Segment::Block(ReservationBlock::canonical(reservation)));
        true
    }

    /// Remove the block at `idx`; surrounding text untouched
    fn remove_at(&mut self, idx: usize) {
        self.segments.remove(idx);
    }

    /// Remove by hostname; returns true when a block was excised
    pub fn remove_by_hostname(&mut self, hostname: &Hostname) -> bool {
        match self.position_by_hostname(hostname) {
            Some(idx) => {
                self.remove_at(idx);
                true
            }
            None => false,
        }
    }

    /// Remove by MAC; returns true when a block was excised
    pub fn remove_by_mac(&mut self, mac: &MacAddress) -> bool {
        match self.position_by_mac(mac) {
            Some(idx) => {
                self.remove_at(idx);
                true
            }
            None => false,
        }
    }

    /// Two reservations sharing a MAC is an invalid state regardless of
    /// hostname or IP
    fn check_unique_macs(&self) -> Result<(), ReservationParseError> {
        let reservations = self.reservations();
        for (i, a) in reservations.iter().enumerate() {
            for b in &reservations[i + 1..] {
                if a.mac == b.mac {
                    return Err(ReservationParseError::DuplicateMac(
                        a.mac.canonical(),
                        a.hostname.to_string(),
                        b.hostname.to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Split text into lines keeping their line endings
fn split_keep_ends(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (idx, ch) in content.char_indices() {
        if ch == '\n' {
            lines.push(content[start..=idx].to_string());
            start = idx + 1;
        }
    }
    if start < content.len() {
        lines.push(content[start..].to_string());
    }
    lines
}

/// Recognize `host <name> {` (leading whitespace allowed) and return the name
fn block_opener(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix("host ")?;
    let brace = rest.find('{')?;
    // Nothing but whitespace may follow the opening brace
    if !rest[brace + 1..].trim().is_empty() {
        return None;
    }
    let name = rest[..brace].trim();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn parse_block<I>(
    name: &str,
    opener: String,
    lines: &mut I,
) -> Result<ReservationBlock, ReservationParseError>
where
    I: Iterator<Item = String>,
{
    let name = name.to_string();
    let hostname = Hostname::new(&name).map_err(|_| {
        ReservationParseError::InvalidValue(name.clone(), "hostname", name.clone())
    })?;

    let mut raw = opener;
    let mut mac: Option<MacAddress> = None;
    let mut ip: Option<Ipv4Addr> = None;
    let mut closed = false;

    for line in lines.by_ref() {
        raw.push_str(&line);
        let trimmed = line.trim();

        if trimmed == "}" {
            closed = true;
            break;
        }

        if let Some(value) = statement_value(trimmed, "hardware ethernet") {
            if mac.is_some() {
                return Err(ReservationParseError::DuplicateStatement(
                    name,
                    "hardware ethernet",
                ));
            }
            mac = Some(MacAddress::new(value).map_err(|_| {
                ReservationParseError::InvalidValue(name.clone(), "mac", value.to_string())
            })?);
        } else if let Some(value) = statement_value(trimmed, "fixed-address") {
            if ip.is_some() {
                return Err(ReservationParseError::DuplicateStatement(
                    name,
                    "fixed-address",
                ));
            }
            ip = Some(crate::domain::parse_ipv4(value).map_err(|_| {
                ReservationParseError::InvalidValue(name.clone(), "ip", value.to_string())
            })?);
        }
        // Other statements inside the block are tolerated and preserved
    }

    if !closed {
        return Err(ReservationParseError::Unterminated(name));
    }

    let mac = mac.ok_or_else(|| ReservationParseError::MissingHardware(name.clone()))?;
    let ip = ip.ok_or_else(|| ReservationParseError::MissingAddress(name.clone()))?;

    Ok(ReservationBlock {
        reservation: DhcpReservation { hostname, mac, ip },
        raw,
    })
}

/// Extract the value of a `<keyword> <value>;` statement
fn statement_value<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    let rest = rest.trim();
    rest.strip_suffix(';').map(str::trim)
}
