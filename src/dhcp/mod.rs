// Copyright (c) 2025 - Cowboy AI, Inc.
//! DHCP reservation file handling
//!
//! [`ReservationFile`] models the file as opaque text segments interleaved
//! with recognized host blocks; [`ReservationStore`] owns the single write
//! path with the validate-then-atomic-replace persistence protocol.

pub mod parser;
pub mod store;

pub use parser::{
    DhcpReservation, ReservationBlock, ReservationFile, ReservationParseError, Segment,
};
pub use store::ReservationStore;
