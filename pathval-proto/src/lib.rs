//! Path validation logic for the QUIC protocol
//!
//! pathval-proto contains a fully deterministic implementation of the state a QUIC connection
//! keeps while proving that a candidate network path is reachable (RFC 9000 §8.2). It contains
//! no networking code and does not get any relevant timestamps from the operating system: the
//! owning connection passes an [`Instant`] into every time-aware operation, encodes and decodes
//! PATH_CHALLENGE and PATH_RESPONSE frames itself, and hands only the raw challenge data over.
//!
//! The most important type is [`PathValidator`], which tracks the outstanding challenges for a
//! single validation attempt. [`NetworkPath`] and [`PathView`] describe the address pair being
//! validated, the former owning its address storage and the latter borrowing it.

#![warn(missing_docs)]
#![cfg_attr(test, allow(dead_code))]

use std::time::Duration;

mod config;
pub use crate::config::{ConfigError, ValidationConfig};

mod constant_time;

mod log;
pub use crate::log::{NoopLog, TracingLog, ValidationLog};

mod path;
pub use crate::path::{Address, AddressBuf, AddressFamily, NetworkPath, PathView};

mod ring;

mod shared;
pub use crate::shared::{ConnectionId, DestinationCid, OutOfMemory, ResetToken};

mod validation;
pub use crate::validation::{
    ChallengeData, ChallengeEntry, PathValidator, ValidateError, ValidationFlags,
    ValidationStats,
};

#[cfg(test)]
mod tests;

#[doc(no_inline)]
pub use std::time::Instant;

/// Maximum number of PATH_CHALLENGE frames a single validation keeps track of
///
/// Must be a power of two.
pub const MAX_CHALLENGES: usize = 4;
/// Length of the data carried by PATH_CHALLENGE and PATH_RESPONSE frames
pub const CHALLENGE_DATA_LEN: usize = 8;

//
// Useful internal constants
//

const RESET_TOKEN_SIZE: usize = 16;
const MAX_CID_SIZE: usize = 20;
const TIMER_GRANULARITY: Duration = Duration::from_millis(1);
