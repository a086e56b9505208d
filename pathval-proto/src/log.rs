//! Diagnostic hooks for path validation
//!
//! [`PathValidator`](crate::PathValidator) reports what it does to a [`ValidationLog`]. None of
//! the hooks can fail, and nothing a sink does feeds back into the validation state.

// Default hook bodies ignore their arguments
#![allow(unused_variables)]

use tracing::{debug, trace};

use crate::{
    path::PathView,
    shared::DestinationCid,
    validation::{ChallengeData, ChallengeEntry, ValidateError},
    Instant,
};

/// Receives notifications about the progress of a path validation
///
/// Every method has an empty default implementation, so a sink only needs to override the
/// events it is interested in.
pub trait ValidationLog {
    /// A PATH_CHALLENGE carrying `data` was recorded as outstanding until `expiry`
    fn challenge_sent(&mut self, dcid: &DestinationCid, data: &ChallengeData, expiry: Instant) {}

    /// An outstanding challenge was discarded to make room for a newer one
    fn challenge_overwritten(&mut self, dcid: &DestinationCid, entry: &ChallengeEntry) {}

    /// An outstanding challenge expired without a response
    fn challenge_lost(&mut self, dcid: &DestinationCid, entry: &ChallengeEntry, now: Instant) {}

    /// A PATH_RESPONSE matched an outstanding challenge
    ///
    /// `on_expected_path` is false if the response arrived on a path other than the one the
    /// destination connection ID is used on.
    fn validated(&mut self, dcid: &DestinationCid, path: PathView<'_>, on_expected_path: bool) {}

    /// A PATH_RESPONSE was disregarded
    fn response_ignored(
        &mut self,
        dcid: &DestinationCid,
        data: &ChallengeData,
        reason: ValidateError,
    ) {
    }
}

/// Emits every notification as a `tracing` event
#[derive(Debug, Default, Copy, Clone)]
pub struct TracingLog;

impl ValidationLog for TracingLog {
    fn challenge_sent(&mut self, dcid: &DestinationCid, data: &ChallengeData, expiry: Instant) {
        trace!(dcid = %dcid.cid, %data, ?expiry, "path challenge outstanding");
    }

    fn challenge_overwritten(&mut self, dcid: &DestinationCid, entry: &ChallengeEntry) {
        trace!(dcid = %dcid.cid, data = %entry.data(), "dropping oldest path challenge");
    }

    fn challenge_lost(&mut self, dcid: &DestinationCid, entry: &ChallengeEntry, now: Instant) {
        trace!(
            dcid = %dcid.cid,
            data = %entry.data(),
            late = ?now.saturating_duration_since(entry.expiry()),
            "path challenge lost"
        );
    }

    fn validated(&mut self, dcid: &DestinationCid, path: PathView<'_>, on_expected_path: bool) {
        if !on_expected_path {
            debug!(dcid = %dcid.cid, %path, expected = %dcid.path, "path response on unexpected path");
        }
        debug!(dcid = %dcid.cid, path = %dcid.path, "path validated");
    }

    fn response_ignored(
        &mut self,
        dcid: &DestinationCid,
        data: &ChallengeData,
        reason: ValidateError,
    ) {
        match reason {
            ValidateError::InvalidState => {
                debug!(dcid = %dcid.cid, %data, "path response without outstanding challenge")
            }
            ValidateError::InvalidArgument => {
                trace!(dcid = %dcid.cid, %data, "ignoring unknown path response")
            }
        }
    }
}

/// Discards every notification
#[derive(Debug, Default, Copy, Clone)]
pub struct NoopLog;

impl ValidationLog for NoopLog {}
