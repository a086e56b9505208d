use std::{
    fmt,
    ops::{BitOr, BitOrAssign},
    time::Duration,
};

use rand::RngCore;
use thiserror::Error;

use crate::{
    config::ValidationConfig,
    constant_time,
    log::{TracingLog, ValidationLog},
    path::PathView,
    ring::FixedRing,
    shared::{DestinationCid, OutOfMemory},
    Instant, CHALLENGE_DATA_LEN, MAX_CHALLENGES, TIMER_GRANULARITY,
};

/// Data carried by a PATH_CHALLENGE frame and echoed back in the PATH_RESPONSE
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ChallengeData([u8; CHALLENGE_DATA_LEN]);

impl ChallengeData {
    /// Generate unpredictable challenge data
    ///
    /// RFC 9000 §8.2.1 requires challenge data to be hard to guess, so `rng` should be a
    /// cryptographically secure generator.
    pub fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut data = [0; CHALLENGE_DATA_LEN];
        rng.fill_bytes(&mut data);
        Self(data)
    }

    /// The raw bytes as they appear on the wire
    pub fn as_bytes(&self) -> &[u8; CHALLENGE_DATA_LEN] {
        &self.0
    }
}

impl From<[u8; CHALLENGE_DATA_LEN]> for ChallengeData {
    fn from(data: [u8; CHALLENGE_DATA_LEN]) -> Self {
        Self(data)
    }
}

impl From<u64> for ChallengeData {
    fn from(token: u64) -> Self {
        Self(token.to_be_bytes())
    }
}

impl From<ChallengeData> for u64 {
    fn from(data: ChallengeData) -> Self {
        Self::from_be_bytes(data.0)
    }
}

impl fmt::Debug for ChallengeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChallengeData({self})")
    }
}

impl fmt::Display for ChallengeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A PATH_CHALLENGE awaiting its response
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ChallengeEntry {
    data: ChallengeData,
    /// When the challenge is deemed lost if no response arrived
    expiry: Instant,
}

impl ChallengeEntry {
    /// Record a challenge carrying `data` that expires at `expiry`
    pub fn new(data: ChallengeData, expiry: Instant) -> Self {
        Self { data, expiry }
    }

    /// The data the peer must echo
    pub fn data(&self) -> &ChallengeData {
        &self.data
    }

    /// When the challenge is deemed lost
    pub fn expiry(&self) -> Instant {
        self.expiry
    }
}

/// How the owning connection treats a path validation
///
/// The validator itself only carries these; acting on them is up to the connection. Flags combine
/// with `|`:
///
/// ```
/// # use pathval_proto::ValidationFlags;
/// let flags = ValidationFlags::BLOCKING | ValidationFlags::RETIRE_DCID_ON_FINISH;
/// assert!(flags.is_blocking());
/// assert!(flags.contains(ValidationFlags::RETIRE_DCID_ON_FINISH));
/// assert!(!flags.contains(ValidationFlags::DONT_CARE));
/// ```
#[derive(Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ValidationFlags {
    blocking: bool,
    dont_care: bool,
    retire_dcid_on_finish: bool,
    verify_old_path_on_success: bool,
    invoke_callback: bool,
}

impl ValidationFlags {
    /// No special treatment
    pub const NONE: Self = Self {
        blocking: false,
        dont_care: false,
        retire_dcid_on_finish: false,
        verify_old_path_on_success: false,
        invoke_callback: false,
    };
    /// Non-probing packets must not be sent until the validation finishes
    pub const BLOCKING: Self = Self {
        blocking: true,
        ..Self::NONE
    };
    /// The outcome of the validation does not matter
    pub const DONT_CARE: Self = Self {
        dont_care: true,
        ..Self::NONE
    };
    /// The destination connection ID is retired once the validation finishes, whatever the
    /// outcome
    pub const RETIRE_DCID_ON_FINISH: Self = Self {
        retire_dcid_on_finish: true,
        ..Self::NONE
    };
    /// The previously active path is validated again after this validation succeeds
    pub const VERIFY_OLD_PATH_ON_SUCCESS: Self = Self {
        verify_old_path_on_success: true,
        ..Self::NONE
    };
    /// The application is notified once the validation finishes
    pub const INVOKE_CALLBACK: Self = Self {
        invoke_callback: true,
        ..Self::NONE
    };

    /// Flags set in either `self` or `other`
    pub const fn union(self, other: Self) -> Self {
        Self {
            blocking: self.blocking || other.blocking,
            dont_care: self.dont_care || other.dont_care,
            retire_dcid_on_finish: self.retire_dcid_on_finish || other.retire_dcid_on_finish,
            verify_old_path_on_success: self.verify_old_path_on_success
                || other.verify_old_path_on_success,
            invoke_callback: self.invoke_callback || other.invoke_callback,
        }
    }

    /// Whether every flag set in `other` is also set in `self`
    pub const fn contains(self, other: Self) -> bool {
        (self.blocking || !other.blocking)
            && (self.dont_care || !other.dont_care)
            && (self.retire_dcid_on_finish || !other.retire_dcid_on_finish)
            && (self.verify_old_path_on_success || !other.verify_old_path_on_success)
            && (self.invoke_callback || !other.invoke_callback)
    }

    /// Whether no flag is set
    pub const fn is_empty(self) -> bool {
        !(self.blocking
            || self.dont_care
            || self.retire_dcid_on_finish
            || self.verify_old_path_on_success
            || self.invoke_callback)
    }

    /// Shorthand for `self.contains(ValidationFlags::BLOCKING)`
    pub const fn is_blocking(self) -> bool {
        self.blocking
    }

    /// Shorthand for `self.contains(ValidationFlags::DONT_CARE)`
    pub const fn is_dont_care(self) -> bool {
        self.dont_care
    }

    /// Shorthand for `self.contains(ValidationFlags::RETIRE_DCID_ON_FINISH)`
    pub const fn retires_dcid_on_finish(self) -> bool {
        self.retire_dcid_on_finish
    }

    /// Shorthand for `self.contains(ValidationFlags::VERIFY_OLD_PATH_ON_SUCCESS)`
    pub const fn verifies_old_path_on_success(self) -> bool {
        self.verify_old_path_on_success
    }

    /// Shorthand for `self.contains(ValidationFlags::INVOKE_CALLBACK)`
    pub const fn invokes_callback(self) -> bool {
        self.invoke_callback
    }
}

impl BitOr for ValidationFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for ValidationFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for ValidationFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let names = [
            (self.blocking, "BLOCKING"),
            (self.dont_care, "DONT_CARE"),
            (self.retire_dcid_on_finish, "RETIRE_DCID_ON_FINISH"),
            (self.verify_old_path_on_success, "VERIFY_OLD_PATH_ON_SUCCESS"),
            (self.invoke_callback, "INVOKE_CALLBACK"),
        ];
        let mut first = true;
        for (_, name) in names.iter().filter(|(set, _)| *set) {
            if !first {
                f.write_str(" | ")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

/// Counters describing what happened during a path validation
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub struct ValidationStats {
    /// PATH_CHALLENGE frames recorded with [`PathValidator::add_entry`]
    pub challenges_sent: u64,
    /// Challenges that expired without a response
    pub challenges_lost: u64,
    /// Challenges discarded unanswered to make room for newer ones
    pub challenges_overwritten: u64,
    /// PATH_RESPONSE frames that validated nothing
    pub responses_ignored: u64,
}

/// Reasons a PATH_RESPONSE fails to validate a path
///
/// Neither is fatal: the connection should disregard the response and keep waiting.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum ValidateError {
    /// No challenge is outstanding
    #[error("no path challenge outstanding")]
    InvalidState,
    /// The response matches none of the outstanding challenges
    ///
    /// It may be a duplicate, a response to a challenge that has already expired, or spoofed.
    #[error("path response matches no outstanding challenge")]
    InvalidArgument,
}

/// State of a single path validation attempt
///
/// Created by the connection when it starts probing a path, and dropped once the validation
/// succeeds, times out, or is abandoned. Every time-dependent operation takes the current time as
/// an argument; the validator never reads a clock.
///
/// ```
/// # use std::{net::SocketAddr, time::{Duration, Instant}};
/// # use pathval_proto::*;
/// let path = NetworkPath::from((
///     "10.0.0.1:4433".parse::<SocketAddr>().unwrap(),
///     "10.0.0.2:443".parse::<SocketAddr>().unwrap(),
/// ));
/// let dcid = DestinationCid::new(1, ConnectionId::new(&[0xAB; 8]), path.clone());
/// let mut pv = PathValidator::new(&dcid, Duration::from_secs(3), ValidationFlags::NONE, NoopLog)?;
///
/// let now = Instant::now();
/// let data = ChallengeData::from(0x0102_0304_0506_0708_u64);
/// pv.ensure_start(now);
/// pv.add_entry(data, now + Duration::from_millis(300));
/// assert_eq!(pv.next_expiry(), Some(now + Duration::from_millis(300)));
///
/// pv.validate(path.as_view(), data).expect("path validated");
/// # Ok::<(), OutOfMemory>(())
/// ```
#[derive(Debug)]
pub struct PathValidator<L = TracingLog> {
    /// The destination connection ID, and the path it is used on, this validation probes with
    dcid: DestinationCid,
    /// Outstanding challenges, oldest first
    entries: FixedRing<ChallengeEntry, MAX_CHALLENGES>,
    /// How long the validation may take in total
    timeout: Duration,
    /// When the first challenge was sent
    started_at: Option<Instant>,
    flags: ValidationFlags,
    stats: ValidationStats,
    log: L,
}

impl<L: ValidationLog> PathValidator<L> {
    /// Begin a path validation using a copy of `dcid`
    ///
    /// `timeout` is the time within which the validation must succeed, counted from
    /// [`ensure_start`](Self::ensure_start). It must be nonzero.
    pub fn new(
        dcid: &DestinationCid,
        timeout: Duration,
        flags: ValidationFlags,
        log: L,
    ) -> Result<Self, OutOfMemory> {
        debug_assert!(!timeout.is_zero(), "path validation timeout must be nonzero");
        Ok(Self {
            dcid: dcid.try_clone()?,
            entries: FixedRing::new(),
            timeout: match timeout.is_zero() {
                true => TIMER_GRANULARITY,
                false => timeout,
            },
            started_at: None,
            flags,
            stats: ValidationStats::default(),
            log,
        })
    }

    /// Begin a path validation with the timeout and flags from `config`
    pub fn with_config(
        dcid: &DestinationCid,
        config: &ValidationConfig,
        log: L,
    ) -> Result<Self, OutOfMemory> {
        Self::new(dcid, config.timeout, config.flags, log)
    }

    /// Mark the validation as started at `now`, unless it already was
    pub fn ensure_start(&mut self, now: Instant) {
        self.started_at.get_or_insert(now);
    }

    /// Record a PATH_CHALLENGE carrying `data` that is deemed lost at `expiry`
    ///
    /// If [`MAX_CHALLENGES`](crate::MAX_CHALLENGES) challenges are already outstanding, the oldest
    /// one is forgotten. A forgotten challenge is not counted as lost.
    pub fn add_entry(&mut self, data: ChallengeData, expiry: Instant) {
        self.stats.challenges_sent += 1;
        self.log.challenge_sent(&self.dcid, &data, expiry);
        if let Some(displaced) = self.entries.push(ChallengeEntry::new(data, expiry)) {
            self.stats.challenges_overwritten += 1;
            self.log.challenge_overwritten(&self.dcid, &displaced);
        }
    }

    /// Whether the maximum number of challenges is outstanding
    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    /// Handle a PATH_RESPONSE carrying `data` that arrived on `path`
    ///
    /// Succeeds iff `data` matches an outstanding challenge, in which case every outstanding
    /// challenge is forgotten. A response may legitimately arrive on a path other than the one
    /// being validated (RFC 9000 §8.2.2), so `path` is only used for diagnostics.
    pub fn validate(
        &mut self,
        path: PathView<'_>,
        data: ChallengeData,
    ) -> Result<(), ValidateError> {
        if self.entries.is_empty() {
            return Err(self.ignore(&data, ValidateError::InvalidState));
        }

        // Compare against every entry so timing doesn't reveal which one matched
        let matched = self.entries.iter().fold(false, |matched, entry| {
            matched | constant_time::eq(entry.data.as_bytes(), data.as_bytes())
        });
        if !matched {
            return Err(self.ignore(&data, ValidateError::InvalidArgument));
        }

        self.entries.clear();
        let on_expected_path = self.dcid.path == path;
        self.log.validated(&self.dcid, path, on_expected_path);
        Ok(())
    }

    fn ignore(&mut self, data: &ChallengeData, reason: ValidateError) -> ValidateError {
        self.stats.responses_ignored += 1;
        self.log.response_ignored(&self.dcid, data, reason);
        reason
    }

    /// Forget every challenge that expired at or before `now`, counting each as lost
    ///
    /// Returns the number of challenges lost. Whether the validation as a whole has failed is
    /// answered by [`validation_timed_out`](Self::validation_timed_out).
    pub fn handle_entry_expiry(&mut self, now: Instant) -> usize {
        let lost = self.entries.remove_where(|entry| entry.expiry <= now);
        let count = lost.len();
        for entry in lost {
            self.log.challenge_lost(&self.dcid, &entry, now);
        }
        self.stats.challenges_lost += count as u64;
        count
    }

    /// Whether the validation failed because it did not succeed within its timeout
    ///
    /// Always false before [`ensure_start`](Self::ensure_start) is called.
    pub fn validation_timed_out(&self, now: Instant) -> bool {
        self.started_at
            .is_some_and(|started| now.saturating_duration_since(started) >= self.timeout)
    }

    /// The earliest expiry among the outstanding challenges
    pub fn next_expiry(&self) -> Option<Instant> {
        self.entries.iter().map(|entry| entry.expiry).min()
    }

    /// When [`validation_timed_out`](Self::validation_timed_out) starts returning true, if the
    /// validation has started
    pub fn deadline(&self) -> Option<Instant> {
        self.started_at.map(|started| started + self.timeout)
    }
}

impl<L> PathValidator<L> {
    /// The destination connection ID, and the path it is used on, this validation probes with
    pub fn dcid(&self) -> &DestinationCid {
        &self.dcid
    }

    /// How the connection should treat this validation
    pub fn flags(&self) -> ValidationFlags {
        self.flags
    }

    /// The time within which the validation must succeed
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// When the validation started, if it has
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Whether [`ensure_start`](Self::ensure_start) has been called
    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Number of challenges that expired without a response
    pub fn loss_count(&self) -> u64 {
        self.stats.challenges_lost
    }

    /// Number of outstanding challenges
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no challenge is outstanding
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outstanding challenges, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &ChallengeEntry> + '_ {
        self.entries.iter()
    }

    /// Counters describing the validation so far
    pub fn stats(&self) -> ValidationStats {
        self.stats
    }

    /// The diagnostic sink
    pub fn log(&self) -> &L {
        &self.log
    }
}
