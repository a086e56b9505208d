use std::{
    io::{self, Write},
    net::SocketAddr,
    str,
    time::Duration,
};

use assert_matches::assert_matches;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    ChallengeData, ChallengeEntry, ConnectionId, DestinationCid, Instant, NetworkPath, PathView,
    PathValidator, TracingLog, ValidateError, ValidationConfig, ValidationFlags, ValidationLog,
    MAX_CHALLENGES,
};


pub(super) fn subscribe() -> tracing::subscriber::DefaultGuard {
    let sub = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(|| TestWriter)
        .finish();
    tracing::subscriber::set_default(sub)
}

struct TestWriter;

impl Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        print!(
            "{}",
            str::from_utf8(buf).expect("tried to log invalid UTF-8")
        );
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

pub(super) fn ms(x: u64) -> Duration {
    Duration::from_millis(x)
}

pub(super) fn active_path() -> NetworkPath {
    NetworkPath::from((
        "[::1]:44433".parse::<SocketAddr>().unwrap(),
        "[::1]:4433".parse::<SocketAddr>().unwrap(),
    ))
}

pub(super) fn dcid() -> DestinationCid {
    DestinationCid::new(1, ConnectionId::new(&[0xAB; 8]), active_path())
}

/// Everything a [`PathValidator`] reported, in order
#[derive(Debug, Default)]
struct RecordingLog {
    events: Vec<LogEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LogEvent {
    Sent(ChallengeData),
    Overwritten(ChallengeData),
    Lost(ChallengeData),
    Validated { on_expected_path: bool },
    Ignored(ValidateError),
}

impl ValidationLog for RecordingLog {
    fn challenge_sent(&mut self, _: &DestinationCid, data: &ChallengeData, _: Instant) {
        self.events.push(LogEvent::Sent(*data));
    }

    fn challenge_overwritten(&mut self, _: &DestinationCid, entry: &ChallengeEntry) {
        self.events.push(LogEvent::Overwritten(*entry.data()));
    }

    fn challenge_lost(&mut self, _: &DestinationCid, entry: &ChallengeEntry, _: Instant) {
        self.events.push(LogEvent::Lost(*entry.data()));
    }

    fn validated(&mut self, _: &DestinationCid, _: PathView<'_>, on_expected_path: bool) {
        self.events.push(LogEvent::Validated { on_expected_path });
    }

    fn response_ignored(&mut self, _: &DestinationCid, _: &ChallengeData, reason: ValidateError) {
        self.events.push(LogEvent::Ignored(reason));
    }
}

#[test]
fn lost_challenge_then_timeout() {
    let _guard = subscribe();
    let t0 = Instant::now();
    let data = ChallengeData::from([1, 2, 3, 4, 5, 6, 7, 8]);
    let mut pv = PathValidator::new(&dcid(), ms(3000), ValidationFlags::BLOCKING, TracingLog)
        .unwrap();
    assert_eq!(pv.len(), 0);
    assert_eq!(pv.started_at(), None);

    pv.ensure_start(t0 + ms(1000));
    pv.add_entry(data, t0 + ms(1300));

    pv.handle_entry_expiry(t0 + ms(1200));
    assert_eq!(pv.loss_count(), 0);
    assert_eq!(pv.next_expiry(), Some(t0 + ms(1300)));

    pv.handle_entry_expiry(t0 + ms(1400));
    assert_eq!(pv.loss_count(), 1);
    assert_eq!(pv.next_expiry(), None);

    assert!(pv.validation_timed_out(t0 + ms(4000)));
    assert!(pv.flags().is_blocking());

    let path = active_path();
    assert_matches!(
        pv.validate(path.as_view(), data),
        Err(ValidateError::InvalidState)
    );
}

#[test]
fn log_sees_every_event() {
    let _guard = subscribe();
    let now = Instant::now();
    let mut pv = PathValidator::new(
        &dcid(),
        ms(3000),
        ValidationFlags::NONE,
        RecordingLog::default(),
    )
    .unwrap();
    let path = active_path();

    pv.validate(path.as_view(), 7u64.into()).unwrap_err();
    for i in 0..=MAX_CHALLENGES as u64 {
        pv.add_entry(i.into(), now + ms(100 + i));
    }
    pv.validate(path.as_view(), 0u64.into()).unwrap_err();
    pv.handle_entry_expiry(now + ms(101));
    pv.validate(path.as_view(), 3u64.into()).unwrap();

    let d = |x: u64| ChallengeData::from(x);
    assert_eq!(
        pv.log().events,
        [
            LogEvent::Ignored(ValidateError::InvalidState),
            LogEvent::Sent(d(0)),
            LogEvent::Sent(d(1)),
            LogEvent::Sent(d(2)),
            LogEvent::Sent(d(3)),
            LogEvent::Sent(d(4)),
            LogEvent::Overwritten(d(0)),
            LogEvent::Ignored(ValidateError::InvalidArgument),
            LogEvent::Lost(d(1)),
            LogEvent::Validated {
                on_expected_path: true
            },
        ]
    );
    let stats = pv.stats();
    assert_eq!(stats.challenges_sent, 5);
    assert_eq!(stats.challenges_overwritten, 1);
    assert_eq!(stats.challenges_lost, 1);
    assert_eq!(stats.responses_ignored, 2);
}

#[test]
fn response_on_other_path_still_validates() {
    let _guard = subscribe();
    let now = Instant::now();
    let mut pv = PathValidator::new(
        &dcid(),
        ms(3000),
        ValidationFlags::NONE,
        RecordingLog::default(),
    )
    .unwrap();
    pv.add_entry(9u64.into(), now + ms(100));

    let local = [0x11, 0x5c, 10, 0, 0, 1];
    let remote = [0x01, 0xbb, 10, 0, 0, 2];
    let view = PathView::new(
        crate::Address::new(crate::AddressFamily::Inet, &local),
        crate::Address::new(crate::AddressFamily::Inet, &remote),
    );
    pv.validate(view, 9u64.into()).unwrap();
    assert_eq!(
        pv.log().events.last(),
        Some(&LogEvent::Validated {
            on_expected_path: false
        })
    );
}

/// Drives a validator the way a connection's event loop would
///
/// A challenge is sent whenever nothing is outstanding or the last challenge expired, up to the
/// validation deadline.
struct Owner {
    pv: PathValidator,
    now: Instant,
    next_token: u64,
    rtt: Duration,
}

impl Owner {
    fn new(now: Instant, rtt: Duration, config: &ValidationConfig) -> Self {
        let mut pv = PathValidator::with_config(&dcid(), config, TracingLog).unwrap();
        pv.ensure_start(now);
        Self {
            pv,
            now,
            next_token: 0,
            rtt,
        }
    }

    fn send_challenge(&mut self) -> ChallengeData {
        let data = ChallengeData::from(self.next_token);
        self.next_token += 1;
        self.pv.add_entry(data, self.now + 3 * self.rtt);
        info!(%data, "sent challenge");
        data
    }

    /// Advance to the next timer, returning false once the validation has timed out
    fn on_timeout(&mut self) -> bool {
        let next = match (self.pv.next_expiry(), self.pv.deadline()) {
            (Some(expiry), Some(deadline)) => expiry.min(deadline),
            (None, deadline) => deadline.unwrap(),
            (expiry, None) => expiry.unwrap(),
        };
        self.now = next;
        if self.pv.validation_timed_out(self.now) {
            return false;
        }
        if self.pv.handle_entry_expiry(self.now) > 0 && !self.pv.is_full() {
            self.send_challenge();
        }
        true
    }
}

#[test]
fn owner_gives_up_after_timeout() {
    let _guard = subscribe();
    let mut config = ValidationConfig::default();
    config.timeout(ms(1000)).unwrap();
    let start = Instant::now();
    let mut owner = Owner::new(start, ms(100), &config);
    owner.send_challenge();

    let mut ticks = 0;
    while owner.on_timeout() {
        ticks += 1;
        assert!(ticks < 100, "validation never timed out");
    }
    assert_eq!(owner.now, start + ms(1000));
    // Challenges expire every 300ms: at 300, 600 and 900
    assert_eq!(owner.pv.loss_count(), 3);
    assert_eq!(owner.pv.stats().challenges_sent, 4);
}

#[test]
fn owner_succeeds_on_late_response() {
    let _guard = subscribe();
    let config = ValidationConfig::default();
    let start = Instant::now();
    let mut owner = Owner::new(start, ms(100), &config);
    let first = owner.send_challenge();
    let second = owner.send_challenge();

    assert!(owner.on_timeout());
    assert_eq!(owner.pv.loss_count(), 2);
    let third = owner.pv.entries().next().map(|entry| *entry.data()).unwrap();

    let path = active_path();
    assert_matches!(
        owner.pv.validate(path.as_view(), first),
        Err(ValidateError::InvalidArgument)
    );
    assert_matches!(
        owner.pv.validate(path.as_view(), second),
        Err(ValidateError::InvalidArgument)
    );
    assert_matches!(owner.pv.validate(path.as_view(), third), Ok(()));
    assert!(!owner.pv.validation_timed_out(owner.now));
}

#[test]
fn flooding_responses_is_bounded() {
    let _guard = subscribe();
    let now = Instant::now();
    let mut pv = PathValidator::new(&dcid(), ms(3000), ValidationFlags::NONE, TracingLog).unwrap();
    for i in 0..1000u64 {
        pv.add_entry(i.into(), now + ms(i));
        assert!(pv.len() <= MAX_CHALLENGES);
    }
    let path = active_path();
    for i in 0..996u64 {
        assert_matches!(
            pv.validate(path.as_view(), i.into()),
            Err(ValidateError::InvalidArgument)
        );
    }
    assert_eq!(pv.len(), MAX_CHALLENGES);
    assert_eq!(pv.next_expiry(), Some(now + ms(996)));
}
