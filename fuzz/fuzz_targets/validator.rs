#![no_main]
#[cfg(fuzzing)]
use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};

#[cfg(fuzzing)]
use arbitrary::Arbitrary;
#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

extern crate proto;
#[cfg(fuzzing)]
use proto::{
    ConnectionId, DestinationCid, NetworkPath, NoopLog, PathValidator, ValidateError,
    ValidationFlags, MAX_CHALLENGES,
};

#[cfg(fuzzing)]
#[derive(Arbitrary, Debug)]
enum Op {
    AddEntry { data: u64, lifetime_ms: u16 },
    EnsureStart,
    Advance { ms: u16 },
    HandleExpiry,
    Validate { data: u64 },
}

#[cfg(fuzzing)]
#[derive(Arbitrary, Debug)]
struct Params {
    timeout_ms: u16,
    ops: Vec<Op>,
}

#[cfg(fuzzing)]
fuzz_target!(|params: Params| {
    let path = NetworkPath::from((
        "127.0.0.1:4433".parse::<SocketAddr>().unwrap(),
        "127.0.0.1:4434".parse::<SocketAddr>().unwrap(),
    ));
    let dcid = DestinationCid::new(0, ConnectionId::new(&[0; 8]), path.clone());
    let timeout = Duration::from_millis(u64::from(params.timeout_ms.max(1)));
    let mut pv = PathValidator::new(&dcid, timeout, ValidationFlags::NONE, NoopLog).unwrap();
    let base = Instant::now();
    let mut now = base;

    for op in params.ops {
        match op {
            Op::AddEntry { data, lifetime_ms } => {
                pv.add_entry(data.into(), now + Duration::from_millis(lifetime_ms.into()));
            }
            Op::EnsureStart => pv.ensure_start(now),
            Op::Advance { ms } => now += Duration::from_millis(ms.into()),
            Op::HandleExpiry => {
                let before = pv.len();
                let lost = pv.handle_entry_expiry(now);
                assert_eq!(pv.len(), before - lost);
                assert!(pv.next_expiry().map_or(true, |expiry| expiry > now));
            }
            Op::Validate { data } => {
                let was_empty = pv.is_empty();
                match pv.validate(path.as_view(), data.into()) {
                    Ok(()) => assert!(pv.is_empty()),
                    Err(ValidateError::InvalidState) => assert!(was_empty),
                    Err(ValidateError::InvalidArgument) => assert!(!was_empty),
                }
            }
        }
        assert!(pv.len() <= MAX_CHALLENGES);
        if let Some(started) = pv.started_at() {
            assert_eq!(pv.validation_timed_out(now), now - started >= pv.timeout());
        }
    }
});
