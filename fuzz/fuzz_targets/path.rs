#![no_main]
#[cfg(fuzzing)]
use arbitrary::Arbitrary;
#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

extern crate proto;
#[cfg(fuzzing)]
use proto::{Address, AddressFamily, NetworkPath, PathView};

#[cfg(fuzzing)]
#[derive(Arbitrary, Debug)]
struct PathParams {
    inet6: bool,
    local: Vec<u8>,
    remote: Vec<u8>,
}

#[cfg(fuzzing)]
fuzz_target!(|params: PathParams| {
    let family = match params.inet6 {
        true => AddressFamily::Inet6,
        false => AddressFamily::Inet,
    };
    let view = PathView::new(
        Address::new(family, &params.local),
        Address::new(family, &params.remote),
    );
    let mut copy = NetworkPath::try_with_capacity(params.local.len(), params.remote.len()).unwrap();
    copy.copy_from(view);
    assert_eq!(copy, view);
    assert_eq!(view, copy);
    if let Some(addr) = view.local.to_socket_addr() {
        assert_eq!(addr.port().to_be_bytes(), params.local[..2]);
    }
});
