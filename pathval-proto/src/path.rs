use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};

use crate::shared::OutOfMemory;

/// Address family of a raw socket address
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AddressFamily {
    /// IPv4
    Inet,
    /// IPv6
    Inet6,
}

impl AddressFamily {
    /// Length of the raw encoding produced for a `SocketAddr` of this family
    fn encoded_len(self) -> usize {
        match self {
            Self::Inet => 2 + 4,
            Self::Inet6 => 2 + 16,
        }
    }
}

/// A socket address borrowed from storage owned elsewhere
///
/// Two addresses are equal iff they have the same family, length and raw bytes.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Address<'a> {
    family: AddressFamily,
    bytes: &'a [u8],
}

impl<'a> Address<'a> {
    /// Refer to `bytes` as an address of the given family without copying them
    pub fn new(family: AddressFamily, bytes: &'a [u8]) -> Self {
        Self { family, bytes }
    }

    /// The address family
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// The raw address bytes
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Length of the raw address in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the raw address is zero-length
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode the raw bytes as a port followed by IP octets, if they have that shape
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        if self.bytes.len() != self.family.encoded_len() {
            return None;
        }
        let (port, ip) = self.bytes.split_at(2);
        let port = u16::from_be_bytes([port[0], port[1]]);
        let ip = match self.family {
            AddressFamily::Inet => {
                let octets: [u8; 4] = ip.try_into().ok()?;
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            AddressFamily::Inet6 => {
                let octets: [u8; 16] = ip.try_into().ok()?;
                IpAddr::V6(Ipv6Addr::from(octets))
            }
        };
        Some(SocketAddr::new(ip, port))
    }
}

impl fmt::Debug for Address<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_socket_addr() {
            Some(addr) => addr.fmt(f),
            None => f
                .debug_struct("Address")
                .field("family", &self.family)
                .field("bytes", &self.bytes)
                .finish(),
        }
    }
}

impl fmt::Display for Address<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(addr) = self.to_socket_addr() {
            return addr.fmt(f);
        }
        for byte in self.bytes {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Owned storage for a socket address
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AddressBuf {
    family: AddressFamily,
    bytes: Vec<u8>,
}

impl AddressBuf {
    /// Allocate empty storage able to hold `capacity` address bytes without reallocating
    pub fn try_with_capacity(
        family: AddressFamily,
        capacity: usize,
    ) -> Result<Self, OutOfMemory> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(capacity)?;
        Ok(Self { family, bytes })
    }

    /// Borrow the stored address
    pub fn as_addr(&self) -> Address<'_> {
        Address::new(self.family, &self.bytes)
    }

    /// Number of address bytes that fit without reallocating
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    /// Mutable access to the stored raw address bytes
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Overwrite the stored address with a copy of `src`
    ///
    /// Storage must already be large enough to hold `src`; this never allocates in that case.
    pub fn copy_from(&mut self, src: Address<'_>) {
        debug_assert!(
            self.bytes.capacity() >= src.len(),
            "address storage too small: {} < {}",
            self.bytes.capacity(),
            src.len()
        );
        self.family = src.family;
        self.bytes.clear();
        self.bytes.extend_from_slice(src.bytes);
    }

    fn try_from_addr(src: Address<'_>) -> Result<Self, OutOfMemory> {
        let mut buf = Self::try_with_capacity(src.family, src.len())?;
        buf.copy_from(src);
        Ok(buf)
    }
}

impl From<SocketAddr> for AddressBuf {
    fn from(addr: SocketAddr) -> Self {
        let (family, ip) = match addr.ip() {
            IpAddr::V4(ip) => (AddressFamily::Inet, ip.octets().to_vec()),
            IpAddr::V6(ip) => (AddressFamily::Inet6, ip.octets().to_vec()),
        };
        let mut bytes = Vec::with_capacity(family.encoded_len());
        bytes.extend_from_slice(&addr.port().to_be_bytes());
        bytes.extend_from_slice(&ip);
        Self { family, bytes }
    }
}

impl PartialEq<Address<'_>> for AddressBuf {
    fn eq(&self, other: &Address<'_>) -> bool {
        self.as_addr() == *other
    }
}

impl fmt::Debug for AddressBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_addr().fmt(f)
    }
}

impl fmt::Display for AddressBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_addr().fmt(f)
    }
}

/// A local/remote address pair referring to storage owned elsewhere
///
/// Used for transient comparisons, e.g. against the path an incoming datagram arrived on. The
/// borrow checker ensures a view never outlives the addresses it refers to; use [`NetworkPath`]
/// to keep a path around.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PathView<'a> {
    /// Our address
    pub local: Address<'a>,
    /// The peer's address
    pub remote: Address<'a>,
}

impl<'a> PathView<'a> {
    /// Construct a view of `local` and `remote` without copying any address bytes
    pub fn new(local: Address<'a>, remote: Address<'a>) -> Self {
        Self { local, remote }
    }
}

impl fmt::Display for PathView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.local, self.remote)
    }
}

/// A local/remote address pair with its own copy of both addresses
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct NetworkPath {
    local: AddressBuf,
    remote: AddressBuf,
}

impl NetworkPath {
    /// Allocate storage for a path whose addresses are at most `local_len` and `remote_len`
    /// bytes long
    ///
    /// Both addresses start out empty and of family [`AddressFamily::Inet`]; fill them in with
    /// [`NetworkPath::copy_from`].
    pub fn try_with_capacity(local_len: usize, remote_len: usize) -> Result<Self, OutOfMemory> {
        Ok(Self {
            local: AddressBuf::try_with_capacity(AddressFamily::Inet, local_len)?,
            remote: AddressBuf::try_with_capacity(AddressFamily::Inet, remote_len)?,
        })
    }

    /// Make an independent deep copy of `src`
    pub fn try_from_view(src: PathView<'_>) -> Result<Self, OutOfMemory> {
        Ok(Self {
            local: AddressBuf::try_from_addr(src.local)?,
            remote: AddressBuf::try_from_addr(src.remote)?,
        })
    }

    /// Fallible counterpart to `clone`
    pub fn try_clone(&self) -> Result<Self, OutOfMemory> {
        Self::try_from_view(self.as_view())
    }

    /// Overwrite both addresses with copies of the ones in `src`
    ///
    /// The storage must have been sized for `src`, e.g. by [`NetworkPath::try_with_capacity`].
    /// Afterwards `self == src` holds and `self` no longer depends on `src`'s storage.
    pub fn copy_from(&mut self, src: PathView<'_>) {
        self.local.copy_from(src.local);
        self.remote.copy_from(src.remote);
    }

    /// Borrow this path as a [`PathView`]
    pub fn as_view(&self) -> PathView<'_> {
        PathView::new(self.local.as_addr(), self.remote.as_addr())
    }

    /// Our address
    pub fn local(&self) -> Address<'_> {
        self.local.as_addr()
    }

    /// The peer's address
    pub fn remote(&self) -> Address<'_> {
        self.remote.as_addr()
    }

    /// Mutable access to our address's storage
    pub fn local_mut(&mut self) -> &mut AddressBuf {
        &mut self.local
    }

    /// Mutable access to the peer's address storage
    pub fn remote_mut(&mut self) -> &mut AddressBuf {
        &mut self.remote
    }
}

impl From<(SocketAddr, SocketAddr)> for NetworkPath {
    fn from((local, remote): (SocketAddr, SocketAddr)) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }
}

impl PartialEq<PathView<'_>> for NetworkPath {
    fn eq(&self, other: &PathView<'_>) -> bool {
        self.as_view() == *other
    }
}

impl PartialEq<NetworkPath> for PathView<'_> {
    fn eq(&self, other: &NetworkPath) -> bool {
        *self == other.as_view()
    }
}

impl fmt::Display for NetworkPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_view().fmt(f)
    }
}
