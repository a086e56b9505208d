use std::{collections::TryReserveError, fmt};

use rand::RngCore;
use thiserror::Error;

use crate::{path::NetworkPath, MAX_CID_SIZE, RESET_TOKEN_SIZE};

/// Protocol-level identifier for a connection.
///
/// Mainly useful for identifying this connection's packets on the wire with tools like Wireshark.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ConnectionId {
    len: u8,
    bytes: [u8; MAX_CID_SIZE],
}

impl ConnectionId {
    /// Construct a connection ID from its raw bytes
    ///
    /// Panics if `bytes` is longer than 20 bytes.
    pub fn new(bytes: &[u8]) -> Self {
        assert!(bytes.len() <= MAX_CID_SIZE, "connection ID too long");
        let mut res = Self {
            len: bytes.len() as u8,
            bytes: [0; MAX_CID_SIZE],
        };
        res.bytes[..bytes.len()].copy_from_slice(bytes);
        res
    }

    /// Construct a random connection ID of `len` bytes
    ///
    /// Panics if `len` is greater than 20.
    pub fn random<R: RngCore + ?Sized>(rng: &mut R, len: usize) -> Self {
        assert!(len <= MAX_CID_SIZE, "connection ID too long");
        let mut res = Self {
            len: len as u8,
            bytes: [0; MAX_CID_SIZE],
        };
        rng.fill_bytes(&mut res.bytes[..len]);
        res
    }
}

impl ::std::ops::Deref for ConnectionId {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.bytes[0..self.len as usize]
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.bytes[0..self.len as usize].fmt(f)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.iter() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Stateless reset token issued alongside a connection ID
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ResetToken([u8; RESET_TOKEN_SIZE]);

impl From<[u8; RESET_TOKEN_SIZE]> for ResetToken {
    fn from(x: [u8; RESET_TOKEN_SIZE]) -> Self {
        Self(x)
    }
}

impl std::ops::Deref for ResetToken {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ResetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.iter() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A destination connection ID together with the path it is used on
///
/// The path validation engine carries its own copy of one of these so that the owning
/// connection can retire the identifier once the validation finishes.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DestinationCid {
    /// Sequence number the peer issued the connection ID with
    pub seq: u64,
    /// The connection ID itself
    pub cid: ConnectionId,
    /// The path packets carrying this connection ID are sent on
    pub path: NetworkPath,
    /// Stateless reset token, if one was issued
    pub reset_token: Option<ResetToken>,
}

impl DestinationCid {
    /// Construct a destination connection ID used on `path`
    pub fn new(seq: u64, cid: ConnectionId, path: NetworkPath) -> Self {
        Self {
            seq,
            cid,
            path,
            reset_token: None,
        }
    }

    /// Deep copy that reports allocation failure instead of aborting
    pub fn try_clone(&self) -> Result<Self, OutOfMemory> {
        Ok(Self {
            seq: self.seq,
            cid: self.cid,
            path: self.path.try_clone()?,
            reset_token: self.reset_token,
        })
    }
}

/// Memory for a new object could not be allocated
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
#[error("out of memory")]
pub struct OutOfMemory;

impl From<TryReserveError> for OutOfMemory {
    fn from(_: TryReserveError) -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn cid_display() {
        let cid = ConnectionId::new(&[0xAB, 0x01, 0xFF]);
        assert_eq!(cid.to_string(), "ab01ff");
        assert_eq!(&*cid, &[0xAB, 0x01, 0xFF]);
    }

    #[test]
    fn random_cid_has_requested_length() {
        let mut rng = StdRng::seed_from_u64(7);
        let cid = ConnectionId::random(&mut rng, 8);
        assert_eq!(cid.len(), 8);
    }

    #[test]
    #[should_panic(expected = "connection ID too long")]
    fn random_cid_rejects_oversized_length() {
        let mut rng = StdRng::seed_from_u64(7);
        ConnectionId::random(&mut rng, MAX_CID_SIZE + 1);
    }

    #[test]
    fn dcid_copy_is_deep() {
        let path = NetworkPath::from((
            "127.0.0.1:1".parse::<SocketAddr>().unwrap(),
            "127.0.0.1:2".parse::<SocketAddr>().unwrap(),
        ));
        let mut dcid = DestinationCid::new(3, ConnectionId::new(&[7; 8]), path);
        dcid.reset_token = Some(ResetToken::from([0xCD; RESET_TOKEN_SIZE]));
        let copy = dcid.try_clone().unwrap();
        assert_eq!(copy, dcid);

        dcid.path.remote_mut().as_bytes_mut()[1] = 3;
        assert_ne!(copy.path, dcid.path);
        assert_eq!(
            copy.path.remote().to_socket_addr(),
            Some("127.0.0.1:2".parse::<SocketAddr>().unwrap())
        );
    }
}
