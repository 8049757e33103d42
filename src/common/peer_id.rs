//! Opaque identifier of a network peer.
use std::fmt::{self, Debug, Display, Formatter};

use bytes::Bytes;
use rand::Rng;

/// Number of bytes in a [PeerId::random] identifier.
pub const RANDOM_PEER_ID_SIZE: usize = 32;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Opaque byte-sequence identifier of a network peer.
///
/// Never interpreted, only compared, hashed and persisted.
pub struct PeerId(Bytes);

impl PeerId {
    pub fn random() -> PeerId {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; RANDOM_PEER_ID_SIZE] = rng.gen();

        PeerId(Bytes::copy_from_slice(&random_bytes))
    }

    /// Returns the raw bytes of this id.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for PeerId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for PeerId {
    fn from(bytes: &[u8]) -> Self {
        PeerId(Bytes::copy_from_slice(bytes))
    }
}

impl From<Vec<u8>> for PeerId {
    fn from(bytes: Vec<u8>) -> Self {
        PeerId(bytes.into())
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{:02x}", byte)?;
        }

        Ok(())
    }
}

impl Debug for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self)
    }
}
