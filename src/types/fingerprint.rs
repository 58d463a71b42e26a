use std::fmt;

use crate::errors::{Error, Result};
use crate::types::KeyId;

/// Represents a v4 fingerprint, the SHA1 over the serialized public key.
#[derive(Clone, Copy, Eq, PartialEq, Hash, derive_more::Debug)]
#[debug("Fingerprint({})", hex::encode(_0))]
pub struct Fingerprint([u8; 20]);

impl Fingerprint {
    pub fn new(fp: &[u8]) -> Result<Self> {
        let fp: [u8; 20] = fp.try_into().map_err(|_| Error::ProtocolError {
            message: format!("invalid fingerprint length {}", fp.len()),
        })?;
        Ok(Fingerprint(fp))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }

    /// The key id is formed by the low 64 bits of the fingerprint.
    pub fn key_id(&self) -> KeyId {
        let mut id = [0u8; 8];
        id.copy_from_slice(&self.0[12..]);
        KeyId::from(id)
    }
}

impl From<[u8; 20]> for Fingerprint {
    fn from(value: [u8; 20]) -> Self {
        Fingerprint(value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}
