use std::fmt;

use crate::errors::{ensure_eq, Result};

/// Represents a Key ID, the low 64 bits of a v4 fingerprint.
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, derive_more::Debug)]
#[debug("KeyId({})", hex::encode(_0))]
pub struct KeyId([u8; 8]);

impl AsRef<[u8]> for KeyId {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl From<[u8; 8]> for KeyId {
    fn from(value: [u8; 8]) -> Self {
        KeyId(value)
    }
}

impl From<u64> for KeyId {
    fn from(value: u64) -> Self {
        KeyId(value.to_be_bytes())
    }
}

impl From<KeyId> for u64 {
    fn from(value: KeyId) -> Self {
        u64::from_be_bytes(value.0)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

impl KeyId {
    pub fn from_slice(input: &[u8]) -> Result<KeyId> {
        ensure_eq!(input.len(), 8, "invalid input length");
        let mut r = [0u8; 8];
        r.copy_from_slice(input);

        Ok(KeyId(r))
    }

    /// The all-zero key id, used for anonymous recipients.
    pub const fn wildcard() -> Self {
        KeyId([0u8; 8])
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == [0u8; 8]
    }

    pub fn to_u64(&self) -> u64 {
        u64::from(*self)
    }

    /// Upper 32 bits as `0x` prefixed uppercase hex, as used in diagnostics.
    pub fn short_hex(&self) -> String {
        format!("0x{}", hex::encode_upper(&self.0[..4]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u64_conversion() {
        let id = KeyId::from(0x0123_4567_89AB_CDEFu64);
        assert_eq!(id.as_ref(), &[0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF]);
        assert_eq!(id.to_u64(), 0x0123_4567_89AB_CDEF);
        assert_eq!(id.to_string(), "0123456789ABCDEF");
        assert_eq!(id.short_hex(), "0x01234567");
    }

    #[test]
    fn test_from_slice() {
        assert!(KeyId::from_slice(&[1, 2, 3]).is_err());
        let id = KeyId::from_slice(&[0; 8]).unwrap();
        assert!(id.is_wildcard());
    }
}
