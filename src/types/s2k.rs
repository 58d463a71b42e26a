use std::io::{self, BufRead};

use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{ensure, format_err, unsupported_err, Result};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;

const EXPBIAS: u32 = 6;

/// Coded iteration count used for new specifiers, 65011712 hashed bytes.
pub const DEFAULT_ITER_SALTED_COUNT: u8 = 0xFF;

/// String-To-Key specifier.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-3.7>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum StringToKey {
    Simple {
        hash_alg: HashAlgorithm,
    },
    Salted {
        hash_alg: HashAlgorithm,
        #[debug("{}", hex::encode(salt))]
        salt: [u8; 8],
    },
    IteratedAndSalted {
        hash_alg: HashAlgorithm,
        #[debug("{}", hex::encode(salt))]
        salt: [u8; 8],
        count: u8,
    },
}

impl StringToKey {
    /// Creates an iterated and salted specifier with a fresh random salt.
    pub fn new_iterated<R: CryptoRng + Rng>(
        mut rng: R,
        hash_alg: HashAlgorithm,
        count: u8,
    ) -> Self {
        let mut salt = [0u8; 8];
        rng.fill(&mut salt);

        StringToKey::IteratedAndSalted {
            hash_alg,
            salt,
            count,
        }
    }

    pub fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let typ = i.read_u8()?;
        let hash_alg = HashAlgorithm::from(i.read_u8()?);
        let s2k = match typ {
            0 => StringToKey::Simple { hash_alg },
            1 => StringToKey::Salted {
                hash_alg,
                salt: i.read_array::<8>()?,
            },
            3 => {
                let salt = i.read_array::<8>()?;
                let count = i.read_u8()?;
                StringToKey::IteratedAndSalted {
                    hash_alg,
                    salt,
                    count,
                }
            }
            _ => unsupported_err!("string to key type {}", typ),
        };
        Ok(s2k)
    }

    pub fn hash_alg(&self) -> HashAlgorithm {
        match self {
            Self::Simple { hash_alg }
            | Self::Salted { hash_alg, .. }
            | Self::IteratedAndSalted { hash_alg, .. } => *hash_alg,
        }
    }

    /// Converts the coded count into the number of bytes to hash.
    /// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-3.7.1.3>
    pub fn decode_count(c: u8) -> usize {
        ((16u32 + u32::from(c & 15)) << (u32::from(c >> 4) + EXPBIAS)) as usize
    }

    /// Derives a key of `key_size` bytes from the passphrase.
    pub fn derive_key(&self, passphrase: &[u8], key_size: usize) -> Result<Zeroizing<Vec<u8>>> {
        let digest_size = self
            .hash_alg()
            .digest_size()
            .ok_or_else(|| format_err!("unsupported s2k hash {:?}", self.hash_alg()))?;
        ensure!(digest_size > 0, "invalid digest size");

        let rounds = key_size.div_ceil(digest_size);
        let mut key = Zeroizing::new(Vec::with_capacity(rounds * digest_size));

        for round in 0..rounds {
            let mut hasher = self.hash_alg().new_hasher()?;
            // each round is preloaded with one more zero byte
            hasher.update(&vec![0u8; round]);

            match self {
                Self::Simple { .. } => hasher.update(passphrase),
                Self::Salted { salt, .. } => {
                    hasher.update(salt);
                    hasher.update(passphrase);
                }
                Self::IteratedAndSalted { salt, count, .. } => {
                    let data_len = salt.len() + passphrase.len();
                    // hash at least the salt and passphrase once
                    let mut remaining = Self::decode_count(*count).max(data_len);
                    while remaining > 0 {
                        let salt_part = remaining.min(salt.len());
                        hasher.update(&salt[..salt_part]);
                        remaining -= salt_part;

                        let pass_part = remaining.min(passphrase.len());
                        hasher.update(&passphrase[..pass_part]);
                        remaining -= pass_part;
                    }
                }
            }

            key.extend_from_slice(&hasher.finalize());
        }

        key.truncate(key_size);
        Ok(key)
    }
}

impl Serialize for StringToKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::Simple { hash_alg } => {
                writer.write_all(&[0, (*hash_alg).into()])?;
            }
            Self::Salted { hash_alg, salt } => {
                writer.write_all(&[1, (*hash_alg).into()])?;
                writer.write_all(salt)?;
            }
            Self::IteratedAndSalted {
                hash_alg,
                salt,
                count,
            } => {
                writer.write_all(&[3, (*hash_alg).into()])?;
                writer.write_all(salt)?;
                writer.write_all(&[*count])?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            Self::Simple { .. } => 2,
            Self::Salted { .. } => 10,
            Self::IteratedAndSalted { .. } => 11,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_count() {
        assert_eq!(StringToKey::decode_count(0), 1024);
        assert_eq!(StringToKey::decode_count(0x60), 65536);
        assert_eq!(StringToKey::decode_count(0xFF), 65_011_712);
    }

    #[test]
    fn test_simple_s2k_sha1() {
        use sha1::{Digest, Sha1};

        let s2k = StringToKey::Simple {
            hash_alg: HashAlgorithm::Sha1,
        };
        // 16 bytes fit into one SHA1 round
        let key = s2k.derive_key(b"hello", 16).unwrap();
        assert_eq!(&key[..], &Sha1::digest(b"hello")[..16]);

        // 32 bytes need a second round, prefixed with a zero byte
        let key = s2k.derive_key(b"hello", 32).unwrap();
        assert_eq!(&key[20..], &Sha1::digest(b"\x00hello")[..12]);
    }

    #[test]
    fn test_iterated_matches_repeated_input() {
        use sha2::{Digest, Sha256};

        let salt = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let s2k = StringToKey::IteratedAndSalted {
            hash_alg: HashAlgorithm::Sha256,
            salt,
            count: 0,
        };
        let key = s2k.derive_key(b"password", 32).unwrap();

        let mut data = Vec::new();
        while data.len() < 1024 {
            data.extend_from_slice(&salt);
            data.extend_from_slice(b"password");
        }
        data.truncate(1024);
        assert_eq!(&key[..], &Sha256::digest(&data)[..]);
    }

    #[test]
    fn test_serialize_parse() {
        let s2k = StringToKey::IteratedAndSalted {
            hash_alg: HashAlgorithm::Sha256,
            salt: [9; 8],
            count: 0x60,
        };
        let bytes = s2k.to_bytes().unwrap();
        assert_eq!(bytes.len(), s2k.write_len());
        assert_eq!(StringToKey::try_from_reader(&bytes[..]).unwrap(), s2k);
    }
}
