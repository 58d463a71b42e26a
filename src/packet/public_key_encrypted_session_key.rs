use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use log::debug;
use rand::{CryptoRng, Rng};
use ::rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::crypto::checksum;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::rsa;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{unsupported_err, Error, Result};
use crate::packet::PacketTrait;
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{KeyId, Mpi, PlainSessionKey, Tag};

/// Algorithm specific values of an encrypted session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PkeskBytes {
    Rsa {
        mpi: Mpi,
    },
    Elgamal {
        first: Mpi,
        second: Mpi,
    },
    /// Values of algorithms we can not decrypt, kept as is.
    Other { raw: Bytes },
}

impl Serialize for PkeskBytes {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PkeskBytes::Rsa { mpi } => mpi.to_writer(writer),
            PkeskBytes::Elgamal { first, second } => {
                first.to_writer(writer)?;
                second.to_writer(writer)
            }
            PkeskBytes::Other { raw } => {
                writer.write_all(raw)?;
                Ok(())
            }
        }
    }

    fn write_len(&self) -> usize {
        match self {
            PkeskBytes::Rsa { mpi } => mpi.write_len(),
            PkeskBytes::Elgamal { first, second } => first.write_len() + second.write_len(),
            PkeskBytes::Other { raw } => raw.len(),
        }
    }
}

/// Public Key Encrypted Session Key Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.1>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyEncryptedSessionKey {
    id: KeyId,
    pk_algo: PublicKeyAlgorithm,
    values: PkeskBytes,
}

impl PublicKeyEncryptedSessionKey {
    /// Parses a `PublicKeyEncryptedSessionKey` packet body.
    pub fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        if version != 3 {
            unsupported_err!("PKESK version {}", version);
        }

        let id = KeyId::from(i.read_array::<8>()?);
        let pk_algo = PublicKeyAlgorithm::from(i.read_u8()?);

        let values = match pk_algo {
            PublicKeyAlgorithm::RSA
            | PublicKeyAlgorithm::RSAEncrypt
            | PublicKeyAlgorithm::RSASign => PkeskBytes::Rsa {
                mpi: Mpi::try_from_reader(&mut i)?,
            },
            PublicKeyAlgorithm::Elgamal => PkeskBytes::Elgamal {
                first: Mpi::try_from_reader(&mut i)?,
                second: Mpi::try_from_reader(&mut i)?,
            },
            _ => PkeskBytes::Other {
                raw: i.rest()?.freeze(),
            },
        };
        debug!("PKESK for {} ({:?})", id, pk_algo);

        Ok(PublicKeyEncryptedSessionKey {
            id,
            pk_algo,
            values,
        })
    }

    /// Encrypts the session key to the given RSA key.
    pub fn from_session_key<R: CryptoRng + Rng>(
        rng: R,
        session_key: &PlainSessionKey,
        id: KeyId,
        key: &RsaPublicKey,
    ) -> Result<Self> {
        // sym_alg || key || checksum
        let key_bytes = session_key.key();
        let mut data = Zeroizing::new(Vec::with_capacity(key_bytes.len() + 3));
        data.push(u8::from(session_key.sym_alg()));
        data.extend_from_slice(key_bytes);
        data.write_u16::<BigEndian>(session_key.checksum())?;

        let mpi = rsa::encrypt(rng, key, &data)?;

        Ok(PublicKeyEncryptedSessionKey {
            id,
            pk_algo: PublicKeyAlgorithm::RSA,
            values: PkeskBytes::Rsa { mpi },
        })
    }

    /// Decrypts the session key with the given RSA key.
    ///
    /// A key that can not open the session results in [`Error::KeyMismatch`],
    /// a damaged payload in a protocol error.
    pub fn decrypt(&self, key: &RsaPrivateKey) -> Result<PlainSessionKey> {
        let PkeskBytes::Rsa { ref mpi } = self.values else {
            unsupported_err!("decrypting {:?} session keys", self.pk_algo);
        };

        let data = rsa::decrypt(key, mpi).map_err(|err| {
            debug!("rsa decryption failed: {}", err);
            Error::KeyMismatch
        })?;

        if data.len() < 3 {
            return Err(Error::KeyMismatch);
        }

        let sym_alg = SymmetricKeyAlgorithm::from(data[0]);
        let (key, sum) = data[1..].split_at(data.len() - 3);
        checksum::simple([sum[0], sum[1]], key)?;

        PlainSessionKey::new(sym_alg, key)
    }

    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.pk_algo
    }

    pub fn values(&self) -> &PkeskBytes {
        &self.values
    }
}

impl Serialize for PublicKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(3)?;
        writer.write_all(self.id.as_ref())?;
        writer.write_u8(self.pk_algo.into())?;
        self.values.to_writer(writer)
    }

    fn write_len(&self) -> usize {
        1 + 8 + 1 + self.values.write_len()
    }
}

impl PacketTrait for PublicKeyEncryptedSessionKey {
    fn tag(&self) -> Tag {
        Tag::PublicKeyEncryptedSessionKey
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_rsa_session_key() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let other = RsaPrivateKey::new(&mut rng, 1024).unwrap();

        let session_key = PlainSessionKey::generate(&mut rng, SymmetricKeyAlgorithm::AES128);
        let id = KeyId::from(0x0102_0304_0506_0708u64);
        let pkesk = PublicKeyEncryptedSessionKey::from_session_key(
            &mut rng,
            &session_key,
            id,
            &key.to_public_key(),
        )
        .unwrap();

        let bytes = pkesk.to_bytes().unwrap();
        let parsed = PublicKeyEncryptedSessionKey::try_from_reader(&bytes[..]).unwrap();
        assert_eq!(parsed, pkesk);
        assert_eq!(parsed.id(), &id);

        assert_eq!(parsed.decrypt(&key).unwrap(), session_key);
        assert!(matches!(
            parsed.decrypt(&other).unwrap_err(),
            Error::KeyMismatch
        ));
    }

    #[test]
    fn test_unknown_algorithm_is_kept() {
        let raw = [3, 1, 2, 3, 4, 5, 6, 7, 8, 18, 0xAA, 0xBB];
        let pkesk = PublicKeyEncryptedSessionKey::try_from_reader(&raw[..]).unwrap();
        assert_eq!(pkesk.algorithm(), PublicKeyAlgorithm::ECDH);
        assert_eq!(pkesk.to_bytes().unwrap(), raw.to_vec());
        assert!(PublicKeyEncryptedSessionKey::try_from_reader(&[2u8; 12][..]).is_err());
    }
}
