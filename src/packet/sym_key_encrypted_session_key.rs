use std::io::{self, BufRead};

use byteorder::WriteBytesExt;
use bytes::Bytes;
use log::debug;
use zeroize::Zeroizing;

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{ensure, unsupported_err, Error, Result};
use crate::packet::PacketTrait;
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{Password, PlainSessionKey, StringToKey, Tag};

/// Symmetric-Key Encrypted Session Key Packet, version 4
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.3>
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub struct SymKeyEncryptedSessionKey {
    sym_algorithm: SymmetricKeyAlgorithm,
    s2k: StringToKey,
    #[debug("{:?}", encrypted_key.as_ref().map(hex::encode))]
    encrypted_key: Option<Bytes>,
}

impl SymKeyEncryptedSessionKey {
    /// Parses a `SymKeyEncryptedSessionKey` packet body.
    pub fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        if version != 4 {
            unsupported_err!("SKESK version {}", version);
        }

        let sym_algorithm = SymmetricKeyAlgorithm::from(i.read_u8()?);
        let s2k = StringToKey::try_from_reader(&mut i)?;
        let encrypted_key = i.rest()?.freeze();
        let encrypted_key = if encrypted_key.is_empty() {
            None
        } else {
            Some(encrypted_key)
        };

        Ok(SymKeyEncryptedSessionKey {
            sym_algorithm,
            s2k,
            encrypted_key,
        })
    }

    /// A packet whose derived key is used as session key directly.
    pub fn new_direct(sym_algorithm: SymmetricKeyAlgorithm, s2k: StringToKey) -> Self {
        SymKeyEncryptedSessionKey {
            sym_algorithm,
            s2k,
            encrypted_key: None,
        }
    }

    /// Wraps an existing session key with a key derived from the password.
    pub fn encrypt(
        password: &Password,
        session_key: &PlainSessionKey,
        s2k: StringToKey,
        alg: SymmetricKeyAlgorithm,
    ) -> Result<Self> {
        ensure!(
            !password.is_empty(),
            "refusing to encrypt a session key with an empty password"
        );
        let key = s2k.derive_key(&password.read(), alg.key_size())?;

        let mut data = Zeroizing::new(Vec::with_capacity(session_key.key().len() + 1));
        data.push(u8::from(session_key.sym_alg()));
        data.extend_from_slice(session_key.key());

        let iv = vec![0u8; alg.block_size()];
        alg.encrypt_with_iv_regular(&key, &iv, &mut data)?;

        Ok(SymKeyEncryptedSessionKey {
            sym_algorithm: alg,
            s2k,
            encrypted_key: Some(Bytes::copy_from_slice(&data)),
        })
    }

    /// Derives the session key from the password.
    ///
    /// A wrapped key that decrypts to garbage is reported as [`Error::BadPassword`].
    /// Without a wrapped key a wrong password can only be detected when the data
    /// is decrypted.
    pub fn decrypt(&self, password: &Password) -> Result<PlainSessionKey> {
        if !self.sym_algorithm.is_supported() {
            unsupported_err!("symmetric algorithm {:?}", self.sym_algorithm);
        }
        let key = self
            .s2k
            .derive_key(&password.read(), self.sym_algorithm.key_size())?;

        let Some(ref encrypted_key) = self.encrypted_key else {
            return PlainSessionKey::new(self.sym_algorithm, &key);
        };

        let mut data = Zeroizing::new(encrypted_key.to_vec());
        let iv = vec![0u8; self.sym_algorithm.block_size()];
        self.sym_algorithm
            .decrypt_with_iv_regular(&key, &iv, &mut data)?;

        let sym_alg = SymmetricKeyAlgorithm::from(data[0]);
        if !sym_alg.is_supported() || data.len() - 1 != sym_alg.key_size() {
            debug!("SKESK decrypted to an invalid session key");
            return Err(Error::BadPassword);
        }

        PlainSessionKey::new(sym_alg, &data[1..])
    }

    pub fn sym_algorithm(&self) -> SymmetricKeyAlgorithm {
        self.sym_algorithm
    }

    pub fn s2k(&self) -> &StringToKey {
        &self.s2k
    }
}

impl Serialize for SymKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(4)?;
        writer.write_u8(self.sym_algorithm.into())?;
        self.s2k.to_writer(writer)?;
        if let Some(ref key) = self.encrypted_key {
            writer.write_all(key)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.s2k.write_len() + self.encrypted_key.as_ref().map_or(0, Bytes::len)
    }
}

impl PacketTrait for SymKeyEncryptedSessionKey {
    fn tag(&self) -> Tag {
        Tag::SymKeyEncryptedSessionKey
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::hash::HashAlgorithm;

    fn s2k() -> StringToKey {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        StringToKey::new_iterated(&mut rng, HashAlgorithm::Sha256, 96)
    }

    #[test]
    fn test_direct_key() {
        let packet = SymKeyEncryptedSessionKey::new_direct(SymmetricKeyAlgorithm::AES128, s2k());
        let bytes = packet.to_bytes().unwrap();
        assert_eq!(bytes.len(), packet.write_len());

        let parsed = SymKeyEncryptedSessionKey::try_from_reader(&bytes[..]).unwrap();
        assert_eq!(parsed, packet);

        let a = parsed.decrypt(&"secret".into()).unwrap();
        let b = parsed.decrypt(&"other".into()).unwrap();
        assert_eq!(a.sym_alg(), SymmetricKeyAlgorithm::AES128);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_wrapped_key() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let session_key = PlainSessionKey::generate(&mut rng, SymmetricKeyAlgorithm::AES256);
        let packet = SymKeyEncryptedSessionKey::encrypt(
            &"secret".into(),
            &session_key,
            s2k(),
            SymmetricKeyAlgorithm::AES128,
        )
        .unwrap();

        let bytes = packet.to_bytes().unwrap();
        let parsed = SymKeyEncryptedSessionKey::try_from_reader(&bytes[..]).unwrap();
        assert_eq!(parsed.decrypt(&"secret".into()).unwrap(), session_key);
        // the algorithm octet decrypts to a plausible value once in a while
        match parsed.decrypt(&"wrong".into()) {
            Ok(key) => assert_ne!(key, session_key),
            Err(err) => assert!(matches!(err, Error::BadPassword), "{:?}", err),
        }
    }
}
