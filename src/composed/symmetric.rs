use std::io::{BufRead, Read, Write};

use derive_builder::Builder;
use log::{debug, warn};
use rand::{CryptoRng, Rng};

use crate::composed::message::decrypt::decrypt_data;
use crate::composed::message::layer::{open_container, write_literal, ContainerSettings};
use crate::composed::shared::{open_encrypted_data, read_session_packets, Source};
use crate::composed::{InMemoryKeyStore, IntegrityResult};
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{bail, ensure, Error, Result};
use crate::packet::{
    write_packet, PacketHeader, SymKeyEncryptedSessionKey, DEFAULT_PARTIAL_CHUNK_SIZE,
};
use crate::provider;
use crate::types::{
    CompressionAlgorithm, Password, PlainSessionKey, StringToKey, DEFAULT_ITER_SALTED_COUNT,
};

/// Settings for [`SymmetricCodec`].
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(default, build_fn(error = "crate::errors::Error"))]
pub struct SymmetricConfig {
    pub sym_alg: SymmetricKeyAlgorithm,
    pub compression: CompressionAlgorithm,
    pub integrity_protected: bool,
    /// Hash used by the string to key derivation.
    pub s2k_hash: HashAlgorithm,
    /// Encoded iteration count of the string to key derivation.
    pub s2k_count: u8,
    pub chunk_size: usize,
}

impl Default for SymmetricConfig {
    fn default() -> Self {
        let defaults = provider::get();
        SymmetricConfig {
            sym_alg: defaults.sym_alg(),
            compression: CompressionAlgorithm::Uncompressed,
            integrity_protected: true,
            s2k_hash: defaults.hash_alg(),
            s2k_count: DEFAULT_ITER_SALTED_COUNT,
            chunk_size: DEFAULT_PARTIAL_CHUNK_SIZE,
        }
    }
}

/// Passphrase only encryption.
///
/// Messages consist of a single SKESK whose derived key is used as the session
/// key, followed by the encrypted data.
#[derive(Debug, Clone, Default)]
pub struct SymmetricCodec {
    config: SymmetricConfig,
}

impl SymmetricCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SymmetricConfig) -> Self {
        SymmetricCodec { config }
    }

    pub fn config(&self) -> &SymmetricConfig {
        &self.config
    }

    pub fn encrypt<RNG: CryptoRng + Rng, R: Read, W: Write>(
        &self,
        mut rng: RNG,
        mut input: R,
        mut output: W,
        armored: bool,
        passphrase: &Password,
    ) -> Result<()> {
        ensure!(!passphrase.is_empty(), "empty passphrase");
        let provider = provider::get();
        ensure!(
            provider.supports_symmetric(self.config.sym_alg),
            "symmetric algorithm {} is not enabled",
            self.config.sym_alg
        );
        ensure!(
            provider.supports_compression(self.config.compression),
            "compression algorithm {} is not enabled",
            self.config.compression
        );

        let s2k = StringToKey::new_iterated(&mut rng, self.config.s2k_hash, self.config.s2k_count);
        let key = s2k.derive_key(&passphrase.read(), self.config.sym_alg.key_size())?;
        let session_key = PlainSessionKey::new(self.config.sym_alg, &key)?;

        let skesk = SymKeyEncryptedSessionKey::new_direct(self.config.sym_alg, s2k);
        let mut sessions = Vec::new();
        write_packet(&mut sessions, &skesk)?;

        let settings = ContainerSettings {
            armored,
            integrity_protected: self.config.integrity_protected,
            compression: self.config.compression,
            chunk_size: self.config.chunk_size,
        };
        let mut container =
            open_container(&mut rng, &mut output, &settings, &sessions, &session_key)?;
        write_literal(&mut container, &mut input, "", self.config.chunk_size, &mut [])?;

        container.close()
    }

    /// Decrypts a passphrase encrypted message into `output`.
    ///
    /// Returns [`Error::BadPassword`] if no session packet can be opened with the
    /// passphrase, and [`Error::ProtocolError`] if the integrity check fails.
    pub fn decrypt<R: BufRead, W: Write>(
        &self,
        input: R,
        output: W,
        passphrase: &Password,
    ) -> Result<IntegrityResult> {
        let mut source = Source::new(input)?;
        let packets = read_session_packets(&mut source)?;
        if packets.skesks.is_empty() {
            debug!("no passphrase sessions");
            return Err(Error::NoPgpDataFound);
        }

        let mut last_err = Error::BadPassword;
        let session_key = packets.skesks.iter().find_map(|skesk| match skesk.decrypt(passphrase) {
            Ok(key) => Some(key),
            Err(err) => {
                debug!("passphrase session failed: {}", err);
                last_err = err;
                None
            }
        });
        let Some(session_key) = session_key else {
            return Err(last_err);
        };

        self.decrypt_body(packets.data_header, source, &session_key, output)
    }

    /// Decrypts with an already known session key, skipping all session packets.
    pub fn decrypt_with_session_key<R: BufRead, W: Write>(
        &self,
        input: R,
        output: W,
        session_key: &PlainSessionKey,
    ) -> Result<IntegrityResult> {
        let mut source = Source::new(input)?;
        let packets = read_session_packets(&mut source)?;

        self.decrypt_body(packets.data_header, source, session_key, output)
    }

    fn decrypt_body<R: BufRead, W: Write>(
        &self,
        data_header: PacketHeader,
        mut source: Source<R>,
        session_key: &PlainSessionKey,
        mut output: W,
    ) -> Result<IntegrityResult> {
        let decryptor = open_encrypted_data(data_header, &mut source, session_key)?;
        if !decryptor.quick_check() {
            debug!("quick check failed");
            return Err(Error::BadPassword);
        }

        let res = decrypt_data(&InMemoryKeyStore::new(), decryptor, &mut output)?;
        if !res.signature_results().is_empty() {
            warn!(
                "ignoring {} signatures in passphrase encrypted message",
                res.signature_results().len()
            );
        }
        source.finish()?;

        let integrity = *res.integrity_result();
        if integrity.is_present() && !integrity.verified() {
            bail!("integrity check failed");
        }

        Ok(integrity)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use testresult::TestResult;

    use super::*;

    fn config() -> SymmetricConfig {
        SymmetricConfigBuilder::default()
            .s2k_count(0x10)
            .chunk_size(512)
            .build()
            .unwrap()
    }

    fn encrypt(codec: &SymmetricCodec, data: &[u8], armored: bool, password: &str) -> Vec<u8> {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let mut out = Vec::new();
        codec
            .encrypt(&mut rng, data, &mut out, armored, &Password::from(password))
            .unwrap();
        out
    }

    #[test]
    fn test_round_trip() -> TestResult {
        let _ = pretty_env_logger::try_init();
        let codec = SymmetricCodec::with_config(config());
        let data = vec![7u8; 3000];

        for armored in [false, true] {
            let encrypted = encrypt(&codec, &data, armored, "secret");
            if armored {
                assert!(encrypted.starts_with(b"-----BEGIN PGP MESSAGE-----"));
            }

            let mut out = Vec::new();
            let integrity = codec.decrypt(&encrypted[..], &mut out, &Password::from("secret"))?;
            assert!(integrity.is_present());
            assert!(integrity.verified());
            assert_eq!(out, data);
        }

        Ok(())
    }

    #[test]
    fn test_wrong_passphrase() {
        let codec = SymmetricCodec::with_config(config());
        let encrypted = encrypt(&codec, b"hello", false, "secret");

        let mut out = Vec::new();
        let err = codec
            .decrypt(&encrypted[..], &mut out, &Password::from("guess"))
            .unwrap_err();
        assert!(matches!(err, Error::BadPassword), "{:?}", err);
        assert!(out.is_empty());
    }

    #[test]
    fn test_tampered_mdc() {
        let codec = SymmetricCodec::with_config(config());
        let mut encrypted = encrypt(&codec, b"hello world", false, "secret");
        let pos = encrypted.len() - 5;
        encrypted[pos] ^= 0x01;

        let err = codec
            .decrypt(&encrypted[..], &mut Vec::new(), &Password::from("secret"))
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolError { .. }), "{:?}", err);
    }

    #[test]
    fn test_without_integrity_protection() -> TestResult {
        let mut config = config();
        config.integrity_protected = false;
        config.compression = CompressionAlgorithm::ZLIB;
        let codec = SymmetricCodec::with_config(config);
        let encrypted = encrypt(&codec, b"legacy data", false, "secret");

        let mut out = Vec::new();
        let integrity = codec.decrypt(&encrypted[..], &mut out, &Password::from("secret"))?;
        assert!(!integrity.is_present());
        assert!(!integrity.verified());
        assert_eq!(out, b"legacy data");

        Ok(())
    }

    #[test]
    fn test_session_key_reuse() -> TestResult {
        let codec = SymmetricCodec::with_config(config());
        let encrypted = encrypt(&codec, b"twice", false, "secret");

        let mut source = Source::new(&encrypted[..])?;
        let packets = read_session_packets(&mut source)?;
        let session_key = packets.skesks[0].decrypt(&Password::from("secret"))?;

        for _ in 0..2 {
            let mut out = Vec::new();
            codec.decrypt_with_session_key(&encrypted[..], &mut out, &session_key)?;
            assert_eq!(out, b"twice");
        }

        Ok(())
    }

    #[test]
    fn test_no_passphrase_session() {
        let err = SymmetricCodec::new()
            .decrypt(&[0xCBu8, 0x00][..], &mut Vec::new(), &Password::from("x"))
            .unwrap_err();
        assert!(matches!(err, Error::NoPgpDataFound), "{:?}", err);
    }
}
