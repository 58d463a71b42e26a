use std::io::{Read, Write};

use chrono::Utc;
use derive_builder::Builder;
use log::debug;
use rand::{CryptoRng, Rng};

use crate::composed::message::layer::{open_container, write_literal, ContainerSettings};
use crate::composed::SignedPublicKey;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{ensure, format_err, Error, Result};
use crate::packet::{
    write_packet, OnePassSignature, SecretKey, SignatureConfig, SignatureHasher, SignatureType,
    DEFAULT_PARTIAL_CHUNK_SIZE,
};
use crate::provider;
use crate::types::{CompressionAlgorithm, Password, PlainSessionKey};

/// Settings for [`MessageEncryptor`].
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(default, build_fn(error = "crate::errors::Error"))]
pub struct EncryptionConfig {
    pub sym_alg: SymmetricKeyAlgorithm,
    pub compression: CompressionAlgorithm,
    /// Write SEIPD with a modification detection code, instead of legacy SED.
    pub integrity_protected: bool,
    /// Hash of inline signatures.
    pub hash_alg: HashAlgorithm,
    /// Size of partial body chunks, a power of two of at least 512.
    pub chunk_size: usize,
    /// File name in the literal data packet.
    #[builder(setter(into))]
    pub file_name: String,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        let defaults = provider::get();
        EncryptionConfig {
            sym_alg: defaults.sym_alg(),
            compression: defaults.compression(),
            integrity_protected: true,
            hash_alg: defaults.hash_alg(),
            chunk_size: DEFAULT_PARTIAL_CHUNK_SIZE,
            file_name: String::new(),
        }
    }
}

/// Encrypts messages to any number of recipients, optionally signing them inline.
#[derive(Debug, Clone, Default)]
pub struct MessageEncryptor {
    config: EncryptionConfig,
}

impl MessageEncryptor {
    /// An encryptor using the provider defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EncryptionConfig) -> Self {
        MessageEncryptor { config }
    }

    pub fn config(&self) -> &EncryptionConfig {
        &self.config
    }

    /// Encrypts `input` to all `recipients`.
    pub fn encrypt<RNG: CryptoRng + Rng, R: Read, W: Write>(
        &self,
        rng: RNG,
        input: R,
        output: W,
        armored: bool,
        recipients: &[SignedPublicKey],
    ) -> Result<()> {
        self.encrypt_signed(rng, input, output, armored, None, None, recipients)
    }

    /// Encrypts `input` to all `recipients`, signed by `signing_key` if one is given.
    ///
    /// A locked signing key is unlocked with `passphrase`. If that fails
    /// nothing is written to `output`.
    #[allow(clippy::too_many_arguments)]
    pub fn encrypt_signed<RNG: CryptoRng + Rng, R: Read, W: Write>(
        &self,
        mut rng: RNG,
        mut input: R,
        mut output: W,
        armored: bool,
        signing_key: Option<&SecretKey>,
        passphrase: Option<&Password>,
        recipients: &[SignedPublicKey],
    ) -> Result<()> {
        ensure!(!recipients.is_empty(), "no recipients");
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

        let signing_key = signing_key
            .map(|key| unlock_signing_key(key, passphrase))
            .transpose()?;

        let session_key = PlainSessionKey::generate(&mut rng, self.config.sym_alg);
        let mut sessions = Vec::new();
        for recipient in recipients {
            let key = recipient.encryption_key().ok_or_else(|| {
                format_err!("certificate {} has no encryption key", recipient.key_id())
            })?;
            debug!("encrypting to {}", key.key_id());
            let pkesk = key.encrypt_session_key(&mut rng, &session_key)?;
            write_packet(&mut sessions, &pkesk)?;
        }

        let settings = ContainerSettings {
            armored,
            integrity_protected: self.config.integrity_protected,
            compression: self.config.compression,
            chunk_size: self.config.chunk_size,
        };
        let mut container =
            open_container(&mut rng, &mut output, &settings, &sessions, &session_key)?;

        match signing_key {
            Some(key) => {
                let config = SignatureConfig::v4(
                    SignatureType::Binary,
                    self.config.hash_alg,
                    key.public_key(),
                    Utc::now(),
                );
                let ops = OnePassSignature::from_config(&config, key.key_id());
                write_packet(&mut container, &ops)?;

                let mut hashers = [SignatureHasher::new(&config)?];
                write_literal(
                    &mut container,
                    &mut input,
                    &self.config.file_name,
                    self.config.chunk_size,
                    &mut hashers,
                )?;
                let [hasher] = hashers;

                let signature = config.sign_hasher(&key, hasher.into_inner())?;
                write_packet(&mut container, &signature)?;
            }
            None => {
                write_literal(
                    &mut container,
                    &mut input,
                    &self.config.file_name,
                    self.config.chunk_size,
                    &mut [],
                )?;
            }
        }

        container.close()
    }
}

/// Returns an unlocked copy of the signing key, or [`Error::BadPassword`].
pub(crate) fn unlock_signing_key(
    key: &SecretKey,
    passphrase: Option<&Password>,
) -> Result<SecretKey> {
    ensure!(
        key.public_key().is_signing_key(),
        "key {} can not sign",
        key.key_id()
    );
    if !key.is_locked() {
        return Ok(key.clone());
    }

    let passphrase = passphrase.ok_or(Error::BadPassword)?;
    key.unlock(passphrase)
}
