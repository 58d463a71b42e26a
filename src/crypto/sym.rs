use std::fmt;

use aes::{Aes128, Aes192, Aes256};
use blowfish::Blowfish;
use camellia::{Camellia128, Camellia192, Camellia256};
use cast5::Cast5;
use cfb_mode::{cipher::KeyIvInit, BufDecryptor, BufEncryptor};
use des::TdesEde3;
use idea::Idea;
use num_enum::{FromPrimitive, IntoPrimitive};
use rand::{CryptoRng, Rng};
use twofish::Twofish;
use zeroize::Zeroizing;

use crate::errors::{bail, unsupported_err, Result};

mod decryptor;
mod encryptor;

pub use self::decryptor::StreamDecryptor;
pub use self::encryptor::StreamEncryptor;

/// Available symmetric key algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-9.2>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive, derive_more::Display)]
#[repr(u8)]
#[non_exhaustive]
pub enum SymmetricKeyAlgorithm {
    /// Plaintext or unencrypted data
    #[display("plaintext")]
    Plaintext = 0,
    /// IDEA
    #[display("IDEA")]
    IDEA = 1,
    /// Triple-DES
    #[display("3DES")]
    TripleDES = 2,
    /// CAST5
    #[display("CAST5")]
    CAST5 = 3,
    /// Blowfish
    #[display("Blowfish")]
    Blowfish = 4,
    // 5 & 6 are reserved for DES/SK
    /// AES with 128-bit key
    #[display("AES128")]
    AES128 = 7,
    /// AES with 192-bit key
    #[display("AES192")]
    AES192 = 8,
    /// AES with 256-bit key
    #[display("AES256")]
    AES256 = 9,
    /// Twofish with 256-bit key
    #[display("Twofish")]
    Twofish = 10,
    /// [Camellia](https://tools.ietf.org/html/rfc5581#section-3) with 128-bit key
    #[display("Camellia128")]
    Camellia128 = 11,
    /// [Camellia](https://tools.ietf.org/html/rfc5581#section-3) with 192-bit key
    #[display("Camellia192")]
    Camellia192 = 12,
    /// [Camellia](https://tools.ietf.org/html/rfc5581#section-3) with 256-bit key
    #[display("Camellia256")]
    Camellia256 = 13,

    #[num_enum(catch_all)]
    #[display("unknown({_0})")]
    Other(u8),
}

impl Default for SymmetricKeyAlgorithm {
    fn default() -> Self {
        Self::AES256
    }
}

impl SymmetricKeyAlgorithm {
    /// The size of a single block in bytes.
    pub fn block_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::IDEA
            | SymmetricKeyAlgorithm::TripleDES
            | SymmetricKeyAlgorithm::CAST5
            | SymmetricKeyAlgorithm::Blowfish => 8,
            SymmetricKeyAlgorithm::AES128
            | SymmetricKeyAlgorithm::AES192
            | SymmetricKeyAlgorithm::AES256
            | SymmetricKeyAlgorithm::Twofish
            | SymmetricKeyAlgorithm::Camellia128
            | SymmetricKeyAlgorithm::Camellia192
            | SymmetricKeyAlgorithm::Camellia256 => 16,
            SymmetricKeyAlgorithm::Plaintext | SymmetricKeyAlgorithm::Other(_) => 0,
        }
    }

    /// The size of the key in bytes.
    pub const fn key_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::IDEA => 16,
            SymmetricKeyAlgorithm::TripleDES => 24,
            SymmetricKeyAlgorithm::CAST5 => 16,
            SymmetricKeyAlgorithm::Blowfish => 16,
            SymmetricKeyAlgorithm::AES128 => 16,
            SymmetricKeyAlgorithm::AES192 => 24,
            SymmetricKeyAlgorithm::AES256 => 32,
            SymmetricKeyAlgorithm::Twofish => 32,
            SymmetricKeyAlgorithm::Camellia128 => 16,
            SymmetricKeyAlgorithm::Camellia192 => 24,
            SymmetricKeyAlgorithm::Camellia256 => 32,
            SymmetricKeyAlgorithm::Plaintext | SymmetricKeyAlgorithm::Other(_) => 0,
        }
    }

    /// Whether this crate can encrypt and decrypt with the algorithm.
    pub fn is_supported(self) -> bool {
        self.block_size() > 0
    }

    /// Generate a new session key.
    pub fn new_session_key<R: Rng + CryptoRng>(self, mut rng: R) -> Zeroizing<Vec<u8>> {
        let mut session_key = Zeroizing::new(vec![0u8; self.key_size()]);
        rng.fill_bytes(&mut session_key);
        session_key
    }

    /// Decrypt the data using regular CFB mode, without padding. Overwrites the input.
    pub fn decrypt_with_iv_regular(self, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
        CfbDecryptor::new(self, key, iv)?.decrypt(data);
        Ok(())
    }

    /// Encrypt the data using regular CFB mode, without padding. Overwrites the input.
    pub fn encrypt_with_iv_regular(self, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
        CfbEncryptor::new(self, key, iv)?.encrypt(data);
        Ok(())
    }

    /// Streaming decryption of a `SymEncryptedProtectedData` body.
    pub fn stream_decryptor_protected<R: std::io::BufRead>(
        self,
        key: &[u8],
        ciphertext: R,
    ) -> Result<StreamDecryptor<R>> {
        StreamDecryptor::new(self, true, key, ciphertext)
    }

    /// Streaming decryption of a legacy `SymEncryptedData` body.
    pub fn stream_decryptor_unprotected<R: std::io::BufRead>(
        self,
        key: &[u8],
        ciphertext: R,
    ) -> Result<StreamDecryptor<R>> {
        StreamDecryptor::new(self, false, key, ciphertext)
    }
}

/// CFB encryption state over any of the supported block ciphers.
pub enum CfbEncryptor {
    Idea(BufEncryptor<Idea>),
    TripleDes(BufEncryptor<TdesEde3>),
    Cast5(BufEncryptor<Cast5>),
    Blowfish(BufEncryptor<Blowfish>),
    Aes128(BufEncryptor<Aes128>),
    Aes192(BufEncryptor<Aes192>),
    Aes256(BufEncryptor<Aes256>),
    Twofish(BufEncryptor<Twofish>),
    Camellia128(BufEncryptor<Camellia128>),
    Camellia192(BufEncryptor<Camellia192>),
    Camellia256(BufEncryptor<Camellia256>),
}

impl fmt::Debug for CfbEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CfbEncryptor")
    }
}

impl CfbEncryptor {
    pub fn new(alg: SymmetricKeyAlgorithm, key: &[u8], iv: &[u8]) -> Result<Self> {
        let enc = match alg {
            SymmetricKeyAlgorithm::Plaintext => {
                bail!("'Plaintext' is not a legal cipher for encrypted data")
            }
            SymmetricKeyAlgorithm::IDEA => Self::Idea(BufEncryptor::new_from_slices(key, iv)?),
            SymmetricKeyAlgorithm::TripleDES => {
                Self::TripleDes(BufEncryptor::new_from_slices(key, iv)?)
            }
            SymmetricKeyAlgorithm::CAST5 => Self::Cast5(BufEncryptor::new_from_slices(key, iv)?),
            SymmetricKeyAlgorithm::Blowfish => {
                Self::Blowfish(BufEncryptor::new_from_slices(key, iv)?)
            }
            SymmetricKeyAlgorithm::AES128 => Self::Aes128(BufEncryptor::new_from_slices(key, iv)?),
            SymmetricKeyAlgorithm::AES192 => Self::Aes192(BufEncryptor::new_from_slices(key, iv)?),
            SymmetricKeyAlgorithm::AES256 => Self::Aes256(BufEncryptor::new_from_slices(key, iv)?),
            SymmetricKeyAlgorithm::Twofish => {
                Self::Twofish(BufEncryptor::new_from_slices(key, iv)?)
            }
            SymmetricKeyAlgorithm::Camellia128 => {
                Self::Camellia128(BufEncryptor::new_from_slices(key, iv)?)
            }
            SymmetricKeyAlgorithm::Camellia192 => {
                Self::Camellia192(BufEncryptor::new_from_slices(key, iv)?)
            }
            SymmetricKeyAlgorithm::Camellia256 => {
                Self::Camellia256(BufEncryptor::new_from_slices(key, iv)?)
            }
            SymmetricKeyAlgorithm::Other(_) => {
                unsupported_err!("SymmetricKeyAlgorithm {} is unsupported", u8::from(alg))
            }
        };
        Ok(enc)
    }

    pub fn encrypt(&mut self, data: &mut [u8]) {
        match self {
            Self::Idea(e) => e.encrypt(data),
            Self::TripleDes(e) => e.encrypt(data),
            Self::Cast5(e) => e.encrypt(data),
            Self::Blowfish(e) => e.encrypt(data),
            Self::Aes128(e) => e.encrypt(data),
            Self::Aes192(e) => e.encrypt(data),
            Self::Aes256(e) => e.encrypt(data),
            Self::Twofish(e) => e.encrypt(data),
            Self::Camellia128(e) => e.encrypt(data),
            Self::Camellia192(e) => e.encrypt(data),
            Self::Camellia256(e) => e.encrypt(data),
        }
    }
}

/// CFB decryption state over any of the supported block ciphers.
pub enum CfbDecryptor {
    Idea(BufDecryptor<Idea>),
    TripleDes(BufDecryptor<TdesEde3>),
    Cast5(BufDecryptor<Cast5>),
    Blowfish(BufDecryptor<Blowfish>),
    Aes128(BufDecryptor<Aes128>),
    Aes192(BufDecryptor<Aes192>),
    Aes256(BufDecryptor<Aes256>),
    Twofish(BufDecryptor<Twofish>),
    Camellia128(BufDecryptor<Camellia128>),
    Camellia192(BufDecryptor<Camellia192>),
    Camellia256(BufDecryptor<Camellia256>),
}

impl fmt::Debug for CfbDecryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CfbDecryptor")
    }
}

impl CfbDecryptor {
    pub fn new(alg: SymmetricKeyAlgorithm, key: &[u8], iv: &[u8]) -> Result<Self> {
        let dec = match alg {
            SymmetricKeyAlgorithm::Plaintext => {
                bail!("'Plaintext' is not a legal cipher for encrypted data")
            }
            SymmetricKeyAlgorithm::IDEA => Self::Idea(BufDecryptor::new_from_slices(key, iv)?),
            SymmetricKeyAlgorithm::TripleDES => {
                Self::TripleDes(BufDecryptor::new_from_slices(key, iv)?)
            }
            SymmetricKeyAlgorithm::CAST5 => Self::Cast5(BufDecryptor::new_from_slices(key, iv)?),
            SymmetricKeyAlgorithm::Blowfish => {
                Self::Blowfish(BufDecryptor::new_from_slices(key, iv)?)
            }
            SymmetricKeyAlgorithm::AES128 => Self::Aes128(BufDecryptor::new_from_slices(key, iv)?),
            SymmetricKeyAlgorithm::AES192 => Self::Aes192(BufDecryptor::new_from_slices(key, iv)?),
            SymmetricKeyAlgorithm::AES256 => Self::Aes256(BufDecryptor::new_from_slices(key, iv)?),
            SymmetricKeyAlgorithm::Twofish => {
                Self::Twofish(BufDecryptor::new_from_slices(key, iv)?)
            }
            SymmetricKeyAlgorithm::Camellia128 => {
                Self::Camellia128(BufDecryptor::new_from_slices(key, iv)?)
            }
            SymmetricKeyAlgorithm::Camellia192 => {
                Self::Camellia192(BufDecryptor::new_from_slices(key, iv)?)
            }
            SymmetricKeyAlgorithm::Camellia256 => {
                Self::Camellia256(BufDecryptor::new_from_slices(key, iv)?)
            }
            SymmetricKeyAlgorithm::Other(_) => {
                unsupported_err!("SymmetricKeyAlgorithm {} is unsupported", u8::from(alg))
            }
        };
        Ok(dec)
    }

    pub fn decrypt(&mut self, data: &mut [u8]) {
        match self {
            Self::Idea(d) => d.decrypt(data),
            Self::TripleDes(d) => d.decrypt(data),
            Self::Cast5(d) => d.decrypt(data),
            Self::Blowfish(d) => d.decrypt(data),
            Self::Aes128(d) => d.decrypt(data),
            Self::Aes192(d) => d.decrypt(data),
            Self::Aes256(d) => d.decrypt(data),
            Self::Twofish(d) => d.decrypt(data),
            Self::Camellia128(d) => d.decrypt(data),
            Self::Camellia192(d) => d.decrypt(data),
            Self::Camellia256(d) => d.decrypt(data),
        }
    }
}
