use rand::{CryptoRng, Rng};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::checksum;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{ensure, ensure_eq, Result};

/// A decrypted session key, together with the algorithm of the data it protects.
///
/// This is what a public key or passphrase based session packet decrypts to.
/// It can be kept around to decrypt the same message again without repeating
/// the asymmetric operation.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, derive_more::Debug)]
pub struct PlainSessionKey {
    #[zeroize(skip)]
    sym_alg: SymmetricKeyAlgorithm,
    #[debug("..")]
    key: Vec<u8>,
}

impl PlainSessionKey {
    pub fn new(sym_alg: SymmetricKeyAlgorithm, key: &[u8]) -> Result<Self> {
        ensure!(
            sym_alg.is_supported(),
            "unsupported session key algorithm {:?}",
            sym_alg
        );
        ensure_eq!(key.len(), sym_alg.key_size(), "invalid session key size");

        Ok(PlainSessionKey {
            sym_alg,
            key: key.to_vec(),
        })
    }

    /// Generates a fresh random session key.
    pub fn generate<R: Rng + CryptoRng>(rng: R, sym_alg: SymmetricKeyAlgorithm) -> Self {
        let key = sym_alg.new_session_key(rng);
        PlainSessionKey {
            sym_alg,
            key: key.to_vec(),
        }
    }

    pub fn sym_alg(&self) -> SymmetricKeyAlgorithm {
        self.sym_alg
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The two octet checksum carried next to the key in session packets.
    pub fn checksum(&self) -> u16 {
        checksum::calculate_simple(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_key_size_checked() {
        assert!(PlainSessionKey::new(SymmetricKeyAlgorithm::AES128, &[0u8; 16]).is_ok());
        assert!(PlainSessionKey::new(SymmetricKeyAlgorithm::AES128, &[0u8; 32]).is_err());
        assert!(PlainSessionKey::new(SymmetricKeyAlgorithm::Plaintext, &[]).is_err());
    }

    #[test]
    fn test_generate_and_debug() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let key = PlainSessionKey::generate(&mut rng, SymmetricKeyAlgorithm::AES256);
        assert_eq!(key.key().len(), 32);
        assert!(!format!("{:?}", key).contains(&hex::encode(key.key())));
    }
}
