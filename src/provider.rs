//! Process wide cryptographic provider.
//!
//! The provider lists the algorithms this crate may produce and the defaults
//! used when a component is created without explicit configuration. It is
//! installed once, either explicitly or on first use.

use std::sync::OnceLock;

use derive_builder::Builder;
use log::debug;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::types::CompressionAlgorithm;

static PROVIDER: OnceLock<Provider> = OnceLock::new();

/// Supported algorithms and default preferences.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(default, build_fn(error = "crate::errors::Error"))]
pub struct Provider {
    symmetric: Vec<SymmetricKeyAlgorithm>,
    hashes: Vec<HashAlgorithm>,
    public_key: Vec<PublicKeyAlgorithm>,
    compression: Vec<CompressionAlgorithm>,
    default_sym_alg: SymmetricKeyAlgorithm,
    default_hash_alg: HashAlgorithm,
    default_compression: CompressionAlgorithm,
}

impl Default for Provider {
    fn default() -> Self {
        let mut compression = vec![
            CompressionAlgorithm::Uncompressed,
            CompressionAlgorithm::ZIP,
            CompressionAlgorithm::ZLIB,
        ];
        if cfg!(feature = "bzip2") {
            compression.push(CompressionAlgorithm::BZip2);
        }

        Provider {
            symmetric: vec![
                SymmetricKeyAlgorithm::AES256,
                SymmetricKeyAlgorithm::AES192,
                SymmetricKeyAlgorithm::AES128,
                SymmetricKeyAlgorithm::Twofish,
                SymmetricKeyAlgorithm::Camellia256,
                SymmetricKeyAlgorithm::Camellia192,
                SymmetricKeyAlgorithm::Camellia128,
                SymmetricKeyAlgorithm::CAST5,
                SymmetricKeyAlgorithm::Blowfish,
                SymmetricKeyAlgorithm::TripleDES,
                SymmetricKeyAlgorithm::IDEA,
            ],
            hashes: vec![
                HashAlgorithm::Sha512,
                HashAlgorithm::Sha384,
                HashAlgorithm::Sha256,
                HashAlgorithm::Sha224,
                HashAlgorithm::Sha1,
                HashAlgorithm::Ripemd160,
            ],
            public_key: vec![
                PublicKeyAlgorithm::RSA,
                PublicKeyAlgorithm::RSAEncrypt,
                PublicKeyAlgorithm::RSASign,
                PublicKeyAlgorithm::Ed25519,
            ],
            compression,
            default_sym_alg: SymmetricKeyAlgorithm::AES256,
            default_hash_alg: HashAlgorithm::Sha256,
            default_compression: CompressionAlgorithm::ZIP,
        }
    }
}

impl Provider {
    pub fn sym_alg(&self) -> SymmetricKeyAlgorithm {
        self.default_sym_alg
    }

    pub fn hash_alg(&self) -> HashAlgorithm {
        self.default_hash_alg
    }

    pub fn compression(&self) -> CompressionAlgorithm {
        self.default_compression
    }

    pub fn supports_symmetric(&self, alg: SymmetricKeyAlgorithm) -> bool {
        self.symmetric.contains(&alg)
    }

    pub fn supports_hash(&self, alg: HashAlgorithm) -> bool {
        self.hashes.contains(&alg)
    }

    pub fn supports_public_key(&self, alg: PublicKeyAlgorithm) -> bool {
        self.public_key.contains(&alg)
    }

    pub fn supports_compression(&self, alg: CompressionAlgorithm) -> bool {
        self.compression.contains(&alg)
    }
}

/// Installs the default provider, unless one is installed already.
pub fn install_default() -> &'static Provider {
    install(Provider::default())
}

/// Installs `provider` as the process wide provider.
///
/// The first install wins. Later calls return the installed provider and drop theirs.
pub fn install(provider: Provider) -> &'static Provider {
    let mut fresh = false;
    let installed = PROVIDER.get_or_init(|| {
        fresh = true;
        provider
    });
    if fresh {
        debug!("installed crypto provider {:?}", installed);
    }

    installed
}

/// The installed provider, installing the default one on first use.
pub fn get() -> &'static Provider {
    match PROVIDER.get() {
        Some(provider) => provider,
        None => install_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_is_idempotent() {
        let first = install_default();
        let custom = ProviderBuilder::default()
            .default_sym_alg(SymmetricKeyAlgorithm::AES128)
            .build()
            .unwrap();
        let second = install(custom);

        assert!(std::ptr::eq(first, second));
        assert!(std::ptr::eq(first, get()));
        assert_eq!(get().sym_alg(), SymmetricKeyAlgorithm::AES256);
    }

    #[test]
    fn test_default_support() {
        let provider = Provider::default();
        assert!(provider.supports_symmetric(SymmetricKeyAlgorithm::AES256));
        assert!(provider.supports_hash(HashAlgorithm::Sha1));
        assert!(!provider.supports_hash(HashAlgorithm::Md5));
        assert!(provider.supports_public_key(PublicKeyAlgorithm::Ed25519));
        assert!(!provider.supports_compression(CompressionAlgorithm::Other(110)));
    }
}
