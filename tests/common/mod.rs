#![allow(dead_code)]

use std::io::Write;

use chrono::{TimeZone, Utc};
use pgp_stream::composed::{
    InMemoryKeyStore, SignedKeyDetails, SignedPublicKey, SignedPublicSubKey, SignedUser,
};
use pgp_stream::crypto::hash::HashAlgorithm;
use pgp_stream::crypto::sym::{StreamEncryptor, SymmetricKeyAlgorithm};
use pgp_stream::packet::{
    write_packet, PartialBodyWriter, PublicKey, SecretKey, SignatureConfig, SignatureType, UserId,
};
use pgp_stream::types::{PlainSessionKey, Tag};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A certificate with an Ed25519 primary key, a signing Ed25519 subkey and an
/// RSA encryption subkey, plus all secret parts.
pub struct Identity {
    pub cert: SignedPublicKey,
    pub primary: SecretKey,
    pub signing: SecretKey,
    pub encryption: SecretKey,
}

impl Identity {
    pub fn new(seed: u64, user_id: &str) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let primary = SecretKey::generate_ed25519(&mut rng, created);
        let signing = SecretKey::generate_ed25519(&mut rng, created);
        let encryption = SecretKey::generate_rsa(&mut rng, 1024, created).unwrap();

        let config =
            |typ| SignatureConfig::v4(typ, HashAlgorithm::Sha256, primary.public_key(), created);
        let id = UserId::from_str(user_id);
        let certification = config(SignatureType::CertPositive)
            .sign_certification(&primary, primary.public_key(), Tag::UserId, &id)
            .unwrap();
        let bind = |subkey: &SecretKey| {
            config(SignatureType::SubkeyBinding)
                .sign_key_binding(&primary, primary.public_key(), subkey.public_key())
                .unwrap()
        };

        let cert = SignedPublicKey::new(
            primary.public_key().clone(),
            SignedKeyDetails::new(
                vec![],
                vec![],
                vec![SignedUser::new(id, vec![certification])],
                vec![],
            ),
            vec![
                SignedPublicSubKey::new(signing.public_key().clone(), vec![bind(&signing)]),
                SignedPublicSubKey::new(encryption.public_key().clone(), vec![bind(&encryption)]),
            ],
        );

        Identity {
            cert,
            primary,
            signing,
            encryption,
        }
    }

    /// A store holding the certificate and all secret keys of this identity.
    pub fn store(&self) -> InMemoryKeyStore {
        let mut store = InMemoryKeyStore::new();
        store
            .add_public_key(self.cert.clone())
            .add_secret_key(self.primary.clone())
            .add_secret_key(self.signing.clone())
            .add_secret_key(self.encryption.clone());
        store
    }
}

pub fn alice() -> Identity {
    Identity::new(1001, "Alice <alice@example.com>")
}

pub fn bob() -> Identity {
    Identity::new(1002, "Bob <bob@example.com>")
}

pub fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Encrypts raw plaintext packets to `recipient`, for messages the encryptor does not produce.
pub fn seal(seed: u64, recipient: &PublicKey, plaintext_packets: &[u8]) -> Vec<u8> {
    let mut rng = rng(seed);
    let session_key = PlainSessionKey::generate(&mut rng, SymmetricKeyAlgorithm::AES128);

    let mut out = Vec::new();
    let pkesk = recipient.encrypt_session_key(&mut rng, &session_key).unwrap();
    write_packet(&mut out, &pkesk).unwrap();

    let mut data = PartialBodyWriter::new(Tag::SymEncryptedProtectedData, 512, &mut out).unwrap();
    data.write_all(&[1]).unwrap();
    let mut encryptor =
        StreamEncryptor::new(&mut rng, session_key.sym_alg(), true, session_key.key(), data)
            .unwrap();
    encryptor.write_all(plaintext_packets).unwrap();
    encryptor.finish().unwrap().finish().unwrap();

    out
}
