//! Ed25519 signatures, in the RFC 9580 framing (algorithm 27).

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{ensure, Result};

/// Ed25519 requires a hash of at least 256 bits.
const MIN_HASH_LEN_BITS: usize = 256;

fn check_hash(hash: HashAlgorithm) -> Result<()> {
    let size = hash.digest_size().unwrap_or(0) * 8;
    ensure!(
        size >= MIN_HASH_LEN_BITS,
        "EdDSA signature: hash algorithm {:?} is too weak for Ed25519",
        hash
    );
    Ok(())
}

/// Verify an Ed25519 signature over the digest.
pub fn verify(
    key: &[u8; 32],
    hash: HashAlgorithm,
    hashed: &[u8],
    sig: &[u8; 64],
) -> Result<()> {
    check_hash(hash)?;
    let key = VerifyingKey::from_bytes(key)?;
    let sig = Signature::from_bytes(sig);
    key.verify_strict(hashed, &sig)?;

    Ok(())
}

/// Sign the digest with Ed25519.
pub fn sign(secret: &[u8; 32], hash: HashAlgorithm, digest: &[u8]) -> Result<[u8; 64]> {
    check_hash(hash)?;
    let key = SigningKey::from_bytes(secret);

    Ok(key.sign(digest).to_bytes())
}

/// Derives the public key for the secret.
pub fn public_key(secret: &[u8; 32]) -> [u8; 32] {
    SigningKey::from_bytes(secret).verifying_key().to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let secret = [3u8; 32];
        let public = public_key(&secret);
        let digest = HashAlgorithm::Sha256.digest(b"hello").unwrap();
        let sig = sign(&secret, HashAlgorithm::Sha256, &digest).unwrap();

        verify(&public, HashAlgorithm::Sha256, &digest, &sig).unwrap();
        assert!(verify(&public, HashAlgorithm::Sha256, &digest[1..], &sig).is_err());
        assert!(sign(&secret, HashAlgorithm::Sha1, &digest).is_err());
    }
}
