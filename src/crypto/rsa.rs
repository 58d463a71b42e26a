//! RSA with PKCS#1 v1.5 padding, for session keys and signatures.

use log::debug;
use rand::{CryptoRng, Rng};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{unsupported_err, Result};
use crate::types::Mpi;

/// Builds the public key from the `n` and `e` MPIs of a key packet.
pub fn public_key(n: &Mpi, e: &Mpi) -> Result<RsaPublicKey> {
    let key = RsaPublicKey::new(
        BigUint::from_bytes_be(n.as_bytes()),
        BigUint::from_bytes_be(e.as_bytes()),
    )?;
    Ok(key)
}

/// RSA decryption using PKCS1v15 padding.
pub fn decrypt(priv_key: &RsaPrivateKey, mpi: &Mpi) -> Result<Zeroizing<Vec<u8>>> {
    // leading zeros are stripped from the MPI, the primitive expects the modulus length
    let ciphertext = mpi.to_padded(priv_key.size());
    let m = priv_key.decrypt(Pkcs1v15Encrypt, &ciphertext)?;

    Ok(Zeroizing::new(m))
}

/// RSA encryption using PKCS1v15 padding.
pub fn encrypt<R: CryptoRng + Rng>(
    mut rng: R,
    key: &RsaPublicKey,
    plaintext: &[u8],
) -> Result<Mpi> {
    debug!("RSA encrypt");
    let data = key.encrypt(&mut rng, Pkcs1v15Encrypt, plaintext)?;

    Ok(Mpi::from_slice(&data))
}

fn padding(hash: HashAlgorithm) -> Result<Pkcs1v15Sign> {
    let scheme = match hash {
        HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        HashAlgorithm::Ripemd160 => Pkcs1v15Sign::new::<ripemd::Ripemd160>(),
        HashAlgorithm::Sha224 => Pkcs1v15Sign::new::<sha2::Sha224>(),
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
        _ => unsupported_err!("RSA signatures with hash {:?}", hash),
    };
    Ok(scheme)
}

/// Verify a RSA, PKCS1v15 padded signature.
pub fn verify(key: &RsaPublicKey, hash: HashAlgorithm, hashed: &[u8], sig: &Mpi) -> Result<()> {
    let sig = sig.to_padded(key.size());
    key.verify(padding(hash)?, hashed, &sig)?;

    Ok(())
}

/// Sign using RSA, with PKCS1v15 padding.
pub fn sign(key: &RsaPrivateKey, hash: HashAlgorithm, digest: &[u8]) -> Result<Mpi> {
    let sig = key.sign(padding(hash)?, digest)?;

    Ok(Mpi::from_slice(&sig))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_rsa_sign_verify_encrypt() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public = RsaPublicKey::from(&key);

        let digest = HashAlgorithm::Sha256.digest(b"hello").unwrap();
        let sig = sign(&key, HashAlgorithm::Sha256, &digest).unwrap();
        verify(&public, HashAlgorithm::Sha256, &digest, &sig).unwrap();

        let other = HashAlgorithm::Sha256.digest(b"world").unwrap();
        assert!(verify(&public, HashAlgorithm::Sha256, &other, &sig).is_err());

        let ciphertext = encrypt(&mut rng, &public, b"session").unwrap();
        let plain = decrypt(&key, &ciphertext).unwrap();
        assert_eq!(&plain[..], b"session");
    }
}
