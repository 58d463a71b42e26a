use std::io::{self, BufRead};

use ::rsa::traits::PrivateKeyParts;
use ::rsa::{BigUint, RsaPrivateKey};
use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::debug;
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::checksum;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::{ed25519, rsa};
use crate::errors::{ensure, ensure_eq, format_err, unsupported_err, Error, Result};
use crate::packet::{
    PacketHeader, PacketTrait, PublicKey, PublicKeyEncryptedSessionKey, PublicParams,
    SignatureBytes,
};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{
    KeyId, Mpi, Password, PlainSessionKey, StringToKey, Tag, DEFAULT_ITER_SALTED_COUNT,
};

/// S2K usage octet: encrypted, with a SHA1 hash of the plaintext.
const USAGE_SHA1: u8 = 254;
/// S2K usage octet: encrypted, with a two octet checksum of the plaintext.
const USAGE_CHECKSUM: u8 = 255;

/// Decrypted secret key material.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum PlainSecretParams {
    #[debug("RSA")]
    RSA {
        key: RsaPrivateKey,
        d: Mpi,
        p: Mpi,
        q: Mpi,
        u: Mpi,
    },
    #[debug("Ed25519")]
    Ed25519 { secret: Zeroizing<[u8; 32]> },
}

impl PlainSecretParams {
    pub fn from_rsa(key: RsaPrivateKey) -> Result<Self> {
        let primes = key.primes();
        ensure_eq!(primes.len(), 2, "multi prime RSA keys are not supported");
        let u = key
            .crt_coefficient()
            .ok_or_else(|| format_err!("RSA key is missing the CRT coefficient"))?;

        // u = p^-1 mod q with the primes swapped
        Ok(PlainSecretParams::RSA {
            d: key.d().into(),
            p: (&primes[1]).into(),
            q: (&primes[0]).into(),
            u: (&u).into(),
            key,
        })
    }

    /// Parses the cleartext algorithm specific part.
    fn try_from_slice(mut i: &[u8], public: &PublicParams) -> Result<Self> {
        let params = match public {
            PublicParams::RSA { n, e } => {
                let d = Mpi::try_from_reader(&mut i)?;
                let p = Mpi::try_from_reader(&mut i)?;
                let q = Mpi::try_from_reader(&mut i)?;
                let u = Mpi::try_from_reader(&mut i)?;

                // keep the prime order of `from_rsa`, where `u` is the CRT coefficient
                let key = RsaPrivateKey::from_components(
                    to_biguint(n),
                    to_biguint(e),
                    to_biguint(&d),
                    vec![to_biguint(&q), to_biguint(&p)],
                )?;
                key.validate()?;

                PlainSecretParams::RSA { key, d, p, q, u }
            }
            PublicParams::Ed25519 { public } => {
                let secret = Zeroizing::new(i.read_array::<32>()?);
                ensure!(
                    &ed25519::public_key(&secret) == public,
                    "Ed25519 secret does not match the public key"
                );
                PlainSecretParams::Ed25519 { secret }
            }
            PublicParams::Other { .. } => unsupported_err!("secret keys of unknown algorithms"),
        };
        ensure!(i.is_empty(), "trailing data in secret key material");

        Ok(params)
    }

    fn to_writer_raw<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PlainSecretParams::RSA { d, p, q, u, .. } => {
                d.to_writer(writer)?;
                p.to_writer(writer)?;
                q.to_writer(writer)?;
                u.to_writer(writer)?;
            }
            PlainSecretParams::Ed25519 { secret } => writer.write_all(&secret[..])?,
        }
        Ok(())
    }

    fn raw_len(&self) -> usize {
        match self {
            PlainSecretParams::RSA { d, p, q, u, .. } => {
                d.write_len() + p.write_len() + q.write_len() + u.write_len()
            }
            PlainSecretParams::Ed25519 { .. } => 32,
        }
    }

    fn to_raw_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        let mut buf = Zeroizing::new(Vec::with_capacity(self.raw_len()));
        self.to_writer_raw(&mut *buf)?;
        Ok(buf)
    }
}

fn to_biguint(mpi: &Mpi) -> BigUint {
    BigUint::from_bytes_be(mpi.as_bytes())
}

/// Passphrase protected secret key material.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct EncryptedSecretParams {
    usage: u8,
    sym_alg: SymmetricKeyAlgorithm,
    s2k: StringToKey,
    #[debug("{}", hex::encode(iv))]
    iv: Bytes,
    #[debug("{} bytes", data.len())]
    data: Bytes,
}

impl EncryptedSecretParams {
    pub fn sym_alg(&self) -> SymmetricKeyAlgorithm {
        self.sym_alg
    }

    pub fn s2k(&self) -> &StringToKey {
        &self.s2k
    }

    fn decrypt(&self, password: &Password, public: &PublicParams) -> Result<PlainSecretParams> {
        let key = self
            .s2k
            .derive_key(&password.read(), self.sym_alg.key_size())?;
        let mut plaintext = Zeroizing::new(self.data.to_vec());
        self.sym_alg
            .decrypt_with_iv_regular(&key, &self.iv, &mut plaintext)?;

        let raw = match self.usage {
            USAGE_SHA1 => {
                ensure!(plaintext.len() >= 20, "secret key material too short");
                let (raw, hash) = plaintext.split_at(plaintext.len() - 20);
                if checksum::calculate_sha1(raw) != hash {
                    return Err(Error::BadPassword);
                }
                raw
            }
            _ => {
                ensure!(plaintext.len() >= 2, "secret key material too short");
                let (raw, sum) = plaintext.split_at(plaintext.len() - 2);
                checksum::simple([sum[0], sum[1]], raw).map_err(|_| Error::BadPassword)?;
                raw
            }
        };

        // a two octet checksum can match by chance
        PlainSecretParams::try_from_slice(raw, public).map_err(|err| {
            debug!("failed to parse decrypted secret key: {}", err);
            Error::BadPassword
        })
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SecretParams {
    Plain(PlainSecretParams),
    Encrypted(EncryptedSecretParams),
}

/// Secret-Key and Secret-Subkey Packet, version 4.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.3>
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SecretKey {
    public: PublicKey,
    params: SecretParams,
}

impl SecretKey {
    pub fn new(public: PublicKey, params: SecretParams) -> Self {
        SecretKey { public, params }
    }

    pub fn from_rsa(created: DateTime<Utc>, key: RsaPrivateKey) -> Result<Self> {
        let public = PublicKey::from_rsa(created, &key.to_public_key());
        let params = PlainSecretParams::from_rsa(key)?;

        Ok(SecretKey {
            public,
            params: SecretParams::Plain(params),
        })
    }

    pub fn from_ed25519(created: DateTime<Utc>, secret: [u8; 32]) -> Self {
        let public = PublicKey::from_ed25519(created, ed25519::public_key(&secret));

        SecretKey {
            public,
            params: SecretParams::Plain(PlainSecretParams::Ed25519 {
                secret: Zeroizing::new(secret),
            }),
        }
    }

    /// Generates a new RSA key of `bits` size.
    pub fn generate_rsa<R: CryptoRng + Rng>(
        mut rng: R,
        bits: usize,
        created: DateTime<Utc>,
    ) -> Result<Self> {
        let key = RsaPrivateKey::new(&mut rng, bits)?;
        Self::from_rsa(created, key)
    }

    /// Generates a new Ed25519 signing key.
    pub fn generate_ed25519<R: CryptoRng + Rng>(mut rng: R, created: DateTime<Utc>) -> Self {
        let mut secret = Zeroizing::new([0u8; 32]);
        rng.fill_bytes(&mut secret[..]);
        Self::from_ed25519(created, *secret)
    }

    /// Parses a secret key packet body.
    pub fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let public = PublicKey::try_from_reader(&mut i)?;
        if let PublicParams::Other { .. } = public.public_params() {
            unsupported_err!("secret keys with algorithm {}", public.algorithm());
        }

        let usage = i.read_u8()?;
        let params = match usage {
            0 => {
                let rest = Zeroizing::new(i.rest()?.to_vec());
                ensure!(rest.len() >= 2, "secret key material too short");
                let (raw, sum) = rest.split_at(rest.len() - 2);
                checksum::simple([sum[0], sum[1]], raw)?;

                SecretParams::Plain(PlainSecretParams::try_from_slice(
                    raw,
                    public.public_params(),
                )?)
            }
            USAGE_SHA1 | USAGE_CHECKSUM => {
                let sym_alg = SymmetricKeyAlgorithm::from(i.read_u8()?);
                ensure!(
                    sym_alg.is_supported(),
                    "unsupported secret key encryption {:?}",
                    sym_alg
                );
                let s2k = StringToKey::try_from_reader(&mut i)?;
                let iv = i.take_bytes(sym_alg.block_size())?.freeze();
                let data = i.rest()?.freeze();

                SecretParams::Encrypted(EncryptedSecretParams {
                    usage,
                    sym_alg,
                    s2k,
                    iv,
                    data,
                })
            }
            _ => unsupported_err!("secret key protection with usage octet {}", usage),
        };

        Ok(SecretKey { public, params })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret_params(&self) -> &SecretParams {
        &self.params
    }

    pub fn key_id(&self) -> KeyId {
        self.public.key_id()
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.params, SecretParams::Encrypted(_))
    }

    /// Protects the key material with a passphrase, using the default iteration count.
    pub fn lock<R: CryptoRng + Rng>(&self, mut rng: R, password: &Password) -> Result<Self> {
        let s2k =
            StringToKey::new_iterated(&mut rng, HashAlgorithm::Sha256, DEFAULT_ITER_SALTED_COUNT);
        self.lock_with(rng, password, s2k)
    }

    /// Protects the key material with AES256 under the given S2K.
    pub fn lock_with<R: CryptoRng + Rng>(
        &self,
        mut rng: R,
        password: &Password,
        s2k: StringToKey,
    ) -> Result<Self> {
        let SecretParams::Plain(ref plain) = self.params else {
            return Ok(self.clone());
        };
        ensure!(!password.is_empty(), "can not lock a key with an empty password");

        let sym_alg = SymmetricKeyAlgorithm::AES256;
        let key = s2k.derive_key(&password.read(), sym_alg.key_size())?;
        let mut iv = vec![0u8; sym_alg.block_size()];
        rng.fill_bytes(&mut iv);

        let mut data = plain.to_raw_bytes()?;
        let hash = checksum::calculate_sha1(&data);
        data.extend_from_slice(&hash);
        sym_alg.encrypt_with_iv_regular(&key, &iv, &mut data)?;

        Ok(SecretKey {
            public: self.public.clone(),
            params: SecretParams::Encrypted(EncryptedSecretParams {
                usage: USAGE_SHA1,
                sym_alg,
                s2k,
                iv: iv.into(),
                data: Bytes::copy_from_slice(&data),
            }),
        })
    }

    /// Returns a copy of this key with the secret material decrypted.
    pub fn unlock(&self, password: &Password) -> Result<Self> {
        let params = match self.params {
            SecretParams::Plain(ref plain) => plain.clone(),
            SecretParams::Encrypted(ref enc) => {
                enc.decrypt(password, self.public.public_params())?
            }
        };

        Ok(SecretKey {
            public: self.public.clone(),
            params: SecretParams::Plain(params),
        })
    }

    fn plain_params(&self) -> Result<&PlainSecretParams> {
        match self.params {
            SecretParams::Plain(ref plain) => Ok(plain),
            SecretParams::Encrypted(_) => {
                debug!("secret key {} is locked", self.key_id());
                Err(Error::BadPassword)
            }
        }
    }

    /// Signs the final signature digest.
    pub fn create_signature(&self, hash: HashAlgorithm, digest: &[u8]) -> Result<SignatureBytes> {
        let sig = match self.plain_params()? {
            PlainSecretParams::RSA { key, .. } => {
                SignatureBytes::Mpis(vec![rsa::sign(key, hash, digest)?])
            }
            PlainSecretParams::Ed25519 { secret } => {
                let sig = ed25519::sign(secret, hash, digest)?;
                SignatureBytes::Native(Bytes::copy_from_slice(&sig))
            }
        };

        Ok(sig)
    }

    /// Opens a public key encrypted session addressed to this key.
    pub fn decrypt_session_key(
        &self,
        pkesk: &PublicKeyEncryptedSessionKey,
    ) -> Result<PlainSessionKey> {
        match self.plain_params()? {
            PlainSecretParams::RSA { key, .. } => pkesk.decrypt(key),
            PlainSecretParams::Ed25519 { .. } => Err(Error::KeyMismatch),
        }
    }

    /// Writes the packet as a secret subkey.
    pub fn to_writer_as_subkey<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        PacketHeader::new_fixed(Tag::SecretSubkey, self.write_len().try_into()?)
            .to_writer(writer)?;
        self.to_writer(writer)
    }
}

impl Serialize for SecretKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.public.to_writer(writer)?;
        match self.params {
            SecretParams::Plain(ref plain) => {
                writer.write_u8(0)?;
                let raw = plain.to_raw_bytes()?;
                writer.write_all(&raw)?;
                writer.write_u16::<BigEndian>(checksum::calculate_simple(&raw))?;
            }
            SecretParams::Encrypted(ref enc) => {
                writer.write_u8(enc.usage)?;
                writer.write_u8(enc.sym_alg.into())?;
                enc.s2k.to_writer(writer)?;
                writer.write_all(&enc.iv)?;
                writer.write_all(&enc.data)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        let params = match self.params {
            SecretParams::Plain(ref plain) => 1 + plain.raw_len() + 2,
            SecretParams::Encrypted(ref enc) => {
                2 + enc.s2k.write_len() + enc.iv.len() + enc.data.len()
            }
        };
        self.public.write_len() + params
    }
}

impl PacketTrait for SecretKey {
    fn tag(&self) -> Tag {
        Tag::SecretKey
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap()
    }

    fn fast_s2k(rng: &mut ChaCha8Rng) -> StringToKey {
        StringToKey::new_iterated(rng, HashAlgorithm::Sha256, 0x10)
    }

    #[test]
    fn test_rsa_plain_round_trip() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let key = SecretKey::generate_rsa(&mut rng, 1024, created()).unwrap();

        let bytes = key.to_bytes().unwrap();
        assert_eq!(bytes.len(), key.write_len());
        let parsed = SecretKey::try_from_reader(&bytes[..]).unwrap();
        assert_eq!(parsed.public_key(), key.public_key());
        assert_eq!(parsed, key);
        assert_eq!(parsed.to_bytes().unwrap(), bytes);

        let digest = HashAlgorithm::Sha256.digest(b"data").unwrap();
        let sig = parsed.create_signature(HashAlgorithm::Sha256, &digest).unwrap();
        key.public_key()
            .verify_signature(HashAlgorithm::Sha256, &digest, &sig)
            .unwrap();
    }

    #[test]
    fn test_lock_unlock() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let key = SecretKey::generate_ed25519(&mut rng, created());
        let s2k = fast_s2k(&mut rng);
        let locked = key.lock_with(&mut rng, &"secret".into(), s2k).unwrap();
        assert!(locked.is_locked());

        let bytes = locked.to_bytes().unwrap();
        let parsed = SecretKey::try_from_reader(&bytes[..]).unwrap();
        assert!(parsed.is_locked());

        let digest = HashAlgorithm::Sha256.digest(b"data").unwrap();
        assert!(matches!(
            parsed.create_signature(HashAlgorithm::Sha256, &digest),
            Err(Error::BadPassword)
        ));
        assert!(matches!(
            parsed.unlock(&"wrong".into()),
            Err(Error::BadPassword)
        ));

        let unlocked = parsed.unlock(&"secret".into()).unwrap();
        assert_eq!(unlocked, key);
    }

    #[test]
    fn test_bad_checksum() {
        let key = SecretKey::from_ed25519(created(), [5u8; 32]);
        let mut bytes = key.to_bytes().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 1;
        assert!(SecretKey::try_from_reader(&bytes[..]).is_err());
    }
}
