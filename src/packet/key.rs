use std::io::{self, BufRead};

use ::rsa::traits::PublicKeyParts;
use ::rsa::RsaPublicKey;
use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use chrono::{DateTime, SubsecRound, Utc};
use digest::DynDigest;
use log::debug;
use rand::{CryptoRng, Rng};
use sha1::{Digest, Sha1};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::{ed25519, rsa};
use crate::errors::{format_err, unsupported_err, Result};
use crate::packet::{PacketHeader, PacketTrait, PublicKeyEncryptedSessionKey, SignatureBytes};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyId, Mpi, PlainSessionKey, Tag};

/// Algorithm specific public key material.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum PublicParams {
    RSA {
        n: Mpi,
        e: Mpi,
    },
    Ed25519 {
        #[debug("{}", hex::encode(public))]
        public: [u8; 32],
    },
    /// Material of algorithms we only carry along.
    Other {
        #[debug("{}", hex::encode(raw))]
        raw: Bytes,
    },
}

impl Serialize for PublicParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PublicParams::RSA { n, e } => {
                n.to_writer(writer)?;
                e.to_writer(writer)?;
            }
            PublicParams::Ed25519 { public } => writer.write_all(public)?,
            PublicParams::Other { raw } => writer.write_all(raw)?,
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            PublicParams::RSA { n, e } => n.write_len() + e.write_len(),
            PublicParams::Ed25519 { .. } => 32,
            PublicParams::Other { raw } => raw.len(),
        }
    }
}

/// Public-Key and Public-Subkey Packet, version 4.
///
/// The same structure is used for both, the tag only differs when serialized.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.2>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    created: DateTime<Utc>,
    algorithm: PublicKeyAlgorithm,
    public_params: PublicParams,
}

impl PublicKey {
    pub fn new(
        algorithm: PublicKeyAlgorithm,
        created: DateTime<Utc>,
        public_params: PublicParams,
    ) -> Self {
        PublicKey {
            created: created.trunc_subsecs(0),
            algorithm,
            public_params,
        }
    }

    pub fn from_rsa(created: DateTime<Utc>, key: &RsaPublicKey) -> Self {
        Self::new(
            PublicKeyAlgorithm::RSA,
            created,
            PublicParams::RSA {
                n: key.n().into(),
                e: key.e().into(),
            },
        )
    }

    pub fn from_ed25519(created: DateTime<Utc>, public: [u8; 32]) -> Self {
        Self::new(
            PublicKeyAlgorithm::Ed25519,
            created,
            PublicParams::Ed25519 { public },
        )
    }

    /// Parses a key packet body. Trailing data is only consumed for unknown algorithms.
    pub fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        if version != 4 {
            unsupported_err!("key version {}", version);
        }

        let created = i.read_be_u32()?;
        let created = DateTime::from_timestamp(created.into(), 0)
            .ok_or_else(|| format_err!("invalid key creation time {}", created))?;
        let algorithm = PublicKeyAlgorithm::from(i.read_u8()?);

        let public_params = match algorithm {
            PublicKeyAlgorithm::RSA
            | PublicKeyAlgorithm::RSAEncrypt
            | PublicKeyAlgorithm::RSASign => PublicParams::RSA {
                n: Mpi::try_from_reader(&mut i)?,
                e: Mpi::try_from_reader(&mut i)?,
            },
            PublicKeyAlgorithm::Ed25519 => PublicParams::Ed25519 {
                public: i.read_array::<32>()?,
            },
            _ => PublicParams::Other {
                raw: i.rest()?.freeze(),
            },
        };

        Ok(PublicKey {
            created,
            algorithm,
            public_params,
        })
    }

    pub fn created(&self) -> &DateTime<Utc> {
        &self.created
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    pub fn public_params(&self) -> &PublicParams {
        &self.public_params
    }

    /// SHA1 over the hashing prefix and the key body.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut buf = Vec::with_capacity(3 + self.write_len());
        if let Err(err) = self.to_hashing_bytes(&mut buf) {
            // only keys with out of range creation times end up here
            debug!("failed to serialize key for fingerprinting: {}", err);
        }
        let digest: [u8; 20] = Sha1::digest(&buf).into();
        Fingerprint::from(digest)
    }

    pub fn key_id(&self) -> KeyId {
        self.fingerprint().key_id()
    }

    fn to_hashing_bytes(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u8(0x99)?;
        buf.write_u16::<BigEndian>(self.write_len().try_into()?)?;
        self.to_writer(buf)
    }

    /// Feeds the key into a signature hash, as done for certifications and bindings.
    pub fn hash_for_signature(&self, hasher: &mut dyn DynDigest) -> Result<()> {
        let mut buf = Vec::with_capacity(3 + self.write_len());
        self.to_hashing_bytes(&mut buf)?;
        hasher.update(&buf);
        Ok(())
    }

    pub fn rsa_public_key(&self) -> Result<RsaPublicKey> {
        match self.public_params {
            PublicParams::RSA { ref n, ref e } => rsa::public_key(n, e),
            _ => unsupported_err!("{} is not an RSA key", self.algorithm),
        }
    }

    pub fn is_encryption_key(&self) -> bool {
        self.algorithm.can_encrypt() && matches!(self.public_params, PublicParams::RSA { .. })
    }

    pub fn is_signing_key(&self) -> bool {
        self.algorithm.can_sign()
    }

    /// Verifies a signature over the final digest.
    pub fn verify_signature(
        &self,
        hash: HashAlgorithm,
        hashed: &[u8],
        sig: &SignatureBytes,
    ) -> Result<()> {
        match (&self.public_params, sig) {
            (PublicParams::RSA { n, e }, SignatureBytes::Mpis(mpis)) if mpis.len() == 1 => {
                let key = rsa::public_key(n, e)?;
                rsa::verify(&key, hash, hashed, &mpis[0])
            }
            (PublicParams::Ed25519 { public }, SignatureBytes::Native(raw)) => {
                let sig: &[u8; 64] = raw[..]
                    .try_into()
                    .map_err(|_| format_err!("invalid Ed25519 signature length {}", raw.len()))?;
                ed25519::verify(public, hash, hashed, sig)
            }
            _ => unsupported_err!("verifying {} signatures", self.algorithm),
        }
    }

    /// Encrypts the session key to this key.
    pub fn encrypt_session_key<R: CryptoRng + Rng>(
        &self,
        rng: R,
        session_key: &PlainSessionKey,
    ) -> Result<PublicKeyEncryptedSessionKey> {
        let key = self.rsa_public_key()?;
        PublicKeyEncryptedSessionKey::from_session_key(rng, session_key, self.key_id(), &key)
    }

    /// Writes the packet as a public subkey.
    pub fn to_writer_as_subkey<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        PacketHeader::new_fixed(Tag::PublicSubkey, self.write_len().try_into()?)
            .to_writer(writer)?;
        self.to_writer(writer)
    }
}

impl Serialize for PublicKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(4)?;
        writer.write_u32::<BigEndian>(self.created.timestamp().try_into()?)?;
        writer.write_u8(self.algorithm.into())?;
        self.public_params.to_writer(writer)
    }

    fn write_len(&self) -> usize {
        1 + 4 + 1 + self.public_params.write_len()
    }
}

impl PacketTrait for PublicKey {
    fn tag(&self) -> Tag {
        Tag::PublicKey
    }
}
