//! Signature packets, version 4.
//!
//! Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2>

mod config;
mod subpacket;

use std::io::{self, BufRead, Read};

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use digest::DynDigest;
use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive};

pub use self::config::*;
pub use self::subpacket::*;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{ensure_eq, unsupported_err, Error, Result};
use crate::packet::{PacketTrait, PublicKey};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyId, Mpi, Tag};

/// Signature types.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.1>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[non_exhaustive]
pub enum SignatureType {
    /// Signature of a binary document.
    Binary = 0x00,
    /// Signature of a canonical text document, hashed with `<CR><LF>` line endings.
    Text = 0x01,
    /// Signature of only its own subpacket contents.
    Standalone = 0x02,
    /// Generic certification of a User ID and Public-Key packet.
    CertGeneric = 0x10,
    /// Persona certification of a User ID and Public-Key packet.
    CertPersona = 0x11,
    /// Casual certification of a User ID and Public-Key packet.
    CertCasual = 0x12,
    /// Positive certification of a User ID and Public-Key packet.
    CertPositive = 0x13,
    /// Statement by the primary key that it owns the subkey.
    SubkeyBinding = 0x18,
    /// Statement by a signing subkey that it is owned by the primary key.
    KeyBinding = 0x19,
    /// Signature directly on a key.
    Key = 0x1F,
    /// Revocation of the key it is calculated on.
    KeyRevocation = 0x20,
    /// Revocation of a subkey binding.
    SubkeyRevocation = 0x28,
    /// Revocation of an earlier certification.
    CertRevocation = 0x30,
    Timestamp = 0x40,
    /// Confirmation of another signature.
    ThirdParty = 0x50,

    #[num_enum(catch_all)]
    Other(u8),
}

/// The algorithm specific part of a signature.
#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
pub enum SignatureBytes {
    /// One MPI for RSA, two for DSA and ECDSA style signatures.
    Mpis(Vec<Mpi>),
    /// Fixed size encodings, like the 64 bytes of Ed25519.
    Native(#[debug("{}", hex::encode(_0))] Bytes),
}

impl Serialize for SignatureBytes {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            SignatureBytes::Mpis(mpis) => mpis.to_writer(writer),
            SignatureBytes::Native(raw) => {
                writer.write_all(raw)?;
                Ok(())
            }
        }
    }

    fn write_len(&self) -> usize {
        match self {
            SignatureBytes::Mpis(mpis) => mpis.write_len(),
            SignatureBytes::Native(raw) => raw.len(),
        }
    }
}

/// Signature Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Signature {
    pub config: SignatureConfig,
    #[debug("{}", hex::encode(signed_hash_value))]
    signed_hash_value: [u8; 2],
    signature: SignatureBytes,
}

impl Signature {
    pub fn from_config(
        config: SignatureConfig,
        signed_hash_value: [u8; 2],
        signature: SignatureBytes,
    ) -> Self {
        Signature {
            config,
            signed_hash_value,
            signature,
        }
    }

    /// Parses a `Signature` packet body.
    ///
    /// Signatures made with a public key algorithm that can not sign are
    /// rejected with [`Error::UnknownSignatureAlgorithm`].
    pub fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        if version != 4 {
            unsupported_err!("signature version {}", version);
        }

        let typ = SignatureType::from(i.read_u8()?);
        let pub_alg = PublicKeyAlgorithm::from(i.read_u8()?);
        if !pub_alg.can_sign() {
            return Err(Error::UnknownSignatureAlgorithm {
                algorithm: pub_alg.into(),
            });
        }
        let hash_alg = HashAlgorithm::from(i.read_u8()?);

        let hashed_len = i.read_be_u16()?;
        let hashed_subpackets = parse_subpackets(&i.take_bytes(hashed_len.into())?)?;
        let unhashed_len = i.read_be_u16()?;
        let unhashed_subpackets = parse_subpackets(&i.take_bytes(unhashed_len.into())?)?;

        let signed_hash_value = i.read_array::<2>()?;
        let signature = match pub_alg {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSASign => {
                SignatureBytes::Mpis(vec![Mpi::try_from_reader(&mut i)?])
            }
            PublicKeyAlgorithm::Ed25519 => SignatureBytes::Native(i.take_bytes(64)?.freeze()),
            _ => SignatureBytes::Mpis(vec![
                Mpi::try_from_reader(&mut i)?,
                Mpi::try_from_reader(&mut i)?,
            ]),
        };
        debug!("signature {:?} {:?} {:?}", typ, pub_alg, hash_alg);

        Ok(Signature {
            config: SignatureConfig {
                typ,
                pub_alg,
                hash_alg,
                hashed_subpackets,
                unhashed_subpackets,
            },
            signed_hash_value,
            signature,
        })
    }

    pub fn typ(&self) -> SignatureType {
        self.config.typ
    }

    pub fn pub_alg(&self) -> PublicKeyAlgorithm {
        self.config.pub_alg
    }

    pub fn hash_alg(&self) -> HashAlgorithm {
        self.config.hash_alg
    }

    pub fn signed_hash_value(&self) -> [u8; 2] {
        self.signed_hash_value
    }

    pub fn signature(&self) -> &SignatureBytes {
        &self.signature
    }

    fn subpackets(&self) -> impl Iterator<Item = &SubpacketData> {
        self.config
            .hashed_subpackets
            .iter()
            .chain(self.config.unhashed_subpackets.iter())
            .map(|p| &p.data)
    }

    /// The creation time, only trusted from the hashed area.
    pub fn created(&self) -> Option<&DateTime<Utc>> {
        self.config.created()
    }

    pub fn signature_expiration_time(&self) -> Option<&Duration> {
        self.config.hashed_subpackets.iter().find_map(|p| match p.data {
            SubpacketData::SignatureExpirationTime(ref d) => Some(d),
            _ => None,
        })
    }

    pub fn key_expiration_time(&self) -> Option<&Duration> {
        self.config.hashed_subpackets.iter().find_map(|p| match p.data {
            SubpacketData::KeyExpirationTime(ref d) => Some(d),
            _ => None,
        })
    }

    /// Issuer key ids, explicit ones first, then those derived from issuer fingerprints.
    pub fn issuer(&self) -> Vec<KeyId> {
        let mut ids: Vec<KeyId> = self
            .subpackets()
            .filter_map(|p| match p {
                SubpacketData::Issuer(id) => Some(*id),
                _ => None,
            })
            .collect();
        for fp in self.issuer_fingerprint() {
            let id = fp.key_id();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    pub fn issuer_fingerprint(&self) -> Vec<&Fingerprint> {
        self.subpackets()
            .filter_map(|p| match p {
                SubpacketData::IssuerFingerprint(fp) => Some(fp),
                _ => None,
            })
            .collect()
    }

    pub fn signers_userid(&self) -> Option<&Bytes> {
        self.subpackets().find_map(|p| match p {
            SubpacketData::SignersUserID(id) => Some(id),
            _ => None,
        })
    }

    pub fn is_primary(&self) -> bool {
        self.config
            .hashed_subpackets
            .iter()
            .any(|p| matches!(p.data, SubpacketData::PrimaryUserId(true)))
    }

    pub fn revocation_reason(&self) -> Option<(u8, &Bytes)> {
        self.subpackets().find_map(|p| match p {
            SubpacketData::RevocationReason(code, reason) => Some((*code, reason)),
            _ => None,
        })
    }

    pub fn embedded_signature(&self) -> Option<&Signature> {
        self.subpackets().find_map(|p| match p {
            SubpacketData::EmbeddedSignature(sig) => Some(&**sig),
            _ => None,
        })
    }

    pub fn is_certification(&self) -> bool {
        self.config.is_certification()
    }

    /// Is this signature made by the given key, judged by its issuer subpackets.
    pub fn is_issued_by(&self, key: &PublicKey) -> bool {
        let fp = key.fingerprint();
        self.issuer_fingerprint().into_iter().any(|f| *f == fp)
            || self.issuer().contains(&fp.key_id())
    }

    /// Verifies the signature over a digest that has already seen the signed data.
    pub fn verify_hasher(&self, key: &PublicKey, hasher: Box<dyn DynDigest>) -> Result<()> {
        let digest = self.config.finalize_hash(hasher)?;
        ensure_eq!(
            &self.signed_hash_value,
            &digest[..2],
            "signature: invalid signed hash value"
        );

        key.verify_signature(self.config.hash_alg, &digest, &self.signature)
    }

    /// Verifies a document signature over `data`.
    pub fn verify<R: Read>(&self, key: &PublicKey, data: R) -> Result<()> {
        let mut hasher = SignatureHasher::new(&self.config)?;
        hasher.update_reader(data)?;
        self.verify_hasher(key, hasher.into_inner())
    }

    /// Verifies a certification of `id` on the key `certified`, made by `signer`.
    pub fn verify_certification(
        &self,
        signer: &PublicKey,
        certified: &PublicKey,
        tag: Tag,
        id: &impl Serialize,
    ) -> Result<()> {
        let mut hasher = self.config.hash_alg.new_hasher()?;
        hash_certification(&mut *hasher, certified, tag, id)?;
        self.verify_hasher(signer, hasher)
    }

    /// Verifies a subkey binding or revocation, also used for primary key bindings.
    pub fn verify_key_binding(
        &self,
        signer: &PublicKey,
        primary: &PublicKey,
        subkey: &PublicKey,
    ) -> Result<()> {
        let mut hasher = self.config.hash_alg.new_hasher()?;
        primary.hash_for_signature(&mut *hasher)?;
        subkey.hash_for_signature(&mut *hasher)?;
        self.verify_hasher(signer, hasher)
    }

    /// Verifies a signature calculated directly on `key`, like a key revocation.
    pub fn verify_key(&self, signer: &PublicKey, key: &PublicKey) -> Result<()> {
        let mut hasher = self.config.hash_alg.new_hasher()?;
        key.hash_for_signature(&mut *hasher)?;
        self.verify_hasher(signer, hasher)
    }
}

/// Hashes the key and the user id or user attribute it is bound to.
pub(crate) fn hash_certification(
    hasher: &mut dyn DynDigest,
    key: &PublicKey,
    tag: Tag,
    id: &impl Serialize,
) -> Result<()> {
    key.hash_for_signature(hasher)?;

    let prefix = match tag {
        Tag::UserId => 0xB4,
        Tag::UserAttribute => 0xD1,
        _ => unsupported_err!("certifications over {:?}", tag),
    };
    let mut prefix_buf: Vec<u8> = vec![prefix];
    prefix_buf.write_u32::<BigEndian>(id.write_len().try_into()?)?;
    hasher.update(&prefix_buf);

    let mut id_buf = Vec::with_capacity(id.write_len());
    id.to_writer(&mut id_buf)?;
    hasher.update(&id_buf);

    Ok(())
}

impl Serialize for Signature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(4)?;
        writer.write_u8(self.config.typ.into())?;
        writer.write_u8(self.config.pub_alg.into())?;
        writer.write_u8(self.config.hash_alg.into())?;

        writer.write_u16::<BigEndian>(self.config.hashed_subpackets.write_len().try_into()?)?;
        self.config.hashed_subpackets.to_writer(writer)?;
        writer.write_u16::<BigEndian>(self.config.unhashed_subpackets.write_len().try_into()?)?;
        self.config.unhashed_subpackets.to_writer(writer)?;

        writer.write_all(&self.signed_hash_value)?;
        self.signature.to_writer(writer)
    }

    fn write_len(&self) -> usize {
        4 + 2
            + self.config.hashed_subpackets.write_len()
            + 2
            + self.config.unhashed_subpackets.write_len()
            + 2
            + self.signature.write_len()
    }
}

impl PacketTrait for Signature {
    fn tag(&self) -> Tag {
        Tag::Signature
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_algorithm() {
        // version 4, binary, Elgamal
        let raw = [4, 0, 16, 8, 0, 0, 0, 0, 0, 0];
        let err = Signature::try_from_reader(&raw[..]).unwrap_err();
        assert!(err.is_unknown_signature_algorithm());
        assert!(matches!(
            err,
            Error::UnknownSignatureAlgorithm { algorithm: 16 }
        ));
    }

    #[test]
    fn test_signature_types() {
        assert_eq!(SignatureType::from(0x13), SignatureType::CertPositive);
        assert_eq!(SignatureType::from(0x77), SignatureType::Other(0x77));
        assert_eq!(u8::from(SignatureType::KeyRevocation), 0x20);
    }
}
