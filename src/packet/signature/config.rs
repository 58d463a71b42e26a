use std::io::{self, Read};

use byteorder::{BigEndian, WriteBytesExt};
use chrono::{DateTime, SubsecRound, Utc};
use digest::DynDigest;
use log::debug;

use super::{hash_certification, Signature, SignatureType, Subpacket, SubpacketData};
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{bail, ensure, Result};
use crate::packet::{PublicKey, SecretKey};
use crate::ser::Serialize;
use crate::types::Tag;
use crate::util::CanonicalText;

const BUFFER_SIZE: usize = 8 * 1024;

/// Everything that goes into a signature, except the signature itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureConfig {
    pub typ: SignatureType,
    pub pub_alg: PublicKeyAlgorithm,
    pub hash_alg: HashAlgorithm,
    pub hashed_subpackets: Vec<Subpacket>,
    pub unhashed_subpackets: Vec<Subpacket>,
}

impl SignatureConfig {
    /// A v4 config with the usual subpackets for a signature made by `key`
    /// at `created`: creation time and issuer fingerprint hashed, issuer key id unhashed.
    pub fn v4(
        typ: SignatureType,
        hash_alg: HashAlgorithm,
        key: &PublicKey,
        created: DateTime<Utc>,
    ) -> Self {
        let fingerprint = key.fingerprint();
        SignatureConfig {
            typ,
            pub_alg: key.algorithm(),
            hash_alg,
            hashed_subpackets: vec![
                Subpacket::regular(SubpacketData::SignatureCreationTime(
                    created.trunc_subsecs(0),
                )),
                Subpacket::regular(SubpacketData::IssuerFingerprint(fingerprint)),
            ],
            unhashed_subpackets: vec![Subpacket::regular(SubpacketData::Issuer(
                fingerprint.key_id(),
            ))],
        }
    }

    pub fn created(&self) -> Option<&DateTime<Utc>> {
        self.hashed_subpackets.iter().find_map(|p| match p.data {
            SubpacketData::SignatureCreationTime(ref d) => Some(d),
            _ => None,
        })
    }

    pub fn is_certification(&self) -> bool {
        matches!(
            self.typ,
            SignatureType::CertGeneric
                | SignatureType::CertPersona
                | SignatureType::CertCasual
                | SignatureType::CertPositive
                | SignatureType::CertRevocation
        )
    }

    /// Hashes the signature fields covered by the signature, returns the hashed length.
    pub fn hash_signature_data(&self, hasher: &mut dyn DynDigest) -> Result<usize> {
        let mut res: Vec<u8> = vec![
            // version
            0x04,
            self.typ.into(),
            self.pub_alg.into(),
            self.hash_alg.into(),
        ];

        let subpackets_len = self.hashed_subpackets.write_len();
        res.write_u16::<BigEndian>(subpackets_len.try_into()?)?;
        self.hashed_subpackets.to_writer(&mut res)?;

        hasher.update(&res);

        Ok(res.len())
    }

    /// The final bytes hashed into a v4 signature.
    pub fn trailer(&self, len: usize) -> Result<Vec<u8>> {
        let mut trailer: Vec<u8> = vec![0x04, 0xFF];
        trailer.write_u32::<BigEndian>(len.try_into()?)?;
        Ok(trailer)
    }

    /// Completes a hasher that has seen the signed data, returns the digest.
    pub fn finalize_hash(&self, mut hasher: Box<dyn DynDigest>) -> Result<Vec<u8>> {
        let len = self.hash_signature_data(&mut *hasher)?;
        hasher.update(&self.trailer(len)?);

        Ok(hasher.finalize().to_vec())
    }

    /// Signs a hasher that has seen the signed data.
    pub fn sign_hasher(self, key: &SecretKey, hasher: Box<dyn DynDigest>) -> Result<Signature> {
        ensure!(
            key.public_key().algorithm() == self.pub_alg,
            "signature algorithm {:?} does not match the key",
            self.pub_alg
        );
        let digest = self.finalize_hash(hasher)?;
        let signature = key.create_signature(self.hash_alg, &digest)?;
        debug!("created signature {:?}", self.typ);

        Ok(Signature::from_config(
            self,
            [digest[0], digest[1]],
            signature,
        ))
    }

    /// Signs the document `data`.
    pub fn sign<R: Read>(self, key: &SecretKey, data: R) -> Result<Signature> {
        let mut hasher = SignatureHasher::new(&self)?;
        hasher.update_reader(data)?;
        self.sign_hasher(key, hasher.into_inner())
    }

    /// Certifies a user id or user attribute on `certified`.
    pub fn sign_certification(
        self,
        key: &SecretKey,
        certified: &PublicKey,
        tag: Tag,
        id: &impl Serialize,
    ) -> Result<Signature> {
        ensure!(
            self.is_certification(),
            "can not sign non certification {:?} as certification",
            self.typ
        );

        let mut hasher = self.hash_alg.new_hasher()?;
        hash_certification(&mut *hasher, certified, tag, id)?;
        self.sign_hasher(key, hasher)
    }

    /// Binds `subkey` to `primary`, or revokes that binding.
    pub fn sign_key_binding(
        self,
        key: &SecretKey,
        primary: &PublicKey,
        subkey: &PublicKey,
    ) -> Result<Signature> {
        let mut hasher = self.hash_alg.new_hasher()?;
        primary.hash_for_signature(&mut *hasher)?;
        subkey.hash_for_signature(&mut *hasher)?;
        self.sign_hasher(key, hasher)
    }

    /// Signs `target` directly, for key revocations and direct key signatures.
    pub fn sign_key(self, key: &SecretKey, target: &PublicKey) -> Result<Signature> {
        let mut hasher = self.hash_alg.new_hasher()?;
        target.hash_for_signature(&mut *hasher)?;
        self.sign_hasher(key, hasher)
    }
}

/// Running digest over signed document data.
///
/// Text signatures are hashed with normalized line endings.
#[derive(derive_more::Debug)]
pub struct SignatureHasher {
    #[debug(skip)]
    hasher: Box<dyn DynDigest>,
    text: Option<CanonicalText>,
}

impl SignatureHasher {
    pub fn new(config: &SignatureConfig) -> Result<Self> {
        Self::with_type(config.typ, config.hash_alg)
    }

    pub fn with_type(typ: SignatureType, hash_alg: HashAlgorithm) -> Result<Self> {
        let text = match typ {
            SignatureType::Binary => None,
            SignatureType::Text => Some(CanonicalText::default()),
            _ => bail!("{:?} is not a document signature", typ),
        };

        Ok(SignatureHasher {
            hasher: hash_alg.new_hasher()?,
            text,
        })
    }

    pub fn update(&mut self, data: &[u8]) {
        match self.text {
            Some(ref mut text) => text.update(&mut *self.hasher, data),
            None => self.hasher.update(data),
        }
    }

    pub fn update_reader<R: Read>(&mut self, mut data: R) -> io::Result<()> {
        let mut buf = vec![0u8; BUFFER_SIZE];
        loop {
            let read = match data.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            self.update(&buf[..read]);
        }
    }

    pub fn into_inner(self) -> Box<dyn DynDigest> {
        self.hasher
    }
}
