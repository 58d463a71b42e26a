use std::io;

use log::warn;

use crate::armor::{ArmorWriter, BlockType, Headers};
use crate::composed::signed_key::SignedKeyDetails;
use crate::errors::{ensure, Result};
use crate::packet::{self, PublicKey, Signature, SignatureType};
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyId};

/// A public certificate: primary key, its users, attributes and subkeys,
/// each with the signatures attached to them.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SignedPublicKey {
    pub primary_key: PublicKey,
    pub details: SignedKeyDetails,
    pub public_subkeys: Vec<SignedPublicSubKey>,
}

impl SignedPublicKey {
    pub fn new(
        primary_key: PublicKey,
        details: SignedKeyDetails,
        mut public_subkeys: Vec<SignedPublicSubKey>,
    ) -> Self {
        public_subkeys.retain(|key| {
            if key.signatures.is_empty() {
                warn!("ignoring unsigned {:?}", key.key);
                false
            } else {
                true
            }
        });

        SignedPublicKey {
            primary_key,
            details,
            public_subkeys,
        }
    }

    pub fn key_id(&self) -> KeyId {
        self.primary_key.key_id()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.primary_key.fingerprint()
    }

    /// All user ids, lossily decoded, primary user first.
    pub fn user_ids(&self) -> Vec<String> {
        let (primary, other): (Vec<_>, Vec<_>) =
            self.details.users.iter().partition(|u| u.is_primary());

        primary
            .into_iter()
            .chain(other)
            .map(|u| u.id.as_string())
            .collect()
    }

    /// The primary key or the subkey with the given id.
    pub fn key_by_id(&self, key_id: &KeyId) -> Option<&PublicKey> {
        if self.primary_key.key_id() == *key_id {
            return Some(&self.primary_key);
        }

        self.public_subkeys
            .iter()
            .map(|k| &k.key)
            .find(|k| k.key_id() == *key_id)
    }

    /// Does the primary key or any of its subkeys have the given id.
    pub fn has_key_id(&self, key_id: &KeyId) -> bool {
        self.key_by_id(key_id).is_some()
    }

    /// The key to encrypt to: the first encryption capable subkey, else the primary key.
    pub fn encryption_key(&self) -> Option<&PublicKey> {
        self.public_subkeys
            .iter()
            .map(|k| &k.key)
            .find(|k| k.is_encryption_key())
            .or_else(|| {
                Some(&self.primary_key).filter(|k| k.is_encryption_key())
            })
    }

    /// Verifies all self signatures and subkey bindings.
    pub fn verify(&self) -> Result<()> {
        self.details.verify(&self.primary_key)?;
        for subkey in &self.public_subkeys {
            subkey.verify(&self.primary_key)?;
        }

        Ok(())
    }

    pub fn to_armored_writer(
        &self,
        writer: &mut impl io::Write,
        headers: Option<&Headers>,
    ) -> Result<()> {
        let mut armor = ArmorWriter::with_headers(BlockType::PublicKey, headers, writer)?;
        self.to_writer(&mut armor)?;
        armor.finish()?;

        Ok(())
    }

    pub fn to_armored_bytes(&self, headers: Option<&Headers>) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.to_armored_writer(&mut buf, headers)?;

        Ok(buf)
    }
}

impl Serialize for SignedPublicKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        packet::write_packet(writer, &self.primary_key)?;
        self.details.to_writer(writer)?;
        for ps in &self.public_subkeys {
            ps.to_writer(writer)?;
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        packet::packet_len(&self.primary_key)
            + self.details.write_len()
            + self.public_subkeys.write_len()
    }
}

/// A public subkey with its binding signatures.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SignedPublicSubKey {
    pub key: PublicKey,
    pub signatures: Vec<Signature>,
}

impl SignedPublicSubKey {
    pub fn new(key: PublicKey, mut signatures: Vec<Signature>) -> Self {
        signatures.retain(|sig| {
            if sig.typ() != SignatureType::SubkeyBinding
                && sig.typ() != SignatureType::SubkeyRevocation
            {
                warn!(
                    "ignoring unexpected signature {:?} after Subkey packet",
                    sig.typ()
                );
                false
            } else {
                true
            }
        });

        SignedPublicSubKey { key, signatures }
    }

    /// The first binding signature, which is the one that makes this a subkey of its primary.
    pub fn binding_signature(&self) -> Option<&Signature> {
        self.signatures
            .iter()
            .find(|s| s.typ() == SignatureType::SubkeyBinding)
    }

    pub fn verify(&self, primary: &PublicKey) -> Result<()> {
        ensure!(!self.signatures.is_empty(), "missing subkey bindings");
        for sig in &self.signatures {
            sig.verify_key_binding(primary, primary, &self.key)?;
        }

        Ok(())
    }
}

impl Serialize for SignedPublicSubKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.key.to_writer_as_subkey(writer)?;
        for sig in &self.signatures {
            packet::write_packet(writer, sig)?;
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        packet::packet_len(&self.key)
            + self
                .signatures
                .iter()
                .map(packet::packet_len)
                .sum::<usize>()
    }
}
