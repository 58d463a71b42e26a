use std::io;

use log::{debug, warn};

use crate::errors::{ensure, Result};
use crate::packet::{self, PublicKey, Signature, SignatureType, UserAttribute, UserId};
use crate::ser::Serialize;
use crate::types::Tag;

/// A user id together with its certifications.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SignedUser {
    pub id: UserId,
    pub signatures: Vec<Signature>,
}

impl SignedUser {
    pub fn new(id: UserId, signatures: Vec<Signature>) -> Self {
        let signatures = signatures
            .into_iter()
            .filter(|sig| {
                if !sig.is_certification() {
                    warn!(
                        "ignoring unexpected signature {:?} after User ID packet",
                        sig.typ()
                    );
                    false
                } else {
                    true
                }
            })
            .collect();

        SignedUser { id, signatures }
    }

    pub fn is_primary(&self) -> bool {
        self.signatures.iter().any(Signature::is_primary)
    }

    /// Verify all self certifications. If signatures is empty, this fails.
    pub fn verify(&self, key: &PublicKey) -> Result<()> {
        debug!("verify signed user {:?}", self.id);
        ensure!(!self.signatures.is_empty(), "no signatures found");

        for signature in self.signatures.iter().filter(|s| s.is_issued_by(key)) {
            signature.verify_certification(key, key, Tag::UserId, &self.id)?;
        }

        Ok(())
    }
}

impl Serialize for SignedUser {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        packet::write_packet(writer, &self.id)?;
        for sig in &self.signatures {
            packet::write_packet(writer, sig)?;
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        packet::packet_len(&self.id)
            + self.signatures.iter().map(packet::packet_len).sum::<usize>()
    }
}

/// A user attribute together with its certifications.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SignedUserAttribute {
    pub attr: UserAttribute,
    pub signatures: Vec<Signature>,
}

impl SignedUserAttribute {
    pub fn new(attr: UserAttribute, signatures: Vec<Signature>) -> Self {
        let signatures = signatures
            .into_iter()
            .filter(|sig| {
                if !sig.is_certification() {
                    warn!(
                        "ignoring unexpected signature {:?} after User Attribute packet",
                        sig.typ()
                    );
                    false
                } else {
                    true
                }
            })
            .collect();

        SignedUserAttribute { attr, signatures }
    }

    /// Verify all self certifications. If signatures is empty, this fails.
    pub fn verify(&self, key: &PublicKey) -> Result<()> {
        debug!("verify signed attribute {:?}", self.attr);
        ensure!(!self.signatures.is_empty(), "no signatures found");

        for signature in self.signatures.iter().filter(|s| s.is_issued_by(key)) {
            signature.verify_certification(key, key, Tag::UserAttribute, &self.attr)?;
        }

        Ok(())
    }
}

impl Serialize for SignedUserAttribute {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        packet::write_packet(writer, &self.attr)?;
        for sig in &self.signatures {
            packet::write_packet(writer, sig)?;
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        packet::packet_len(&self.attr)
            + self.signatures.iter().map(packet::packet_len).sum::<usize>()
    }
}

/// Everything attached to a primary key, except for its subkeys.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct SignedKeyDetails {
    pub revocation_signatures: Vec<Signature>,
    pub direct_signatures: Vec<Signature>,
    pub users: Vec<SignedUser>,
    pub user_attributes: Vec<SignedUserAttribute>,
}

impl SignedKeyDetails {
    pub fn new(
        revocation_signatures: Vec<Signature>,
        direct_signatures: Vec<Signature>,
        users: Vec<SignedUser>,
        user_attributes: Vec<SignedUserAttribute>,
    ) -> Self {
        let users = users
            .into_iter()
            .filter(|user| {
                if user.signatures.is_empty() {
                    warn!("ignoring unsigned {:?}", user.id);
                    false
                } else {
                    true
                }
            })
            .collect();

        SignedKeyDetails {
            revocation_signatures,
            direct_signatures,
            users,
            user_attributes,
        }
    }

    /// Verifies the self signatures made by `key`.
    ///
    /// Certifications by third parties are skipped, their issuers are not known here.
    pub fn verify(&self, key: &PublicKey) -> Result<()> {
        for user in &self.users {
            user.verify(key)?;
        }
        for attr in &self.user_attributes {
            attr.verify(key)?;
        }
        for sig in &self.revocation_signatures {
            ensure!(
                sig.typ() == SignatureType::KeyRevocation,
                "unexpected {:?} in key revocations",
                sig.typ()
            );
            sig.verify_key(key, key)?;
        }
        for sig in self.direct_signatures.iter().filter(|s| s.is_issued_by(key)) {
            sig.verify_key(key, key)?;
        }

        Ok(())
    }
}

impl Serialize for SignedKeyDetails {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        for sig in &self.revocation_signatures {
            packet::write_packet(writer, sig)?;
        }

        for sig in &self.direct_signatures {
            packet::write_packet(writer, sig)?;
        }

        for user in &self.users {
            user.to_writer(writer)?;
        }

        for attr in &self.user_attributes {
            attr.to_writer(writer)?;
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        self.revocation_signatures
            .iter()
            .chain(self.direct_signatures.iter())
            .map(packet::packet_len)
            .sum::<usize>()
            + self.users.iter().map(Serialize::write_len).sum::<usize>()
            + self
                .user_attributes
                .iter()
                .map(Serialize::write_len)
                .sum::<usize>()
    }
}
