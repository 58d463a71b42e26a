use std::io::BufRead;

use log::{debug, warn};

use crate::armor::{self, BlockType, Dearmor};
use crate::composed::signed_key::{
    SignedKeyDetails, SignedPublicKey, SignedPublicSubKey, SignedUser, SignedUserAttribute,
};
use crate::errors::{bail, Result};
use crate::packet::{
    Packet, PacketParser, PublicKey, SecretKey, Signature, SignatureType, UserAttribute, UserId,
};
use crate::types::Tag;

/// Certificates and secret key material read from one or more key blocks.
#[derive(Debug, Default)]
pub struct ParsedKeys {
    pub public_keys: Vec<SignedPublicKey>,
    /// Secret key packets in stream order, primary keys and subkeys alike.
    pub secret_keys: Vec<SecretKey>,
}

impl ParsedKeys {
    /// Finishes the certificate in progress and begins one for `primary`.
    fn start(&mut self, current: &mut Option<KeyBuilder>, primary: PublicKey) {
        if let Some(done) = current.replace(KeyBuilder::new(primary)) {
            self.public_keys.push(done.build());
        }
    }
}

impl SignedPublicKey {
    /// Parses all certificates from armored or binary data.
    ///
    /// Secret key blocks are accepted too, their public parts are returned.
    pub fn from_reader_many<R: BufRead>(input: R) -> Result<Vec<Self>> {
        Ok(from_reader_many(input)?.public_keys)
    }
}

/// Parses public and secret key blocks from armored or binary data.
pub fn from_reader_many<R: BufRead>(mut input: R) -> Result<ParsedKeys> {
    if armor::is_armored(&mut input)? {
        let mut dearmor = Dearmor::new(input);
        dearmor.read_header()?;
        match dearmor.typ() {
            Some(BlockType::PublicKey) | Some(BlockType::PrivateKey) => {}
            Some(typ) => bail!("unexpected block type: {}", typ),
            None => bail!("missing armor block type"),
        }
        from_packets(PacketParser::new(dearmor))
    } else {
        from_packets(PacketParser::new(input))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Primary,
    User,
    Attribute,
    Subkey,
}

#[derive(Debug)]
struct KeyBuilder {
    primary: PublicKey,
    section: Section,
    revocation_signatures: Vec<Signature>,
    direct_signatures: Vec<Signature>,
    users: Vec<(UserId, Vec<Signature>)>,
    user_attributes: Vec<(UserAttribute, Vec<Signature>)>,
    subkeys: Vec<(PublicKey, Vec<Signature>)>,
}

impl KeyBuilder {
    fn new(primary: PublicKey) -> Self {
        KeyBuilder {
            primary,
            section: Section::Primary,
            revocation_signatures: Vec::new(),
            direct_signatures: Vec::new(),
            users: Vec::new(),
            user_attributes: Vec::new(),
            subkeys: Vec::new(),
        }
    }

    fn push_signature(&mut self, sig: Signature) {
        let target = match self.section {
            Section::Primary if sig.typ() == SignatureType::KeyRevocation => {
                &mut self.revocation_signatures
            }
            Section::Primary => &mut self.direct_signatures,
            Section::User => match self.users.last_mut() {
                Some((_, sigs)) => sigs,
                None => return,
            },
            Section::Attribute => match self.user_attributes.last_mut() {
                Some((_, sigs)) => sigs,
                None => return,
            },
            Section::Subkey => match self.subkeys.last_mut() {
                Some((_, sigs)) => sigs,
                None => return,
            },
        };
        target.push(sig);
    }

    fn build(self) -> SignedPublicKey {
        let users = self
            .users
            .into_iter()
            .map(|(id, sigs)| SignedUser::new(id, sigs))
            .collect();
        let user_attributes = self
            .user_attributes
            .into_iter()
            .map(|(attr, sigs)| SignedUserAttribute::new(attr, sigs))
            .collect();
        let subkeys = self
            .subkeys
            .into_iter()
            .map(|(key, sigs)| SignedPublicSubKey::new(key, sigs))
            .collect();

        SignedPublicKey::new(
            self.primary,
            SignedKeyDetails::new(
                self.revocation_signatures,
                self.direct_signatures,
                users,
                user_attributes,
            ),
            subkeys,
        )
    }
}

/// Groups a packet sequence into certificates.
pub fn from_packets(packets: impl Iterator<Item = Result<Packet>>) -> Result<ParsedKeys> {
    let mut parsed = ParsedKeys::default();
    let mut current: Option<KeyBuilder> = None;

    for packet in packets {
        let packet = packet?;
        debug!("key packet {:?}", packet.tag());

        // primary keys start a new certificate
        let packet = match packet {
            Packet::PublicKey(key) => {
                parsed.start(&mut current, key);
                continue;
            }
            Packet::SecretKey(key) => {
                parsed.start(&mut current, key.public_key().clone());
                parsed.secret_keys.push(key);
                continue;
            }
            packet => packet,
        };

        let Some(ref mut builder) = current else {
            match packet {
                Packet::Marker | Packet::Other { tag: Tag::Trust, .. } => continue,
                packet => bail!("unexpected {:?} packet before a primary key", packet.tag()),
            }
        };

        match packet {
            Packet::PublicSubkey(key) => {
                builder.subkeys.push((key, Vec::new()));
                builder.section = Section::Subkey;
            }
            Packet::SecretSubkey(key) => {
                builder.subkeys.push((key.public_key().clone(), Vec::new()));
                builder.section = Section::Subkey;
                parsed.secret_keys.push(key);
            }
            Packet::UserId(id) => {
                builder.users.push((id, Vec::new()));
                builder.section = Section::User;
            }
            Packet::UserAttribute(attr) => {
                builder.user_attributes.push((attr, Vec::new()));
                builder.section = Section::Attribute;
            }
            Packet::Signature(sig) => builder.push_signature(sig),
            Packet::Marker | Packet::Other { tag: Tag::Trust, .. } => {}
            Packet::Other { tag, .. } => warn!("ignoring {:?} packet in key", tag),
            packet => bail!("unexpected {:?} packet in key", packet.tag()),
        }
    }

    if let Some(done) = current.take() {
        parsed.public_keys.push(done.build());
    }

    Ok(parsed)
}
