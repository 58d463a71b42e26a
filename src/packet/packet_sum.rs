use std::io::{self, BufRead};

use bytes::Bytes;

use crate::errors::Result;
use crate::packet::{
    OnePassSignature, PacketBodyReader, PacketHeader, PacketTrait, PublicKey,
    PublicKeyEncryptedSessionKey, SecretKey, Signature, SymKeyEncryptedSessionKey, UserAttribute,
    UserId,
};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Tag;

/// A packet that is read into memory in full.
///
/// Data carrying packets (literal, compressed and encrypted data) are streamed
/// by the message reader instead and only show up as [`Packet::Other`] here.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-4>
#[derive(Debug, PartialEq, Eq, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum Packet {
    PublicKey(PublicKey),
    PublicSubkey(PublicKey),
    SecretKey(SecretKey),
    SecretSubkey(SecretKey),
    UserId(UserId),
    UserAttribute(UserAttribute),
    Signature(Signature),
    OnePassSignature(OnePassSignature),
    PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey),
    SymKeyEncryptedSessionKey(SymKeyEncryptedSessionKey),
    Marker,
    Other { tag: Tag, body: Bytes },
}

impl Packet {
    /// Parses the body of a packet with the given header.
    ///
    /// The body is not required to be consumed completely.
    pub fn from_reader<R: BufRead>(
        header: PacketHeader,
        body: &mut PacketBodyReader<R>,
    ) -> Result<Self> {
        let packet = match header.tag() {
            Tag::PublicKey => Packet::PublicKey(PublicKey::try_from_reader(body)?),
            Tag::PublicSubkey => Packet::PublicSubkey(PublicKey::try_from_reader(body)?),
            Tag::SecretKey => Packet::SecretKey(SecretKey::try_from_reader(body)?),
            Tag::SecretSubkey => Packet::SecretSubkey(SecretKey::try_from_reader(body)?),
            Tag::UserId => Packet::UserId(UserId::try_from_reader(body)?),
            Tag::UserAttribute => Packet::UserAttribute(UserAttribute::try_from_reader(body)?),
            Tag::Signature => Packet::Signature(Signature::try_from_reader(body)?),
            Tag::OnePassSignature => {
                Packet::OnePassSignature(OnePassSignature::try_from_reader(body)?)
            }
            Tag::PublicKeyEncryptedSessionKey => Packet::PublicKeyEncryptedSessionKey(
                PublicKeyEncryptedSessionKey::try_from_reader(body)?,
            ),
            Tag::SymKeyEncryptedSessionKey => Packet::SymKeyEncryptedSessionKey(
                SymKeyEncryptedSessionKey::try_from_reader(body)?,
            ),
            Tag::Marker => Packet::Marker,
            tag => Packet::Other {
                tag,
                body: body.rest()?.freeze(),
            },
        };

        Ok(packet)
    }

    pub fn tag(&self) -> Tag {
        match self {
            Self::PublicKey(_) => Tag::PublicKey,
            Self::PublicSubkey(_) => Tag::PublicSubkey,
            Self::SecretKey(_) => Tag::SecretKey,
            Self::SecretSubkey(_) => Tag::SecretSubkey,
            Self::UserId(_) => Tag::UserId,
            Self::UserAttribute(_) => Tag::UserAttribute,
            Self::Signature(_) => Tag::Signature,
            Self::OnePassSignature(_) => Tag::OnePassSignature,
            Self::PublicKeyEncryptedSessionKey(_) => Tag::PublicKeyEncryptedSessionKey,
            Self::SymKeyEncryptedSessionKey(_) => Tag::SymKeyEncryptedSessionKey,
            Self::Marker => Tag::Marker,
            Self::Other { tag, .. } => *tag,
        }
    }
}

/// Writes a single packet, with a new style header.
pub fn write_packet<W: io::Write, P: PacketTrait>(writer: &mut W, packet: &P) -> Result<()> {
    packet.to_writer_with_header(writer)
}

impl Serialize for Packet {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::PublicKey(p) => p.to_writer_with_header(writer),
            Self::PublicSubkey(p) => p.to_writer_as_subkey(writer),
            Self::SecretKey(p) => p.to_writer_with_header(writer),
            Self::SecretSubkey(p) => p.to_writer_as_subkey(writer),
            Self::UserId(p) => p.to_writer_with_header(writer),
            Self::UserAttribute(p) => p.to_writer_with_header(writer),
            Self::Signature(p) => p.to_writer_with_header(writer),
            Self::OnePassSignature(p) => p.to_writer_with_header(writer),
            Self::PublicKeyEncryptedSessionKey(p) => p.to_writer_with_header(writer),
            Self::SymKeyEncryptedSessionKey(p) => p.to_writer_with_header(writer),
            Self::Marker => {
                PacketHeader::new_fixed(Tag::Marker, 3).to_writer(writer)?;
                writer.write_all(b"PGP")?;
                Ok(())
            }
            Self::Other { tag, body } => {
                PacketHeader::new_fixed(*tag, body.len().try_into()?).to_writer(writer)?;
                writer.write_all(body)?;
                Ok(())
            }
        }
    }

    fn write_len(&self) -> usize {
        let body_len = match self {
            Self::PublicKey(p) | Self::PublicSubkey(p) => p.write_len(),
            Self::SecretKey(p) | Self::SecretSubkey(p) => p.write_len(),
            Self::UserId(p) => p.write_len(),
            Self::UserAttribute(p) => p.write_len(),
            Self::Signature(p) => p.write_len(),
            Self::OnePassSignature(p) => p.write_len(),
            Self::PublicKeyEncryptedSessionKey(p) => p.write_len(),
            Self::SymKeyEncryptedSessionKey(p) => p.write_len(),
            Self::Marker => 3,
            Self::Other { body, .. } => body.len(),
        };
        with_header_len(body_len)
    }
}

/// Length of a packet including its new style header.
pub fn packet_len<P: PacketTrait>(packet: &P) -> usize {
    with_header_len(packet.write_len())
}

fn with_header_len(body_len: usize) -> usize {
    // tag octet plus the new style length
    let length_len = if body_len < 192 {
        1
    } else if body_len < 8384 {
        2
    } else {
        5
    };
    1 + length_len + body_len
}
