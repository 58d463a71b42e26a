use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::errors::{unsupported_err, Result};
use crate::parsing_reader::BufReadParsing;

/// Represents the packet length.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PacketLength {
    Fixed(u32),
    Indeterminate,
    Partial(u32),
}

impl PacketLength {
    /// Parses a new style length, as used in new headers and between partial chunks.
    pub fn try_from_reader<R: BufRead>(mut r: R) -> io::Result<Self> {
        let olen = r.read_u8()?;
        let len = match olen {
            // One-Octet Lengths
            0..=191 => PacketLength::Fixed(olen.into()),
            // Two-Octet Lengths
            192..=223 => {
                let a = r.read_u8()?;
                let l = ((u32::from(olen) - 192) << 8) + 192 + u32::from(a);
                PacketLength::Fixed(l)
            }
            // Partial Body Lengths
            224..=254 => PacketLength::Partial(1 << (olen & 0x1F)),
            // Five-Octet Lengths
            255 => PacketLength::Fixed(r.read_be_u32()?),
        };
        Ok(len)
    }

    /// Writes a new style length.
    pub fn to_writer_new<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match *self {
            PacketLength::Fixed(len) => {
                if len < 192 {
                    writer.write_u8(len as u8)?;
                } else if len < 8384 {
                    writer.write_u8((((len - 192) >> 8) + 192) as u8)?;
                    writer.write_u8(((len - 192) & 0xFF) as u8)?;
                } else {
                    writer.write_u8(255)?;
                    writer.write_u32::<BigEndian>(len)?;
                }
            }
            PacketLength::Indeterminate => {
                unsupported_err!("indeterminate lengths can not be written in new style headers");
            }
            PacketLength::Partial(len) => {
                debug_assert_eq!(len.count_ones(), 1); // must be a power of two
                let n = len.trailing_zeros();
                writer.write_u8((224 + n) as u8)?;
            }
        }
        Ok(())
    }

    /// Number of bytes `to_writer_new` emits for this length.
    pub fn new_encoding_len(&self) -> usize {
        match *self {
            PacketLength::Fixed(len) if len < 192 => 1,
            PacketLength::Fixed(len) if len < 8384 => 2,
            PacketLength::Fixed(_) => 5,
            PacketLength::Indeterminate | PacketLength::Partial(_) => 1,
        }
    }
}

/// Packet Tag, see <https://www.rfc-editor.org/rfc/rfc4880.html#section-4.3>
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[non_exhaustive]
pub enum Tag {
    /// Public-Key Encrypted Session Key Packet
    PublicKeyEncryptedSessionKey = 1,
    /// Signature Packet
    Signature = 2,
    /// Symmetric-Key Encrypted Session Key Packet
    SymKeyEncryptedSessionKey = 3,
    /// One-Pass Signature Packet
    OnePassSignature = 4,
    /// Secret-Key Packet
    SecretKey = 5,
    /// Public-Key Packet
    PublicKey = 6,
    /// Secret-Subkey Packet
    SecretSubkey = 7,
    /// Compressed Data Packet
    CompressedData = 8,
    /// Symmetrically Encrypted Data Packet
    SymEncryptedData = 9,
    /// Marker Packet
    Marker = 10,
    /// Literal Data Packet
    LiteralData = 11,
    /// Trust Packet
    Trust = 12,
    /// User ID Packet
    UserId = 13,
    /// Public-Subkey Packet
    PublicSubkey = 14,
    /// User Attribute Packet
    UserAttribute = 17,
    /// Sym. Encrypted and Integrity Protected Data Packet
    SymEncryptedProtectedData = 18,
    /// Modification Detection Code Packet
    ModDetectionCode = 19,
    /// Padding Packet
    Padding = 21,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Tag {
    /// Partial body lengths are only allowed for data packets.
    pub fn allows_partial_length(self) -> bool {
        matches!(
            self,
            Tag::LiteralData
                | Tag::CompressedData
                | Tag::SymEncryptedData
                | Tag::SymEncryptedProtectedData
        )
    }
}

/// The version of the packet format.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum PacketHeaderVersion {
    /// Old Packet Format
    Old,
    /// New Packet Format
    #[default]
    New,
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_partial_length() {
        let mut buf = Vec::new();
        PacketLength::Partial(8192).to_writer_new(&mut buf).unwrap();
        assert_eq!(buf, vec![0xED]);
        assert_eq!(
            PacketLength::try_from_reader(&buf[..]).unwrap(),
            PacketLength::Partial(8192)
        );
    }

    #[test]
    fn test_two_octet_length() {
        let mut buf = Vec::new();
        PacketLength::Fixed(1173).to_writer_new(&mut buf).unwrap();
        assert_eq!(buf, vec![0xC3, 0xD5]);
    }

    #[test]
    fn test_tag_conversion() {
        assert_eq!(Tag::from(18u8), Tag::SymEncryptedProtectedData);
        assert_eq!(Tag::from(60u8), Tag::Other(60));
        assert_eq!(u8::from(Tag::Marker), 10);
        assert!(Tag::LiteralData.allows_partial_length());
        assert!(!Tag::Signature.allows_partial_length());
    }

    proptest! {
        #[test]
        fn fixed_length_encoding(len: u32) {
            let length = PacketLength::Fixed(len);
            let mut buf = Vec::new();
            length.to_writer_new(&mut buf).unwrap();
            prop_assert_eq!(buf.len(), length.new_encoding_len());
            prop_assert_eq!(PacketLength::try_from_reader(&buf[..]).unwrap(), length);
        }
    }
}
