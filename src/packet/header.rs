use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};

use crate::errors::{bail, ensure, Result};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, PacketLength, Tag};

/// Represents a packet header.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-4.2>
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PacketHeader {
    version: PacketHeaderVersion,
    tag: Tag,
    length: PacketLength,
}

impl PacketHeader {
    /// A new style header with a fixed body length.
    pub fn new_fixed(tag: Tag, length: u32) -> Self {
        PacketHeader {
            version: PacketHeaderVersion::New,
            tag,
            length: PacketLength::Fixed(length),
        }
    }

    pub fn from_parts(
        version: PacketHeaderVersion,
        tag: Tag,
        length: PacketLength,
    ) -> Result<Self> {
        if version == PacketHeaderVersion::Old {
            ensure!(
                u8::from(tag) < 16,
                "tag {:?} does not fit into an old style header",
                tag
            );
            ensure!(
                !matches!(length, PacketLength::Partial(_)),
                "partial lengths are not allowed in old style headers"
            );
        } else {
            ensure!(
                u8::from(tag) < 64,
                "tag {:?} does not fit into a new style header",
                tag
            );
        }

        Ok(PacketHeader {
            version,
            tag,
            length,
        })
    }

    /// Parses the next header, returns `None` if the source is exhausted.
    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Option<Self>> {
        if !r.has_remaining()? {
            return Ok(None);
        }

        let header = r.read_u8()?;
        if header & 0x80 == 0 {
            bail!("invalid packet header {:#04x}", header);
        }

        let header = if header & 0x40 != 0 {
            PacketHeader {
                version: PacketHeaderVersion::New,
                tag: Tag::from(header & 0x3F),
                length: PacketLength::try_from_reader(&mut r)?,
            }
        } else {
            let length = match header & 0x03 {
                0 => PacketLength::Fixed(r.read_u8()?.into()),
                1 => PacketLength::Fixed(r.read_be_u16()?.into()),
                2 => PacketLength::Fixed(r.read_be_u32()?),
                _ => PacketLength::Indeterminate,
            };
            PacketHeader {
                version: PacketHeaderVersion::Old,
                tag: Tag::from((header >> 2) & 0x0F),
                length,
            }
        };

        Ok(Some(header))
    }

    pub fn version(&self) -> PacketHeaderVersion {
        self.version
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn packet_length(&self) -> PacketLength {
        self.length
    }
}

impl Serialize for PacketHeader {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let tag = u8::from(self.tag);
        match self.version {
            PacketHeaderVersion::New => {
                writer.write_u8(0xC0 | tag)?;
                self.length.to_writer_new(writer)?;
            }
            PacketHeaderVersion::Old => {
                let base = 0x80 | (tag << 2);
                match self.length {
                    PacketLength::Fixed(len) if len < 256 => {
                        writer.write_u8(base)?;
                        writer.write_u8(len as u8)?;
                    }
                    PacketLength::Fixed(len) if len < 65536 => {
                        writer.write_u8(base | 0x01)?;
                        writer.write_u16::<BigEndian>(len as u16)?;
                    }
                    PacketLength::Fixed(len) => {
                        writer.write_u8(base | 0x02)?;
                        writer.write_u32::<BigEndian>(len)?;
                    }
                    PacketLength::Indeterminate => {
                        writer.write_u8(base | 0x03)?;
                    }
                    PacketLength::Partial(_) => {
                        bail!("partial lengths are not allowed in old style headers");
                    }
                }
            }
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self.version {
            PacketHeaderVersion::New => 1 + self.length.new_encoding_len(),
            PacketHeaderVersion::Old => match self.length {
                PacketLength::Fixed(len) if len < 256 => 2,
                PacketLength::Fixed(len) if len < 65536 => 3,
                PacketLength::Fixed(_) => 5,
                PacketLength::Indeterminate | PacketLength::Partial(_) => 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_old_header() {
        // literal data, two octet length
        let raw = [0xAD, 0x01, 0x00];
        let header = PacketHeader::try_from_reader(&raw[..]).unwrap().unwrap();
        assert_eq!(header.version(), PacketHeaderVersion::Old);
        assert_eq!(header.tag(), Tag::LiteralData);
        assert_eq!(header.packet_length(), PacketLength::Fixed(256));

        // compressed data, indeterminate
        let header = PacketHeader::try_from_reader(&[0xA3][..]).unwrap().unwrap();
        assert_eq!(header.tag(), Tag::CompressedData);
        assert_eq!(header.packet_length(), PacketLength::Indeterminate);
    }

    #[test]
    fn test_new_header() {
        let raw = [0xD2, 0xEC];
        let header = PacketHeader::try_from_reader(&raw[..]).unwrap().unwrap();
        assert_eq!(header.version(), PacketHeaderVersion::New);
        assert_eq!(header.tag(), Tag::SymEncryptedProtectedData);
        assert_eq!(header.packet_length(), PacketLength::Partial(4096));
    }

    #[test]
    fn test_eof_and_garbage() {
        assert!(PacketHeader::try_from_reader(&b""[..]).unwrap().is_none());
        assert!(PacketHeader::try_from_reader(&[0x2D, 0x00][..]).is_err());
        // truncated length
        assert!(PacketHeader::try_from_reader(&[0xC2, 0xFF, 0x00][..]).is_err());
    }

    #[test]
    fn test_old_header_rejects_partial() {
        assert!(PacketHeader::from_parts(
            PacketHeaderVersion::Old,
            Tag::LiteralData,
            PacketLength::Partial(512)
        )
        .is_err());
        assert!(PacketHeader::from_parts(
            PacketHeaderVersion::Old,
            Tag::UserAttribute,
            PacketLength::Fixed(10)
        )
        .is_err());
    }

    proptest! {
        #[test]
        fn header_write_len_matches(tag in 1u8..16, len: u32, old: bool) {
            let version = if old { PacketHeaderVersion::Old } else { PacketHeaderVersion::New };
            let header =
                PacketHeader::from_parts(version, Tag::from(tag), PacketLength::Fixed(len))
                    .unwrap();
            let buf = header.to_bytes().unwrap();
            prop_assert_eq!(buf.len(), header.write_len());
            let back = PacketHeader::try_from_reader(&buf[..]).unwrap().unwrap();
            prop_assert_eq!(back, header);
        }
    }
}
