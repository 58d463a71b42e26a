use std::io::{self, BufRead};

use byteorder::WriteBytesExt;
use bytes::Bytes;

use crate::errors::{ensure, Result};
use crate::packet::PacketTrait;
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Tag;

const IMAGE_TYPE: u8 = 1;
/// Image header, version 1, JPEG encoding.
const IMAGE_HEADER: [u8; 16] = [0x10, 0x00, 0x01, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];

/// User Attribute Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.12>
///
/// The body is kept as is, so certifications hash exactly what was received.
#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
pub struct UserAttribute {
    #[debug("{} bytes", data.len())]
    data: Bytes,
}

impl UserAttribute {
    /// Parses a `UserAttribute` packet body, checking the subpacket framing.
    pub fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let data = i.rest()?.freeze();
        let attr = UserAttribute { data };
        attr.subpackets()?;

        Ok(attr)
    }

    /// An attribute holding a single JPEG image.
    pub fn new_image(jpeg: &[u8]) -> Result<Self> {
        let len = 1 + IMAGE_HEADER.len() + jpeg.len();
        let mut data = Vec::with_capacity(len + 5);
        write_subpacket_len(&mut data, len)?;
        data.push(IMAGE_TYPE);
        data.extend_from_slice(&IMAGE_HEADER);
        data.extend_from_slice(jpeg);

        Ok(UserAttribute { data: data.into() })
    }

    /// The contained subpackets as type and body.
    pub fn subpackets(&self) -> Result<Vec<(u8, Bytes)>> {
        let mut packets = Vec::new();
        let mut i = &self.data[..];
        while !i.is_empty() {
            let len = match i.read_u8()? {
                len @ 0..=191 => usize::from(len),
                first @ 192..=254 => {
                    ((usize::from(first) - 192) << 8) + usize::from(i.read_u8()?) + 192
                }
                255 => i.read_be_u32()?.try_into()?,
            };
            ensure!(len > 0, "empty user attribute subpacket");
            let typ = i.read_u8()?;
            let body = i.take_bytes(len - 1)?.freeze();
            packets.push((typ, body));
        }

        Ok(packets)
    }

    /// The JPEG data of the first image subpacket.
    pub fn image(&self) -> Option<Bytes> {
        self.subpackets()
            .ok()?
            .into_iter()
            .find(|(typ, body)| *typ == IMAGE_TYPE && body.len() >= IMAGE_HEADER.len())
            .map(|(_, body)| body.slice(IMAGE_HEADER.len()..))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

fn write_subpacket_len<W: io::Write>(writer: &mut W, len: usize) -> Result<()> {
    if len < 192 {
        writer.write_u8(len as u8)?;
    } else if len < 8384 {
        writer.write_u8((((len - 192) >> 8) + 192) as u8)?;
        writer.write_u8(((len - 192) & 0xFF) as u8)?;
    } else {
        writer.write_u8(255)?;
        writer.write_all(&u32::try_from(len)?.to_be_bytes())?;
    }
    Ok(())
}

impl Serialize for UserAttribute {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.data.len()
    }
}

impl PacketTrait for UserAttribute {
    fn tag(&self) -> Tag {
        Tag::UserAttribute
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_attribute() {
        let jpeg = vec![0xFFu8; 500];
        let attr = UserAttribute::new_image(&jpeg).unwrap();

        let bytes = attr.to_bytes().unwrap();
        let parsed = UserAttribute::try_from_reader(&bytes[..]).unwrap();
        assert_eq!(parsed, attr);
        assert_eq!(parsed.image().unwrap(), &jpeg[..]);
        assert_eq!(parsed.subpackets().unwrap().len(), 1);
    }

    #[test]
    fn test_bad_framing() {
        assert!(UserAttribute::try_from_reader(&[10, 1, 2][..]).is_err());
    }
}
