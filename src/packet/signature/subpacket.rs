use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use log::debug;

use super::Signature;
use crate::errors::{ensure, format_err, Result};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyId};

/// A signature subpacket.
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.3.1>
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Subpacket {
    pub is_critical: bool,
    pub data: SubpacketData,
}

#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
pub enum SubpacketData {
    /// The time the signature was made.
    SignatureCreationTime(DateTime<Utc>),
    /// The time the signature will expire, relative to its creation.
    SignatureExpirationTime(Duration),
    /// When the key is going to expire, relative to its creation.
    KeyExpirationTime(Duration),
    Issuer(KeyId),
    PrimaryUserId(bool),
    KeyFlags(#[debug("{}", hex::encode(_0))] Bytes),
    SignersUserID(#[debug("{}", String::from_utf8_lossy(_0))] Bytes),
    RevocationReason(u8, #[debug("{}", String::from_utf8_lossy(_1))] Bytes),
    EmbeddedSignature(Box<Signature>),
    IssuerFingerprint(Fingerprint),
    /// Subpackets this crate does not interpret, kept for hashing and serialization.
    Other(u8, #[debug("{}", hex::encode(_1))] Bytes),
}

impl Subpacket {
    /// Construct a new regular subpacket.
    pub const fn regular(data: SubpacketData) -> Self {
        Subpacket {
            is_critical: false,
            data,
        }
    }

    /// Construct a new critical subpacket.
    pub const fn critical(data: SubpacketData) -> Self {
        Subpacket {
            is_critical: true,
            data,
        }
    }

    pub fn typ(&self) -> u8 {
        match self.data {
            SubpacketData::SignatureCreationTime(_) => 2,
            SubpacketData::SignatureExpirationTime(_) => 3,
            SubpacketData::KeyExpirationTime(_) => 9,
            SubpacketData::Issuer(_) => 16,
            SubpacketData::PrimaryUserId(_) => 25,
            SubpacketData::KeyFlags(_) => 27,
            SubpacketData::SignersUserID(_) => 28,
            SubpacketData::RevocationReason(..) => 29,
            SubpacketData::EmbeddedSignature(_) => 32,
            SubpacketData::IssuerFingerprint(_) => 33,
            SubpacketData::Other(typ, _) => typ,
        }
    }

    /// Parses a single subpacket, including its length.
    pub fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let len = match i.read_u8()? {
            len @ 0..=191 => usize::from(len),
            first @ 192..=254 => {
                let second = i.read_u8()?;
                ((usize::from(first) - 192) << 8) + usize::from(second) + 192
            }
            255 => i.read_be_u32()?.try_into()?,
        };
        ensure!(len > 0, "empty subpacket");

        let typ = i.read_u8()?;
        let is_critical = typ & 0x80 != 0;
        let typ = typ & 0x7F;
        let body = i.take_bytes(len - 1)?;
        let mut body = &body[..];

        let data = match typ {
            2 => SubpacketData::SignatureCreationTime(read_time(&mut body)?),
            3 => SubpacketData::SignatureExpirationTime(read_duration(&mut body)?),
            9 => SubpacketData::KeyExpirationTime(read_duration(&mut body)?),
            16 => SubpacketData::Issuer(KeyId::from(body.read_array::<8>()?)),
            25 => SubpacketData::PrimaryUserId(body.read_u8()? != 0),
            27 => SubpacketData::KeyFlags(Bytes::copy_from_slice(body)),
            28 => SubpacketData::SignersUserID(Bytes::copy_from_slice(body)),
            29 => {
                let code = body.read_u8()?;
                SubpacketData::RevocationReason(code, Bytes::copy_from_slice(body))
            }
            32 => SubpacketData::EmbeddedSignature(Box::new(Signature::try_from_reader(
                &mut body,
            )?)),
            33 => {
                let version = body.read_u8()?;
                if version == 4 {
                    SubpacketData::IssuerFingerprint(Fingerprint::new(body)?)
                } else {
                    debug!("ignoring issuer fingerprint version {}", version);
                    let mut raw = vec![version];
                    raw.extend_from_slice(body);
                    SubpacketData::Other(typ, raw.into())
                }
            }
            _ => SubpacketData::Other(typ, Bytes::copy_from_slice(body)),
        };

        Ok(Subpacket { is_critical, data })
    }

    fn body_len(&self) -> usize {
        match &self.data {
            SubpacketData::SignatureCreationTime(_)
            | SubpacketData::SignatureExpirationTime(_)
            | SubpacketData::KeyExpirationTime(_) => 4,
            SubpacketData::Issuer(_) => 8,
            SubpacketData::PrimaryUserId(_) => 1,
            SubpacketData::KeyFlags(data) | SubpacketData::SignersUserID(data) => data.len(),
            SubpacketData::RevocationReason(_, reason) => 1 + reason.len(),
            SubpacketData::EmbeddedSignature(sig) => sig.write_len(),
            SubpacketData::IssuerFingerprint(_) => 21,
            SubpacketData::Other(_, data) => data.len(),
        }
    }

    fn body_to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match &self.data {
            SubpacketData::SignatureCreationTime(time) => {
                writer.write_u32::<BigEndian>(time.timestamp().try_into()?)?;
            }
            SubpacketData::SignatureExpirationTime(duration)
            | SubpacketData::KeyExpirationTime(duration) => {
                writer.write_u32::<BigEndian>(duration.num_seconds().try_into()?)?;
            }
            SubpacketData::Issuer(id) => writer.write_all(id.as_ref())?,
            SubpacketData::PrimaryUserId(primary) => writer.write_u8(u8::from(*primary))?,
            SubpacketData::KeyFlags(data) | SubpacketData::SignersUserID(data) => {
                writer.write_all(data)?
            }
            SubpacketData::RevocationReason(code, reason) => {
                writer.write_u8(*code)?;
                writer.write_all(reason)?;
            }
            SubpacketData::EmbeddedSignature(sig) => sig.to_writer(writer)?,
            SubpacketData::IssuerFingerprint(fp) => {
                writer.write_u8(4)?;
                writer.write_all(fp.as_bytes())?;
            }
            SubpacketData::Other(_, data) => writer.write_all(data)?,
        }
        Ok(())
    }
}

fn read_time(body: &mut &[u8]) -> Result<DateTime<Utc>> {
    let ts = body.read_be_u32()?;
    DateTime::from_timestamp(ts.into(), 0).ok_or_else(|| format_err!("invalid timestamp {}", ts))
}

fn read_duration(body: &mut &[u8]) -> Result<Duration> {
    let secs = body.read_be_u32()?;
    Ok(Duration::seconds(secs.into()))
}

fn subpacket_length_len(len: usize) -> usize {
    if len < 192 {
        1
    } else if len < 8384 {
        2
    } else {
        5
    }
}

impl Serialize for Subpacket {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let len = self.body_len() + 1;
        if len < 192 {
            writer.write_u8(len as u8)?;
        } else if len < 8384 {
            writer.write_u8((((len - 192) >> 8) + 192) as u8)?;
            writer.write_u8(((len - 192) & 0xFF) as u8)?;
        } else {
            writer.write_u8(255)?;
            writer.write_u32::<BigEndian>(len.try_into()?)?;
        }

        let typ = if self.is_critical {
            self.typ() | 0x80
        } else {
            self.typ()
        };
        writer.write_u8(typ)?;
        self.body_to_writer(writer)
    }

    fn write_len(&self) -> usize {
        let len = self.body_len() + 1;
        subpacket_length_len(len) + len
    }
}

/// Parses a complete subpacket area.
pub fn parse_subpackets(mut data: &[u8]) -> Result<Vec<Subpacket>> {
    let mut packets = Vec::new();
    while !data.is_empty() {
        packets.push(Subpacket::try_from_reader(&mut data)?);
    }
    Ok(packets)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_subpackets_round_trip() {
        let packets = vec![
            Subpacket::regular(SubpacketData::SignatureCreationTime(
                Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap(),
            )),
            Subpacket::critical(SubpacketData::KeyExpirationTime(Duration::days(30))),
            Subpacket::regular(SubpacketData::Issuer(KeyId::from(42u64))),
            Subpacket::regular(SubpacketData::IssuerFingerprint(Fingerprint::from(
                [9u8; 20],
            ))),
            Subpacket::regular(SubpacketData::RevocationReason(2, "compromised".into())),
            Subpacket::regular(SubpacketData::Other(100, vec![1u8; 300].into())),
        ];

        let bytes = packets.to_bytes().unwrap();
        assert_eq!(bytes.len(), packets.write_len());
        assert_eq!(parse_subpackets(&bytes).unwrap(), packets);
    }

    #[test]
    fn test_critical_bit() {
        let raw = [2, 0x80 | 25, 1];
        let packets = parse_subpackets(&raw).unwrap();
        assert_eq!(
            packets,
            vec![Subpacket::critical(SubpacketData::PrimaryUserId(true))]
        );
    }

    #[test]
    fn test_truncated_area() {
        assert!(parse_subpackets(&[5, 2, 0, 0]).is_err());
        assert!(parse_subpackets(&[0]).is_err());
    }
}
