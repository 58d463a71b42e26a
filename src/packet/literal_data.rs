use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use chrono::{DateTime, SubsecRound, Utc};
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::errors::{format_err, Result};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DataMode {
    Binary = b'b',
    Text = b't',
    Utf8 = b'u',
    Mime = b'm',

    #[num_enum(catch_all)]
    Other(u8),
}

/// The header of a Literal Data Packet, the payload follows it in the packet body.
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.9>
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub struct LiteralDataHeader {
    mode: DataMode,
    #[debug("{}", String::from_utf8_lossy(file_name))]
    file_name: Bytes,
    created: DateTime<Utc>,
}

impl LiteralDataHeader {
    /// Creates a header, file names longer than 255 bytes are truncated.
    pub fn new(mode: DataMode, file_name: &str, created: DateTime<Utc>) -> Self {
        let name = file_name.as_bytes();
        let name = &name[..name.len().min(255)];

        LiteralDataHeader {
            mode,
            file_name: Bytes::copy_from_slice(name),
            created: created.trunc_subsecs(0),
        }
    }

    /// Parses the header, leaving the reader at the first byte of the payload.
    pub fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let mode = DataMode::from(i.read_u8()?);
        let name_len = i.read_u8()?;
        let file_name = i.take_bytes(name_len.into())?.freeze();
        let created = i.read_be_u32()?;
        let created = DateTime::from_timestamp(created.into(), 0)
            .ok_or_else(|| format_err!("invalid literal data date {}", created))?;

        Ok(LiteralDataHeader {
            mode,
            file_name,
            created,
        })
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    pub fn file_name(&self) -> &[u8] {
        &self.file_name
    }

    pub fn created(&self) -> &DateTime<Utc> {
        &self.created
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.mode, DataMode::Binary)
    }
}

impl Serialize for LiteralDataHeader {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.mode.into())?;
        writer.write_u8(self.file_name.len().try_into()?)?;
        writer.write_all(&self.file_name)?;
        writer.write_u32::<BigEndian>(self.created.timestamp().try_into()?)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 1 + self.file_name.len() + 4
    }
}
