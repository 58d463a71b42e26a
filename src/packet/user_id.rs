use std::io::{self, BufRead};

use bytes::Bytes;

use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Tag;

/// User ID Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.11>
#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
#[debug("UserId({:?})", String::from_utf8_lossy(id))]
pub struct UserId {
    id: Bytes,
}

impl UserId {
    /// Parses a `UserId` packet body. The content is not required to be UTF-8.
    pub fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let id = i.rest()?.freeze();
        Ok(UserId { id })
    }

    pub fn from_str(input: &str) -> Self {
        UserId {
            id: Bytes::copy_from_slice(input.as_bytes()),
        }
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// The id as text, invalid UTF-8 sequences replaced.
    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.id).into_owned()
    }
}

impl Serialize for UserId {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.id)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.id.len()
    }
}

impl PacketTrait for UserId {
    fn tag(&self) -> Tag {
        Tag::UserId
    }
}
