use std::io;

use crate::errors::Result;
use crate::packet::PacketHeader;
use crate::ser::Serialize;
use crate::types::Tag;

pub trait PacketTrait: Serialize {
    /// Returns the tag for this packet type.
    fn tag(&self) -> Tag;

    /// Writes the packet with a new style, fixed length header.
    fn to_writer_with_header<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let len = self.write_len().try_into()?;
        PacketHeader::new_fixed(self.tag(), len).to_writer(writer)?;
        self.to_writer(writer)
    }
}
