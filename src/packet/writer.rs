use std::io::{self, Write};

use byteorder::WriteBytesExt;
use log::debug;

use crate::errors::{ensure, Result};
use crate::types::{PacketLength, Tag};

/// Default size of partial body chunks when streaming packets out.
pub const DEFAULT_PARTIAL_CHUNK_SIZE: usize = 8 * 1024;

/// Streams a packet body of unknown size using partial body lengths.
///
/// Full chunks are written as partial lengths, whatever is buffered when
/// [`finish`](Self::finish) is called becomes the final fixed length chunk.
#[derive(derive_more::Debug)]
pub struct PartialBodyWriter<W: Write> {
    #[debug(skip)]
    inner: W,
    tag: Tag,
    #[debug("{}", buffer.len())]
    buffer: Vec<u8>,
    chunk_size: usize,
}

impl<W: Write> PartialBodyWriter<W> {
    /// Writes the packet tag and prepares the body.
    ///
    /// `chunk_size` must be a power of two between 512 bytes and 1 GiB.
    pub fn new(tag: Tag, chunk_size: usize, mut inner: W) -> Result<Self> {
        ensure!(
            tag.allows_partial_length(),
            "partial body length is not allowed for packet type {:?}",
            tag
        );
        ensure!(
            chunk_size.is_power_of_two() && (512..=1 << 30).contains(&chunk_size),
            "invalid partial chunk size {}",
            chunk_size
        );
        debug!("start partial packet {:?}", tag);

        inner.write_u8(0xC0 | u8::from(tag))?;

        Ok(PartialBodyWriter {
            inner,
            tag,
            buffer: Vec::with_capacity(chunk_size),
            chunk_size,
        })
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        debug_assert_eq!(chunk.len(), self.chunk_size);
        PacketLength::Partial(self.chunk_size as u32).to_writer_new(&mut self.inner)?;
        self.inner.write_all(chunk)
    }

    /// Writes the final chunk and returns the inner writer.
    pub fn finish(mut self) -> Result<W> {
        debug!("finish partial packet {:?}", self.tag);
        PacketLength::Fixed(self.buffer.len().try_into()?).to_writer_new(&mut self.inner)?;
        self.inner.write_all(&self.buffer)?;
        self.inner.flush()?;

        Ok(self.inner)
    }
}

impl<W: Write> Write for PartialBodyWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.buffer.is_empty() && buf.len() >= self.chunk_size {
            let chunk_size = self.chunk_size;
            self.write_chunk(&buf[..chunk_size])?;
            return Ok(chunk_size);
        }

        let len = (self.chunk_size - self.buffer.len()).min(buf.len());
        self.buffer.extend_from_slice(&buf[..len]);

        if self.buffer.len() == self.chunk_size {
            let chunk = std::mem::take(&mut self.buffer);
            self.write_chunk(&chunk)?;
            self.buffer = chunk;
            self.buffer.clear();
        }

        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::packet::{PacketBodyReader, PacketHeader};
    use crate::parsing_reader::BufReadParsing;

    #[test]
    fn test_small_body_is_fixed() {
        let mut writer = PartialBodyWriter::new(Tag::LiteralData, 512, Vec::new()).unwrap();
        writer.write_all(b"hello").unwrap();
        let out = writer.finish().unwrap();
        assert_eq!(out, vec![0xCB, 0x05, b'h', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn test_streamed_body_reads_back() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();

        let mut writer = PartialBodyWriter::new(Tag::LiteralData, 1024, Vec::new()).unwrap();
        for chunk in data.chunks(333) {
            writer.write_all(chunk).unwrap();
        }
        let out = writer.finish().unwrap();

        let mut src = &out[..];
        let header = PacketHeader::try_from_reader(&mut src).unwrap().unwrap();
        assert_eq!(header.packet_length(), PacketLength::Partial(1024));
        let mut body = PacketBodyReader::new(header, src).unwrap();
        assert_eq!(&body.rest().unwrap()[..], &data[..]);
    }

    #[test]
    fn test_exact_multiple_ends_with_empty_chunk() {
        let mut writer = PartialBodyWriter::new(Tag::CompressedData, 512, Vec::new()).unwrap();
        writer.write_all(&[7u8; 1024]).unwrap();
        let out = writer.finish().unwrap();
        assert_eq!(out.len(), 1 + 1 + 512 + 1 + 512 + 1);
        assert_eq!(out[out.len() - 1], 0);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(PartialBodyWriter::new(Tag::Signature, 512, Vec::new()).is_err());
        assert!(PartialBodyWriter::new(Tag::LiteralData, 1000, Vec::new()).is_err());
        assert!(PartialBodyWriter::new(Tag::LiteralData, 256, Vec::new()).is_err());
    }
}
