use std::io::{self, BufRead, Read};

use log::debug;

use super::PacketHeader;
use crate::errors::{ensure, Result};
use crate::types::PacketLength;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyState {
    /// Inside a length delimited chunk. `last` is false for partial chunks.
    Chunk { remaining: u32, last: bool },
    /// Runs until the end of the source.
    Indeterminate,
    Done,
}

/// Streams the body of a single packet, following partial body lengths.
///
/// Reads never go past the end of the body, so once the reader reports EOF
/// the source is positioned at the next packet header.
#[derive(Debug)]
pub struct PacketBodyReader<R: BufRead> {
    header: PacketHeader,
    source: R,
    state: BodyState,
}

impl<R: BufRead> PacketBodyReader<R> {
    pub fn new(header: PacketHeader, source: R) -> Result<Self> {
        let state = match header.packet_length() {
            PacketLength::Fixed(len) => {
                debug!("fixed packet {:?} {}", header.tag(), len);
                BodyState::Chunk {
                    remaining: len,
                    last: true,
                }
            }
            PacketLength::Indeterminate => {
                debug!("indeterminate packet {:?}", header.tag());
                BodyState::Indeterminate
            }
            PacketLength::Partial(len) => {
                debug!("partial packet {:?} start {}", header.tag(), len);
                ensure!(
                    header.tag().allows_partial_length(),
                    "partial body length is not allowed for packet type {:?}",
                    header.tag()
                );
                ensure!(
                    len >= 512,
                    "illegal first partial body length {} (shorter than 512 bytes)",
                    len
                );
                BodyState::Chunk {
                    remaining: len,
                    last: false,
                }
            }
        };

        Ok(PacketBodyReader {
            header,
            source,
            state,
        })
    }

    pub fn packet_header(&self) -> PacketHeader {
        self.header
    }

    /// True once the complete body has been consumed.
    pub fn is_done(&self) -> bool {
        self.state == BodyState::Done
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    /// Moves past exhausted chunks, reading the next partial length if needed.
    fn next_chunk(&mut self) -> io::Result<()> {
        while let BodyState::Chunk { remaining: 0, last } = self.state {
            if last {
                self.state = BodyState::Done;
                break;
            }

            self.state = match PacketLength::try_from_reader(&mut self.source)? {
                PacketLength::Fixed(len) => {
                    debug!("last partial chunk {}", len);
                    BodyState::Chunk {
                        remaining: len,
                        last: true,
                    }
                }
                PacketLength::Partial(len) => BodyState::Chunk {
                    remaining: len,
                    last: false,
                },
                PacketLength::Indeterminate => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "invalid indeterminate packet length",
                    ));
                }
            };
        }
        Ok(())
    }
}

impl<R: BufRead> BufRead for PacketBodyReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.next_chunk()?;

        match self.state {
            BodyState::Chunk { remaining, .. } => {
                let buf = self.source.fill_buf()?;
                if buf.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "packet body is shorter than its declared length",
                    ));
                }
                let len = buf.len().min(remaining as usize);
                Ok(&buf[..len])
            }
            BodyState::Indeterminate => {
                if self.source.fill_buf()?.is_empty() {
                    self.state = BodyState::Done;
                    return Ok(&[][..]);
                }
                self.source.fill_buf()
            }
            BodyState::Done => Ok(&[][..]),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self.state {
            BodyState::Chunk {
                ref mut remaining, ..
            } => {
                let amt = amt.min(*remaining as usize);
                *remaining -= amt as u32;
                self.source.consume(amt);
            }
            BodyState::Indeterminate => self.source.consume(amt),
            BodyState::Done => {}
        }
    }
}

impl<R: BufRead> Read for PacketBodyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let len = available.len().min(buf.len());
        buf[..len].copy_from_slice(&available[..len]);
        self.consume(len);
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parsing_reader::BufReadParsing;
    use crate::types::Tag;

    fn partial_body(chunks: &[&[u8]], last: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in chunks {
            PacketLength::Partial(chunk.len() as u32)
                .to_writer_new(&mut out)
                .unwrap();
            out.extend_from_slice(chunk);
        }
        PacketLength::Fixed(last.len() as u32)
            .to_writer_new(&mut out)
            .unwrap();
        out.extend_from_slice(last);
        out
    }

    #[test]
    fn test_fixed_body_stops_at_boundary() {
        let source = &b"hellonext"[..];
        let header = PacketHeader::new_fixed(Tag::UserId, 5);
        let mut reader = PacketBodyReader::new(header, source).unwrap();
        assert_eq!(&reader.rest().unwrap()[..], b"hello");
        assert!(reader.is_done());
        assert_eq!(reader.into_inner(), b"next");
    }

    #[test]
    fn test_partial_body() {
        let first = vec![1u8; 512];
        let second = vec![2u8; 1024];
        let mut data = partial_body(&[&second], b"end");
        data.extend_from_slice(b"tail");

        let header = PacketHeader::from_parts(
            Default::default(),
            Tag::LiteralData,
            PacketLength::Partial(512),
        )
        .unwrap();
        let mut source = first.clone();
        source.extend_from_slice(&data);

        let mut src = &source[..];
        let mut reader = PacketBodyReader::new(header, &mut src).unwrap();
        let body = reader.rest().unwrap();

        let mut expected = first;
        expected.extend_from_slice(&second);
        expected.extend_from_slice(b"end");
        assert_eq!(&body[..], &expected[..]);
        assert!(reader.is_done());
        assert_eq!(src, b"tail");
    }

    #[test]
    fn test_partial_not_allowed() {
        let header = PacketHeader::from_parts(
            Default::default(),
            Tag::Signature,
            PacketLength::Partial(1024),
        )
        .unwrap();
        assert!(PacketBodyReader::new(header, &b""[..]).is_err());

        let header = PacketHeader::from_parts(
            Default::default(),
            Tag::LiteralData,
            PacketLength::Partial(256),
        )
        .unwrap();
        assert!(PacketBodyReader::new(header, &b""[..]).is_err());
    }

    #[test]
    fn test_truncated_body() {
        let header = PacketHeader::new_fixed(Tag::LiteralData, 10);
        let mut reader = PacketBodyReader::new(header, &b"short"[..]).unwrap();
        let err = reader.rest().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
