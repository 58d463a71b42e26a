use std::io::BufRead;

use log::{debug, warn};

use crate::errors::{Error, Result};
use crate::packet::{Packet, PacketBodyReader, PacketHeader};
use crate::parsing_reader::BufReadParsing;

/// Reads complete packets from a stream.
///
/// Packets that use versions or algorithms this crate does not understand are
/// skipped with a warning.
#[derive(Debug)]
pub struct PacketParser<R: BufRead> {
    reader: R,
    done: bool,
}

impl<R: BufRead> PacketParser<R> {
    pub fn new(reader: R) -> Self {
        PacketParser {
            reader,
            done: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn next_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            let Some(header) = PacketHeader::try_from_reader(&mut self.reader)? else {
                return Ok(None);
            };
            debug!("parsing packet {:?}", header);

            let mut body = PacketBodyReader::new(header, &mut self.reader)?;
            let res = Packet::from_reader(header, &mut body);
            // skip whatever the packet parser left behind
            body.drain()?;

            match res {
                Ok(packet) => return Ok(Some(packet)),
                Err(Error::Unsupported { message }) => {
                    warn!("skipping unsupported {:?} packet: {}", header.tag(), message);
                }
                Err(err) if err.is_unknown_signature_algorithm() => {
                    warn!("skipping signature: {}", err);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl<R: BufRead> Iterator for PacketParser<R> {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_packet() {
            Ok(Some(packet)) => Some(Ok(packet)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
