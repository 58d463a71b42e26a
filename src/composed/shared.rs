use std::io::{self, BufRead, Read};

use log::{debug, warn};

use crate::armor::{self, Dearmor};
use crate::crypto::sym::StreamDecryptor;
use crate::errors::{unsupported_err, Error, Result};
use crate::packet::{
    PacketBodyReader, PacketHeader, PublicKeyEncryptedSessionKey, SymKeyEncryptedSessionKey,
};
use crate::parsing_reader::BufReadParsing;
use crate::types::{PlainSessionKey, Tag};

/// Message input, armored or binary.
#[derive(Debug)]
pub(crate) enum Source<R: BufRead> {
    Armored(Dearmor<R>),
    Binary(R),
}

impl<R: BufRead> Source<R> {
    /// Looks at the first octet to decide whether the input is armored.
    pub(crate) fn new(mut input: R) -> Result<Self> {
        if armor::is_armored(&mut input)? {
            let mut dearmor = Dearmor::new(input);
            dearmor.read_header()?;
            debug!("armored input {:?}", dearmor.typ());
            Ok(Source::Armored(dearmor))
        } else {
            Ok(Source::Binary(input))
        }
    }

    /// Reads the rest of an armored input, which checks the armor checksum.
    pub(crate) fn finish(&mut self) -> Result<()> {
        if let Source::Armored(ref mut dearmor) = self {
            io::copy(dearmor, &mut io::sink())?;
        }

        Ok(())
    }
}

impl<R: BufRead> Read for Source<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Armored(ref mut r) => r.read(buf),
            Self::Binary(ref mut r) => r.read(buf),
        }
    }
}

impl<R: BufRead> BufRead for Source<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            Self::Armored(ref mut r) => r.fill_buf(),
            Self::Binary(ref mut r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            Self::Armored(ref mut r) => r.consume(amt),
            Self::Binary(ref mut r) => r.consume(amt),
        }
    }
}

/// The session packets in front of an encrypted data packet.
#[derive(Debug)]
pub(crate) struct SessionPackets {
    pub(crate) pkesks: Vec<PublicKeyEncryptedSessionKey>,
    pub(crate) skesks: Vec<SymKeyEncryptedSessionKey>,
    /// Header of the encrypted data packet, its body is next in the source.
    pub(crate) data_header: PacketHeader,
}

/// Reads packets up to the encrypted data packet.
///
/// Fails with [`Error::NoPgpDataFound`] if the input ends or something other
/// than session or marker packets shows up first.
pub(crate) fn read_session_packets<R: BufRead>(source: &mut R) -> Result<SessionPackets> {
    let mut pkesks = Vec::new();
    let mut skesks = Vec::new();

    loop {
        let Some(header) = PacketHeader::try_from_reader(&mut *source)? else {
            debug!("input ended before the encrypted data");
            return Err(Error::NoPgpDataFound);
        };
        debug!("message packet {:?}", header);

        match header.tag() {
            Tag::SymEncryptedProtectedData | Tag::SymEncryptedData => {
                return Ok(SessionPackets {
                    pkesks,
                    skesks,
                    data_header: header,
                });
            }
            Tag::PublicKeyEncryptedSessionKey => {
                let mut body = PacketBodyReader::new(header, &mut *source)?;
                match PublicKeyEncryptedSessionKey::try_from_reader(&mut body) {
                    Ok(pkesk) => pkesks.push(pkesk),
                    Err(Error::Unsupported { message }) => {
                        warn!("skipping session packet: {}", message)
                    }
                    Err(err) => return Err(err),
                }
                body.drain()?;
            }
            Tag::SymKeyEncryptedSessionKey => {
                let mut body = PacketBodyReader::new(header, &mut *source)?;
                match SymKeyEncryptedSessionKey::try_from_reader(&mut body) {
                    Ok(skesk) => skesks.push(skesk),
                    Err(Error::Unsupported { message }) => {
                        warn!("skipping session packet: {}", message)
                    }
                    Err(err) => return Err(err),
                }
                body.drain()?;
            }
            Tag::Marker => {
                PacketBodyReader::new(header, &mut *source)?.drain()?;
            }
            tag => {
                debug!("unexpected {:?} packet in front of the encrypted data", tag);
                return Err(Error::NoPgpDataFound);
            }
        }
    }
}

/// Sets up decryption of the encrypted data packet with the given header.
pub(crate) fn open_encrypted_data<R: BufRead>(
    header: PacketHeader,
    source: R,
    session_key: &PlainSessionKey,
) -> Result<StreamDecryptor<PacketBodyReader<R>>> {
    let mut body = PacketBodyReader::new(header, source)?;

    let protected = match header.tag() {
        Tag::SymEncryptedProtectedData => {
            let version = body.read_u8()?;
            if version != 1 {
                unsupported_err!("SEIPD version {}", version);
            }
            true
        }
        _ => {
            warn!("message is not integrity protected");
            false
        }
    };

    StreamDecryptor::new(session_key.sym_alg(), protected, session_key.key(), body)
}
