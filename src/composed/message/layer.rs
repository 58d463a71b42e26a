use std::io::{self, Read, Write};

use chrono::Utc;
use log::debug;
use rand::{CryptoRng, Rng};

use crate::armor::{ArmorWriter, BlockType};
use crate::crypto::sym::StreamEncryptor;
use crate::errors::Result;
use crate::packet::{
    Compressor, DataMode, LiteralDataHeader, PartialBodyWriter, SignatureHasher,
};
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, PlainSessionKey, Tag};

const BUFFER_SIZE: usize = 8 * 1024;

/// One layer of an outgoing message.
///
/// Layers own the layer below them. Closing a layer completes it and then
/// closes everything below, so the innermost layer is closed first. A layer
/// dropped without being closed leaves the message incomplete, only the
/// armor is still terminated.
pub(crate) trait Layer: Write {
    fn close(self: Box<Self>) -> Result<()>;
}

/// The caller's output, at the bottom of every stack.
pub(crate) struct Sink<'a>(pub(crate) &'a mut dyn Write);

impl Write for Sink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl Layer for Sink<'_> {
    fn close(self: Box<Self>) -> Result<()> {
        self.0.flush()?;
        Ok(())
    }
}

impl<'a> Layer for ArmorWriter<Box<dyn Layer + 'a>> {
    fn close(self: Box<Self>) -> Result<()> {
        self.finish()?.close()
    }
}

impl<'a> Layer for PartialBodyWriter<Box<dyn Layer + 'a>> {
    fn close(self: Box<Self>) -> Result<()> {
        self.finish()?.close()
    }
}

impl<'a> Layer for StreamEncryptor<Box<dyn Layer + 'a>> {
    fn close(self: Box<Self>) -> Result<()> {
        self.finish()?.close()
    }
}

impl<'a> Layer for Compressor<Box<dyn Layer + 'a>> {
    fn close(self: Box<Self>) -> Result<()> {
        self.finish()?.close()
    }
}

/// How the encrypted container of a message is laid out.
#[derive(Debug, Clone)]
pub(crate) struct ContainerSettings {
    pub(crate) armored: bool,
    pub(crate) integrity_protected: bool,
    pub(crate) compression: CompressionAlgorithm,
    pub(crate) chunk_size: usize,
}

/// Opens armor, session packets, encrypted data and compression.
///
/// `session_packets` are written as is in front of the encrypted data. The
/// returned layer takes the plaintext packets.
pub(crate) fn open_container<'a, R: CryptoRng + Rng>(
    rng: R,
    output: &'a mut dyn Write,
    settings: &ContainerSettings,
    session_packets: &[u8],
    session_key: &PlainSessionKey,
) -> Result<Box<dyn Layer + 'a>> {
    let mut layer: Box<dyn Layer + 'a> = Box::new(Sink(output));
    if settings.armored {
        layer = Box::new(ArmorWriter::new(BlockType::Message, layer)?);
    }
    layer.write_all(session_packets)?;

    let tag = if settings.integrity_protected {
        Tag::SymEncryptedProtectedData
    } else {
        Tag::SymEncryptedData
    };
    let mut data = PartialBodyWriter::new(tag, settings.chunk_size, layer)?;
    if settings.integrity_protected {
        // SEIPD version
        data.write_all(&[1])?;
    }

    let mut layer: Box<dyn Layer + 'a> = Box::new(StreamEncryptor::new(
        rng,
        session_key.sym_alg(),
        settings.integrity_protected,
        session_key.key(),
        Box::new(data) as Box<dyn Layer + 'a>,
    )?);

    if settings.compression != CompressionAlgorithm::Uncompressed {
        debug!("compressing with {}", settings.compression);
        let packet = PartialBodyWriter::new(Tag::CompressedData, settings.chunk_size, layer)?;
        layer = Box::new(Compressor::new(
            settings.compression,
            Box::new(packet) as Box<dyn Layer + 'a>,
        )?);
    }

    Ok(layer)
}

/// Streams `input` as a binary literal data packet, feeding every hasher on the way.
pub(crate) fn write_literal(
    container: &mut dyn Write,
    input: &mut dyn Read,
    file_name: &str,
    chunk_size: usize,
    hashers: &mut [SignatureHasher],
) -> Result<u64> {
    let header = LiteralDataHeader::new(DataMode::Binary, file_name, Utc::now());
    let mut packet = PartialBodyWriter::new(Tag::LiteralData, chunk_size, container)?;
    header.to_writer(&mut packet)?;

    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let read = match input.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        let chunk = &buffer[..read];
        for hasher in hashers.iter_mut() {
            hasher.update(chunk);
        }
        packet.write_all(chunk)?;
        total += read as u64;
    }
    packet.finish()?;
    debug!("wrote {} bytes of literal data", total);

    Ok(total)
}
