//! # Utilities

use std::io::{self, BufRead, Read};

use bytes::{BufMut, BytesMut};
use digest::DynDigest;

use crate::types::KeyId;

/// Renders key ids for operator diagnostics: the upper 32 bits of each id as
/// uppercase hex, `0x` prefixed, comma separated and wrapped in parentheses.
pub fn format_key_ids(ids: &[KeyId]) -> String {
    let parts: Vec<String> = ids.iter().map(KeyId::short_hex).collect();
    format!("({})", parts.join(", "))
}

/// Fills the buffer as far as possible, returning the number of bytes read.
///
/// Stops early only at the end of the source.
pub fn fill_buffer<R: Read>(mut source: R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut offset = 0;
    while offset < buffer.len() {
        match source.read(&mut buffer[offset..]) {
            Ok(0) => break,
            Ok(n) => offset += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(offset)
}

/// Appends up to `len` bytes from the source to the buffer.
pub fn fill_buffer_bytes<R: BufRead>(
    mut source: R,
    buffer: &mut BytesMut,
    len: usize,
) -> io::Result<usize> {
    let mut read_total = 0;
    while buffer.len() < len {
        let source_buffer = source.fill_buf()?;
        if source_buffer.is_empty() {
            break;
        }
        let to_read = source_buffer.len().min(len - buffer.len());
        buffer.put_slice(&source_buffer[..to_read]);
        read_total += to_read;
        source.consume(to_read);
    }
    Ok(read_total)
}

/// `io::Write` adapter for a boxed digest.
pub(crate) struct WriteHasher<'a>(pub(crate) &'a mut dyn DynDigest);

impl io::Write for WriteHasher<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Feeds text into a digest, converting every line ending into `\r\n`.
///
/// A lone `\r` at the end of one chunk is remembered, so a `\r\n` split across
/// two updates is not doubled.
#[derive(Debug, Default, Clone)]
pub struct CanonicalText {
    last_was_cr: bool,
}

impl CanonicalText {
    pub fn update(&mut self, hasher: &mut dyn DynDigest, data: &[u8]) {
        let mut start = 0;
        for (i, b) in data.iter().enumerate() {
            match *b {
                b'\n' if self.last_was_cr => {
                    self.last_was_cr = false;
                    start = i + 1;
                }
                b'\n' => {
                    hasher.update(&data[start..i]);
                    hasher.update(b"\r\n");
                    start = i + 1;
                }
                b'\r' => {
                    hasher.update(&data[start..i]);
                    hasher.update(b"\r\n");
                    start = i + 1;
                    self.last_was_cr = true;
                }
                _ => {
                    self.last_was_cr = false;
                }
            }
        }
        hasher.update(&data[start..]);
    }
}
