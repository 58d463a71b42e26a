use std::hash::Hasher;
use std::io::{self, Write};

use base64::engine::{general_purpose::STANDARD, Engine as _};
use crc24::Crc24Hasher;
use log::debug;

use crate::armor::{BlockType, Headers};
use crate::errors::{format_err, Result};

/// Raw bytes per armored line, 64 base64 characters.
const LINE_BYTES: usize = 48;

/// Streaming ascii armor encoding.
///
/// The armor trailer (checksum and footer line) is written by
/// [`ArmorWriter::finish`], or on drop if the writer was never finished.
#[derive(derive_more::Debug)]
pub struct ArmorWriter<W: Write> {
    #[debug(skip)]
    inner: Option<W>,
    typ: BlockType,
    #[debug("{} bytes", buffer.len())]
    buffer: Vec<u8>,
    #[debug(skip)]
    crc: Crc24Hasher,
}

impl<W: Write> ArmorWriter<W> {
    pub fn new(typ: BlockType, inner: W) -> Result<Self> {
        Self::with_headers(typ, None, inner)
    }

    /// Writes the armor header line and the given armor headers.
    pub fn with_headers(typ: BlockType, headers: Option<&Headers>, mut inner: W) -> Result<Self> {
        writeln!(inner, "-----BEGIN {typ}-----")?;
        if let Some(headers) = headers {
            for (key, values) in headers {
                for value in values {
                    writeln!(inner, "{key}: {value}")?;
                }
            }
        }
        inner.write_all(b"\n")?;

        Ok(ArmorWriter {
            inner: Some(inner),
            typ,
            buffer: Vec::with_capacity(LINE_BYTES),
            crc: Crc24Hasher::new(),
        })
    }

    fn write_line(inner: &mut W, data: &[u8]) -> io::Result<()> {
        let line = STANDARD.encode(data);
        inner.write_all(line.as_bytes())?;
        inner.write_all(b"\n")
    }

    fn finish_inner(&mut self) -> Result<Option<W>> {
        let Some(mut inner) = self.inner.take() else {
            return Ok(None);
        };

        if !self.buffer.is_empty() {
            Self::write_line(&mut inner, &self.buffer)?;
            self.buffer.clear();
        }

        let crc = self.crc.finish() as u32;
        let crc = crc.to_be_bytes();
        writeln!(inner, "={}", STANDARD.encode(&crc[1..]))?;
        writeln!(inner, "-----END {}-----", self.typ)?;
        inner.flush()?;

        Ok(Some(inner))
    }

    /// Terminates the armor and returns the inner writer.
    pub fn finish(mut self) -> Result<W> {
        let inner = self.finish_inner()?;
        inner.ok_or_else(|| format_err!("armor writer already finished"))
    }
}

impl<W: Write> Write for ArmorWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(ref mut inner) = self.inner else {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "armor writer already finished",
            ));
        };
        self.crc.write(buf);

        let mut data = buf;
        while !data.is_empty() {
            let take = (LINE_BYTES - self.buffer.len()).min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.buffer.len() == LINE_BYTES {
                Self::write_line(inner, &self.buffer)?;
                self.buffer.clear();
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner {
            Some(ref mut inner) => inner.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for ArmorWriter<W> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            debug!("terminating unfinished armor");
            if let Err(err) = self.finish_inner() {
                debug!("failed to terminate armor: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::armor::Dearmor;

    #[test]
    fn test_armor_round_trip_sizes() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        for size in [0, 1, 2, 3, 47, 48, 49, 100, 1000] {
            let data: Vec<u8> = (0..size).map(|_| rng.gen()).collect();

            let mut writer = ArmorWriter::new(BlockType::Signature, Vec::new()).unwrap();
            // uneven writes
            for chunk in data.chunks(7) {
                writer.write_all(chunk).unwrap();
            }
            let armored = writer.finish().unwrap();

            let text = std::str::from_utf8(&armored).unwrap();
            assert!(text.starts_with("-----BEGIN PGP SIGNATURE-----\n\n"));
            assert!(text.ends_with("-----END PGP SIGNATURE-----\n"));
            assert!(text.lines().all(|l| l.len() <= 64));
            assert!(!text.contains("\n\n\n"));

            let mut out = Vec::new();
            Dearmor::new(&armored[..]).read_to_end(&mut out).unwrap();
            assert_eq!(out, data);
        }
    }

    #[test]
    fn test_armor_terminated_on_drop() {
        let mut out = Vec::new();
        {
            let mut writer = ArmorWriter::new(BlockType::Message, &mut out).unwrap();
            writer.write_all(b"partial").unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("-----END PGP MESSAGE-----\n"));
    }

    #[test]
    fn test_armor_headers() {
        let mut headers = Headers::new();
        headers.insert("Comment".into(), vec!["hello".into()]);
        let writer =
            ArmorWriter::with_headers(BlockType::Message, Some(&headers), Vec::new()).unwrap();
        let armored = writer.finish().unwrap();

        let mut dearmor = Dearmor::new(&armored[..]);
        let mut out = Vec::new();
        dearmor.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(dearmor.headers(), &headers);
    }
}
