use std::io::{self, BufRead, BufReader, Read, Write};

use byteorder::WriteBytesExt;
use flate2::bufread::{DeflateDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;
use log::debug;

use crate::errors::{unsupported_err, Result};
use crate::parsing_reader::BufReadParsing;
use crate::types::CompressionAlgorithm;

/// Streaming decompression of a Compressed Data Packet body.
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.6>
#[derive(derive_more::Debug)]
pub enum Decompressor<R: BufRead> {
    Uncompressed(#[debug(skip)] R),
    Zip(#[debug(skip)] BufReader<DeflateDecoder<R>>),
    Zlib(#[debug(skip)] BufReader<ZlibDecoder<R>>),
    #[cfg(feature = "bzip2")]
    Bzip2(#[debug(skip)] BufReader<bzip2::bufread::BzDecoder<R>>),
}

impl<R: BufRead> Decompressor<R> {
    /// Reads the algorithm octet and sets up decompression of the rest of the body.
    pub fn from_reader(mut source: R) -> Result<Self> {
        let alg = CompressionAlgorithm::from(source.read_u8()?);
        debug!("decompressing {}", alg);

        match alg {
            CompressionAlgorithm::Uncompressed => Ok(Self::Uncompressed(source)),
            CompressionAlgorithm::ZIP => Ok(Self::Zip(BufReader::new(DeflateDecoder::new(
                source,
            )))),
            CompressionAlgorithm::ZLIB => Ok(Self::Zlib(BufReader::new(ZlibDecoder::new(
                source,
            )))),
            #[cfg(feature = "bzip2")]
            CompressionAlgorithm::BZip2 => Ok(Self::Bzip2(BufReader::new(
                bzip2::bufread::BzDecoder::new(source),
            ))),
            #[cfg(not(feature = "bzip2"))]
            CompressionAlgorithm::BZip2 => unsupported_err!("bzip2 compression"),
            CompressionAlgorithm::Other(id) => unsupported_err!("compression algorithm {}", id),
        }
    }
}

impl<R: BufRead> BufRead for Decompressor<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            Self::Uncompressed(r) => r.fill_buf(),
            Self::Zip(r) => r.fill_buf(),
            Self::Zlib(r) => r.fill_buf(),
            #[cfg(feature = "bzip2")]
            Self::Bzip2(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            Self::Uncompressed(r) => r.consume(amt),
            Self::Zip(r) => r.consume(amt),
            Self::Zlib(r) => r.consume(amt),
            #[cfg(feature = "bzip2")]
            Self::Bzip2(r) => r.consume(amt),
        }
    }
}

impl<R: BufRead> Read for Decompressor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Uncompressed(r) => r.read(buf),
            Self::Zip(r) => r.read(buf),
            Self::Zlib(r) => r.read(buf),
            #[cfg(feature = "bzip2")]
            Self::Bzip2(r) => r.read(buf),
        }
    }
}

/// Streaming compression into a Compressed Data Packet body.
#[derive(derive_more::Debug)]
pub enum Compressor<W: Write> {
    Uncompressed(#[debug(skip)] W),
    Zip(#[debug(skip)] DeflateEncoder<W>),
    Zlib(#[debug(skip)] ZlibEncoder<W>),
    #[cfg(feature = "bzip2")]
    Bzip2(#[debug(skip)] bzip2::write::BzEncoder<W>),
}

impl<W: Write> Compressor<W> {
    /// Writes the algorithm octet and starts compressing.
    pub fn new(alg: CompressionAlgorithm, mut inner: W) -> Result<Self> {
        debug!("compressing {}", alg);
        let compressor = match alg {
            CompressionAlgorithm::Uncompressed => {
                inner.write_u8(alg.into())?;
                Self::Uncompressed(inner)
            }
            CompressionAlgorithm::ZIP => {
                inner.write_u8(alg.into())?;
                Self::Zip(DeflateEncoder::new(inner, Compression::default()))
            }
            CompressionAlgorithm::ZLIB => {
                inner.write_u8(alg.into())?;
                Self::Zlib(ZlibEncoder::new(inner, Compression::default()))
            }
            #[cfg(feature = "bzip2")]
            CompressionAlgorithm::BZip2 => {
                inner.write_u8(alg.into())?;
                Self::Bzip2(bzip2::write::BzEncoder::new(
                    inner,
                    bzip2::Compression::default(),
                ))
            }
            #[cfg(not(feature = "bzip2"))]
            CompressionAlgorithm::BZip2 => unsupported_err!("bzip2 compression"),
            CompressionAlgorithm::Other(id) => unsupported_err!("compression algorithm {}", id),
        };

        Ok(compressor)
    }

    /// Flushes the compressed stream and returns the inner writer.
    pub fn finish(self) -> Result<W> {
        let inner = match self {
            Self::Uncompressed(w) => w,
            Self::Zip(w) => w.finish()?,
            Self::Zlib(w) => w.finish()?,
            #[cfg(feature = "bzip2")]
            Self::Bzip2(w) => w.finish()?,
        };
        Ok(inner)
    }
}

impl<W: Write> Write for Compressor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Uncompressed(w) => w.write(buf),
            Self::Zip(w) => w.write(buf),
            Self::Zlib(w) => w.write(buf),
            #[cfg(feature = "bzip2")]
            Self::Bzip2(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Uncompressed(w) => w.flush(),
            Self::Zip(w) => w.flush(),
            Self::Zlib(w) => w.flush(),
            #[cfg(feature = "bzip2")]
            Self::Bzip2(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn roundtrip(alg: CompressionAlgorithm) {
        let data = "hello world\n".repeat(500);
        let mut compressor = Compressor::new(alg, Vec::new()).unwrap();
        compressor.write_all(data.as_bytes()).unwrap();
        let body = compressor.finish().unwrap();
        assert_eq!(body[0], u8::from(alg));

        let mut out = String::new();
        Decompressor::from_reader(&body[..])
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_zip() {
        roundtrip(CompressionAlgorithm::ZIP);
    }

    #[test]
    fn test_zlib() {
        roundtrip(CompressionAlgorithm::ZLIB);
    }

    #[test]
    fn test_uncompressed() {
        roundtrip(CompressionAlgorithm::Uncompressed);
    }

    #[cfg(feature = "bzip2")]
    #[test]
    fn test_bzip2() {
        roundtrip(CompressionAlgorithm::BZip2);
    }

    #[test]
    fn test_unknown_algorithm() {
        let err = Decompressor::from_reader(&[110u8, 1, 2][..]).unwrap_err();
        assert!(matches!(err, crate::errors::Error::Unsupported { .. }));
    }
}
