use std::io::{self, BufRead, Read};

use bytes::{Buf, BytesMut};
use log::{debug, warn};
use sha1::{Digest, Sha1};

use super::{CfbDecryptor, SymmetricKeyAlgorithm};
use crate::errors::Result;
use crate::util::{fill_buffer, fill_buffer_bytes};

/// MDC is 1 byte packet tag, 1 byte length prefix and 20 bytes SHA1 hash.
const MDC_LEN: usize = 22;
const BUFFER_SIZE: usize = 1024 * 8;

/// Streaming OpenPGP CFB decryption of a `SymEncryptedProtectedData` or
/// `SymEncryptedData` body.
///
/// For protected data the trailing MDC is held back from the returned plaintext
/// and checked once the source is exhausted. A mismatch is recorded, not raised,
/// so the caller decides how to surface it.
#[derive(derive_more::Debug)]
pub struct StreamDecryptor<R: BufRead> {
    decryptor: CfbDecryptor,
    source: R,
    #[debug("{}", hex::encode(buffer))]
    buffer: BytesMut,
    /// How much data at the front of `buffer` is decrypted, hashed and
    /// ready to be returned.
    data_available: usize,
    #[debug("{}", mdc_hasher.is_some())]
    mdc_hasher: Option<Sha1>,
    quick_check: bool,
    mdc_verified: Option<bool>,
    done: bool,
}

impl<R: BufRead> StreamDecryptor<R> {
    /// Reads and decrypts the random prefix, leaving the stream at the first plaintext byte.
    pub fn new(
        alg: SymmetricKeyAlgorithm,
        protected: bool,
        key: &[u8],
        mut source: R,
    ) -> Result<Self> {
        debug!("decrypt stream {:?}, protected: {}", alg, protected);
        let bs = alg.block_size();

        // IV is all zeroes
        let iv = vec![0u8; bs];
        let mut decryptor = CfbDecryptor::new(alg, key, &iv)?;

        let mut prefix = vec![0u8; bs + 2];
        let read = fill_buffer(&mut source, &mut prefix)?;
        if read < bs + 2 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "missing quick check").into());
        }
        let encrypted_prefix = prefix.clone();
        decryptor.decrypt(&mut prefix);

        // The quick check is only exposed, never enforced on the data path.
        // See <https://www.rfc-editor.org/rfc/rfc9580.html#name-risks-of-a-quick-check-orac>
        let quick_check = prefix[bs - 2..bs] == prefix[bs..];

        let mdc_hasher = if protected {
            let mut hasher = Sha1::default();
            hasher.update(&prefix);
            Some(hasher)
        } else {
            // legacy resyncing
            decryptor = CfbDecryptor::new(alg, key, &encrypted_prefix[2..])?;
            None
        };

        Ok(StreamDecryptor {
            decryptor,
            source,
            buffer: BytesMut::with_capacity(BUFFER_SIZE),
            data_available: 0,
            mdc_hasher,
            quick_check,
            mdc_verified: None,
            done: false,
        })
    }

    /// `true` if the repeated prefix bytes match.
    pub fn quick_check(&self) -> bool {
        self.quick_check
    }

    pub fn is_protected(&self) -> bool {
        self.mdc_hasher.is_some() || self.mdc_verified.is_some()
    }

    /// Result of the MDC check, `None` for unprotected data or before the end of the stream.
    pub fn mdc_verified(&self) -> Option<bool> {
        self.mdc_verified
    }

    pub fn is_done(&self) -> bool {
        self.done && self.data_available == 0
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    fn fill_inner(&mut self) -> io::Result<()> {
        if self.done || self.data_available > 0 {
            return Ok(());
        }

        // everything left in the buffer is the held back tail
        let current_len = self.buffer.len();
        fill_buffer_bytes(&mut self.source, &mut self.buffer, BUFFER_SIZE)?;
        self.decryptor.decrypt(&mut self.buffer[current_len..]);
        let is_last_read = self.buffer.len() < BUFFER_SIZE;

        match self.mdc_hasher.take() {
            Some(mut hasher) => {
                if !is_last_read {
                    // keep a full mdc in the buffer until the end of the stream
                    let end = self.buffer.len() - MDC_LEN;
                    hasher.update(&self.buffer[..end]);
                    self.data_available = end;
                    self.mdc_hasher = Some(hasher);
                    return Ok(());
                }

                if self.buffer.len() < MDC_LEN {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "missing MDC",
                    ));
                }

                let end = self.buffer.len() - MDC_LEN;
                let mdc = self.buffer.split_off(end);
                hasher.update(&self.buffer);
                hasher.update(&mdc[..2]);
                let sha1: [u8; 20] = hasher.finalize().into();

                let valid = mdc[0] == 0xD3 && mdc[1] == 0x14 && mdc[2..] == sha1[..];
                if !valid {
                    warn!("modification detection code mismatch");
                }
                self.mdc_verified = Some(valid);
                self.data_available = self.buffer.len();
                self.done = true;
            }
            None => {
                self.data_available = self.buffer.len();
                self.done = is_last_read;
            }
        }

        Ok(())
    }
}

impl<R: BufRead> BufRead for StreamDecryptor<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.fill_inner()?;
        Ok(&self.buffer[..self.data_available])
    }

    fn consume(&mut self, amt: usize) {
        let amt = amt.min(self.data_available);
        self.buffer.advance(amt);
        self.data_available -= amt;
    }
}

impl<R: BufRead> Read for StreamDecryptor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let to_write = available.len().min(buf.len());
        buf[..to_write].copy_from_slice(&available[..to_write]);
        self.consume(to_write);
        Ok(to_write)
    }
}
