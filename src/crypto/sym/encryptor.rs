use std::io::{self, Write};

use log::debug;
use rand::{CryptoRng, Rng};
use sha1::{Digest, Sha1};

use super::{CfbEncryptor, SymmetricKeyAlgorithm};
use crate::errors::Result;

const CHUNK_SIZE: usize = 1024 * 8;

/// Streaming OpenPGP CFB encryption, writing ciphertext into `inner`.
///
/// The random prefix is written on construction. [`StreamEncryptor::finish`]
/// appends the MDC for protected data and must be called to complete the body.
#[derive(derive_more::Debug)]
pub struct StreamEncryptor<W: Write> {
    encryptor: CfbEncryptor,
    #[debug("{}", mdc_hasher.is_some())]
    mdc_hasher: Option<Sha1>,
    #[debug(skip)]
    scratch: Vec<u8>,
    inner: W,
}

impl<W: Write> StreamEncryptor<W> {
    pub fn new<R: CryptoRng + Rng>(
        mut rng: R,
        alg: SymmetricKeyAlgorithm,
        protected: bool,
        key: &[u8],
        mut inner: W,
    ) -> Result<Self> {
        debug!("encrypt stream {:?}, protected: {}", alg, protected);
        let bs = alg.block_size();

        // IV is all zeroes
        let iv = vec![0u8; bs];
        let mut encryptor = CfbEncryptor::new(alg, key, &iv)?;

        let mut prefix = vec![0u8; bs + 2];
        rng.fill_bytes(&mut prefix[..bs]);
        // add quick check
        prefix[bs] = prefix[bs - 2];
        prefix[bs + 1] = prefix[bs - 1];

        let mdc_hasher = if protected {
            let mut hasher = Sha1::default();
            hasher.update(&prefix);
            encryptor.encrypt(&mut prefix);
            Some(hasher)
        } else {
            encryptor.encrypt(&mut prefix);
            // legacy resyncing
            encryptor = CfbEncryptor::new(alg, key, &prefix[2..])?;
            None
        };
        inner.write_all(&prefix)?;

        Ok(StreamEncryptor {
            encryptor,
            mdc_hasher,
            scratch: Vec::with_capacity(CHUNK_SIZE),
            inner,
        })
    }

    /// Writes the MDC, if any, and returns the inner writer.
    pub fn finish(mut self) -> Result<W> {
        if let Some(mut hasher) = self.mdc_hasher.take() {
            let mut mdc = [0u8; 22];
            mdc[0] = 0xD3;
            mdc[1] = 0x14;
            hasher.update(&mdc[..2]);
            mdc[2..].copy_from_slice(&hasher.finalize());

            self.encryptor.encrypt(&mut mdc);
            self.inner.write_all(&mdc)?;
        }
        self.inner.flush()?;

        Ok(self.inner)
    }
}

impl<W: Write> Write for StreamEncryptor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len().min(CHUNK_SIZE);
        let buf = &buf[..len];
        if let Some(ref mut hasher) = self.mdc_hasher {
            hasher.update(buf);
        }

        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.encryptor.encrypt(&mut self.scratch);
        self.inner.write_all(&self.scratch)?;

        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
