use std::io::{self, BufRead, Read, Write};

use chrono::Utc;
use log::{debug, warn};

use crate::armor::{ArmorWriter, BlockType};
use crate::composed::message::encrypt::unlock_signing_key;
use crate::composed::shared::Source;
use crate::composed::verifier::RunningVerifier;
use crate::composed::{KeyRetrievalStrategy, SignatureVerificationResult};
use crate::crypto::hash::HashAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::{
    write_packet, Decompressor, PacketBodyReader, PacketHeader, SecretKey, Signature,
    SignatureConfig, SignatureType,
};
use crate::parsing_reader::BufReadParsing;
use crate::types::{Password, Tag};

const BUFFER_SIZE: usize = 8 * 1024;

/// Maximum nesting of compressed data around detached signatures.
const MAX_NESTING: usize = 8;

/// Creates and verifies detached document signatures.
#[derive(Debug)]
pub struct DetachedSignatureCodec<S: KeyRetrievalStrategy> {
    strategy: S,
}

impl<S: KeyRetrievalStrategy> DetachedSignatureCodec<S> {
    pub fn new(strategy: S) -> Self {
        DetachedSignatureCodec { strategy }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Signs `input` as a binary document and writes the signature packet to `output`.
    pub fn create_signature<R: Read, W: Write>(
        &self,
        input: R,
        mut output: W,
        armored: bool,
        signing_key: &SecretKey,
        passphrase: Option<&Password>,
        hash_alg: HashAlgorithm,
    ) -> Result<()> {
        let key = unlock_signing_key(signing_key, passphrase)?;
        let config =
            SignatureConfig::v4(SignatureType::Binary, hash_alg, key.public_key(), Utc::now());
        let signature = config.sign(&key, input)?;
        debug!("created detached signature by {}", key.key_id());

        if armored {
            let mut armor = ArmorWriter::new(BlockType::Signature, &mut output)?;
            write_packet(&mut armor, &signature)?;
            armor.finish()?;
        } else {
            write_packet(&mut output, &signature)?;
        }
        output.flush()?;

        Ok(())
    }

    /// Verifies every signature in `signature_data` against `signed_data`.
    ///
    /// The signed data is read once, whatever the number of signatures.
    pub fn verify_signatures<D: Read, R: BufRead>(
        &self,
        mut signed_data: D,
        signature_data: R,
    ) -> Result<Vec<SignatureVerificationResult>> {
        let mut source = Source::new(signature_data)?;
        let mut found = Vec::new();
        read_signatures(&mut source, 0, &mut found)?;
        source.finish()?;
        if found.is_empty() {
            return Err(Error::NoPgpDataFound);
        }

        let mut pending: Vec<Result<(Signature, RunningVerifier), Error>> = found
            .into_iter()
            .map(|sig| {
                sig.map(|sig| {
                    let verifier = RunningVerifier::new(
                        &self.strategy,
                        &sig.issuer(),
                        sig.typ(),
                        sig.hash_alg(),
                    );
                    (sig, verifier)
                })
            })
            .collect();

        let mut buffer = vec![0u8; BUFFER_SIZE];
        loop {
            let read = match signed_data.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            for (_, verifier) in pending.iter_mut().flatten() {
                verifier.update(&buffer[..read]);
            }
        }

        pending
            .into_iter()
            .map(|entry| match entry {
                Ok((sig, verifier)) => verifier.finish(&sig),
                Err(err) => {
                    Ok(SignatureVerificationResult::missing().with_error(err.to_string()))
                }
            })
            .collect()
    }

    /// The content type of a `multipart/signed` body carrying a signature made with `hash_alg`.
    pub fn get_content_type(hash_alg: HashAlgorithm) -> String {
        let micalg = match hash_alg {
            HashAlgorithm::Sha1
            | HashAlgorithm::Sha224
            | HashAlgorithm::Sha256
            | HashAlgorithm::Sha384
            | HashAlgorithm::Sha512 => hash_alg.micalg().unwrap_or("pgp-sha1"),
            _ => "pgp-sha1",
        };

        format!("multipart/signed; protocol=\"application/pgp-signature\"; micalg={micalg}")
    }
}

/// Collects signature packets, looking into compressed data.
///
/// Signatures that fail to parse are kept as errors so they still get a result.
fn read_signatures(
    source: &mut dyn BufRead,
    depth: usize,
    found: &mut Vec<Result<Signature>>,
) -> Result<()> {
    if depth > MAX_NESTING {
        return Err(Error::NestingTooDeep);
    }

    while let Some(header) = PacketHeader::try_from_reader(&mut *source)? {
        let mut body = PacketBodyReader::new(header, &mut *source)?;
        match header.tag() {
            Tag::Signature => {
                let sig = Signature::try_from_reader(&mut body);
                if let Err(ref err) = sig {
                    warn!("unreadable detached signature: {}", err);
                }
                found.push(sig);
            }
            Tag::CompressedData => {
                let mut decompressor = Decompressor::from_reader(&mut body)?;
                read_signatures(&mut decompressor, depth + 1, found)?;
            }
            Tag::Marker => {}
            tag => warn!("ignoring {:?} packet in detached signature", tag),
        }
        body.drain()?;
    }

    Ok(())
}
