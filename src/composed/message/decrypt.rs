use std::io::{self, BufRead, Write};

use log::{debug, warn};

use crate::composed::shared::{open_encrypted_data, read_session_packets, Source};
use crate::composed::verifier::RunningVerifier;
use crate::composed::{
    DecryptionResult, IntegrityResult, KeyRetrievalStrategy, SignatureVerificationResult,
};
use crate::crypto::sym::StreamDecryptor;
use crate::errors::{Error, Result};
use crate::packet::{
    Decompressor, LiteralDataHeader, OnePassSignature, PacketBodyReader, PacketHeader, Signature,
};
use crate::parsing_reader::BufReadParsing;
use crate::types::{KeyId, Password, PlainSessionKey, Tag};

/// Literal data is copied in chunks of this size.
const BUFFER_SIZE: usize = 8 * 1024;

/// Maximum nesting of compressed data packets.
const MAX_NESTING: usize = 8;

/// Decrypts public key encrypted messages and verifies the signatures inside.
#[derive(Debug)]
pub struct MessageDecryptor<S: KeyRetrievalStrategy> {
    strategy: S,
}

impl<S: KeyRetrievalStrategy> MessageDecryptor<S> {
    pub fn new(strategy: S) -> Self {
        MessageDecryptor { strategy }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Decrypts `input` into `output`.
    ///
    /// The first session whose private key the strategy can provide is used.
    /// Problems with individual signatures end up in the returned results, only
    /// failures to open the message are returned as errors.
    pub fn decrypt<R: BufRead, W: Write>(
        &self,
        input: R,
        mut output: W,
        identity: Option<&str>,
        passphrase: Option<&Password>,
    ) -> Result<DecryptionResult> {
        let mut source = Source::new(input)?;
        let packets = read_session_packets(&mut source)?;
        if packets.pkesks.is_empty() {
            debug!("no public key encrypted sessions");
            return Err(Error::NoPgpDataFound);
        }
        if !packets.skesks.is_empty() {
            debug!("ignoring {} passphrase sessions", packets.skesks.len());
        }

        let found = packets.pkesks.iter().find_map(|pkesk| {
            self.strategy
                .get_private_key(pkesk.id(), identity, passphrase)
                .map(|key| (pkesk, key))
        });
        let Some((pkesk, key)) = found else {
            let mut key_ids: Vec<KeyId> = Vec::new();
            for pkesk in &packets.pkesks {
                if !key_ids.contains(pkesk.id()) {
                    key_ids.push(*pkesk.id());
                }
            }
            return Err(Error::PrivateKeyNotFound { key_ids });
        };
        debug!("decrypting session for {}", pkesk.id());

        let key = if key.is_locked() {
            let passphrase = passphrase.ok_or(Error::BadPassword)?;
            key.unlock(passphrase)?
        } else {
            key
        };
        let session_key = key.decrypt_session_key(pkesk)?;

        let decryptor = open_encrypted_data(packets.data_header, &mut source, &session_key)?;
        let res = decrypt_data(&self.strategy, decryptor, &mut output)?;
        source.finish()?;

        Ok(res)
    }

    /// Decrypts `input` with an already known session key, skipping all session packets.
    pub fn decrypt_with_session_key<R: BufRead, W: Write>(
        &self,
        input: R,
        mut output: W,
        session_key: &PlainSessionKey,
    ) -> Result<DecryptionResult> {
        let mut source = Source::new(input)?;
        let packets = read_session_packets(&mut source)?;

        let decryptor = open_encrypted_data(packets.data_header, &mut source, session_key)?;
        let res = decrypt_data(&self.strategy, decryptor, &mut output)?;
        source.finish()?;

        Ok(res)
    }
}

/// Walks the plaintext packets of an opened encrypted data packet.
///
/// Signers are looked up through `strategy`.
pub(crate) fn decrypt_data<S: KeyRetrievalStrategy, R: BufRead>(
    strategy: &S,
    mut decryptor: StreamDecryptor<PacketBodyReader<R>>,
    output: &mut dyn Write,
) -> Result<DecryptionResult> {
    let mut walker = Walker::new(strategy, output);
    walker.walk(&mut decryptor, 0)?;
    walker.output.flush()?;

    // the rest of the plaintext has to pass through the MDC check
    io::copy(&mut decryptor, &mut io::sink())?;
    let integrity = match decryptor.mdc_verified() {
        Some(verified) => IntegrityResult::new(true, verified),
        None => IntegrityResult::absent(),
    };
    if integrity.is_present() && !integrity.verified() {
        warn!("message failed the integrity check");
    }
    decryptor.into_inner().drain()?;

    let signature_results = walker
        .finish()
        .into_iter()
        .map(|res| res.with_integrity(integrity))
        .collect();

    Ok(DecryptionResult::new(signature_results, integrity))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    /// A signature with an unknown algorithm was found, nothing after it is read.
    Stop,
}

/// Walks the decrypted packet stream.
struct Walker<'a, S: KeyRetrievalStrategy> {
    strategy: &'a S,
    output: &'a mut dyn Write,
    /// One pass signatures waiting for their final signature, outermost first.
    one_pass: Vec<(OnePassSignature, RunningVerifier)>,
    /// Signatures in front of the literal data.
    prefixed: Vec<(Signature, RunningVerifier)>,
    literal_seen: bool,
    results: Vec<SignatureVerificationResult>,
}

impl<'a, S: KeyRetrievalStrategy> Walker<'a, S> {
    fn new(strategy: &'a S, output: &'a mut dyn Write) -> Self {
        Walker {
            strategy,
            output,
            one_pass: Vec::new(),
            prefixed: Vec::new(),
            literal_seen: false,
            results: Vec::new(),
        }
    }

    fn walk(&mut self, source: &mut dyn BufRead, depth: usize) -> Result<Flow> {
        if depth > MAX_NESTING {
            return Err(Error::NestingTooDeep);
        }

        while let Some(header) = PacketHeader::try_from_reader(&mut *source)? {
            debug!("plaintext packet {:?}", header);
            let mut body = PacketBodyReader::new(header, &mut *source)?;

            match header.tag() {
                Tag::CompressedData => {
                    let mut decompressor = Decompressor::from_reader(&mut body)?;
                    if self.walk(&mut decompressor, depth + 1)? == Flow::Stop {
                        return Ok(Flow::Stop);
                    }
                }
                Tag::LiteralData => self.literal_data(&mut body)?,
                Tag::OnePassSignature => match OnePassSignature::try_from_reader(&mut body) {
                    Ok(ops) => self.one_pass_signature(ops),
                    Err(Error::Unsupported { message }) => {
                        warn!("skipping one pass signature: {}", message)
                    }
                    Err(err) => return Err(err),
                },
                Tag::Signature => match Signature::try_from_reader(&mut body) {
                    Ok(sig) => self.signature(sig)?,
                    Err(err) if err.is_unknown_signature_algorithm() => {
                        warn!("stopping at signature: {}", err);
                        return Ok(Flow::Stop);
                    }
                    Err(err) => self.broken_signature(err),
                },
                Tag::Marker => {}
                tag => warn!("ignoring {:?} packet in message", tag),
            }

            body.drain()?;
        }

        Ok(Flow::Continue)
    }

    fn literal_data(&mut self, body: &mut dyn BufRead) -> Result<()> {
        let header = LiteralDataHeader::try_from_reader(&mut *body)?;
        debug!("literal data {:?}", header);
        if self.literal_seen {
            warn!("message contains more than one literal data packet");
        }
        self.literal_seen = true;

        let mut buffer = vec![0u8; BUFFER_SIZE];
        loop {
            let read = match body.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            let chunk = &buffer[..read];

            for (_, verifier) in self.one_pass.iter_mut() {
                verifier.update(chunk);
            }
            for (_, verifier) in self.prefixed.iter_mut() {
                verifier.update(chunk);
            }
            self.output.write_all(chunk)?;
        }

        Ok(())
    }

    fn one_pass_signature(&mut self, ops: OnePassSignature) {
        debug!("one pass signature by {}", ops.key_id());
        let verifier = RunningVerifier::new(
            self.strategy,
            &[*ops.key_id()],
            ops.typ(),
            ops.hash_algorithm(),
        );
        self.one_pass.push((ops, verifier));
    }

    fn signature(&mut self, sig: Signature) -> Result<()> {
        if !self.literal_seen {
            debug!("signature in front of the literal data");
            let verifier =
                RunningVerifier::new(self.strategy, &sig.issuer(), sig.typ(), sig.hash_alg());
            self.prefixed.push((sig, verifier));
            return Ok(());
        }

        // innermost one pass signature from the same issuer, else the innermost one
        let issuers = sig.issuer();
        let pos = self
            .one_pass
            .iter()
            .rposition(|(ops, verifier)| {
                issuers.contains(ops.key_id())
                    || verifier
                        .signer_key_id()
                        .is_some_and(|id| issuers.contains(&id))
            })
            .or_else(|| self.one_pass.len().checked_sub(1));

        let res = match pos {
            Some(pos) => {
                let (_, verifier) = self.one_pass.remove(pos);
                verifier.finish(&sig)?
            }
            None => {
                warn!("signature without a matching one pass signature");
                SignatureVerificationResult::missing()
            }
        };
        self.results.push(res);

        Ok(())
    }

    /// A signature packet that could not be parsed still gets a result.
    fn broken_signature(&mut self, err: Error) {
        warn!("unreadable signature: {}", err);
        if self.literal_seen {
            self.one_pass.pop();
        }
        self.results
            .push(SignatureVerificationResult::missing().with_error(err.to_string()));
    }

    /// Results of the final signatures, followed by those in front of the data.
    fn finish(mut self) -> Vec<SignatureVerificationResult> {
        let prefixed = std::mem::take(&mut self.prefixed);
        for (sig, verifier) in prefixed {
            match verifier.finish(&sig) {
                Ok(res) => self.results.push(res),
                Err(err) => self.broken_signature(err),
            }
        }
        if !self.one_pass.is_empty() {
            warn!(
                "{} one pass signatures without a final signature",
                self.one_pass.len()
            );
        }

        self.results
    }
}
