use std::io::BufRead;

use log::debug;

use crate::composed::shared::{read_session_packets, Source};
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::{PkeskBytes, PublicKeyEncryptedSessionKey, SecretKey};
use crate::types::{KeyId, Password, PlainSessionKey};

/// A session key encrypted to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedSession {
    packet: PublicKeyEncryptedSessionKey,
}

impl EncryptedSession {
    pub fn key_id(&self) -> &KeyId {
        self.packet.id()
    }

    /// The public key algorithm the session key is encrypted with.
    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.packet.algorithm()
    }

    pub fn encrypted_key_data(&self) -> &PkeskBytes {
        self.packet.values()
    }

    pub fn packet(&self) -> &PublicKeyEncryptedSessionKey {
        &self.packet
    }
}

impl From<PublicKeyEncryptedSessionKey> for EncryptedSession {
    fn from(packet: PublicKeyEncryptedSessionKey) -> Self {
        EncryptedSession { packet }
    }
}

/// Extracts and opens the session keys of a message, without touching its body.
///
/// The resulting [`PlainSessionKey`] can be handed to the `decrypt_with_session_key`
/// methods any number of times, so the asymmetric operation only happens once.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionKeyCodec;

impl SessionKeyCodec {
    pub fn new() -> Self {
        SessionKeyCodec
    }

    /// Reads the public key encrypted sessions in front of the message body.
    pub fn read_sessions<R: BufRead>(&self, input: R) -> Result<Vec<EncryptedSession>> {
        let mut source = Source::new(input)?;
        let packets = read_session_packets(&mut source)?;
        debug!(
            "{} public key sessions, {} passphrase sessions",
            packets.pkesks.len(),
            packets.skesks.len()
        );

        Ok(packets.pkesks.into_iter().map(Into::into).collect())
    }

    /// Decrypts the session key with the given private key.
    ///
    /// A locked key is unlocked with `passphrase` first.
    pub fn decrypt_session_key(
        &self,
        session: &EncryptedSession,
        private_key: &SecretKey,
        passphrase: Option<&Password>,
    ) -> Result<PlainSessionKey> {
        if !session.key_id().is_wildcard() && *session.key_id() != private_key.key_id() {
            debug!(
                "session for {} can not be opened by {}",
                session.key_id(),
                private_key.key_id()
            );
            return Err(Error::KeyMismatch);
        }

        if private_key.is_locked() {
            let passphrase = passphrase.ok_or(Error::BadPassword)?;
            let unlocked = private_key.unlock(passphrase)?;
            return unlocked.decrypt_session_key(&session.packet);
        }

        private_key.decrypt_session_key(&session.packet)
    }
}
