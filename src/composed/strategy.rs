use std::io::BufRead;

use log::debug;

use crate::composed::signed_key::{self, SignedPublicKey};
use crate::errors::Result;
use crate::packet::SecretKey;
use crate::types::{KeyId, Password};

/// Looks up key material for the components in [`crate::composed`].
///
/// `None` means the key is not available, it is never treated as an error by itself.
pub trait KeyRetrievalStrategy {
    /// Returns the secret key component with the given id, unlocked if a passphrase is given.
    ///
    /// `identity` restricts the lookup to certificates carrying a matching user id.
    fn get_private_key(
        &self,
        key_id: &KeyId,
        identity: Option<&str>,
        passphrase: Option<&Password>,
    ) -> Option<SecretKey>;

    /// Returns the certificate whose primary key or one of whose subkeys has the given id.
    fn get_public_key(&self, key_id: &KeyId) -> Option<SignedPublicKey>;
}

impl<T: KeyRetrievalStrategy + ?Sized> KeyRetrievalStrategy for &T {
    fn get_private_key(
        &self,
        key_id: &KeyId,
        identity: Option<&str>,
        passphrase: Option<&Password>,
    ) -> Option<SecretKey> {
        (**self).get_private_key(key_id, identity, passphrase)
    }

    fn get_public_key(&self, key_id: &KeyId) -> Option<SignedPublicKey> {
        (**self).get_public_key(key_id)
    }
}

/// A key store holding everything in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyStore {
    secret_keys: Vec<SecretKey>,
    public_keys: Vec<SignedPublicKey>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads all key blocks from armored or binary data.
    pub fn from_reader<R: BufRead>(input: R) -> Result<Self> {
        let mut store = Self::new();
        store.load(input)?;
        Ok(store)
    }

    /// Adds all key blocks from armored or binary data.
    pub fn load<R: BufRead>(&mut self, input: R) -> Result<()> {
        let parsed = signed_key::from_reader_many(input)?;
        debug!(
            "loaded {} certificates, {} secret keys",
            parsed.public_keys.len(),
            parsed.secret_keys.len()
        );
        self.public_keys.extend(parsed.public_keys);
        self.secret_keys.extend(parsed.secret_keys);

        Ok(())
    }

    pub fn add_public_key(&mut self, key: SignedPublicKey) -> &mut Self {
        self.public_keys.push(key);
        self
    }

    pub fn add_secret_key(&mut self, key: SecretKey) -> &mut Self {
        self.secret_keys.push(key);
        self
    }

    pub fn public_keys(&self) -> &[SignedPublicKey] {
        &self.public_keys
    }

    pub fn secret_keys(&self) -> &[SecretKey] {
        &self.secret_keys
    }

    fn matches_identity(&self, key_id: &KeyId, identity: &str) -> bool {
        self.public_keys
            .iter()
            .filter(|k| k.has_key_id(key_id))
            .flat_map(|k| k.user_ids())
            .any(|id| id.contains(identity))
    }
}

impl KeyRetrievalStrategy for InMemoryKeyStore {
    fn get_private_key(
        &self,
        key_id: &KeyId,
        identity: Option<&str>,
        passphrase: Option<&Password>,
    ) -> Option<SecretKey> {
        let key = self.secret_keys.iter().find(|k| k.key_id() == *key_id)?;
        if let Some(identity) = identity {
            if !self.matches_identity(key_id, identity) {
                debug!("secret key {} does not match identity {:?}", key_id, identity);
                return None;
            }
        }

        match passphrase {
            Some(passphrase) if key.is_locked() => match key.unlock(passphrase) {
                Ok(key) => Some(key),
                // hand out the locked key, the caller reports the bad password
                Err(err) => {
                    debug!("failed to unlock {}: {}", key_id, err);
                    Some(key.clone())
                }
            },
            _ => Some(key.clone()),
        }
    }

    fn get_public_key(&self, key_id: &KeyId) -> Option<SignedPublicKey> {
        self.public_keys
            .iter()
            .find(|k| k.has_key_id(key_id))
            .cloned()
    }
}
