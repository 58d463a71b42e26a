use log::{debug, warn};

use crate::composed::{
    KeyRetrievalStrategy, SignatureVerificationResult, SignatureVerificationResultBuilder,
    SignedPublicKey,
};
use crate::crypto::hash::HashAlgorithm;
use crate::errors::Result;
use crate::packet::{PublicKey, Signature, SignatureHasher, SignatureType};
use crate::types::KeyId;

/// A signer resolved through the key retrieval strategy.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedSigner {
    /// The certificate the signing key was found in.
    pub(crate) cert: SignedPublicKey,
    /// The key component that made the signature.
    pub(crate) key: PublicKey,
}

impl ResolvedSigner {
    /// Asks the strategy for each key id in turn, the first hit wins.
    pub(crate) fn resolve<S: KeyRetrievalStrategy>(
        strategy: &S,
        key_ids: &[KeyId],
    ) -> Option<Self> {
        key_ids.iter().find_map(|id| {
            let cert = strategy.get_public_key(id)?;
            let key = cert.key_by_id(id)?.clone();
            Some(ResolvedSigner { cert, key })
        })
    }

    /// The user ids of the master key, if the signing key is bound to it.
    ///
    /// For subkeys the binding signature has to verify against the primary key.
    pub(crate) fn master_user_ids(&self) -> Vec<String> {
        let primary = &self.cert.primary_key;
        if self.key == *primary {
            return self.cert.user_ids();
        }

        let bound = self
            .cert
            .public_subkeys
            .iter()
            .filter(|sub| sub.key == self.key)
            .filter_map(|sub| sub.binding_signature())
            .any(|sig| sig.verify_key_binding(primary, primary, &self.key).is_ok());
        if bound {
            self.cert.user_ids()
        } else {
            warn!("signing subkey {} is not bound to its primary key", self.key.key_id());
            Vec::new()
        }
    }
}

/// A signature whose digest is being computed while the signed data streams by.
#[derive(Debug)]
pub(crate) struct RunningVerifier {
    signer: Option<ResolvedSigner>,
    hash_alg: HashAlgorithm,
    hasher: Result<SignatureHasher, String>,
}

impl RunningVerifier {
    pub(crate) fn new<S: KeyRetrievalStrategy>(
        strategy: &S,
        key_ids: &[KeyId],
        typ: SignatureType,
        hash_alg: HashAlgorithm,
    ) -> Self {
        let signer = ResolvedSigner::resolve(strategy, key_ids);
        if signer.is_none() {
            debug!("no public key for signature by {:?}", key_ids);
        }
        let hasher = SignatureHasher::with_type(typ, hash_alg).map_err(|err| err.to_string());

        RunningVerifier {
            signer,
            hash_alg,
            hasher,
        }
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.signer.is_some()
    }

    pub(crate) fn signer_key_id(&self) -> Option<KeyId> {
        self.signer.as_ref().map(|s| s.key.key_id())
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        if self.signer.is_none() {
            return;
        }
        if let Ok(ref mut hasher) = self.hasher {
            hasher.update(data);
        }
    }

    /// Checks the final signature against the digest of everything seen.
    pub(crate) fn finish(self, signature: &Signature) -> Result<SignatureVerificationResult> {
        let Some(signer) = self.signer else {
            return Ok(SignatureVerificationResult::missing());
        };

        let outcome = match self.hasher {
            Ok(_) if signature.hash_alg() != self.hash_alg => Err(format!(
                "hash algorithm {:?} does not match the announced {:?}",
                signature.hash_alg(),
                self.hash_alg
            )),
            Ok(hasher) => signature
                .verify_hasher(&signer.key, hasher.into_inner())
                .map_err(|err| err.to_string()),
            Err(err) => Err(err),
        };

        let mut builder = SignatureVerificationResultBuilder::default();
        builder
            .verified(outcome.is_ok())
            .issuer_user_ids(signer.master_user_ids());
        if let Some(id) = signer.cert.user_ids().into_iter().next() {
            builder.user_id(id);
        }
        if let Err(err) = outcome {
            warn!("signature by {} did not verify: {}", signer.key.key_id(), err);
            builder.error(err);
        }
        builder.public_key(signer.key).issuer_key(signer.cert);

        builder.build()
    }
}
