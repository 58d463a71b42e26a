use derive_builder::Builder;

use crate::composed::SignedPublicKey;
use crate::packet::{PublicKey, UserAttribute};

/// Outcome of the integrity check (MDC) of an encrypted message.
///
/// A message without integrity protection is reported as not present and
/// never as verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntegrityResult {
    is_present: bool,
    verified: bool,
}

impl IntegrityResult {
    pub fn new(is_present: bool, verified: bool) -> Self {
        IntegrityResult {
            is_present,
            verified: is_present && verified,
        }
    }

    /// The message carried no integrity protection.
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn is_present(&self) -> bool {
        self.is_present
    }

    pub fn verified(&self) -> bool {
        self.verified
    }
}

/// Outcome of verifying a single signature packet.
#[derive(Debug, Clone, Default, Builder)]
#[builder(
    default,
    setter(into, strip_option),
    build_fn(error = "crate::errors::Error")
)]
pub struct SignatureVerificationResult {
    verified: bool,
    /// No public key could be found for the signature.
    missing: bool,
    error: Option<String>,
    user_id: Option<String>,
    /// The key component that made the signature.
    public_key: Option<PublicKey>,
    /// The certificate the signing key belongs to.
    issuer_key: Option<SignedPublicKey>,
    user_attributes: Option<UserAttribute>,
    issuer_user_ids: Vec<String>,
    nested_integrity_result: Option<IntegrityResult>,
}

impl SignatureVerificationResult {
    /// The result for a signature whose key could not be resolved.
    pub fn missing() -> Self {
        SignatureVerificationResult {
            missing: true,
            ..Default::default()
        }
    }

    pub fn verified(&self) -> bool {
        self.verified
    }

    pub fn is_missing(&self) -> bool {
        self.missing
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    pub fn issuer_key(&self) -> Option<&SignedPublicKey> {
        self.issuer_key.as_ref()
    }

    pub fn user_attributes(&self) -> Option<&UserAttribute> {
        self.user_attributes.as_ref()
    }

    pub fn issuer_user_ids(&self) -> &[String] {
        &self.issuer_user_ids
    }

    pub fn nested_integrity_result(&self) -> Option<&IntegrityResult> {
        self.nested_integrity_result.as_ref()
    }

    pub(crate) fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches the integrity result of the message the signature was found in.
    pub(crate) fn with_integrity(mut self, integrity: IntegrityResult) -> Self {
        self.nested_integrity_result = Some(integrity);
        self
    }
}

/// Everything learned while decrypting a message, besides the plaintext itself.
#[derive(Debug, Clone)]
pub struct DecryptionResult {
    signature_results: Vec<SignatureVerificationResult>,
    integrity_result: IntegrityResult,
}

impl DecryptionResult {
    pub fn new(
        signature_results: Vec<SignatureVerificationResult>,
        integrity_result: IntegrityResult,
    ) -> Self {
        DecryptionResult {
            signature_results,
            integrity_result,
        }
    }

    /// One entry per signature packet, in the order they were found.
    pub fn signature_results(&self) -> &[SignatureVerificationResult] {
        &self.signature_results
    }

    pub fn integrity_result(&self) -> &IntegrityResult {
        &self.integrity_result
    }
}
