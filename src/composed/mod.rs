//! The components that drive whole messages, signatures and certificates.
//!
//! Each component takes its key material from a [`KeyRetrievalStrategy`] and
//! streams data between a reader and a writer.

mod detached;
mod key_signature;
pub mod message;
mod results;
mod session_key;
mod shared;
mod signed_key;
mod strategy;
mod symmetric;
mod verifier;

pub use self::detached::DetachedSignatureCodec;
pub use self::key_signature::KeySignatureVerifier;
pub use self::message::{
    EncryptionConfig, EncryptionConfigBuilder, MessageDecryptor, MessageEncryptor,
};
pub use self::results::{
    DecryptionResult, IntegrityResult, SignatureVerificationResult,
    SignatureVerificationResultBuilder,
};
pub use self::session_key::{EncryptedSession, SessionKeyCodec};
pub use self::signed_key::*;
pub use self::strategy::{InMemoryKeyStore, KeyRetrievalStrategy};
pub use self::symmetric::{SymmetricCodec, SymmetricConfig, SymmetricConfigBuilder};
