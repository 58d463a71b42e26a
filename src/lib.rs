//! # pgp-stream
//!
//! A streaming OpenPGP engine ([RFC 4880]): public key and passphrase
//! encryption, decryption with inline signature verification, detached
//! signatures and verification of the signatures inside certificates.
//!
//! Payloads are never held in memory as a whole. Every component reads from
//! an [`std::io::Read`] and writes to an [`std::io::Write`], key material is
//! looked up through a caller supplied [`composed::KeyRetrievalStrategy`].
//!
//! [RFC 4880]: https://www.rfc-editor.org/rfc/rfc4880.html
//!
//! # Example
//!
//! ```rust
//! use pgp_stream::composed::SymmetricCodec;
//! use pgp_stream::types::Password;
//!
//! let codec = SymmetricCodec::new();
//! let password = Password::from("correct horse");
//!
//! let mut encrypted = Vec::new();
//! codec.encrypt(rand::thread_rng(), &b"hello world"[..], &mut encrypted, true, &password)?;
//! assert!(encrypted.starts_with(b"-----BEGIN PGP MESSAGE-----"));
//!
//! let mut plain = Vec::new();
//! let integrity = codec.decrypt(&encrypted[..], &mut plain, &password)?;
//! assert!(integrity.verified());
//! assert_eq!(plain, b"hello world");
//! # Ok::<(), pgp_stream::errors::Error>(())
//! ```

#![forbid(unsafe_code)]

pub mod armor;
pub mod composed;
pub mod crypto;
pub mod errors;
pub mod packet;
pub mod provider;
pub mod types;

mod parsing_reader;
mod ser;
mod util;

pub use self::composed::*;
pub use self::ser::Serialize;

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
