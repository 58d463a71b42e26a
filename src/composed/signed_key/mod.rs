//! Signed public keys.
//!
//! A [`SignedPublicKey`] is the in memory form of a transferable public key:
//! the primary key, its user ids and user attributes, its subkeys, and every
//! signature attached to them. Secret material is kept per key component as
//! [`crate::packet::SecretKey`].

mod parse;
mod public;
mod shared;

pub use self::parse::*;
pub use self::public::*;
pub use self::shared::*;
