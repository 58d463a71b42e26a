//! Public key encrypted messages.
//!
//! Outgoing messages are built as a stack of writers, see [`layer`]. Incoming
//! ones are read packet by packet, with decryption and decompression applied
//! as streams, so neither direction holds the whole message in memory.

pub(crate) mod decrypt;
pub(crate) mod encrypt;
pub(crate) mod layer;

pub use self::decrypt::*;
pub use self::encrypt::*;
