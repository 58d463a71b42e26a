//! # Cryptography module

pub mod checksum;
pub mod ed25519;
pub mod hash;
pub mod public_key;
pub mod rsa;
pub mod sym;
