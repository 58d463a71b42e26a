//! # Packet module
//!
//! Parsing and serialization of the individual OpenPGP packets, plus the
//! framing around them: headers, partial body lengths and streaming bodies.
//!
//! ```rust
//! use pgp_stream::packet::{write_packet, Packet, PacketParser, UserId};
//!
//! let mut buf = Vec::new();
//! write_packet(&mut buf, &UserId::from_str("Me <me@example.com>")).unwrap();
//!
//! let packets: Vec<Packet> = PacketParser::new(&buf[..])
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(packets, vec![Packet::UserId(UserId::from_str("Me <me@example.com>"))]);
//! ```

mod compressed_data;
mod header;
mod key;
mod literal_data;
mod many;
mod one_pass_signature;
mod packet_sum;
mod packet_trait;
mod public_key_encrypted_session_key;
mod reader;
mod secret_key;
mod signature;
mod sym_key_encrypted_session_key;
mod user_attribute;
mod user_id;
mod writer;

pub use self::compressed_data::*;
pub use self::header::*;
pub use self::key::*;
pub use self::literal_data::*;
pub use self::many::*;
pub use self::one_pass_signature::*;
pub use self::packet_sum::*;
pub use self::packet_trait::*;
pub use self::public_key_encrypted_session_key::*;
pub use self::reader::*;
pub use self::secret_key::*;
pub use self::signature::*;
pub use self::sym_key_encrypted_session_key::*;
pub use self::user_attribute::*;
pub use self::user_id::*;
pub use self::writer::*;
