mod compression;
mod fingerprint;
mod key_id;
mod mpi;
mod packet;
mod password;
mod s2k;
mod session_key;

pub use self::compression::*;
pub use self::fingerprint::*;
pub use self::key_id::*;
pub use self::mpi::*;
pub use self::packet::*;
pub use self::password::*;
pub use self::s2k::*;
pub use self::session_key::*;
