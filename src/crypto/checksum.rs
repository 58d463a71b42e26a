use sha1::{Digest, Sha1};

use crate::errors::{ensure_eq, Result};

/// Two octet checksum: sum of all octets mod 65536.
pub fn calculate_simple(data: &[u8]) -> u16 {
    let sum: u32 = data.iter().map(|v| u32::from(*v)).sum();
    (sum & 0xffff) as u16
}

/// Verifies the two octet checksum of `data`.
pub fn simple(actual: [u8; 2], data: &[u8]) -> Result<()> {
    ensure_eq!(
        u16::from_be_bytes(actual),
        calculate_simple(data),
        "invalid simple checksum"
    );

    Ok(())
}

/// SHA1 checksum, first 20 octets.
pub fn calculate_sha1(data: &[u8]) -> [u8; 20] {
    Sha1::digest(data).into()
}
