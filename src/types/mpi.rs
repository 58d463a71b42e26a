use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;

use crate::errors::{ensure, Result};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;

/// Number of bits we accept when reading or writing MPIs.
/// The value is the same as gnupgs.
const MAX_EXTERN_MPI_BITS: u16 = 16384;

/// Represents an owned MPI value, stored without leading zeros.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-3.2>
#[derive(Default, Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Mpi(#[debug("{}", hex::encode(_0))] Bytes);

impl Mpi {
    /// Parses a length prefixed MPI.
    pub fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let len_bits = i.read_be_u16()?;
        ensure!(
            len_bits <= MAX_EXTERN_MPI_BITS,
            "mpi too large: {} bits",
            len_bits
        );

        let len_bytes = (usize::from(len_bits) + 7) >> 3;
        let n = i.take_bytes(len_bytes)?.freeze();
        let stripped = strip_leading_zeros(&n);

        Ok(Mpi(n.slice_ref(stripped)))
    }

    /// Represent the data in `raw` as an Mpi, stripping leading zeros.
    /// `raw` is not length-prefixed.
    pub fn from_slice(raw: &[u8]) -> Self {
        Mpi(Bytes::copy_from_slice(strip_leading_zeros(raw)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the value left padded with zeros to `len` bytes.
    pub fn to_padded(&self, len: usize) -> Vec<u8> {
        if self.0.len() >= len {
            return self.0.to_vec();
        }
        let mut out = vec![0u8; len - self.0.len()];
        out.extend_from_slice(&self.0);
        out
    }
}

impl From<&rsa::BigUint> for Mpi {
    fn from(value: &rsa::BigUint) -> Self {
        Mpi::from_slice(&value.to_bytes_be())
    }
}

impl Serialize for Mpi {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        let bits = bit_size(&self.0);
        w.write_u16::<BigEndian>(bits.try_into()?)?;
        w.write_all(&self.0)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.0.len()
    }
}

/// Returns the bit length of a given slice.
#[inline]
fn bit_size(val: &[u8]) -> usize {
    if val.is_empty() {
        0
    } else {
        (val.len() * 8) - val[0].leading_zeros() as usize
    }
}

#[inline]
fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mpi() {
        // Decode the number `511` (`0x1FF` in hex).
        let mpi = Mpi::try_from_reader(&[0x00, 0x09, 0x01, 0xFF][..]).unwrap();
        assert_eq!(mpi.as_bytes(), &[0x01, 0xFF]);
        assert_eq!(mpi.to_bytes().unwrap(), vec![0x00, 0x09, 0x01, 0xFF]);
    }

    #[test]
    fn test_mpi_leading_zeros() {
        let mpi = Mpi::from_slice(&[0x00, 0x00, 0x80, 0x01]);
        assert_eq!(mpi.as_bytes(), &[0x80, 0x01]);
        assert_eq!(mpi.to_bytes().unwrap(), vec![0x00, 0x10, 0x80, 0x01]);
        assert_eq!(mpi.to_padded(4), vec![0x00, 0x00, 0x80, 0x01]);
    }

    #[test]
    fn test_mpi_too_short() {
        assert!(Mpi::try_from_reader(&[0x00, 0x10, 0x01][..]).is_err());
    }
}
