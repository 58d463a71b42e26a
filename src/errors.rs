use std::num::TryFromIntError;

use snafu::{Backtrace, Snafu};

use crate::types::KeyId;
use crate::util::format_key_ids;

pub type Result<T, E = Error> = ::std::result::Result<T, E>;

/// Error types
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The input does not contain an encrypted message this engine understands.
    #[snafu(display("no pgp data found"))]
    NoPgpDataFound,
    /// None of the sessions of a message could be matched with a private key.
    #[snafu(display(
        "no private key found for any of the message recipients {}",
        format_key_ids(key_ids)
    ))]
    PrivateKeyNotFound { key_ids: Vec<KeyId> },
    /// The passphrase for a secret key or a symmetric message was rejected.
    #[snafu(display("bad password"))]
    BadPassword,
    /// The given private key can not open the given session.
    #[snafu(display("the private key does not match the encrypted session"))]
    KeyMismatch,
    /// Malformed or inconsistent packet stream.
    #[snafu(display("{message}"))]
    ProtocolError { message: String },
    /// Signals packet versions and parameters we don't support, but can safely ignore
    #[snafu(display("Unsupported: {message}"))]
    Unsupported { message: String },
    /// A signature packet uses a public key algorithm that can not produce signatures.
    #[snafu(display("unknown signature algorithm {algorithm}"))]
    UnknownSignatureAlgorithm { algorithm: u8 },
    #[snafu(display("invalid armor: {message}"))]
    InvalidArmor { message: String },
    #[snafu(display("invalid crc24 checksum"))]
    InvalidChecksum,
    #[snafu(display("nesting of compressed packets is too deep"))]
    NestingTooDeep,
    #[snafu(transparent)]
    Base64Decode { source: base64::DecodeError },
    #[snafu(transparent)]
    RSAError { source: rsa::errors::Error },
    #[snafu(transparent)]
    SignatureError { source: ed25519_dalek::SignatureError },
    #[snafu(transparent)]
    IO {
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(transparent)]
    TryFromInt { source: TryFromIntError },
    #[snafu(display("cfb: invalid key iv length"))]
    CfbInvalidKeyIvLength,
}

impl Error {
    /// Signature algorithm errors mark the end of the usable trailing signatures.
    pub fn is_unknown_signature_algorithm(&self) -> bool {
        matches!(self, Error::UnknownSignatureAlgorithm { .. })
    }
}

impl From<cipher::InvalidLength> for Error {
    fn from(_: cipher::InvalidLength) -> Error {
        Error::CfbInvalidKeyIvLength
    }
}

impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(err: derive_builder::UninitializedFieldError) -> Error {
        Error::ProtocolError {
            message: err.to_string(),
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> std::io::Error {
        match err {
            Error::IO { source, .. } => source,
            err => std::io::Error::new(std::io::ErrorKind::InvalidData, err),
        }
    }
}

macro_rules! unsupported_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unsupported { message: $e.to_string()})
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unsupported { message: format!($fmt, $($arg)+) })
    };
}

macro_rules! bail {
    ($e:expr) => {
        return Err($crate::errors::Error::ProtocolError { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::ProtocolError { message: format!($fmt, $($arg)+) })
    };
}

macro_rules! format_err {
    ($e:expr) => {
        $crate::errors::Error::ProtocolError { message: $e.to_string() }
    };
    ($fmt:expr, $($arg:tt)+) => {
        $crate::errors::Error::ProtocolError { message: format!($fmt, $($arg)+) }
    };
}

macro_rules! ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            $crate::errors::bail!($e);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)+) => {
        if !($cond) {
            $crate::errors::bail!($fmt, $($arg)+);
        }
    };
}

macro_rules! ensure_eq {
    ($left:expr, $right:expr) => ({
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    $crate::errors::bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`"#, left_val, right_val)
                }
            }
        }
    });
    ($left:expr, $right:expr, $($arg:tt)+) => ({
        match (&($left), &($right)) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    $crate::errors::bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`: {}"#, left_val, right_val,
                           format_args!($($arg)+))
                }
            }
        }
    });
}

pub(crate) use bail;
pub(crate) use ensure;
pub(crate) use ensure_eq;
pub(crate) use format_err;
pub(crate) use unsupported_err;

#[cfg(test)]
mod tests {
    use super::*;

    fn check(cond: bool) -> Result<()> {
        ensure!(cond, "condition failed: {}", 42);
        Ok(())
    }

    #[test]
    fn test_ensure() {
        assert!(check(true).is_ok());
        let err = check(false).unwrap_err();
        assert_eq!(err.to_string(), "condition failed: 42");
    }

    #[test]
    fn test_private_key_not_found_display() {
        let err = Error::PrivateKeyNotFound {
            key_ids: vec![
                KeyId::from(0x1234_5678_9ABC_DEF0u64),
                KeyId::from(0x0FED_CBA9_8765_4321u64),
            ],
        };
        assert_eq!(
            err.to_string(),
            "no private key found for any of the message recipients (0x12345678, 0x0FEDCBA9)"
        );
    }
}
