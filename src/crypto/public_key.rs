use num_enum::{FromPrimitive, IntoPrimitive};

/// Public key algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-public-key-algorithms>
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive, derive_more::Display)]
#[repr(u8)]
#[non_exhaustive]
pub enum PublicKeyAlgorithm {
    /// RSA (Encrypt and Sign)
    #[display("RSA")]
    RSA = 1,
    /// DEPRECATED: RSA (Encrypt-Only)
    #[display("RSA (encrypt only)")]
    RSAEncrypt = 2,
    /// DEPRECATED: RSA (Sign-Only)
    #[display("RSA (sign only)")]
    RSASign = 3,
    /// Elgamal (Encrypt-Only)
    #[display("Elgamal")]
    Elgamal = 16,
    /// DSA (Digital Signature Algorithm)
    #[display("DSA")]
    DSA = 17,
    /// Elliptic Curve: RFC-6637
    #[display("ECDH")]
    ECDH = 18,
    /// ECDSA: RFC-6637
    #[display("ECDSA")]
    ECDSA = 19,
    /// EdDSA legacy format
    #[display("EdDSA (legacy)")]
    EdDSALegacy = 22,
    /// X25519 [RFC 9580]
    #[display("X25519")]
    X25519 = 25,
    /// Ed25519 [RFC 9580]
    #[display("Ed25519")]
    Ed25519 = 27,

    #[num_enum(catch_all)]
    #[display("unknown({_0})")]
    Unknown(u8),
}

impl PublicKeyAlgorithm {
    /// Algorithms that produce signatures.
    pub fn can_sign(self) -> bool {
        matches!(
            self,
            Self::RSA | Self::RSASign | Self::DSA | Self::ECDSA | Self::EdDSALegacy | Self::Ed25519
        )
    }

    /// Algorithms that encrypt session keys.
    pub fn can_encrypt(self) -> bool {
        matches!(
            self,
            Self::RSA | Self::RSAEncrypt | Self::Elgamal | Self::ECDH | Self::X25519
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        assert!(PublicKeyAlgorithm::RSA.can_sign());
        assert!(PublicKeyAlgorithm::RSA.can_encrypt());
        assert!(PublicKeyAlgorithm::Ed25519.can_sign());
        assert!(!PublicKeyAlgorithm::Ed25519.can_encrypt());
        assert!(!PublicKeyAlgorithm::from(16).can_sign());
        assert_eq!(PublicKeyAlgorithm::from(99), PublicKeyAlgorithm::Unknown(99));
    }
}
