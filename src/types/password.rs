use zeroize::Zeroizing;

/// A passphrase for secret keys and symmetric messages.
#[derive(Clone, Default, derive_more::Debug)]
#[debug("Password(***)")]
pub struct Password(Zeroizing<Vec<u8>>);

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self(value.into_bytes().into())
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec().into())
    }
}

impl From<&[u8]> for Password {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec().into())
    }
}

impl Password {
    /// Creates an empty password.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a copy of the secret bytes.
    pub fn read(&self) -> Zeroizing<Vec<u8>> {
        self.0.clone()
    }
}
