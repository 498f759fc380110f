//! Signing secret.

use rand::RngCore;
use secrecy::{ExposeSecret, SecretSlice};

/// Minimum accepted secret length in bytes.
pub const MIN_SECRET_LEN: usize = 16;

/// Prefix marking a hex-encoded secret.
pub const HEX_PREFIX: &str = "hex:";

/// Server-held HMAC secret.
///
/// Wrapped with `secrecy` so it never shows up in `Debug` output or logs.
pub struct SigningKey(SecretSlice<u8>);

impl SigningKey {
    /// Use the raw bytes of a configured secret string.
    #[must_use]
    pub fn from_secret(secret: &str) -> Self {
        Self::from_bytes(secret.as_bytes().to_vec())
    }

    /// Wrap raw key bytes.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(SecretSlice::from(bytes))
    }

    /// Parse a configured secret. A `hex:` prefix marks hex-encoded key
    /// bytes; anything else is used as raw UTF-8.
    ///
    /// # Errors
    ///
    /// Returns error if a `hex:` secret is not valid hex.
    pub fn parse(secret: &str) -> Result<Self, hex::FromHexError> {
        match secret.strip_prefix(HEX_PREFIX) {
            Some(encoded) => Self::from_hex(encoded.trim()),
            None => Ok(Self::from_secret(secret)),
        }
    }

    /// Decode a hex-encoded secret.
    ///
    /// # Errors
    ///
    /// Returns error if the input is not valid hex.
    pub fn from_hex(hex_secret: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(hex_secret).map(Self::from_bytes)
    }

    /// Generate a random 256-bit key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    /// Key length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    /// Whether the key is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expose the key bytes. Only the token signer should call this.
    pub(crate) fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey([REDACTED; {}])", self.len())
    }
}
