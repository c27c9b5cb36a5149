//! Ed25519 signatures over canonical audit record bytes.

use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CryptoError, CryptoResult};
use crate::keypair::PublicKey;

/// Length of an encoded Ed25519 signature.
pub(crate) const SIGNATURE_LEN: usize = 64;

/// An Ed25519 signature (64 bytes).
///
/// Stored alongside each record as base64 text; see [`Signature::to_base64`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    /// Create from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    /// Try to create from a slice.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidSignatureLength`] if the slice is not exactly 64 bytes.
    pub fn try_from_slice(slice: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; SIGNATURE_LEN] =
            slice
                .try_into()
                .map_err(|_| CryptoError::InvalidSignatureLength {
                    expected: SIGNATURE_LEN,
                    actual: slice.len(),
                })?;
        Ok(Self(bytes))
    }

    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    /// Encode as hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Encode as base64 string. This is the storage form.
    #[must_use]
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    /// Decode from base64 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid base64 or not 64 bytes.
    pub fn from_base64(s: &str) -> CryptoResult<Self> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(s.trim())
            .map_err(|_| CryptoError::InvalidBase64Encoding)?;
        Self::try_from_slice(&bytes)
    }

    /// Verify this signature against a message and public key.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key is not a valid point or the
    /// signature does not match the message.
    pub fn verify(&self, message: &[u8], public_key: &PublicKey) -> CryptoResult<()> {
        let verifying_key = VerifyingKey::from_bytes(public_key.as_bytes())
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

        verifying_key
            .verify(message, &DalekSignature::from_bytes(&self.0))
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..16])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

impl From<DalekSignature> for Signature {
    fn from(sig: DalekSignature) -> Self {
        Self(sig.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyPair;

    #[test]
    fn test_base64_roundtrip_preserves_bytes() {
        let keypair = KeyPair::generate();
        let sig = keypair.sign(b"serial=OATH0001");

        let restored = Signature::from_base64(&sig.to_base64()).unwrap();
        assert_eq!(sig, restored);
    }

    #[test]
    fn test_from_base64_tolerates_surrounding_whitespace() {
        let sig = KeyPair::generate().sign(b"x");
        let padded = format!("  {}\n", sig.to_base64());
        assert_eq!(Signature::from_base64(&padded).unwrap(), sig);
    }

    #[test]
    fn test_rejects_wrong_length() {
        let err = Signature::try_from_slice(&[0u8; 12]).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::InvalidSignatureLength {
                expected: 64,
                actual: 12
            }
        ));
    }

    #[test]
    fn test_rejects_garbage_text() {
        assert!(matches!(
            Signature::from_base64("not base64!!"),
            Err(CryptoError::InvalidBase64Encoding)
        ));
    }

    #[test]
    fn test_verify_detects_other_key() {
        let signer = KeyPair::generate();
        let other = KeyPair::generate();
        let sig = signer.sign(b"realm=default");

        assert!(sig.verify(b"realm=default", &signer.export_public_key()).is_ok());
        assert!(sig.verify(b"realm=default", &other.export_public_key()).is_err());
    }

    #[test]
    fn test_serde_uses_base64_text() {
        let sig = KeyPair::generate().sign(b"payload");
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, format!("\"{}\"", sig.to_base64()));

        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }
}
