//! Ed25519 key pairs with secure memory handling.
//!
//! The writer side of the audit trail holds a [`KeyPair`] and signs every
//! finalized record. Readers hold only a [`PublicKey`].
//!
//! Key files:
//! - private key: 32 raw bytes, or the same bytes as 64 hex characters
//! - public key: 32 raw bytes, 64 hex characters, or base64 text

use std::io::Write;
use std::path::Path;

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CryptoError, CryptoResult};
use crate::signature::Signature;

/// Length of an Ed25519 secret or public key.
const KEY_LEN: usize = 32;

/// An Ed25519 key pair with secure memory handling.
///
/// The secret key is zeroized on drop to prevent leaking sensitive material.
#[derive(ZeroizeOnDrop)]
pub struct KeyPair {
    #[zeroize(skip)] // VerifyingKey doesn't implement Zeroize
    verifying_key: VerifyingKey,
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random key pair.
    #[must_use]
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        Self {
            verifying_key,
            signing_key,
        }
    }

    /// Create from a secret key (32 bytes).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if the slice is not exactly 32 bytes.
    pub fn from_secret_key(bytes: &[u8]) -> CryptoResult<Self> {
        let mut secret: [u8; KEY_LEN] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: bytes.len(),
            })?;

        let signing_key = SigningKey::from_bytes(&secret);
        let verifying_key = signing_key.verifying_key();
        secret.zeroize();

        Ok(Self {
            verifying_key,
            signing_key,
        })
    }

    /// Get the public key bytes (32 bytes).
    #[must_use]
    pub fn public_key_bytes(&self) -> &[u8; KEY_LEN] {
        self.verifying_key.as_bytes()
    }

    /// Short hex identifier of the public half, safe for log output.
    #[must_use]
    pub fn key_id_hex(&self) -> String {
        self.export_public_key().key_id_hex()
    }

    /// Sign a message.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::from(self.signing_key.sign(message))
    }

    /// Verify a signature with our own public key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SignatureVerificationFailed`] if verification fails.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> CryptoResult<()> {
        signature.verify(message, &self.export_public_key())
    }

    /// Export the public key for distribution to verifiers.
    #[must_use]
    pub fn export_public_key(&self) -> PublicKey {
        PublicKey::from_bytes(*self.public_key_bytes())
    }

    /// Export the secret key bytes (careful - sensitive!).
    ///
    /// Only used to persist the key; wrap the result in [`Zeroizing`].
    #[must_use]
    pub fn secret_key_bytes(&self) -> Zeroizing<[u8; KEY_LEN]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    /// Load a private key file.
    ///
    /// Accepts 32 raw bytes or 64 hex characters (surrounding whitespace
    /// ignored). Symlinks are refused.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyFile`] when the file cannot be read, or a
    /// decoding error when its contents are not a key.
    pub fn load(path: impl AsRef<Path>) -> CryptoResult<Self> {
        let path = path.as_ref();
        let bytes = read_key_file(path)?;
        if bytes.len() == KEY_LEN {
            return Self::from_secret_key(&bytes);
        }

        let text = std::str::from_utf8(&bytes).map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        let decoded =
            Zeroizing::new(hex::decode(text.trim()).map_err(|_| CryptoError::InvalidHexEncoding)?);
        Self::from_secret_key(&decoded)
    }

    /// Generate a new key pair and write its secret to `path`.
    ///
    /// Refuses to overwrite an existing file. On Unix the file is created
    /// atomically with mode 0o600. Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyFile`] if the file exists or cannot be written.
    pub fn write_new(path: impl AsRef<Path>) -> CryptoResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CryptoError::key_file(path, e))?;
        }

        let mut file = open_exclusive(path).map_err(|e| CryptoError::key_file(path, e))?;
        let keypair = Self::generate();
        file.write_all(keypair.secret_key_bytes().as_slice())
            .map_err(|e| CryptoError::key_file(path, e))?;
        Ok(keypair)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_id", &self.key_id_hex())
            .finish_non_exhaustive()
    }
}

/// Reads a key file into a zeroizing buffer, refusing symlinks.
fn read_key_file(path: &Path) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let meta = std::fs::symlink_metadata(path).map_err(|e| CryptoError::key_file(path, e))?;
    if meta.file_type().is_symlink() {
        return Err(CryptoError::key_file(path, "refusing to read a symlink"));
    }
    let bytes = std::fs::read(path).map_err(|e| CryptoError::key_file(path, e))?;
    Ok(Zeroizing::new(bytes))
}

#[cfg(unix)]
fn open_exclusive(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_exclusive(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
}

/// A public key (safe to share, serialize, etc.).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; KEY_LEN]);

impl PublicKey {
    /// Create from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Try to create from a slice.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if the slice is not exactly 32 bytes.
    pub fn try_from_slice(slice: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; KEY_LEN] = slice.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: slice.len(),
        })?;
        Ok(Self(bytes))
    }

    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// First 8 bytes as hex.
    #[must_use]
    pub fn key_id_hex(&self) -> String {
        hex::encode(&self.0[..8])
    }

    /// Encode as hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not 32 bytes.
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidHexEncoding)?;
        Self::try_from_slice(&bytes)
    }

    /// Encode as base64 string.
    #[must_use]
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    /// Decode from base64 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid base64 or not 32 bytes.
    pub fn from_base64(s: &str) -> CryptoResult<Self> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(|_| CryptoError::InvalidBase64Encoding)?;
        Self::try_from_slice(&bytes)
    }

    /// Parse the textual forms accepted in public key files: 64 hex
    /// characters, otherwise base64.
    ///
    /// # Errors
    ///
    /// Returns a decoding error if neither form applies.
    pub fn parse(text: &str) -> CryptoResult<Self> {
        let text = text.trim();
        if text.len() == KEY_LEN.saturating_mul(2) && text.bytes().all(|b| b.is_ascii_hexdigit()) {
            Self::from_hex(text)
        } else {
            Self::from_base64(text)
        }
    }

    /// Load a public key file.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyFile`] when the file cannot be read, or a
    /// decoding error when its contents are not a key.
    pub fn load(path: impl AsRef<Path>) -> CryptoResult<Self> {
        let path = path.as_ref();
        let bytes = read_key_file(path)?;
        if bytes.len() == KEY_LEN {
            return Self::try_from_slice(&bytes);
        }
        let text = std::str::from_utf8(&bytes).map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Self::parse(text)
    }

    /// Write the key as hex text followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyFile`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> CryptoResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CryptoError::key_file(path, e))?;
        }
        std::fs::write(path, format!("{}\n", self.to_hex()))
            .map_err(|e| CryptoError::key_file(path, e))
    }

    /// Verify a signature against this public key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SignatureVerificationFailed`] if verification fails.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> CryptoResult<()> {
        signature.verify(message, self)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.key_id_hex())
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        assert_ne!(kp1.public_key_bytes(), kp2.public_key_bytes());
    }

    #[test]
    fn test_keypair_from_secret() {
        let original = KeyPair::generate();
        let secret = original.secret_key_bytes();

        let restored = KeyPair::from_secret_key(secret.as_slice()).unwrap();
        assert_eq!(original.public_key_bytes(), restored.public_key_bytes());
    }

    #[test]
    fn test_from_secret_rejects_short_input() {
        assert!(matches!(
            KeyPair::from_secret_key(&[7u8; 31]),
            Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 31
            })
        ));
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"action=POST /token/init");
        assert!(kp.verify(b"action=POST /token/init", &sig).is_ok());
        assert!(kp.verify(b"action=POST /token/disable", &sig).is_err());
    }

    #[test]
    fn test_public_key_parse_accepts_hex_and_base64() {
        let pk = KeyPair::generate().export_public_key();
        assert_eq!(PublicKey::parse(&pk.to_hex()).unwrap(), pk);
        assert_eq!(PublicKey::parse(&pk.to_base64()).unwrap(), pk);
        assert_eq!(PublicKey::parse(&format!("{}\n", pk.to_hex())).unwrap(), pk);
    }

    #[test]
    fn test_public_key_debug_shows_only_key_id() {
        let pk = KeyPair::generate().export_public_key();
        let debug = format!("{pk:?}");
        assert_eq!(debug, format!("PublicKey({})", pk.key_id_hex()));
        assert_eq!(pk.key_id_hex().len(), 16);
    }

    #[test]
    fn test_keypair_debug_hides_secret() {
        let kp = KeyPair::generate();
        let debug = format!("{kp:?}");
        assert!(debug.contains(&kp.key_id_hex()));
        assert!(!debug.contains(&hex::encode(kp.secret_key_bytes().as_slice())));
    }
}
