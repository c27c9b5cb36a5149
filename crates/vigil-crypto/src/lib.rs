//! Vigil Crypto - Ed25519 key material for signing audit records.
//!
//! This crate provides:
//! - Ed25519 key pairs whose secret half is zeroized on drop
//! - Public keys that can be shipped to read-only verifiers
//! - Signatures with a stable base64 text form for storage columns
//! - Key file loading and generation
//!
//! Writers hold the private key and sign each finalized record. Readers only
//! need the public key to recompute and check signatures, so a database copy
//! can be verified by a process that never sees the secret.
//!
//! # Example
//!
//! ```
//! use vigil_crypto::{KeyPair, Signature};
//!
//! let keypair = KeyPair::generate();
//! let signature = keypair.sign(b"action=login");
//!
//! let stored = signature.to_base64();
//! let restored = Signature::from_base64(&stored).unwrap();
//!
//! let public = keypair.export_public_key();
//! assert!(public.verify(b"action=login", &restored).is_ok());
//! assert!(public.verify(b"action=logout", &restored).is_err());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod keypair;
mod signature;

pub use error::{CryptoError, CryptoResult};
pub use keypair::{KeyPair, PublicKey};
pub use signature::Signature;
