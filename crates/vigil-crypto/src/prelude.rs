//! Prelude module - commonly used types for convenient import.
//!
//! Use `use vigil_crypto::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust
//! use vigil_crypto::prelude::*;
//!
//! let keypair = KeyPair::generate();
//! let public: PublicKey = keypair.export_public_key();
//! let signature: Signature = keypair.sign(b"hello");
//! assert!(public.verify(b"hello", &signature).is_ok());
//! ```

// Errors
pub use crate::{CryptoError, CryptoResult};

// Key types
pub use crate::{KeyPair, PublicKey};

// Signature
pub use crate::Signature;
