//! Canonical record encoding and Ed25519 signing.
//!
//! The signed message is a self-delimiting byte string that does not depend
//! on field insertion order or on how a store encodes values:
//!
//! ```text
//! "vigil-audit-record/v1"
//! id            16 bytes (UUID)
//! timestamp     i64 BE, microseconds since the Unix epoch
//! field count   u64 BE
//! per field, sorted by key:
//!   key         u64 BE length + UTF-8 bytes
//!   tag         1 byte
//!   payload     depends on tag (see below)
//! ```
//!
//! | tag | value | payload |
//! |---|---|---|
//! | 0 | null | none |
//! | 1 | bool | 1 byte, 0 or 1 |
//! | 2 | int | i64 BE |
//! | 3 | text | u64 BE length + UTF-8 bytes |
//! | 4 | timestamp | i64 BE microseconds |

use std::sync::Arc;

use vigil_crypto::{KeyPair, PublicKey, Signature};

use crate::record::{AuditRecord, FieldValue, SigCheck};

const DOMAIN: &[u8] = b"vigil-audit-record/v1";

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_TEXT: u8 = 3;
const TAG_TIMESTAMP: u8 = 4;

/// Canonical bytes of everything in `record` except its signature.
#[must_use]
pub fn canonical_bytes(record: &AuditRecord) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    out.extend_from_slice(DOMAIN);
    out.extend_from_slice(record.id.0.as_bytes());
    out.extend_from_slice(&record.timestamp.timestamp_micros().to_be_bytes());
    put_len(&mut out, record.fields.len());

    for (key, value) in &record.fields {
        put_bytes(&mut out, key.as_bytes());
        match value {
            FieldValue::Null => out.push(TAG_NULL),
            FieldValue::Bool(b) => {
                out.push(TAG_BOOL);
                out.push(u8::from(*b));
            },
            FieldValue::Int(n) => {
                out.push(TAG_INT);
                out.extend_from_slice(&n.to_be_bytes());
            },
            FieldValue::Text(s) => {
                out.push(TAG_TEXT);
                put_bytes(&mut out, s.as_bytes());
            },
            FieldValue::Timestamp(t) => {
                out.push(TAG_TIMESTAMP);
                out.extend_from_slice(&t.timestamp_micros().to_be_bytes());
            },
        }
    }
    out
}

fn put_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&u64::try_from(len).unwrap_or(u64::MAX).to_be_bytes());
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    put_len(out, bytes.len());
    out.extend_from_slice(bytes);
}

/// Sign the canonical form of `record`.
#[must_use]
pub fn sign_record(record: &AuditRecord, key: &KeyPair) -> Signature {
    key.sign(&canonical_bytes(record))
}

/// Check `signature` (base64 text) against the canonical form of `record`.
///
/// Returns `false` on any mismatch, undecodable signature or missing key.
#[must_use]
pub fn verify_record(record: &AuditRecord, signature: &str, key: Option<&PublicKey>) -> bool {
    let Some(key) = key else {
        return false;
    };
    let Ok(signature) = Signature::from_base64(signature) else {
        return false;
    };
    key.verify(&canonical_bytes(record), &signature).is_ok()
}

/// Key material used on the write path (signing) and the read path
/// (verification). Either half may be absent.
#[derive(Debug, Clone, Default)]
pub struct Signer {
    signing_key: Option<Arc<KeyPair>>,
    verifying_key: Option<PublicKey>,
}

impl Signer {
    /// Build from optional key halves. When only a private key is given,
    /// its public half is used for verification.
    #[must_use]
    pub fn new(signing_key: Option<Arc<KeyPair>>, verifying_key: Option<PublicKey>) -> Self {
        let verifying_key =
            verifying_key.or_else(|| signing_key.as_ref().map(|k| k.export_public_key()));
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Whether records written through this signer get a signature.
    #[must_use]
    pub fn can_sign(&self) -> bool {
        self.signing_key.is_some()
    }

    /// The verification key, if any.
    #[must_use]
    pub fn verifying_key(&self) -> Option<&PublicKey> {
        self.verifying_key.as_ref()
    }

    /// Attach a signature to `record`, replacing any previous one.
    /// Leaves the record unsigned when no private key is configured.
    pub fn sign(&self, record: &mut AuditRecord) {
        let signature = self
            .signing_key
            .as_ref()
            .map(|key| sign_record(record, key).to_base64());
        record.signature = signature;
    }

    /// Read-time signature status of `record`.
    #[must_use]
    pub fn check(&self, record: &AuditRecord) -> SigCheck {
        let Some(signature) = record.signature.as_deref() else {
            return SigCheck::NotApplicable;
        };
        if verify_record(record, signature, self.verifying_key.as_ref()) {
            SigCheck::Ok
        } else {
            tracing::warn!(record_id = %record.id, "audit record signature does not verify");
            SigCheck::Fail
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn record(pairs: &[(&str, FieldValue)]) -> AuditRecord {
        let fields = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>();
        AuditRecord::new(fields)
    }

    #[test]
    fn test_canonical_form_ignores_insertion_order() {
        let a = record(&[("user", "hans".into()), ("realm", "r1".into())]);
        let mut b = record(&[("realm", "r1".into()), ("user", "hans".into())]);
        b.id = a.id;
        b.timestamp = a.timestamp;
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
    }

    #[test]
    fn test_canonical_form_distinguishes_types() {
        let text = record(&[("success", "1".into())]);
        let mut int = record(&[("success", FieldValue::Int(1))]);
        let mut boolean = record(&[("success", FieldValue::Bool(true))]);
        int.id = text.id;
        int.timestamp = text.timestamp;
        boolean.id = text.id;
        boolean.timestamp = text.timestamp;

        assert_ne!(canonical_bytes(&text), canonical_bytes(&int));
        assert_ne!(canonical_bytes(&int), canonical_bytes(&boolean));
    }

    #[test]
    fn test_canonical_form_is_unambiguous_across_boundaries() {
        let a = record(&[("ab", "c".into())]);
        let mut b = record(&[("a", "bc".into())]);
        b.id = a.id;
        b.timestamp = a.timestamp;
        assert_ne!(canonical_bytes(&a), canonical_bytes(&b));
    }

    #[test]
    fn test_sign_then_check_ok() {
        let signer = Signer::new(Some(Arc::new(KeyPair::generate())), None);
        let mut rec = record(&[("serial", "kölbel".into()), ("success", true.into())]);
        signer.sign(&mut rec);

        assert!(rec.signature.is_some());
        assert_eq!(signer.check(&rec), SigCheck::Ok);
    }

    #[test]
    fn test_tampering_fails() {
        let signer = Signer::new(Some(Arc::new(KeyPair::generate())), None);
        let mut rec = record(&[("action", "login".into())]);
        signer.sign(&mut rec);

        rec.fields.insert("action".into(), "logout".into());
        assert_eq!(signer.check(&rec), SigCheck::Fail);
    }

    #[test]
    fn test_added_field_fails() {
        let signer = Signer::new(Some(Arc::new(KeyPair::generate())), None);
        let mut rec = record(&[("action", "login".into())]);
        signer.sign(&mut rec);

        rec.fields.insert("info".into(), FieldValue::Null);
        assert_eq!(signer.check(&rec), SigCheck::Fail);
    }

    #[test]
    fn test_unsigned_is_not_applicable() {
        let signer = Signer::default();
        let mut rec = record(&[("action", "login".into())]);
        signer.sign(&mut rec);

        assert!(rec.signature.is_none());
        assert_eq!(signer.check(&rec), SigCheck::NotApplicable);
    }

    #[test]
    fn test_missing_public_key_fails() {
        let key = KeyPair::generate();
        let mut rec = record(&[("action", "login".into())]);
        rec.signature = Some(sign_record(&rec, &key).to_base64());

        assert_eq!(Signer::default().check(&rec), SigCheck::Fail);
    }

    #[test]
    fn test_garbage_signature_fails() {
        let signer = Signer::new(Some(Arc::new(KeyPair::generate())), None);
        let mut rec = record(&[("action", "login".into())]);
        rec.signature = Some("####".into());
        assert_eq!(signer.check(&rec), SigCheck::Fail);
    }

    #[test]
    fn test_verify_only_signer() {
        let key = KeyPair::generate();
        let reader = Signer::new(None, Some(key.export_public_key()));
        let mut rec = record(&[("user", "hans".into())]);
        rec.signature = Some(sign_record(&rec, &key).to_base64());

        assert!(!reader.can_sign());
        assert_eq!(reader.check(&rec), SigCheck::Ok);
        assert!(!verify_record(&rec, rec.signature.as_deref().unwrap(), None));
    }
}
