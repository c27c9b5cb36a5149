//! Key file loading and generation on a real filesystem.

use vigil_crypto::{CryptoError, KeyPair, PublicKey};

#[test]
fn write_new_then_load_yields_same_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys").join("private.key");

    let written = KeyPair::write_new(&path).unwrap();
    assert_eq!(std::fs::read(&path).unwrap().len(), 32);

    let loaded = KeyPair::load(&path).unwrap();
    assert_eq!(written.public_key_bytes(), loaded.public_key_bytes());
}

#[test]
fn write_new_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("private.key");

    KeyPair::write_new(&path).unwrap();
    let err = KeyPair::write_new(&path).unwrap_err();
    assert!(matches!(err, CryptoError::KeyFile { .. }));
}

#[cfg(unix)]
#[test]
fn private_key_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("private.key");
    KeyPair::write_new(&path).unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn load_accepts_hex_encoded_private_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("private.hex");

    let original = KeyPair::generate();
    std::fs::write(
        &path,
        format!("{}\n", hex::encode(original.secret_key_bytes().as_slice())),
    )
    .unwrap();

    let loaded = KeyPair::load(&path).unwrap();
    assert_eq!(original.public_key_bytes(), loaded.public_key_bytes());
}

#[test]
fn public_key_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("public.key");

    let public = KeyPair::generate().export_public_key();
    public.save(&path).unwrap();

    assert_eq!(PublicKey::load(&path).unwrap(), public);
}

#[test]
fn public_key_load_accepts_base64_and_raw() {
    let dir = tempfile::tempdir().unwrap();
    let public = KeyPair::generate().export_public_key();

    let b64 = dir.path().join("public.b64");
    std::fs::write(&b64, public.to_base64()).unwrap();
    assert_eq!(PublicKey::load(&b64).unwrap(), public);

    let raw = dir.path().join("public.raw");
    std::fs::write(&raw, public.as_bytes()).unwrap();
    assert_eq!(PublicKey::load(&raw).unwrap(), public);
}

#[test]
fn missing_key_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.key");

    let err = KeyPair::load(&path).unwrap_err();
    assert!(err.to_string().contains("absent.key"));
}

#[cfg(unix)]
#[test]
fn symlinked_key_file_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("real.key");
    KeyPair::write_new(&target).unwrap();

    let link = dir.path().join("link.key");
    std::os::unix::fs::symlink(&target, &link).unwrap();

    assert!(matches!(
        KeyPair::load(&link),
        Err(CryptoError::KeyFile { .. })
    ));
}
