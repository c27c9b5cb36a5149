//! Keys command - create signing key material.

use std::path::Path;

use anyhow::Context;
use vigil_crypto::KeyPair;

use crate::theme::Theme;

/// File name of the generated private key.
pub(crate) const PRIVATE_KEY_FILE: &str = "private.key";
/// File name of the generated public key.
pub(crate) const PUBLIC_KEY_FILE: &str = "public.key";

/// Generate a key pair in `dir`. Never overwrites existing keys.
pub(crate) fn generate(dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let private_path = dir.join(PRIVATE_KEY_FILE);
    let public_path = dir.join(PUBLIC_KEY_FILE);
    if public_path.exists() {
        anyhow::bail!("{} already exists; refusing to overwrite", public_path.display());
    }

    let key = KeyPair::write_new(&private_path)?;
    key.export_public_key().save(&public_path)?;

    println!("{}", Theme::success("New audit signing key generated."));
    println!("  Key ID:      {}", key.key_id_hex());
    println!("  Private key: {}", private_path.display());
    println!("  Public key:  {}", public_path.display());
    println!();
    println!("{}", Theme::dimmed("Add to your config:"));
    println!("{}", Theme::dimmed("  [audit]"));
    println!(
        "{}",
        Theme::dimmed(&format!("  private_key = {:?}", private_path.display().to_string()))
    );
    println!(
        "{}",
        Theme::dimmed(&format!("  public_key = {:?}", public_path.display().to_string()))
    );
    Ok(())
}
