//! Verify command - check every matching record's signature.

use vigil_audit::{Audit, FilterMap};

use crate::theme::Theme;

/// Verify all matching records. Fails when any signature does not verify.
pub(crate) fn verify_records(audit: &Audit, filters: &FilterMap) -> anyhow::Result<()> {
    if audit.signer().verifying_key().is_none() {
        println!(
            "{}",
            Theme::warning("No verification key configured; signatures cannot be checked.")
        );
    }

    let report = audit.integrity_report(filters)?;

    if report.is_intact() {
        println!(
            "{}",
            Theme::success(&format!(
                "{} records checked: {} OK, {} unsigned",
                report.total(),
                report.ok,
                report.unsigned
            ))
        );
        return Ok(());
    }

    println!(
        "{}",
        Theme::error(&format!(
            "{} of {} records failed verification:",
            report.failed,
            report.total()
        ))
    );
    for id in &report.failed_ids {
        println!("  - {id}");
    }
    anyhow::bail!("{} audit records failed verification", report.failed)
}
