//! Log command - write one signed record.

use anyhow::Context;
use vigil_audit::Audit;

use super::field_value;
use crate::theme::Theme;

/// Finalize one record built from `fields` and `policies`.
pub(crate) fn write_record(
    audit: &Audit,
    fields: &[(String, String)],
    policies: &[String],
) -> anyhow::Result<()> {
    if fields.is_empty() && policies.is_empty() {
        anyhow::bail!("nothing to log: pass at least one --field or --policy");
    }

    let mut session = audit.session();
    session.log(fields.iter().map(|(k, v)| (k.as_str(), field_value(k, v))));
    session.add_policy(policies.to_vec());
    let id = session.finalize().context("failed to write audit record")?;

    let signed = if audit.signer().can_sign() {
        "signed"
    } else {
        "unsigned"
    };
    println!("{}", Theme::success(&format!("Record {id} written ({signed})")));
    Ok(())
}
