//! Export command - stream matching records as CSV.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use vigil_audit::{Audit, FilterMap, csv_header};

use crate::theme::Theme;

/// Write every matching record, oldest first, to `output` or stdout.
pub(crate) fn export_csv(
    audit: &Audit,
    filters: &FilterMap,
    output: Option<&Path>,
    header: bool,
) -> anyhow::Result<()> {
    let lines = audit.csv_export(filters)?;

    let written = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let n = write_lines(BufWriter::new(file), lines, header)?;
            eprintln!(
                "{}",
                Theme::success(&format!("Exported {n} records to {}", path.display()))
            );
            n
        },
        None => write_lines(BufWriter::new(std::io::stdout().lock()), lines, header)?,
    };

    tracing::info!(records = written, "csv export finished");
    Ok(())
}

fn write_lines<W: Write>(
    mut out: W,
    lines: impl Iterator<Item = vigil_audit::AuditResult<String>>,
    header: bool,
) -> anyhow::Result<u64> {
    if header {
        writeln!(out, "{}", csv_header())?;
    }
    let mut n: u64 = 0;
    for line in lines {
        writeln!(out, "{}", line?)?;
        n = n.saturating_add(1);
    }
    out.flush()?;
    Ok(n)
}
