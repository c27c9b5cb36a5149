//! Search, count and columns commands.

use std::fmt::Write as _;

use colored::Colorize;
use vigil_audit::{
    Audit, AuditPage, AuditSettings, COLUMNS, ColumnConstraints, ColumnKind, FilterMap,
    SearchOptions, parse_time_limit,
};

use crate::theme::Theme;

/// Print one page of matching records.
pub(crate) fn search(
    audit: &Audit,
    filters: &FilterMap,
    options: &SearchOptions,
    json: bool,
) -> anyhow::Result<()> {
    let page = audit.search(filters, options)?;

    if json {
        let out = serde_json::json!({
            "count": page.total,
            "current": page.current,
            "prev": page.prev,
            "next": page.next,
            "entries": page.items.iter().map(|v| v.to_json()).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_page(&page);
    Ok(())
}

fn print_page(page: &AuditPage) {
    if page.items.is_empty() {
        println!("{}", Theme::info("No matching audit records"));
        return;
    }

    println!("\n{}", Theme::header("Audit Records"));
    println!(
        "{:<19} {:<24} {:<16} {:<16} {:<7} {}",
        "DATE".dimmed(),
        "ACTION".dimmed(),
        "USER".dimmed(),
        "SERIAL".dimmed(),
        "SUCCESS".dimmed(),
        "SIG".dimmed()
    );
    println!("{}", Theme::separator());

    for item in &page.items {
        let r = &item.record;
        let cell = |name: &str| r.get(name).map(ToString::to_string).unwrap_or_default();
        println!(
            "{:<19} {:<24} {:<16} {:<16} {:<7} {}",
            Theme::timestamp(&r.timestamp),
            cell("action"),
            cell("user"),
            cell("serial"),
            cell("success"),
            Theme::sig_check(item.sig_check)
        );
    }

    println!("{}", Theme::separator());
    let mut footer = format!(
        "page {} of {} records ({} per page)",
        page.current, page.total, page.page_size
    );
    if let Some(prev) = page.prev {
        let _ = write!(footer, ", prev {prev}");
    }
    if let Some(next) = page.next {
        let _ = write!(footer, ", next {next}");
    }
    println!("{}\n", Theme::dimmed(&footer));
}

/// Print the number of matching records.
pub(crate) fn count(
    audit: &Audit,
    filters: &FilterMap,
    success: Option<bool>,
    since: Option<&str>,
) -> anyhow::Result<()> {
    let delta = since.map(parse_time_limit).transpose()?;
    println!("{}", audit.get_count(filters, success, delta)?);
    Ok(())
}

/// List searchable columns with their effective widths.
pub(crate) fn columns(settings: &AuditSettings) {
    let constraints = settings
        .column_limits
        .iter()
        .fold(ColumnConstraints::default(), |table, (name, bound)| {
            table.with_bound(name.clone(), *bound)
        });

    println!("\n{}", Theme::header("Audit Columns"));
    println!("{:<16} {:<6} {}", "NAME".dimmed(), "KIND".dimmed(), "MAX".dimmed());
    println!("{}", Theme::separator());
    for col in COLUMNS {
        let kind = match col.kind {
            ColumnKind::Text => "text",
            ColumnKind::Bool => "bool",
            ColumnKind::Int => "int",
        };
        let max = if col.name == vigil_audit::POLICIES {
            constraints.policies_bound().to_string()
        } else {
            constraints
                .max_length(col.name)
                .map_or_else(|| "-".to_string(), |n| n.to_string())
        };
        println!("{:<16} {:<6} {max}", col.name, kind);
    }
    println!();
}
