use std::io::Write;

use owo_colors::OwoColorize;

use refstyle_core::links::scholar_search_url;
use refstyle_core::{
    Analysis, AnalyzedEntry, Boundary, Component, ConfidenceLevel, LinkCheck, LinkStatus,
    ReferenceSection, Severity,
};
use refstyle_parsing::SplitResult;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn boundary_text(boundary: &Boundary) -> String {
    match boundary {
        Boundary::Header { line, header } => format!("header \"{}\" at line {}", header, line + 1),
        Boundary::ContentPattern { line } => {
            format!("no header, reference-like lines from line {}", line + 1)
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_string(),
    }
}

fn print_banner(w: &mut dyn Write, title: &str, color: ColorMode) -> std::io::Result<()> {
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", title.bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "{}", title)?;
        writeln!(w, "{}", sep)?;
    }
    Ok(())
}

/// Print the full analysis for a terminal.
pub fn print_report(
    w: &mut dyn Write,
    file_name: &str,
    analysis: &Analysis,
    scholar_links: bool,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w, "Analyzing references in {}...", file_name)?;
    let Some(section) = analysis.section.section() else {
        if color.enabled() {
            writeln!(w, "{}", "No references detected.".yellow())?;
        } else {
            writeln!(w, "No references detected.")?;
        }
        return Ok(());
    };
    writeln!(w, "Reference section: {}", boundary_text(&section.boundary))?;
    writeln!(w, "Found {} references", analysis.entries.len())?;
    if analysis.split_stats.noise > 0 {
        let msg = format!(
            "(Discarded {} non-reference fragments)",
            analysis.split_stats.noise
        );
        if color.enabled() {
            writeln!(w, "{}", msg.dimmed())?;
        } else {
            writeln!(w, "{}", msg)?;
        }
    }

    for e in &analysis.entries {
        print_entry(w, e, scholar_links, color)?;
    }

    print_summary(w, analysis, color)
}

fn print_entry(
    w: &mut dyn Write,
    e: &AnalyzedEntry,
    scholar_links: bool,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    let num = format!("[{}]", e.entry.index + 1);
    let style = format!(
        "{} ({:.2}, {})",
        e.style_match.label(),
        e.style_match.confidence,
        e.style_match.level().label()
    );
    if color.enabled() {
        let style = if !e.style_match.is_known() {
            style.red().to_string()
        } else {
            match e.style_match.level() {
                ConfidenceLevel::High => style.green().to_string(),
                ConfidenceLevel::Medium => style.yellow().to_string(),
                ConfidenceLevel::Low => style.red().to_string(),
            }
        };
        writeln!(w, "{} {}", num.bold().yellow(), style)?;
        writeln!(w, "  {}", truncate(&e.entry.text, 200).dimmed())?;
    } else {
        writeln!(w, "{} {}", num, style)?;
        writeln!(w, "  {}", truncate(&e.entry.text, 200))?;
    }

    for component in [
        Component::Authors,
        Component::Year,
        Component::Title,
        Component::Source,
    ] {
        let label = format!("{}:", component.name());
        let value = e.components.display(component);
        if color.enabled() && !e.components.has(component) {
            writeln!(w, "  {:<9}{}", label, value.red())?;
        } else {
            writeln!(w, "  {:<9}{}", label, value)?;
        }
    }

    for link in &e.links {
        write_link_line(w, link, color)?;
    }

    for issue in &e.validation.issues {
        match (issue.severity, color.enabled()) {
            (Severity::Error, true) => writeln!(w, "  {} {}", "ERROR:".red().bold(), issue.message)?,
            (Severity::Warning, true) => writeln!(w, "  {} {}", "WARNING:".yellow(), issue.message)?,
            (severity, false) => writeln!(
                w,
                "  {}: {}",
                severity.label().to_uppercase(),
                issue.message
            )?,
        }
    }

    if scholar_links {
        writeln!(w, "  Scholar: {}", scholar_search_url(e.entry.body()))?;
    }
    Ok(())
}

fn write_link_line(w: &mut dyn Write, link: &LinkCheck, color: ColorMode) -> std::io::Result<()> {
    let target = link.normalized.as_deref().unwrap_or(&link.raw);
    let status = match link.status.reason() {
        Some(reason) => format!("{} ({})", link.status.label(), reason),
        None => link.status.label().to_string(),
    };
    if color.enabled() {
        let status = match link.status {
            LinkStatus::Valid => status.green().to_string(),
            LinkStatus::Invalid { .. } => status.red().to_string(),
            LinkStatus::Unverified { .. } => status.yellow().to_string(),
            LinkStatus::Unchecked => status.dimmed().to_string(),
        };
        writeln!(w, "  {} {} {}", link.kind.label().bold(), target, status)?;
    } else {
        writeln!(w, "  {} {} {}", link.kind.label(), target, status)?;
    }
    Ok(())
}

/// Print style distribution, consistency and in-text citation checks.
fn print_summary(w: &mut dyn Write, analysis: &Analysis, color: ColorMode) -> std::io::Result<()> {
    writeln!(w)?;
    print_banner(w, "SUMMARY", color)?;

    writeln!(w, "  References analyzed: {}", analysis.entries.len())?;
    for share in analysis.style_distribution() {
        writeln!(
            w,
            "    {:<8} {:>4}  ({:.1}%)",
            share.label(),
            share.count,
            share.percentage
        )?;
    }
    writeln!(w)?;

    let consistency = &analysis.consistency;
    match (&consistency.warning, consistency.dominant) {
        (Some(warning), _) => {
            if color.enabled() {
                writeln!(w, "  {} {}", "Consistency:".yellow(), warning)?;
            } else {
                writeln!(w, "  Consistency: {}", warning)?;
            }
        }
        (None, Some(style)) => {
            if color.enabled() {
                writeln!(w, "  {} all {}", "Consistency:".green(), style.name())?;
            } else {
                writeln!(w, "  Consistency: all {}", style.name())?;
            }
        }
        (None, None) => writeln!(w, "  Consistency: no classified entries")?,
    }

    let errors: usize = analysis
        .entries
        .iter()
        .map(|e| e.validation.errors().count())
        .sum();
    let warnings: usize = analysis
        .entries
        .iter()
        .map(|e| e.validation.warnings().count())
        .sum();
    if color.enabled() && errors > 0 {
        writeln!(w, "  {} {}", "Format errors:".red(), errors)?;
    } else {
        writeln!(w, "  Format errors: {}", errors)?;
    }
    writeln!(w, "  Warnings: {}", warnings)?;

    let in_text = &analysis.in_text;
    if !in_text.is_empty() {
        writeln!(
            w,
            "  In-text citations: {} numeric, {} author-year",
            in_text.numeric.len(),
            in_text.author_year.len()
        )?;
        if !in_text.unresolved.is_empty() {
            let msg = format!(
                "Cited but not listed: {}",
                join_numbers(&in_text.unresolved)
            );
            if color.enabled() {
                writeln!(w, "    {}", msg.red())?;
            } else {
                writeln!(w, "    {}", msg)?;
            }
        }
        if !in_text.uncited.is_empty() {
            writeln!(
                w,
                "    Listed but never cited: {}",
                join_numbers(&in_text.uncited)
            )?;
        }
    }

    let links: Vec<&LinkCheck> = analysis.links().collect();
    if !links.is_empty() {
        let count = |label: &str| links.iter().filter(|l| l.status.label() == label).count();
        let msg = format!(
            "Links: {} found, {} valid, {} invalid, {} unverified",
            links.len(),
            count("valid"),
            count("invalid"),
            count("unverified")
        );
        if color.enabled() {
            writeln!(w, "  {}", msg.dimmed())?;
        } else {
            writeln!(w, "  {}", msg)?;
        }
    }
    writeln!(w)?;
    Ok(())
}

fn join_numbers(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(|n| format!("[{}]", n))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Message for `segment` when no reference list was located.
pub fn print_no_references(
    w: &mut dyn Write,
    file_name: &str,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(
            w,
            "{} {}: no references detected",
            "DRY RUN:".bold().cyan(),
            file_name.bold()
        )
    } else {
        writeln!(w, "DRY RUN: {}: no references detected", file_name)
    }
}

/// Dry-run listing of the reference section and its entries.
pub fn print_segmentation(
    w: &mut dyn Write,
    file_name: &str,
    section: &ReferenceSection,
    split: &SplitResult,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(
            w,
            "{} {} ({})\n",
            "DRY RUN:".bold().cyan(),
            file_name.bold(),
            boundary_text(&section.boundary)
        )?;
    } else {
        writeln!(
            w,
            "DRY RUN: {} ({})\n",
            file_name,
            boundary_text(&section.boundary)
        )?;
    }

    for entry in &split.entries {
        let num = match entry.number {
            Some(n) => format!("[{}] #{}", entry.index + 1, n),
            None => format!("[{}]", entry.index + 1),
        };
        if color.enabled() {
            writeln!(w, "{}", num.bold().yellow())?;
        } else {
            writeln!(w, "{}", num)?;
        }
        writeln!(w, "  {}", entry.text)?;
    }

    writeln!(w)?;
    writeln!(
        w,
        "Total: {} entries ({} candidates, {} discarded as noise)",
        split.entries.len(),
        split.stats.total_raw,
        split.stats.noise
    )
}

/// One line per link for `check-links`.
pub fn print_link_check(w: &mut dyn Write, link: &LinkCheck, color: ColorMode) -> std::io::Result<()> {
    if let Some(normalized) = link.normalized.as_deref()
        && normalized != link.raw.trim()
    {
        writeln!(w, "{} (from {})", normalized, link.raw)?;
    } else {
        writeln!(w, "{}", link.raw)?;
    }
    write_link_line(w, link, color)
}
