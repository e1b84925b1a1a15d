use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use refstyle_core::{
    Analysis, AnalyzedEntry, Boundary, Component, ConsistencyVerdict, InTextCitations, Issue,
    LinkCheck, SectionOutcome, SplitStats, StyleShare, links::scholar_search_url,
};

use crate::types::{ExportFormat, ReportOptions};

const TITLE: &str = "Reference Style Report";

/// Render `analysis` in the given format.
///
/// Output depends only on its inputs, so identical analyses render to
/// identical bytes.
pub fn render_report(analysis: &Analysis, options: &ReportOptions, format: ExportFormat) -> String {
    match format {
        ExportFormat::Text => export_text(analysis, options),
        ExportFormat::Markdown => export_markdown(analysis, options),
        ExportFormat::Json => export_json(analysis, options),
    }
}

/// Render `analysis` and write it to `path`.
pub fn export_report(
    analysis: &Analysis,
    options: &ReportOptions,
    format: ExportFormat,
    path: &Path,
) -> Result<(), String> {
    let content = render_report(analysis, options, format);

    let mut file =
        std::fs::File::create(path).map_err(|e| format!("Failed to create file: {}", e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| format!("Failed to write: {}", e))?;
    tracing::debug!(path = %path.display(), %format, "report written");
    Ok(())
}

fn section_summary(section: &SectionOutcome) -> String {
    match section.section().map(|s| &s.boundary) {
        Some(Boundary::Header { line, header }) => {
            format!("header \"{}\" at line {}", header, line + 1)
        }
        Some(Boundary::ContentPattern { line }) => {
            format!("no header, detected by content at line {}", line + 1)
        }
        None => "not found (no references detected)".to_string(),
    }
}

fn consistency_summary(verdict: &ConsistencyVerdict) -> String {
    match (&verdict.warning, verdict.dominant) {
        (Some(warning), _) => warning.clone(),
        (None, Some(style)) => format!("consistent ({})", style.name()),
        (None, None) => "no classified entries".to_string(),
    }
}

fn bracket_list(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(|n| format!("[{}]", n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn link_target(link: &LinkCheck) -> &str {
    link.normalized.as_deref().unwrap_or(&link.raw)
}

fn link_status(link: &LinkCheck) -> String {
    match link.status.reason() {
        Some(reason) => format!("{} ({})", link.status.label(), reason),
        None => link.status.label().to_string(),
    }
}

fn style_line(e: &AnalyzedEntry) -> String {
    format!(
        "{} (confidence {:.2}, {})",
        e.style_match.label(),
        e.style_match.confidence,
        e.style_match.level().label()
    )
}

// ── Text ─────────────────────────────────────────────────────────────

fn export_text(analysis: &Analysis, options: &ReportOptions) -> String {
    let mut out = String::from(TITLE);
    out.push('\n');
    out.push_str(&"=".repeat(60));
    out.push('\n');

    if !options.source_name.is_empty() {
        out.push_str(&format!("Source: {}\n", options.source_name));
    }
    out.push_str(&format!(
        "Reference section: {}\n",
        section_summary(&analysis.section)
    ));
    out.push_str(&format!(
        "References: {} ({} candidates discarded as noise)\n",
        analysis.entries.len(),
        analysis.split_stats.noise
    ));

    let shares = analysis.style_distribution();
    if !shares.is_empty() {
        out.push_str("\nStyle distribution\n");
        out.push_str(&"-".repeat(18));
        out.push('\n');
        for share in &shares {
            out.push_str(&format!(
                "  {:<8} {:>4}  {:>5.1}%\n",
                share.label(),
                share.count,
                share.percentage
            ));
        }
    }

    out.push_str(&format!(
        "\nConsistency: {}\n",
        consistency_summary(&analysis.consistency)
    ));
    write_text_in_text(&mut out, &analysis.in_text);

    if !analysis.entries.is_empty() {
        out.push_str("\nEntries\n");
        out.push_str(&"-".repeat(7));
        out.push('\n');
    }
    for e in &analysis.entries {
        write_text_entry(&mut out, e, options);
    }
    out
}

fn write_text_in_text(out: &mut String, in_text: &InTextCitations) {
    if in_text.is_empty() {
        out.push_str("In-text citations: none found\n");
        return;
    }
    out.push_str(&format!(
        "In-text citations: {} numeric, {} author-year, in {} sentences\n",
        in_text.numeric.len(),
        in_text.author_year.len(),
        in_text.sentences.len()
    ));
    if !in_text.unresolved.is_empty() {
        out.push_str(&format!(
            "  Cited but not in the reference list: {}\n",
            bracket_list(&in_text.unresolved)
        ));
    }
    if !in_text.uncited.is_empty() {
        out.push_str(&format!(
            "  Listed but never cited: {}\n",
            bracket_list(&in_text.uncited)
        ));
    }
}

fn write_text_entry(out: &mut String, e: &AnalyzedEntry, options: &ReportOptions) {
    out.push_str(&format!("\n{:>3}. {}\n", e.entry.index + 1, e.entry.text));
    out.push_str(&format!("     Style: {}\n", style_line(e)));
    for component in Component::ALL {
        out.push_str(&format!(
            "     {:<10} {}\n",
            format!("{}:", component.name()),
            e.components.display(component)
        ));
    }
    for link in &e.links {
        out.push_str(&format!(
            "     {} {}: {}\n",
            link.kind.label(),
            link_target(link),
            link_status(link)
        ));
    }
    for issue in &e.validation.issues {
        out.push_str(&format!(
            "     {}: {}\n",
            issue.severity.label().to_uppercase(),
            issue.message
        ));
    }
    if options.scholar_links {
        out.push_str(&format!(
            "     Scholar: {}\n",
            scholar_search_url(e.entry.body())
        ));
    }
}

// ── Markdown ─────────────────────────────────────────────────────────

fn md_escape(s: &str) -> String {
    s.replace('|', "\\|")
}

fn export_markdown(analysis: &Analysis, options: &ReportOptions) -> String {
    let mut out = format!("# {}\n\n", TITLE);

    if !options.source_name.is_empty() {
        out.push_str(&format!("**Source:** {}  \n", md_escape(&options.source_name)));
    }
    out.push_str(&format!(
        "**Reference section:** {}  \n",
        section_summary(&analysis.section)
    ));
    out.push_str(&format!(
        "**References:** {} ({} discarded as noise)\n\n",
        analysis.entries.len(),
        analysis.split_stats.noise
    ));

    let shares = analysis.style_distribution();
    if !shares.is_empty() {
        out.push_str("## Style distribution\n\n");
        out.push_str("| Style | Count | Share |\n|---|---:|---:|\n");
        for share in &shares {
            out.push_str(&format!(
                "| {} | {} | {:.1}% |\n",
                share.label(),
                share.count,
                share.percentage
            ));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "**Consistency:** {}\n\n",
        consistency_summary(&analysis.consistency)
    ));

    let in_text = &analysis.in_text;
    if !in_text.is_empty() {
        out.push_str("## In-text citations\n\n");
        out.push_str(&format!(
            "- {} numeric, {} author-year\n",
            in_text.numeric.len(),
            in_text.author_year.len()
        ));
        if !in_text.unresolved.is_empty() {
            out.push_str(&format!(
                "- Cited but not in the reference list: {}\n",
                bracket_list(&in_text.unresolved)
            ));
        }
        if !in_text.uncited.is_empty() {
            out.push_str(&format!(
                "- Listed but never cited: {}\n",
                bracket_list(&in_text.uncited)
            ));
        }
        out.push('\n');
    }

    if !analysis.entries.is_empty() {
        out.push_str("## Entries\n\n");
    }
    for e in &analysis.entries {
        write_md_entry(&mut out, e, options);
    }
    out
}

fn write_md_entry(out: &mut String, e: &AnalyzedEntry, options: &ReportOptions) {
    out.push_str(&format!("### {}. {}\n\n", e.entry.index + 1, style_line(e)));
    out.push_str(&format!("> {}\n\n", e.entry.text));

    out.push_str("| Component | Value |\n|---|---|\n");
    for component in Component::ALL {
        out.push_str(&format!(
            "| {} | {} |\n",
            component.name(),
            md_escape(e.components.display(component))
        ));
    }
    out.push('\n');

    for link in &e.links {
        out.push_str(&format!(
            "- {} `{}`: {}\n",
            link.kind.label(),
            link_target(link),
            link_status(link)
        ));
    }
    for issue in &e.validation.issues {
        out.push_str(&format!(
            "- **{}:** {}\n",
            issue.severity.label(),
            issue.message
        ));
    }
    if options.scholar_links {
        out.push_str(&format!(
            "- [Google Scholar]({})\n",
            scholar_search_url(e.entry.body())
        ));
    }
    out.push('\n');
}

// ── JSON ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JsonReport<'a> {
    source: &'a str,
    reference_count: usize,
    min_confidence: f64,
    section: &'a SectionOutcome,
    split: &'a SplitStats,
    style_distribution: Vec<StyleShare>,
    consistency: &'a ConsistencyVerdict,
    in_text: &'a InTextCitations,
    entries: Vec<JsonEntry<'a>>,
}

#[derive(Serialize)]
struct JsonEntry<'a> {
    index: usize,
    number: Option<u32>,
    text: &'a str,
    style: &'static str,
    confidence: f64,
    level: &'static str,
    matched_rules: &'a [String],
    components: BTreeMap<&'static str, &'a str>,
    issues: &'a [Issue],
    links: &'a [LinkCheck],
    #[serde(skip_serializing_if = "Option::is_none")]
    scholar_url: Option<String>,
}

fn json_entry<'a>(e: &'a AnalyzedEntry, options: &ReportOptions) -> JsonEntry<'a> {
    JsonEntry {
        index: e.entry.index,
        number: e.entry.number,
        text: &e.entry.text,
        style: e.style_match.label(),
        confidence: e.style_match.confidence,
        level: e.style_match.level().label(),
        matched_rules: &e.style_match.matched_rules,
        components: Component::ALL
            .into_iter()
            .map(|c| (c.name(), e.components.display(c)))
            .collect(),
        issues: &e.validation.issues,
        links: &e.links,
        scholar_url: options
            .scholar_links
            .then(|| scholar_search_url(e.entry.body())),
    }
}

fn export_json(analysis: &Analysis, options: &ReportOptions) -> String {
    let report = JsonReport {
        source: &options.source_name,
        reference_count: analysis.entries.len(),
        min_confidence: analysis.min_confidence,
        section: &analysis.section,
        split: &analysis.split_stats,
        style_distribution: analysis.style_distribution(),
        consistency: &analysis.consistency,
        in_text: &analysis.in_text,
        entries: analysis
            .entries
            .iter()
            .map(|e| json_entry(e, options))
            .collect(),
    };

    match serde_json::to_string_pretty(&report) {
        Ok(mut json) => {
            json.push('\n');
            json
        }
        Err(e) => {
            tracing::error!("failed to serialize report: {}", e);
            String::from("{}\n")
        }
    }
}
