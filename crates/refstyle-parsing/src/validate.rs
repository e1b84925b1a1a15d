//! Per-entry style validation and document-level consistency.

use once_cell::sync::Lazy;
use regex::Regex;

use refstyle_core::links::{host_of, is_valid_acm_url};
use refstyle_core::{
    AnalyzedEntry, CitationStyle, Component, ComponentSet, ConsistencyVerdict, Issue, LinkCheck,
    LinkKind, LinkStatus, ReferenceEntry, StyleCount, StyleMatch, ValidationResult,
};

static QUOTED_TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["“][^"”]+["”]"#).unwrap());
static LAST_FIRST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\p{Lu}[\p{L}'\-]+,\s+\p{Lu}\p{Ll}+").unwrap());
static PAREN_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((?:[A-Za-z]+\.?\s+)?(?:19|20)\d{2}[a-z]?\)").unwrap());
static MALFORMED_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\(|,\s)(?P<year>\d{3}|\d{5})[a-z]?(?:\)|\.\s*$)").unwrap()
});
static MONTH_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\((?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s+(?:19|20)\d{2}\)",
    )
    .unwrap()
});

/// Check one entry against the formatting rules of its style.
///
/// Missing authors, year or title are warnings; violations of a rule that
/// defines the style (such as APA's parenthesized year) are errors.
pub fn validate(
    entry: &ReferenceEntry,
    style_match: &StyleMatch,
    components: &ComponentSet,
    links: &[LinkCheck],
) -> ValidationResult {
    let mut result = ValidationResult::default();
    let body = entry.body();

    let malformed_year = if components.has(Component::Year) {
        None
    } else {
        MALFORMED_YEAR_RE.captures(body).map(|c| c["year"].to_string())
    };
    for (component, message) in [
        (Component::Authors, "Missing authors"),
        (Component::Year, "Missing publication year"),
        (Component::Title, "Missing title"),
    ] {
        if component == Component::Year && malformed_year.is_some() {
            continue;
        }
        if !components.has(component) {
            result.push(Issue::warning(message));
        }
    }
    if let Some(year) = malformed_year {
        result.push(Issue::error(format!("Malformed publication year: {}", year)));
    }

    match style_match.style {
        Some(CitationStyle::Apa) => validate_apa(body, components, &mut result),
        Some(CitationStyle::Mla) => validate_mla(body, components, &mut result),
        Some(CitationStyle::Chicago) => validate_chicago(body, components, &mut result),
        Some(CitationStyle::Ieee) => validate_ieee(entry, components, &mut result),
        Some(CitationStyle::Acm) => validate_acm(body, components, &mut result),
        None => result.push(Issue::warning("Citation style could not be determined")),
    }

    for link in links {
        if let LinkStatus::Invalid { .. } = link.status {
            result.push(Issue::warning(format!(
                "Malformed {}: {}",
                link.kind.label(),
                link.raw
            )));
        } else if link.kind == LinkKind::Url
            && host_of(&link.raw).as_deref() == Some("dl.acm.org")
            && !is_valid_acm_url(&link.raw)
        {
            result.push(Issue::warning(format!(
                "ACM Digital Library link should point at a DOI page: {}",
                link.raw
            )));
        }
    }

    result
}

fn validate_apa(body: &str, components: &ComponentSet, result: &mut ValidationResult) {
    static AUTHOR_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^\p{Lu}[\p{L}'\-]+,\s+(?:\p{Lu}\.\s*)+").unwrap());
    static YEAR_AFTER_AUTHORS_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^[^()]{2,300}?\((?:19|20)\d{2}[a-z]?(?:,[^)]*)?\)").unwrap()
    });
    static AND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",?\s+and\s+\p{Lu}").unwrap());

    if let Some(authors) = components.get(Component::Authors) {
        if !AUTHOR_RE.is_match(authors) {
            result.push(Issue::warning(
                "Authors should be formatted as 'Last, F. M.'",
            ));
        }
        if AND_RE.is_match(authors) && !authors.contains('&') {
            result.push(Issue::warning("Use '&' before the last author"));
        }
        if authors.contains('&') && !authors.contains(", &") {
            result.push(Issue::warning(
                "Separate authors with commas, e.g. Smith, J., & Lee, K.",
            ));
        }
    }
    if !YEAR_AFTER_AUTHORS_RE.is_match(body) {
        result.push(Issue::error(
            "Year must appear in parentheses after the authors, e.g. (2020)",
        ));
    }
}

fn unmatched_quotes(body: &str) -> bool {
    body.matches('"').count() % 2 != 0 || body.matches('“').count() != body.matches('”').count()
}

fn validate_mla(body: &str, components: &ComponentSet, result: &mut ValidationResult) {
    if let Some(authors) = components.get(Component::Authors)
        && !LAST_FIRST_RE.is_match(authors)
    {
        result.push(Issue::warning(
            "First author should be formatted as 'Last, First'",
        ));
    }
    if unmatched_quotes(body) {
        result.push(Issue::error("Unmatched quotation marks around the title"));
    }
}

fn validate_chicago(body: &str, components: &ComponentSet, result: &mut ValidationResult) {
    static ISSUE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bno\.\s*\d+").unwrap());

    validate_mla(body, components, result);
    if ISSUE_RE.is_match(body) && !PAREN_YEAR_RE.is_match(body) {
        result.push(Issue::warning(
            "Journal year should follow the issue in parentheses, e.g. 12, no. 3 (2019)",
        ));
    }
}

fn validate_ieee(entry: &ReferenceEntry, components: &ComponentSet, result: &mut ValidationResult) {
    static BRACKET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\[\d+\]").unwrap());
    static PP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bpp?\.\s*\d").unwrap());

    if !BRACKET_RE.is_match(&entry.text) {
        result.push(Issue::error(
            "Entry should start with a bracketed number like [1]",
        ));
    }
    if !QUOTED_TITLE_RE.is_match(&entry.text) {
        result.push(Issue::warning("Title should be in quotation marks"));
    }
    if components.has(Component::Pages) && !PP_RE.is_match(&entry.text) {
        result.push(Issue::warning("Page ranges should be written as pp. 45-60"));
    }
    if let Some(year) = components.get(Component::Year)
        && !ieee_year_closes_entry(&entry.text, year)
    {
        result.push(Issue::warning(
            "Year should come last, just before the final period",
        ));
    }
}

/// IEEE puts the year last. Pages, a DOI or an article number may still
/// trail it in conference and early-access entries.
fn ieee_year_closes_entry(text: &str, year: &str) -> bool {
    const TRAILERS: [&str; 4] = [", pp", ", doi", ", Art", ", p."];
    text.match_indices(year).any(|(i, _)| {
        let rest = text[i + year.len()..].trim_start_matches(|c: char| c.is_ascii_lowercase());
        let rest = rest.trim_end();
        rest.is_empty() || rest.starts_with('.') || TRAILERS.iter().any(|t| rest.starts_with(t))
    })
}

/// `year` occurs followed by an optional letter suffix and a period.
fn year_followed_by_period(body: &str, year: &str) -> bool {
    body.match_indices(year).any(|(i, _)| {
        let mut rest = body[i + year.len()..].chars();
        match rest.next() {
            Some('.') => true,
            Some(c) if c.is_ascii_lowercase() => rest.next() == Some('.'),
            _ => false,
        }
    })
}

fn validate_acm(body: &str, components: &ComponentSet, result: &mut ValidationResult) {
    static INITIALS_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(?:\p{Lu}\.\s*)+\p{Lu}").unwrap());

    if let Some(authors) = components.get(Component::Authors) {
        if INITIALS_RE.is_match(authors) {
            result.push(Issue::warning(
                "Use full author names rather than initials",
            ));
        }
        if authors.contains(',') && !authors.contains(" and ") {
            result.push(Issue::warning("Join the last two authors with 'and'"));
        }
    }

    if let Some(year) = components.get(Component::Year)
        && !year_followed_by_period(body, year)
    {
        result.push(Issue::error("Year should be followed by a period"));
    }

    let proceedings = body.to_lowercase().contains("proceedings");
    if let Some(source) = components.get(Component::Source)
        && !source.starts_with("Proceedings")
        && !proceedings
        && !MONTH_YEAR_RE.is_match(body)
    {
        result.push(Issue::warning(
            "Journal citations should include the issue date, e.g. (Jan. 2020)",
        ));
    }
    if proceedings && !body.contains("In Proceedings of") {
        result.push(Issue::warning(
            "Conference papers should use 'In Proceedings of'",
        ));
    }
    if !components.has(Component::Doi) && !components.has(Component::Url) {
        result.push(Issue::warning("Include a DOI or URL"));
    }
}

/// Judge whether the confidently classified entries share one style.
///
/// Entries classified as Unknown do not count. The dominant style is the
/// most frequent one, ties going to the earlier style in priority order.
pub fn check_consistency(entries: &[AnalyzedEntry]) -> ConsistencyVerdict {
    check_style_consistency(entries.iter().map(|e| e.style_match.style))
}

/// [`check_consistency`] over bare style labels.
pub fn check_style_consistency(
    styles: impl IntoIterator<Item = Option<CitationStyle>>,
) -> ConsistencyVerdict {
    let mut counts = [0usize; CitationStyle::ALL.len()];
    for style in styles.into_iter().flatten() {
        counts[style.priority()] += 1;
    }

    let mut present: Vec<StyleCount> = CitationStyle::ALL
        .into_iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(style, count)| StyleCount { style, count })
        .collect();
    // Stable: equal counts stay in priority order
    present.sort_by(|a, b| b.count.cmp(&a.count));

    let mut iter = present.into_iter();
    let Some(dominant) = iter.next() else {
        return ConsistencyVerdict::default();
    };
    let outliers: Vec<StyleCount> = iter.collect();

    let warning = (!outliers.is_empty()).then(|| {
        let others = outliers
            .iter()
            .map(|o| format!("{} ({})", o.style, o.count))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Mixed citation styles: mostly {} ({}), but also {}",
            dominant.style, dominant.count, others
        )
    });

    ConsistencyVerdict {
        dominant: Some(dominant.style),
        outliers,
        warning,
    }
}
