use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use refstyle_core::{InTextCitations, ReferenceEntry};

use crate::text_processing::normalize_whitespace;

/// Largest numeric range (`[3–40]`) expanded into individual citations.
const MAX_RANGE: u32 = 100;

static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d{1,3}(?:\s*[-–,]\s*\d{1,3})*)\]").unwrap());

static AUTHOR_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    let one = r"\p{Lu}[\p{L}'\-]+(?:\s+(?:et\s+al\.|(?:and|&)\s+\p{Lu}[\p{L}'\-]+))?,\s*(?:19|20)\d{2}[a-z]?";
    Regex::new(&format!(r"\(({one}(?:;\s*{one})*)\)")).unwrap()
});

/// Numbers cited by one bracket group: `[1]`, `[2, 5]`, `[3–6]`.
fn parse_numeric_group(group: &str) -> Vec<u32> {
    static RANGE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(\d+)\s*[-–]\s*(\d+)$").unwrap());

    let mut numbers = Vec::new();
    for part in group.split(',') {
        let part = part.trim();
        if let Some(caps) = RANGE_RE.captures(part)
            && let (Ok(lo), Ok(hi)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>())
        {
            if lo <= hi && hi - lo <= MAX_RANGE {
                numbers.extend(lo..=hi);
            }
        } else if let Ok(n) = part.parse::<u32>() {
            numbers.push(n);
        }
    }
    numbers
}

/// Split text into sentences at `.`, `!` or `?` followed by whitespace and
/// a capital letter.
fn sentences(text: &str) -> Vec<&str> {
    static BREAK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").unwrap());

    let mut out = Vec::new();
    let mut start = 0;
    for m in BREAK_RE.find_iter(text) {
        if text[m.end()..].chars().next().is_some_and(char::is_uppercase) {
            out.push(text[start..m.start() + 1].trim());
            start = m.end();
        }
    }
    if start < text.len() {
        out.push(text[start..].trim());
    }
    out.retain(|s| !s.is_empty());
    out
}

/// Scan the document body for in-text citations and cross-check numeric
/// ones against the numbered entries of the reference list.
///
/// `unresolved` and `uncited` are only filled when both sides are numeric:
/// the body cites `[n]` and the list has numbered entries.
pub fn scan_citations(body: &str, entries: &[ReferenceEntry]) -> InTextCitations {
    let text = normalize_whitespace(body);

    let mut numeric: BTreeSet<u32> = BTreeSet::new();
    let mut author_year: Vec<String> = Vec::new();
    let mut cited_sentences: Vec<String> = Vec::new();

    for sentence in sentences(&text) {
        let mut cites = false;
        for caps in NUMERIC_RE.captures_iter(sentence) {
            numeric.extend(parse_numeric_group(&caps[1]));
            cites = true;
        }
        for caps in AUTHOR_YEAR_RE.captures_iter(sentence) {
            for cite in caps[1].split(';').map(str::trim) {
                if !author_year.iter().any(|c| c == cite) {
                    author_year.push(cite.to_string());
                }
            }
            cites = true;
        }
        if cites && !cited_sentences.iter().any(|s| s == sentence) {
            cited_sentences.push(sentence.to_string());
        }
    }

    let listed: BTreeSet<u32> = entries.iter().filter_map(|e| e.number).collect();
    let (unresolved, uncited) = if numeric.is_empty() || listed.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        (
            numeric.difference(&listed).copied().collect(),
            listed.difference(&numeric).copied().collect(),
        )
    };

    tracing::debug!(
        numeric = numeric.len(),
        author_year = author_year.len(),
        unresolved = unresolved.len(),
        uncited = uncited.len(),
        "scanned in-text citations"
    );

    InTextCitations {
        numeric: numeric.into_iter().collect(),
        author_year,
        sentences: cited_sentences,
        unresolved,
        uncited,
    }
}
