use once_cell::sync::Lazy;
use regex::Regex;

use refstyle_core::{Boundary, Document, ReferenceSection, SectionOutcome};

use crate::config::ParsingConfig;
use crate::split::{closes_entry, looks_like_entry_start};

const DEFAULT_HEADER_WORDS: &[&str] = &[
    "references",
    "bibliography",
    "works cited",
    "literature cited",
    "cited works",
    "reference list",
    "sources",
    "citations",
];

/// Lines examined after a candidate start by the content-pattern fallback.
const LOOKAHEAD_LINES: usize = 10;

pub(crate) fn default_header_words() -> Vec<String> {
    DEFAULT_HEADER_WORDS.iter().map(|s| s.to_string()).collect()
}

static DEFAULT_HEADERS: Lazy<HeaderPatterns> = Lazy::new(|| {
    HeaderPatterns::new(&default_header_words()).unwrap()
});

static END_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:(?:\d+(?:\.\d+)*\.?|[a-z]\.|[ivxlcdm]+\.)\s+)?(?:appendix|appendices|acknowledge?ments?|supplementary\s+material|ethics\s+statement|ethical\s+considerations|broader\s+impacts?|paper\s+checklist|checklist)\b",
    )
    .unwrap()
});

/// Text following a header on the same line must look like the start of an
/// entry, otherwise the line is prose ("References to prior work ...").
static ENTRY_LIKE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\[\d+\]|\d{1,3}\.?\s|[A-Z][A-Za-z'\-]+,\s|[A-Z]\.\s?[A-Z])").unwrap()
});

/// Header line matcher compiled from a header vocabulary.
///
/// Accepts a bare header ("References"), a page prefix ("Page 12 References"),
/// section numbering in arabic or roman numerals ("7. References",
/// "VII. REFERENCES"), a number fused to the header ("19REFERENCES"),
/// appendix labels ("Appendix B: Bibliography") and paired headers
/// ("References and Bibliography").
#[derive(Debug, Clone)]
pub(crate) struct HeaderPatterns {
    line_re: Option<Regex>,
}

impl HeaderPatterns {
    pub(crate) fn new(words: &[String]) -> Result<Self, regex::Error> {
        let mut alternatives: Vec<String> = words
            .iter()
            .filter(|w| !w.trim().is_empty())
            .map(|w| {
                w.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect();
        if alternatives.is_empty() {
            return Ok(Self { line_re: None });
        }
        alternatives.sort_by_key(|a| std::cmp::Reverse(a.len()));
        let h = alternatives.join("|");

        let pattern = format!(
            r"(?i)^(?P<header>(?:page\s*\d+\s+|(?:section\s+)?\d+(?:\.\d+)*\.?\s*|[ivxlcdm]+\.\s*|[ivxlcdm]+\s+|appendix\s+[a-z0-9]+\.?\s*:?\s*)?(?:{h})(?:\s+(?:and|&)\s+(?:{h}))?)\b[\s:.]*(?P<rest>.*)$"
        );
        Ok(Self {
            line_re: Some(Regex::new(&pattern)?),
        })
    }

    /// Split a header line into the header and any text following it.
    fn match_line<'t>(&self, line: &'t str) -> Option<(&'t str, &'t str)> {
        let caps = self.line_re.as_ref()?.captures(line.trim())?;
        let header = caps.name("header")?.as_str();
        let rest = caps.name("rest").map_or("", |m| m.as_str().trim());
        if !rest.is_empty() && !ENTRY_LIKE_RE.is_match(rest) {
            return None;
        }
        Some((header, rest))
    }
}

/// Locate the reference section of a document.
///
/// The last line that qualifies as a reference header wins. The section runs
/// to the next end marker (Appendix, Acknowledgments, ...) or the end of the
/// document. Without a header, the trailing part of the document is searched
/// for a dense run of reference-like lines.
pub fn find_references_section(doc: &Document) -> SectionOutcome {
    find_references_section_with_config(doc, &ParsingConfig::default())
}

/// Config-aware version of [`find_references_section`].
pub(crate) fn find_references_section_with_config(
    doc: &Document,
    config: &ParsingConfig,
) -> SectionOutcome {
    let full = doc.full_text();
    let lines: Vec<&str> = full.split('\n').map(|l| l.trim_end_matches('\r')).collect();
    let headers = config.header_patterns.as_ref().unwrap_or(&DEFAULT_HEADERS);
    let end_re = config.section_end_re.as_ref().unwrap_or(&END_RE);

    for (i, line) in lines.iter().enumerate().rev() {
        let Some((header, rest)) = headers.match_line(line) else {
            continue;
        };
        if wraps_previous_line(&lines, i, rest) {
            tracing::debug!(line = i, header, "header word inside a wrapped entry, skipping");
            continue;
        }
        let end = section_end(&lines, i + 1, end_re);
        let mut text = String::from(rest);
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&lines[i + 1..end].join("\n"));
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!(line = i, "empty section after header, trying earlier headers");
            continue;
        }

        tracing::debug!(line = i, header, "reference section header found");
        return SectionOutcome::Found(ReferenceSection {
            boundary: Boundary::Header {
                line: i,
                header: header.trim().to_string(),
            },
            body: lines[..i].join("\n"),
            text: text.to_string(),
        });
    }

    if let Some(start) = find_by_content(&lines, doc, config) {
        let end = section_end(&lines, start + 1, end_re);
        let text = lines[start..end].join("\n");
        tracing::debug!(line = start, "reference section located by content");
        return SectionOutcome::Found(ReferenceSection {
            boundary: Boundary::ContentPattern { line: start },
            body: lines[..start].join("\n"),
            text: text.trim().to_string(),
        });
    }

    tracing::debug!("no reference section found");
    SectionOutcome::NotFound
}

/// A header candidate that is really the continuation of an unfinished
/// entry line, e.g. "citations. J. Informetrics, 14(1), 1-10." after
/// "Lee, K. (2020). Counting scholarly".
fn wraps_previous_line(lines: &[&str], i: usize, rest: &str) -> bool {
    let lowercase = lines[i]
        .trim_start()
        .chars()
        .next()
        .is_some_and(char::is_lowercase);
    if rest.is_empty() && !lowercase {
        return false;
    }
    lines[..i]
        .iter()
        .rev()
        .find(|l| !l.trim().is_empty())
        .is_some_and(|prev| !closes_entry(prev))
}

fn section_end(lines: &[&str], from: usize, end_re: &Regex) -> usize {
    (from..lines.len())
        .find(|&j| {
            let line = lines[j].trim();
            line.len() < 80 && end_re.is_match(line)
        })
        .unwrap_or(lines.len())
}

/// Whether a line carries a typical trace of a reference entry.
fn has_reference_indicator(line: &str) -> bool {
    static INDICATORS: Lazy<Vec<Regex>> = Lazy::new(|| {
        [
            r"^\s*\[\d+\]",
            r"^\s*\d{1,3}\.\s",
            r"^[A-Z][A-Za-z'\-]+,\s+[A-Z]\.",
            r"\bet\s+al\.",
            r"(?i)\bdoi\b",
            r"https?://",
            r"\((?:19|20)\d{2}[a-z]?\)",
            r"(?i)\bvol(?:ume)?\.?\s*\d+",
            r"(?i)\bpp?\.\s*\d+",
            r",\s*(?:19|20)\d{2}[.,]",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    });
    INDICATORS.iter().any(|re| re.is_match(line))
}

/// First line of the 0-based page `page`, counting lines the way
/// [`Document::full_text`] joins them.
fn page_start_line(doc: &Document, page: usize) -> usize {
    doc.pages()
        .iter()
        .take(page)
        .map(|p| p.split('\n').count())
        .sum()
}

/// Find the start of a dense run of entries near the end of the document.
///
/// Only the last `fallback_pages` pages or the last `fallback_fraction` of
/// lines (whichever starts earlier) are searched for the first qualifying
/// line; the run is then extended backwards over preceding entries.
fn find_by_content(lines: &[&str], doc: &Document, config: &ParsingConfig) -> Option<usize> {
    let n = lines.len();
    let tail = ((n as f64 * config.fallback_fraction).ceil() as usize).min(n);
    let by_fraction = n - tail;
    let by_pages = page_start_line(doc, doc.page_count().saturating_sub(config.fallback_pages));
    let window_start = by_fraction.min(by_pages);

    let qualifies = |i: usize| -> bool {
        if !looks_like_entry_start(lines[i]) {
            return false;
        }
        let window = &lines[i..(i + LOOKAHEAD_LINES).min(n)];
        let hits = window.iter().filter(|l| has_reference_indicator(l)).count();
        let starts = window.iter().filter(|l| looks_like_entry_start(l)).count();
        hits >= config.min_indicator_hits && starts >= 2
    };

    let mut start = (window_start..n).find(|&i| qualifies(i))?;
    while let Some(prev) = (start.saturating_sub(LOOKAHEAD_LINES)..start)
        .rev()
        .find(|&j| looks_like_entry_start(lines[j]))
    {
        if !qualifies(prev) {
            break;
        }
        start = prev;
    }
    Some(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParsingConfigBuilder;

    fn doc(text: &str) -> Document {
        Document::from_pages(vec![text.to_string()])
    }

    fn found(outcome: SectionOutcome) -> ReferenceSection {
        match outcome {
            SectionOutcome::Found(s) => s,
            SectionOutcome::NotFound => panic!("expected a reference section"),
        }
    }

    #[test]
    fn test_header_section() {
        let d = doc("Intro text here.\nMore text.\n\nReferences\n[1] A. Smith, \"T,\" 2020.\n[2] B. Jones, \"U,\" 2021.");
        let s = found(find_references_section(&d));
        assert_eq!(
            s.boundary,
            Boundary::Header {
                line: 3,
                header: "References".into()
            }
        );
        assert!(s.text.starts_with("[1] A. Smith"));
        assert!(s.body.contains("Intro text"));
    }

    #[test]
    fn test_header_variants() {
        for header in [
            "REFERENCES",
            "7. References",
            "VII. REFERENCES",
            "Page 12 References",
            "Appendix B: Bibliography",
            "Works Cited",
            "References and Bibliography",
        ] {
            let d = doc(&format!("Body.\n{}\nSmith, J. (2020). Title. Journal, 1(2), 3-4.", header));
            let s = found(find_references_section(&d));
            assert_eq!(s.boundary.line(), 1, "header {:?}", header);
        }
    }

    #[test]
    fn test_concatenated_page_number_header() {
        let d = doc("Body text.\n19REFERENCES\n[1] A. Smith, \"Title,\" 2020.");
        let s = found(find_references_section(&d));
        match s.boundary {
            Boundary::Header { header, .. } => assert_eq!(header, "19REFERENCES"),
            other => panic!("unexpected boundary {:?}", other),
        }
    }

    #[test]
    fn test_same_line_remainder_kept() {
        let d = doc("Body.\nReferences [1] A. Smith, \"Title,\" 2020.\n[2] B. Jones, \"Other,\" 2021.");
        let s = found(find_references_section(&d));
        assert!(s.text.starts_with("[1] A. Smith"));
        assert!(s.text.contains("[2] B. Jones"));
    }

    #[test]
    fn test_prose_mentioning_references_rejected() {
        let d = doc("References to prior work are discussed below.\nNothing else here.");
        assert_eq!(find_references_section(&d), SectionOutcome::NotFound);
    }

    #[test]
    fn test_last_header_wins() {
        let d = doc("Contents\nReferences\nIntro\nBody text.\nReferences\n[1] A. Smith, \"Title,\" 2020.");
        let s = found(find_references_section(&d));
        assert_eq!(s.boundary.line(), 4);
    }

    #[test]
    fn test_end_marker_stops_section() {
        let d = doc("Body.\nReferences\n[1] A. Smith, \"Title,\" 2020.\nAcknowledgments\nWe thank everyone.");
        let s = found(find_references_section(&d));
        assert_eq!(s.text, "[1] A. Smith, \"Title,\" 2020.");
    }

    #[test]
    fn test_content_pattern_fallback() {
        let d = doc(
            "Some discussion of results.\nMore discussion.\n\
             [1] A. Smith, \"Deep Learning Basics,\" IEEE Trans., vol. 12, pp. 45-60, 2021.\n\
             [2] B. Jones, \"Graph Methods,\" in Proc. ICML, pp. 1-9, 2020.\n\
             [3] C. Lee, \"Transformers,\" Nature, vol. 5, pp. 10-20, 2019.",
        );
        let s = found(find_references_section(&d));
        assert_eq!(s.boundary, Boundary::ContentPattern { line: 2 });
        assert!(s.body.ends_with("More discussion."));
    }

    #[test]
    fn test_plain_prose_not_found() {
        let d = doc("This document has no citations at all.\nJust some prose.\nAnd a conclusion.");
        assert_eq!(find_references_section(&d), SectionOutcome::NotFound);
    }

    #[test]
    fn test_wrapped_entry_line_is_not_a_header() {
        let d = doc(
            "Body text.\nReferences\n\
             Smith, J. (2020). Learning theory. Journal of AI, 5(2), 100-120.\n\
             Doe, A. (2019). Graph theory. Journal of Graphs, 3(1), 1-20.\n\
             Lee, K. (2020). Counting scholarly\n\
             citations. J. Informetrics, 14(1), 1-10.\n\
             Kim, M. (2021). Deep models. Journal of AI, 6(1), 5-9.",
        );
        let s = found(find_references_section(&d));
        assert_eq!(
            s.boundary,
            Boundary::Header {
                line: 1,
                header: "References".into()
            }
        );
        assert!(s.text.starts_with("Smith, J. (2020)"));
        assert!(s.text.contains("citations. J. Informetrics"));
        assert_eq!(crate::split::split_references(&s.text).entries.len(), 4);
    }

    #[test]
    fn test_header_after_finished_entry_still_accepted() {
        assert!(!wraps_previous_line(&["Body text.", "References [1] A. Smith"], 1, "[1] A. Smith"));
        assert!(wraps_previous_line(
            &["Lee, K. (2020). Counting scholarly", "citations. J. Informetrics"],
            1,
            "J. Informetrics"
        ));
        assert!(!wraps_previous_line(&["Lee, K. (2020). Counting", "References"], 1, ""));
    }

    #[test]
    fn test_custom_header_word() {
        let config = ParsingConfigBuilder::new()
            .add_header_word("Literaturverzeichnis".to_string())
            .build()
            .unwrap();
        let d = doc("Text.\nLiteraturverzeichnis\nSmith, J. (2020). Titel. Verlag.");
        let s = found(find_references_section_with_config(&d, &config));
        assert_eq!(s.boundary.line(), 1);
    }
}
