//! Rule-based citation style classification.
//!
//! Each style has a table of weighted rules. A style's confidence is the
//! weight of its matched rules divided by the weight of all its rules, so
//! every confidence lies in `[0, 1]`.

use once_cell::sync::Lazy;
use regex::Regex;

use refstyle_core::{CitationStyle, ReferenceEntry, StyleMatch, StyleScore};

use crate::config::ParsingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
    /// Matches when the pattern is found.
    Present,
    /// Matches when the pattern is not found.
    Absent,
}

#[derive(Debug)]
struct StyleRule {
    name: &'static str,
    weight: u32,
    kind: RuleKind,
    re: Regex,
}

impl StyleRule {
    fn matches(&self, text: &str) -> bool {
        match self.kind {
            RuleKind::Present => self.re.is_match(text),
            RuleKind::Absent => !self.re.is_match(text),
        }
    }
}

#[derive(Debug)]
struct StyleRules {
    style: CitationStyle,
    rules: Vec<StyleRule>,
    total: u32,
}

fn present(name: &'static str, weight: u32, pattern: &str) -> StyleRule {
    StyleRule {
        name,
        weight,
        kind: RuleKind::Present,
        re: Regex::new(pattern).unwrap(),
    }
}

fn absent(name: &'static str, weight: u32, pattern: &str) -> StyleRule {
    StyleRule {
        name,
        weight,
        kind: RuleKind::Absent,
        re: Regex::new(pattern).unwrap(),
    }
}

fn table(style: CitationStyle, rules: Vec<StyleRule>) -> StyleRules {
    let total = rules.iter().map(|r| r.weight).sum();
    StyleRules {
        style,
        rules,
        total,
    }
}

// Optional sequence marker in front of an author list
const MARKER: &str = r"(?:\[\d+\]\s*|\d{1,3}\.?\s+)?";

static RULE_TABLES: Lazy<Vec<StyleRules>> = Lazy::new(|| {
    vec![
        table(
            CitationStyle::Apa,
            vec![
                present(
                    "author-initials",
                    2,
                    &format!(r"^{MARKER}\p{{Lu}}[\p{{L}}'\-]+,\s+(?:\p{{Lu}}\.\s*)+"),
                ),
                present(
                    "parenthesized-year",
                    3,
                    r"^[^()]{2,300}?\((?:19|20)\d{2}[a-z]?(?:,\s*[A-Za-z]+(?:\s+\d{1,2})?)?\)\.",
                ),
                present("ampersand-authors", 1, r",?\s&\s+\p{Lu}"),
                present(
                    "volume-issue-pages",
                    2,
                    r",\s*\d+\s*\(\d+(?:[-–]\d+)?\)\s*,\s*\d+\s*[-–]\s*\d+",
                ),
                absent("unquoted-title", 1, r#"["“”]"#),
            ],
        ),
        table(
            CitationStyle::Mla,
            vec![
                present(
                    "full-name-lead",
                    2,
                    &format!(r"^{MARKER}\p{{Lu}}[\p{{L}}'\-]+,\s+\p{{Lu}}\p{{Ll}}+"),
                ),
                present("quoted-title-period", 2, r#"["“][^"”]+\.["”]"#),
                present("vol-no", 1, r"\bvol\.\s*\d+,\s*no\.\s*\d+"),
                present("year-before-pages", 2, r",\s*(?:19|20)\d{2},\s*pp\.\s*\d+"),
                present("and-conjunction", 1, r",\s+and\s+\p{Lu}\p{Ll}+"),
                absent("no-parenthesized-year", 1, r"\((?:19|20)\d{2}\)"),
            ],
        ),
        table(
            CitationStyle::Chicago,
            vec![
                present(
                    "full-name-lead",
                    2,
                    &format!(r"^{MARKER}\p{{Lu}}[\p{{L}}'\-]+,\s+\p{{Lu}}\p{{Ll}}+"),
                ),
                present("quoted-title-period", 2, r#"["“][^"”]+\.["”]"#),
                present(
                    "issue-year-colon",
                    3,
                    r"\d+,\s*no\.\s*\d+\s*\((?:[A-Za-z]+\.?\s+)?(?:19|20)\d{2}\)\s*:",
                ),
                present(
                    "place-publisher-year",
                    2,
                    r"\p{Lu}[\p{L} .]+:\s*\p{Lu}[\p{L}&.' ]+,\s*(?:19|20)\d{2}",
                ),
                present("and-conjunction", 1, r",\s+and\s+\p{Lu}\p{Ll}+"),
            ],
        ),
        table(
            CitationStyle::Ieee,
            vec![
                present("bracket-number", 3, r"^\s*\[\d+\]"),
                present(
                    "initials-author",
                    2,
                    r"^(?:\[\d+\]\s*)?(?:\p{Lu}\.\s*(?:-?\p{Lu}\.\s*)*)\p{Lu}[\p{L}'\-]+",
                ),
                present("quoted-title-comma", 2, r#"["“][^"”]+,["”]"#),
                present("vol-pp", 2, r"\bvol\.\s*\d+.*\bpp\.\s*\d+"),
                present(
                    "trailing-year",
                    1,
                    r",\s*(?:\p{Lu}\p{Ll}{2,8}\.?\s+)?(?:19|20)\d{2}\.?\s*$",
                ),
                present("in-proc", 1, r"\bin\s+Proc\."),
            ],
        ),
        table(
            CitationStyle::Acm,
            vec![
                present("bracket-number", 1, r"^\s*\[\d+\]"),
                present(
                    "full-name-authors",
                    2,
                    r"^(?:\[\d+\]\s*)?\p{Lu}\p{Ll}+(?:\s+\p{Lu}\.)*\s+\p{Lu}\p{Ll}+(?:,|\s+and\s)",
                ),
                present(
                    "year-after-authors",
                    3,
                    r"^.{0,250}?\p{Ll}\.\s+(?:19|20)\d{2}[a-z]?\.\s",
                ),
                present("and-conjunction", 1, r"\s+and\s+\p{Lu}"),
                present("in-proceedings-of", 2, r"\bIn\s+Proceedings\s+of\b"),
                present(
                    "month-year",
                    2,
                    r"\((?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s+(?:19|20)\d{2}\)",
                ),
                present("article-pages", 1, r"\bArticle\s+\d+|\b\d+\s+pages\b"),
                present("doi-link", 1, r"https?://(?:dx\.)?doi\.org/|\bdoi:"),
            ],
        ),
    ]
});

/// Score every style against `text`, in priority order, with the names of
/// the rules each style matched.
pub fn score_styles(text: &str) -> Vec<(StyleScore, Vec<&'static str>)> {
    RULE_TABLES
        .iter()
        .map(|t| {
            let matched: Vec<&StyleRule> = t.rules.iter().filter(|r| r.matches(text)).collect();
            let weight: u32 = matched.iter().map(|r| r.weight).sum();
            let confidence = if t.total == 0 {
                0.0
            } else {
                f64::from(weight) / f64::from(t.total)
            };
            (
                StyleScore {
                    style: t.style,
                    confidence,
                },
                matched.iter().map(|r| r.name).collect(),
            )
        })
        .collect()
}

/// The highest score; on ties the style earliest in priority order wins.
pub(crate) fn select_best(scores: &[StyleScore]) -> Option<StyleScore> {
    let mut best: Option<StyleScore> = None;
    for score in scores {
        if best.is_none_or(|b| score.confidence > b.confidence) {
            best = Some(*score);
        }
    }
    best
}

/// Classify an entry with the default threshold.
pub fn classify(entry: &ReferenceEntry) -> StyleMatch {
    classify_with_config(entry, &ParsingConfig::default())
}

/// Config-aware version of [`classify`].
pub(crate) fn classify_with_config(entry: &ReferenceEntry, config: &ParsingConfig) -> StyleMatch {
    let scored = score_styles(&entry.text);
    let scores: Vec<StyleScore> = scored.iter().map(|(s, _)| *s).collect();

    let Some(best) = select_best(&scores) else {
        return StyleMatch {
            style: None,
            confidence: 0.0,
            matched_rules: Vec::new(),
            scores,
        };
    };

    let matched_rules = scored
        .iter()
        .find(|(s, _)| s.style == best.style)
        .map(|(_, rules)| rules.iter().map(|r| r.to_string()).collect())
        .unwrap_or_default();

    let known = best.confidence > 0.0 && best.confidence >= config.min_confidence;
    tracing::trace!(
        entry = entry.index,
        style = %best.style,
        confidence = best.confidence,
        known,
        "classified entry"
    );

    StyleMatch {
        style: known.then_some(best.style),
        confidence: best.confidence,
        matched_rules,
        scores,
    }
}
