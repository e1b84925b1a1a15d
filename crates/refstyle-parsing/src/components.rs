//! Bibliographic component extraction.
//!
//! Each style has an ordered table of patterns with named capture groups
//! (`authors`, `year`, `title`, ...). Patterns run in order and the first
//! one to produce a field keeps it. Generic patterns then fill in whatever
//! the style table left missing.

use once_cell::sync::Lazy;
use regex::Regex;

use refstyle_core::{
    CitationStyle, Component, ComponentSet, LinkCheck, LinkKind, ReferenceEntry, StyleMatch,
};

struct Extractor {
    re: Regex,
}

impl Extractor {
    fn new(pattern: &str) -> Self {
        Self {
            re: Regex::new(pattern).unwrap(),
        }
    }

    fn apply(&self, text: &str, components: &mut ComponentSet) {
        let Some(caps) = self.re.captures(text) else {
            return;
        };
        for component in Component::ALL {
            if let Some(m) = caps.name(component.name()) {
                let value = match component {
                    Component::Pages => m.as_str().split_whitespace().collect::<String>(),
                    _ => m.as_str().to_string(),
                };
                components.set_if_missing(component, &value);
            }
        }
    }
}

fn extractors(patterns: &[&str]) -> Vec<Extractor> {
    patterns.iter().map(|p| Extractor::new(p)).collect()
}

const BOOK_IMPRINT: &str = r"(?P<location>\p{Lu}\p{L}*(?:\s+\p{Lu}\p{L}*)*(?:,\s*\p{Lu}{2})?):\s*(?P<publisher>[^,:]+?),\s*(?:19|20)\d{2}";

static APA: Lazy<Vec<Extractor>> = Lazy::new(|| {
    extractors(&[
        r"^(?P<authors>.+?)\s*\((?P<year>(?:19|20)\d{2})[a-z]?(?:,[^)]*)?\)",
        r"\((?:19|20)\d{2}[a-z]?(?:,[^)]*)?\)\.\s*(?P<title>[^.?!]+[?!]?)",
        r"\)\.\s*[^.?!]+[.?!]\s+(?P<source>[^,]+?),\s*(?P<volume>\d+)\s*(?:\((?P<issue>\d+(?:[-–]\d+)?)\))?\s*,\s*(?P<pages>\d+\s*[-–]\s*\d+)",
        r"\)\.\s*[^.?!]+[.?!]\s+(?P<publisher>\p{Lu}[^.,]+)\.\s*(?:https?://\S+)?$",
    ])
});

static MLA: Lazy<Vec<Extractor>> = Lazy::new(|| {
    extractors(&[
        r#"^(?P<authors>.+?)\.\s+["“]"#,
        r"^(?P<authors>[^.]+?)\.\s",
        r#"["“](?P<title>[^"”]+?)[.,]?["”]"#,
        r#"["“][^"”]+["”]\s*(?P<source>[^,]+?),"#,
        r",\s*(?P<year>(?:19|20)\d{2})(?:,|\.|$)",
        r"\.\s*(?P<publisher>[^.,]+),\s*(?:19|20)\d{2}\.?$",
    ])
});

static CHICAGO: Lazy<Vec<Extractor>> = Lazy::new(|| {
    extractors(&[
        r#"^(?P<authors>.+?)\.\s+["“]"#,
        r"^(?P<authors>[^.]+?)\.\s",
        r#"["“](?P<title>[^"”]+?)[.,]?["”]"#,
        r"^[^.]+\.\s+(?P<title>[^.]+)\.",
        r#"["“][^"”]+["”]\s*(?P<source>[^"“”]+?)\s+(?P<volume>\d+),\s*no\.\s*(?P<issue>\d+)\s*\((?:[A-Za-z]+\.?\s+)?(?P<year>(?:19|20)\d{2})\):\s*(?P<pages>\d+\s*[-–]\s*\d+)"#,
        BOOK_IMPRINT,
    ])
});

static IEEE: Lazy<Vec<Extractor>> = Lazy::new(|| {
    extractors(&[
        r#"^(?P<authors>[^"“]+?),?\s*["“]"#,
        r#"["“](?P<title>[^"”]+?)[,.]?["”]"#,
        r#"["“][^"”]+["”],?\s*(?:[Ii]n\s+)?(?P<source>[^,"“”]+?),"#,
        r",\s*(?:\p{Lu}\p{Ll}{2,8}\.?\s+)?(?P<year>(?:19|20)\d{2})(?:\.|,|\s*$)",
        BOOK_IMPRINT,
    ])
});

static ACM: Lazy<Vec<Extractor>> = Lazy::new(|| {
    extractors(&[
        r"^(?P<authors>.+?)\.\s+(?P<year>(?:19|20)\d{2})[a-z]?\.\s*(?P<title>[^.?!]+[?!]?)",
        r"\bIn\s+(?P<source>Proceedings\s+of\s+[^()]+?)\s*(?:\(|,|\.)",
        r"[.?!]\s+(?P<source>\p{Lu}[^,.]*(?:\.\s*\p{Lu}[^,.]*)*?)\s+(?P<volume>\d+),\s*(?P<issue>\d+)\s*\((?:[A-Za-z]+\.?\s+)?(?:19|20)\d{2}\),\s*(?P<pages>\d+\s*[-–]\s*\d+)",
        r"\)\.\s*(?P<publisher>\p{Lu}[\p{L}&]*(?:\s+\p{Lu}[\p{L}&]*)*),\s*(?P<location>\p{Lu}[^,]+(?:,\s*\p{Lu}{2,})*),\s*(?P<pages>\d+\s*[-–]\s*\d+)",
    ])
});

/// Patterns that apply whatever the style, run after the style table.
static GENERIC: Lazy<Vec<Extractor>> = Lazy::new(|| {
    extractors(&[
        r#"["“](?P<title>[^"”]{3,}?)[,.]?["”]"#,
        r"^(?P<authors>\p{Lu}[\p{L}'\-]+,\s+(?:\p{Lu}\.\s*)+(?:,\s*(?:&\s*)?\p{Lu}[\p{L}'\-]+,\s+(?:\p{Lu}\.\s*)+)*)",
        r"\((?P<year>(?:19|20)\d{2})[a-z]?\)",
        r"\b(?P<year>(?:19|20)\d{2})\b",
        r"(?i)\b(?:vol\.?|volume)\s*(?P<volume>\d+)",
        r"(?i)\b(?:no\.|issue)\s*(?P<issue>\d+)",
        r"(?i)\bpp?\.\s*(?P<pages>\d+\s*[-–]\s*\d+)",
        r"(?i)\bpages\s+(?P<pages>\d+\s*[-–]\s*\d+)",
        r"[,:]\s*(?P<pages>\d{1,5}\s*[-–]\s*\d{1,5})(?:\.|,|$)",
        BOOK_IMPRINT,
    ])
});

fn style_table(style: CitationStyle) -> &'static [Extractor] {
    match style {
        CitationStyle::Apa => &APA,
        CitationStyle::Mla => &MLA,
        CitationStyle::Chicago => &CHICAGO,
        CitationStyle::Ieee => &IEEE,
        CitationStyle::Acm => &ACM,
    }
}

/// Extract components from `entry` using the patterns of the matched style.
///
/// The DOI and URL come from `links`: the first well-formed DOI and URL.
pub fn extract_components(
    entry: &ReferenceEntry,
    style_match: &StyleMatch,
    links: &[LinkCheck],
) -> ComponentSet {
    let body = entry.body();
    let mut components = ComponentSet::new();

    if let Some(style) = style_match.style {
        for extractor in style_table(style) {
            extractor.apply(body, &mut components);
        }
    }
    for extractor in GENERIC.iter() {
        extractor.apply(body, &mut components);
    }

    for kind in [LinkKind::Doi, LinkKind::Url] {
        let component = match kind {
            LinkKind::Doi => Component::Doi,
            LinkKind::Url => Component::Url,
        };
        if let Some(value) = links
            .iter()
            .filter(|l| l.kind == kind)
            .find_map(|l| l.normalized.as_deref())
        {
            components.set(component, value);
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use refstyle_core::{MarkerKind, extract_links};

    fn extract(text: &str, style: Option<CitationStyle>) -> ComponentSet {
        let marker = if text.starts_with('[') {
            MarkerKind::Bracketed
        } else {
            MarkerKind::AuthorLed
        };
        let entry = ReferenceEntry {
            index: 0,
            number: None,
            marker,
            text: text.to_string(),
        };
        let style_match = StyleMatch {
            style,
            confidence: 1.0,
            matched_rules: Vec::new(),
            scores: Vec::new(),
        };
        extract_components(&entry, &style_match, &extract_links(text))
    }

    #[test]
    fn test_apa_journal_article() {
        let c = extract(
            "Smith, J. (2020). Learning theory. Journal of AI, 5(2), 100-120.",
            Some(CitationStyle::Apa),
        );
        assert_eq!(c.get(Component::Authors), Some("Smith, J."));
        assert_eq!(c.get(Component::Year), Some("2020"));
        assert_eq!(c.get(Component::Title), Some("Learning theory"));
        assert_eq!(c.get(Component::Source), Some("Journal of AI"));
        assert_eq!(c.get(Component::Volume), Some("5"));
        assert_eq!(c.get(Component::Issue), Some("2"));
        assert_eq!(c.get(Component::Pages), Some("100-120"));
        assert_eq!(c.display(Component::Doi), "missing");
    }

    #[test]
    fn test_apa_book_publisher() {
        let c = extract(
            "Doe, J. (2019). Deep learning for everyone. MIT Press.",
            Some(CitationStyle::Apa),
        );
        assert_eq!(c.get(Component::Publisher), Some("MIT Press"));
        assert_eq!(c.get(Component::Title), Some("Deep learning for everyone"));
    }

    #[test]
    fn test_ieee_article() {
        let c = extract(
            "[1] A. Smith, \"Deep Learning Basics,\" IEEE Trans. Neural Netw., vol. 12, no. 3, pp. 45-60, 2021.",
            Some(CitationStyle::Ieee),
        );
        assert_eq!(c.get(Component::Authors), Some("A. Smith"));
        assert_eq!(c.get(Component::Title), Some("Deep Learning Basics"));
        assert_eq!(c.get(Component::Source), Some("IEEE Trans. Neural Netw."));
        assert_eq!(c.get(Component::Volume), Some("12"));
        assert_eq!(c.get(Component::Issue), Some("3"));
        assert_eq!(c.get(Component::Pages), Some("45-60"));
        assert_eq!(c.get(Component::Year), Some("2021"));
    }

    #[test]
    fn test_mla_article() {
        let c = extract(
            "Smith, John, and Jane Doe. \"Learning Theory Revisited.\" Journal of AI, vol. 12, no. 3, 2019, pp. 45-60.",
            Some(CitationStyle::Mla),
        );
        assert_eq!(c.get(Component::Authors), Some("Smith, John, and Jane Doe"));
        assert_eq!(c.get(Component::Title), Some("Learning Theory Revisited"));
        assert_eq!(c.get(Component::Source), Some("Journal of AI"));
        assert_eq!(c.get(Component::Year), Some("2019"));
        assert_eq!(c.get(Component::Pages), Some("45-60"));
    }

    #[test]
    fn test_chicago_journal_and_book() {
        let journal = extract(
            "Smith, John. \"Learning Theory Revisited.\" Journal of AI 12, no. 3 (2019): 45–60.",
            Some(CitationStyle::Chicago),
        );
        assert_eq!(journal.get(Component::Source), Some("Journal of AI"));
        assert_eq!(journal.get(Component::Volume), Some("12"));
        assert_eq!(journal.get(Component::Issue), Some("3"));
        assert_eq!(journal.get(Component::Year), Some("2019"));
        assert_eq!(journal.get(Component::Pages), Some("45–60"));

        let book = extract(
            "Smith, John. Learning Theory. Cambridge, MA: MIT Press, 2019.",
            Some(CitationStyle::Chicago),
        );
        assert_eq!(book.get(Component::Authors), Some("Smith, John"));
        assert_eq!(book.get(Component::Title), Some("Learning Theory"));
        assert_eq!(book.get(Component::Location), Some("Cambridge, MA"));
        assert_eq!(book.get(Component::Publisher), Some("MIT Press"));
        assert_eq!(book.get(Component::Year), Some("2019"));
    }

    #[test]
    fn test_acm_article_with_doi() {
        let c = extract(
            "[1] Patricia S. Abril and Robert Plant. 2007. The patent holder's dilemma: Buy, sell, or troll? Commun. ACM 50, 1 (Jan. 2007), 36–44. https://doi.org/10.1145/1188913.1188915",
            Some(CitationStyle::Acm),
        );
        assert_eq!(c.get(Component::Authors), Some("Patricia S. Abril and Robert Plant"));
        assert_eq!(c.get(Component::Year), Some("2007"));
        assert_eq!(
            c.get(Component::Title),
            Some("The patent holder's dilemma: Buy, sell, or troll?")
        );
        assert_eq!(c.get(Component::Source), Some("Commun. ACM"));
        assert_eq!(c.get(Component::Volume), Some("50"));
        assert_eq!(c.get(Component::Pages), Some("36–44"));
        assert_eq!(c.get(Component::Doi), Some("10.1145/1188913.1188915"));
        assert!(!c.has(Component::Url));
    }

    #[test]
    fn test_acm_proceedings_imprint() {
        let c = extract(
            "[2] Jane Doe and John Roe. 2019. Designing for trust. In Proceedings of the 2019 CHI Conference on Human Factors in Computing Systems (CHI '19). ACM, New York, NY, USA, 1–12.",
            Some(CitationStyle::Acm),
        );
        assert_eq!(
            c.get(Component::Source),
            Some("Proceedings of the 2019 CHI Conference on Human Factors in Computing Systems")
        );
        assert_eq!(c.get(Component::Publisher), Some("ACM"));
        assert_eq!(c.get(Component::Location), Some("New York, NY, USA"));
        assert_eq!(c.get(Component::Pages), Some("1–12"));
    }

    #[test]
    fn test_unknown_style_uses_generic_patterns() {
        let c = extract(
            "Notes on graph theory, lecture handout, vol. 3, pages 10-12, see http://example.com/notes",
            None,
        );
        assert_eq!(c.get(Component::Volume), Some("3"));
        assert_eq!(c.get(Component::Pages), Some("10-12"));
        assert_eq!(c.get(Component::Url), Some("http://example.com/notes"));
        assert!(!c.has(Component::Year));
        assert_eq!(c.display(Component::Year), "missing");
    }
}
