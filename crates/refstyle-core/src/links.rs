//! DOI and URL normalization with local syntax checks.
//!
//! Nothing here touches the network. [`extract_links`] produces
//! [`LinkCheck`]s whose status is either `Invalid` (bad syntax) or
//! `Unchecked`; the resolver module upgrades them after a lookup.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Doi,
    Url,
}

impl LinkKind {
    pub fn label(self) -> &'static str {
        match self {
            LinkKind::Doi => "DOI",
            LinkKind::Url => "URL",
        }
    }
}

/// Verification state of a DOI or URL.
///
/// `Unverified` means a lookup was attempted but could not complete
/// (timeout, connection failure, rate limiting). It never means the link is
/// wrong; only `Invalid` does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LinkStatus {
    /// Syntax is fine; no lookup attempted.
    Unchecked,
    Valid,
    Invalid { reason: String },
    Unverified { reason: String },
}

impl LinkStatus {
    pub fn label(&self) -> &'static str {
        match self {
            LinkStatus::Unchecked => "unchecked",
            LinkStatus::Valid => "valid",
            LinkStatus::Invalid { .. } => "invalid",
            LinkStatus::Unverified { .. } => "unverified",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            LinkStatus::Invalid { reason } | LinkStatus::Unverified { reason } => Some(reason),
            LinkStatus::Unchecked | LinkStatus::Valid => None,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        LinkStatus::Invalid {
            reason: reason.into(),
        }
    }

    pub(crate) fn unverified(reason: impl Into<String>) -> Self {
        LinkStatus::Unverified {
            reason: reason.into(),
        }
    }
}

/// A DOI or URL found in a reference entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkCheck {
    pub kind: LinkKind,
    /// Text as it appeared in the entry.
    pub raw: String,
    /// Normalized DOI (`10.x/...`) or URL; `None` when normalization failed.
    pub normalized: Option<String>,
    pub status: LinkStatus,
}

impl LinkCheck {
    /// Build a check for a DOI, validating its syntax.
    pub fn doi(raw: &str) -> Self {
        let doi = normalize_doi(raw);
        if is_valid_doi(&doi) {
            Self {
                kind: LinkKind::Doi,
                raw: raw.to_string(),
                normalized: Some(doi),
                status: LinkStatus::Unchecked,
            }
        } else {
            Self {
                kind: LinkKind::Doi,
                raw: raw.to_string(),
                normalized: None,
                status: LinkStatus::invalid("malformed DOI"),
            }
        }
    }

    /// Build a check for a URL, validating its syntax.
    pub fn url(raw: &str) -> Self {
        match clean_url(raw) {
            Some(url) => Self {
                kind: LinkKind::Url,
                raw: raw.to_string(),
                normalized: Some(url),
                status: LinkStatus::Unchecked,
            },
            None => Self {
                kind: LinkKind::Url,
                raw: raw.to_string(),
                normalized: None,
                status: LinkStatus::invalid("malformed URL"),
            },
        }
    }

    /// Parse user input as either a DOI or a URL.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("10.") || lower.starts_with("doi:") || lower.contains("doi.org/") {
            Self::doi(trimmed)
        } else {
            Self::url(trimmed)
        }
    }

    /// The URL a network lookup should fetch.
    pub fn lookup_url(&self) -> Option<String> {
        let normalized = self.normalized.as_ref()?;
        match self.kind {
            LinkKind::Doi => Some(format!("https://doi.org/{}", normalized)),
            LinkKind::Url => Some(normalized.clone()),
        }
    }

    /// Whether the syntax check passed.
    pub fn is_well_formed(&self) -> bool {
        self.normalized.is_some()
    }
}

/// Strip `doi:` and resolver prefixes, whitespace, trailing punctuation and
/// unbalanced closing brackets from a DOI.
pub fn normalize_doi(raw: &str) -> String {
    static PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)^(?:doi\s*:\s*|https?://(?:dx\.)?doi\.org/|(?:dx\.)?doi\.org/)").unwrap()
    });

    let trimmed = raw.trim();
    let without_prefix = PREFIX_RE.replace(trimmed, "");
    let compact: String = without_prefix.chars().filter(|c| !c.is_whitespace()).collect();

    let mut doi = compact.trim_end_matches(['.', ',', ';', ':']);
    for (open, close) in [('(', ')'), ('[', ']'), ('{', '}')] {
        while doi.ends_with(close) && doi.matches(close).count() > doi.matches(open).count() {
            doi = &doi[..doi.len() - 1];
            doi = doi.trim_end_matches(['.', ',', ';', ':']);
        }
    }
    doi.to_string()
}

/// Whether `doi` (already normalized) has the `10.<registrant>/<suffix>` shape.
pub fn is_valid_doi(doi: &str) -> bool {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^10\.\d{4,9}/\S+$").unwrap());
    RE.is_match(doi)
}

/// Extract the DOI from a DOI-bearing URL (`doi.org/...`, `dl.acm.org/doi/...`).
pub fn doi_from_url(url: &str) -> Option<String> {
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)(?:doi\.org/|/doi/(?:abs/|pdf/|full/)?)(10\.\d{4,9}/[^\s?#]+)").unwrap()
    });
    RE.captures(url)
        .map(|c| normalize_doi(&c[1]))
        .filter(|d| is_valid_doi(d))
}

/// Clean a URL as it appears in extracted PDF text.
///
/// Pieces split by whitespace are joined, DOI URLs are rewritten to their
/// canonical resolver form, trailing punctuation is dropped and `www.` hosts
/// get an `https://` scheme. Path and query are percent-encoded by the URL
/// parser. Returns `None` when the result is not an http(s) URL with a
/// dotted host.
pub fn clean_url(raw: &str) -> Option<String> {
    static JUNK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["'<>{}\[\]]"#).unwrap());
    static TRAILING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.,;:)\]}]+$").unwrap());

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    let joined = if parts.len() > 1 {
        parts
            .iter()
            .map(|p| JUNK_RE.replace_all(p, "").to_string())
            .map(|p| {
                p.trim_matches(['.', ',', ';', ':', '(', ')', '[', ']', '{', '}'])
                    .to_string()
            })
            .collect::<String>()
    } else {
        trimmed.to_string()
    };
    let joined = joined.replace('\\', "/");

    if joined.to_ascii_lowercase().contains("doi")
        && let Some(doi) = doi_from_url(&joined)
    {
        if joined.to_ascii_lowercase().contains("dl.acm.org") {
            return Some(format!("https://dl.acm.org/doi/{}", doi));
        }
        return Some(format!("https://doi.org/{}", doi));
    }

    let stripped = TRAILING_RE.replace(&joined, "");
    let lower = stripped.to_ascii_lowercase();
    let with_scheme = if lower.starts_with("http://") || lower.starts_with("https://") {
        stripped.to_string()
    } else if lower.starts_with("www.") {
        format!("https://{}", stripped)
    } else {
        return None;
    };

    let parsed = Url::parse(&with_scheme).ok()?;
    let host = parsed.host_str()?;
    if !host.contains('.') || host.starts_with('.') || host.ends_with('.') {
        return None;
    }
    Some(parsed.to_string())
}

/// Whether `url` has one of the ACM Digital Library citation shapes.
pub fn is_valid_acm_url(url: &str) -> bool {
    static PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
        [
            Regex::new(r"(?i)dl\.acm\.org/doi/(?:abs/|pdf/)?10\.\d+/[\d.]+").unwrap(),
            Regex::new(r"(?i)dl\.acm\.org/citation\.cfm\?id=\d+").unwrap(),
        ]
    });
    PATTERNS.iter().any(|re| re.is_match(url))
}

/// Host name of a URL, lower-cased and without a leading `www.`.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

/// Google Scholar search link for a reference, built from its first 200
/// characters.
pub fn scholar_search_url(reference: &str) -> String {
    let query: String = reference
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(200)
        .collect();
    format!(
        "https://scholar.google.com/scholar?q={}",
        urlencoding::encode(&query)
    )
}

/// Find the DOIs and URLs in a reference entry and check their syntax.
///
/// URLs that point at a DOI resolver are reported once, as a DOI.
pub fn extract_links(text: &str) -> Vec<LinkCheck> {
    static DOI_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"(?i)(?:doi\s*:\s*|https?://(?:dx\.)?doi\.org/)?\b10\.\d{4,9}/[^\s,;"<>]+"#)
            .unwrap()
    });
    static URL_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"(?i)\bhttps?://[^\s<>"]+|\bwww\.[^\s<>"]+"#).unwrap());

    let mut links: Vec<LinkCheck> = Vec::new();

    for m in DOI_RE.find_iter(text) {
        let check = LinkCheck::doi(m.as_str());
        if !links
            .iter()
            .any(|l| l.kind == LinkKind::Doi && l.normalized == check.normalized)
        {
            links.push(check);
        }
    }

    for m in URL_RE.find_iter(text) {
        if m.as_str().to_ascii_lowercase().contains("doi.org/") {
            continue;
        }
        let check = LinkCheck::url(m.as_str());
        if !links
            .iter()
            .any(|l| l.kind == LinkKind::Url && l.raw == check.raw)
        {
            links.push(check);
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_doi_strips_prefixes() {
        assert_eq!(normalize_doi("doi: 10.1145/3290605"), "10.1145/3290605");
        assert_eq!(
            normalize_doi("https://doi.org/10.1109/5.771073."),
            "10.1109/5.771073"
        );
        assert_eq!(
            normalize_doi("http://dx.doi.org/10.1000/xyz123,"),
            "10.1000/xyz123"
        );
    }

    #[test]
    fn normalize_doi_keeps_balanced_parens() {
        assert_eq!(
            normalize_doi("10.1016/0021-9681(87)90171-8"),
            "10.1016/0021-9681(87)90171-8"
        );
        assert_eq!(normalize_doi("(10.1000/abc)"), "(10.1000/abc)");
        assert_eq!(normalize_doi("10.1000/abc)."), "10.1000/abc");
    }

    #[test]
    fn doi_syntax() {
        assert!(is_valid_doi("10.1145/3290605.3300233"));
        assert!(!is_valid_doi("10.12/short"));
        assert!(!is_valid_doi("11.1234/abc"));
        assert!(!is_valid_doi("10.1234/"));
    }

    #[test]
    fn clean_url_joins_split_parts() {
        assert_eq!(
            clean_url("https://example.org/ papers/ deep.pdf").as_deref(),
            Some("https://example.org/papers/deep.pdf")
        );
    }

    #[test]
    fn clean_url_adds_scheme_to_www() {
        assert_eq!(
            clean_url("www.example.com/page.").as_deref(),
            Some("https://www.example.com/page")
        );
    }

    #[test]
    fn clean_url_rewrites_doi_urls() {
        assert_eq!(
            clean_url("http://dx.doi.org/10.1145/1234567.").as_deref(),
            Some("https://doi.org/10.1145/1234567")
        );
        assert_eq!(
            clean_url("https://dl.acm.org/doi/abs/10.1145/3290605.3300233").as_deref(),
            Some("https://dl.acm.org/doi/10.1145/3290605.3300233")
        );
    }

    #[test]
    fn clean_url_rejects_non_urls() {
        assert_eq!(clean_url("ftp://example.com"), None);
        assert_eq!(clean_url("example"), None);
        assert_eq!(clean_url("http://localhost/x"), None);
        assert_eq!(clean_url(""), None);
    }

    #[test]
    fn clean_url_percent_encodes_path() {
        let url = clean_url("https://example.com/a b").unwrap();
        assert_eq!(url, "https://example.com/ab");
        let url = clean_url("https://example.com/caf\u{e9}").unwrap();
        assert_eq!(url, "https://example.com/caf%C3%A9");
    }

    #[test]
    fn acm_url_shapes() {
        assert!(is_valid_acm_url("https://dl.acm.org/doi/10.1145/3290605.3300233"));
        assert!(is_valid_acm_url("https://dl.acm.org/doi/pdf/10.1145/1234.5678"));
        assert!(is_valid_acm_url("https://dl.acm.org/citation.cfm?id=1234567"));
        assert!(!is_valid_acm_url("https://dl.acm.org/profile/81100"));
    }

    #[test]
    fn host_of_strips_www() {
        assert_eq!(host_of("https://www.Example.com/x").as_deref(), Some("example.com"));
        assert_eq!(host_of("https://doi.org/10.1/x").as_deref(), Some("doi.org"));
        assert_eq!(host_of("not a url"), None);
    }

    #[test]
    fn scholar_url_is_encoded_and_truncated() {
        let long = "word ".repeat(100);
        let url = scholar_search_url(&long);
        assert!(url.starts_with("https://scholar.google.com/scholar?q=word%20word"));
        let query = url.trim_start_matches("https://scholar.google.com/scholar?q=");
        assert!(urlencoding::decode(query).unwrap().chars().count() <= 200);
    }

    #[test]
    fn extract_links_finds_doi_and_url() {
        let text = "A. Smith. 2020. Title. In Proc. X. https://doi.org/10.1145/3290605.3300233 \
                    Available: https://example.com/paper.pdf.";
        let links = extract_links(text);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].kind, LinkKind::Doi);
        assert_eq!(links[0].normalized.as_deref(), Some("10.1145/3290605.3300233"));
        assert_eq!(links[0].status, LinkStatus::Unchecked);
        assert_eq!(links[1].kind, LinkKind::Url);
        assert_eq!(
            links[1].normalized.as_deref(),
            Some("https://example.com/paper.pdf")
        );
    }

    #[test]
    fn extract_links_dedupes_doi() {
        let text = "doi:10.1000/abc123. See also https://doi.org/10.1000/abc123";
        let links = extract_links(text);
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn extract_links_none() {
        assert!(extract_links("Smith, J. (2020). Learning theory.").is_empty());
    }

    #[test]
    fn parse_picks_kind() {
        assert_eq!(LinkCheck::parse("doi:10.1000/abc").kind, LinkKind::Doi);
        assert_eq!(LinkCheck::parse("https://example.com").kind, LinkKind::Url);
        let bad = LinkCheck::parse("10.12/x");
        assert!(matches!(bad.status, LinkStatus::Invalid { .. }));
        assert!(!bad.is_well_formed());
    }

    #[test]
    fn lookup_url_for_doi() {
        let check = LinkCheck::doi("10.1000/abc");
        assert_eq!(check.lookup_url().as_deref(), Some("https://doi.org/10.1000/abc"));
    }
}
