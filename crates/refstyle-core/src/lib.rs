use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

pub mod backend;
pub mod config_file;
pub mod links;
pub mod rate_limit;
pub mod resolver;

// Re-export for convenience
pub use backend::{BackendError, PdfBackend};
pub use links::{LinkCheck, LinkKind, LinkStatus, extract_links};
pub use rate_limit::{AdaptiveHostLimiter, HostRateLimiters, LinkQueryError};
pub use resolver::{HttpResolver, LinkResolver, verify_link, verify_links};

/// Page delimiter line inserted between pages in user-editable text.
static PAGE_DELIMITER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^---[ \t]*Page[ \t]+\d+[ \t]*---[ \t]*$").unwrap());

/// An extracted document: the ordered text of each page.
///
/// Documents are immutable snapshots. Editing the text produces a new
/// `Document` via [`Document::from_text`]; nothing derived from an older
/// snapshot is carried over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Document {
    pages: Vec<String>,
}

impl Document {
    pub fn from_pages(pages: Vec<String>) -> Self {
        Self { pages }
    }

    /// Build a document from plain text.
    ///
    /// Lines of the form `--- Page N ---` split the text into pages, so the
    /// output of [`Document::to_text`] parses back into the same pages. Text
    /// without delimiters becomes a single page.
    pub fn from_text(text: &str) -> Self {
        let mut pages = Vec::new();
        let mut last = 0;
        let mut seen_delimiter = false;

        for m in PAGE_DELIMITER_RE.find_iter(text) {
            let chunk = &text[last..m.start()];
            if seen_delimiter {
                pages.push(trim_page_newlines(chunk).to_string());
            } else if !chunk.trim().is_empty() {
                pages.push(chunk.trim_end_matches('\n').to_string());
            }
            seen_delimiter = true;
            last = m.end();
        }

        if seen_delimiter {
            pages.push(trim_page_newlines(&text[last..]).to_string());
        } else {
            pages.push(text.to_string());
        }

        Self { pages }
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All pages concatenated with a newline between them.
    pub fn full_text(&self) -> String {
        self.pages.join("\n")
    }

    /// Render the document with `--- Page N ---` delimiters for editing.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (i, page) in self.pages.iter().enumerate() {
            out.push_str(&format!("--- Page {} ---\n{}\n", i + 1, page));
        }
        out
    }

    /// True when no page contains any non-whitespace text.
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|p| p.trim().is_empty())
    }
}

fn trim_page_newlines(chunk: &str) -> &str {
    let chunk = chunk.strip_prefix('\n').unwrap_or(chunk);
    chunk.strip_suffix('\n').unwrap_or(chunk)
}

/// The supported citation styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CitationStyle {
    #[serde(rename = "APA")]
    Apa,
    #[serde(rename = "MLA")]
    Mla,
    #[serde(rename = "Chicago")]
    Chicago,
    #[serde(rename = "IEEE")]
    Ieee,
    #[serde(rename = "ACM")]
    Acm,
}

impl CitationStyle {
    /// All styles in tie-break priority order. When two styles score the same
    /// confidence, the one listed first wins. The order has no meaning beyond
    /// making results reproducible.
    pub const ALL: [CitationStyle; 5] = [
        CitationStyle::Apa,
        CitationStyle::Mla,
        CitationStyle::Chicago,
        CitationStyle::Ieee,
        CitationStyle::Acm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CitationStyle::Apa => "APA",
            CitationStyle::Mla => "MLA",
            CitationStyle::Chicago => "Chicago",
            CitationStyle::Ieee => "IEEE",
            CitationStyle::Acm => "ACM",
        }
    }

    /// Position in [`CitationStyle::ALL`].
    pub fn priority(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CitationStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CitationStyle::ALL
            .into_iter()
            .find(|style| style.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown citation style: {}", s))
    }
}

/// How the start of a reference entry was recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    /// `[n]`
    Bracketed,
    /// `n.`
    NumberedPeriod,
    /// `n ` followed by a capitalized word
    PlainNumber,
    /// No number; the entry starts with an author list.
    AuthorLed,
}

/// A single citation from the reference list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceEntry {
    /// 0-based position in the reference list after noise filtering.
    pub index: usize,
    /// Sequence number carried by the entry marker, if numbered.
    pub number: Option<u32>,
    pub marker: MarkerKind,
    /// Raw entry text, wrapped lines joined, marker included.
    pub text: String,
}

impl ReferenceEntry {
    /// The entry text with its leading sequence marker removed.
    pub fn body(&self) -> &str {
        static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\[\d+\]\s*").unwrap());
        static PERIOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\.\s*").unwrap());
        static PLAIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\s+").unwrap());

        let re = match self.marker {
            MarkerKind::Bracketed => &BRACKETED,
            MarkerKind::NumberedPeriod => &PERIOD,
            MarkerKind::PlainNumber => &PLAIN,
            MarkerKind::AuthorLed => return self.text.trim(),
        };
        match re.find(&self.text) {
            Some(m) => self.text[m.end()..].trim(),
            None => self.text.trim(),
        }
    }
}

/// Confidence of a single style for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StyleScore {
    pub style: CitationStyle,
    pub confidence: f64,
}

/// Coarse bucket for displaying a confidence value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.8 {
            ConfidenceLevel::High
        } else if confidence >= 0.5 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConfidenceLevel::High => "High",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::Low => "Low",
        }
    }
}

/// The classification of one entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleMatch {
    /// Winning style, or `None` when no style reached the threshold.
    pub style: Option<CitationStyle>,
    /// Confidence of the best-scoring style, in `[0, 1]`.
    pub confidence: f64,
    /// Names of the rules the best-scoring style matched.
    pub matched_rules: Vec<String>,
    /// Confidence of every style, in priority order.
    pub scores: Vec<StyleScore>,
}

impl StyleMatch {
    pub fn label(&self) -> &'static str {
        self.style.map(CitationStyle::name).unwrap_or("Unknown")
    }

    pub fn is_known(&self) -> bool {
        self.style.is_some()
    }

    pub fn level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_confidence(self.confidence)
    }
}

/// Display value for a component that could not be extracted.
pub const MISSING: &str = "missing";

/// A bibliographic field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Authors,
    Year,
    Title,
    /// Journal, proceedings or other venue.
    Source,
    Volume,
    Issue,
    Pages,
    Doi,
    Url,
    Publisher,
    Location,
}

impl Component {
    pub const ALL: [Component; 11] = [
        Component::Authors,
        Component::Year,
        Component::Title,
        Component::Source,
        Component::Volume,
        Component::Issue,
        Component::Pages,
        Component::Doi,
        Component::Url,
        Component::Publisher,
        Component::Location,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Component::Authors => "authors",
            Component::Year => "year",
            Component::Title => "title",
            Component::Source => "source",
            Component::Volume => "volume",
            Component::Issue => "issue",
            Component::Pages => "pages",
            Component::Doi => "doi",
            Component::Url => "url",
            Component::Publisher => "publisher",
            Component::Location => "location",
        }
    }
}

/// Extracted fields of one entry. Fields that were not found are absent and
/// display as [`MISSING`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentSet {
    fields: BTreeMap<Component, String>,
}

impl ComponentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, component: Component) -> Option<&str> {
        self.fields.get(&component).map(String::as_str)
    }

    /// The field value, or `"missing"`.
    pub fn display(&self, component: Component) -> &str {
        self.get(component).unwrap_or(MISSING)
    }

    pub fn has(&self, component: Component) -> bool {
        self.fields.contains_key(&component)
    }

    /// Store a value. Surrounding whitespace and trailing separators are
    /// trimmed; empty values are ignored.
    pub fn set(&mut self, component: Component, value: &str) {
        let value = value.trim().trim_end_matches([',', ';', ':']).trim();
        if !value.is_empty() {
            self.fields.insert(component, value.to_string());
        }
    }

    /// Store a value only if the field is still missing.
    pub fn set_if_missing(&mut self, component: Component, value: &str) {
        if !self.has(component) {
            self.set(component, value);
        }
    }

    pub fn missing(&self) -> impl Iterator<Item = Component> + '_ {
        Component::ALL.into_iter().filter(|c| !self.has(*c))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Component, &str)> {
        self.fields.iter().map(|(c, v)| (*c, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for ComponentSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Component::ALL.len()))?;
        for component in Component::ALL {
            map.serialize_entry(component.name(), &self.get(component))?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
}

impl Issue {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// Ordered validation findings for one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub issues: Vec<Issue>,
}

impl ValidationResult {
    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    /// No errors (warnings are allowed).
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Number of entries in one style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleCount {
    pub style: CitationStyle,
    pub count: usize,
}

/// Document-level style consistency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsistencyVerdict {
    /// Most frequent style among confidently classified entries.
    pub dominant: Option<CitationStyle>,
    /// Other styles present, most frequent first.
    pub outliers: Vec<StyleCount>,
    /// Set when more than one style is present.
    pub warning: Option<String>,
}

impl ConsistencyVerdict {
    pub fn is_consistent(&self) -> bool {
        self.warning.is_none()
    }
}

/// Where the reference list was found to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Boundary {
    /// A header line such as "References" or "7. Bibliography".
    Header { line: usize, header: String },
    /// No header; the start of a run of reference-shaped lines.
    ContentPattern { line: usize },
}

impl Boundary {
    /// 0-based line index (in the full text) of the boundary.
    pub fn line(&self) -> usize {
        match self {
            Boundary::Header { line, .. } | Boundary::ContentPattern { line } => *line,
        }
    }
}

/// The located reference list and the body text before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceSection {
    pub boundary: Boundary,
    pub body: String,
    pub text: String,
}

/// Result of reference section detection. `NotFound` is a normal outcome
/// meaning "no references detected".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionOutcome {
    Found(ReferenceSection),
    NotFound,
}

impl SectionOutcome {
    pub fn section(&self) -> Option<&ReferenceSection> {
        match self {
            SectionOutcome::Found(section) => Some(section),
            SectionOutcome::NotFound => None,
        }
    }
}

/// Counts from splitting the reference list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitStats {
    /// Candidate entries before noise filtering.
    pub total_raw: usize,
    /// Candidates discarded as noise (page artifacts, placeholder text).
    pub noise: usize,
}

/// Citations found in the document body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InTextCitations {
    /// Distinct numbers cited as `[n]`, ascending.
    pub numeric: Vec<u32>,
    /// Distinct author-year citations, in order of first appearance.
    pub author_year: Vec<String>,
    /// Sentences containing at least one citation.
    pub sentences: Vec<String>,
    /// Cited numbers with no matching numbered entry.
    pub unresolved: Vec<u32>,
    /// Numbered entries never cited in the body.
    pub uncited: Vec<u32>,
}

impl InTextCitations {
    pub fn is_empty(&self) -> bool {
        self.numeric.is_empty() && self.author_year.is_empty()
    }
}

/// Everything derived for one reference entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzedEntry {
    pub entry: ReferenceEntry,
    pub style_match: StyleMatch,
    pub components: ComponentSet,
    pub validation: ValidationResult,
    pub links: Vec<LinkCheck>,
}

/// Share of entries in one style (`None` = Unknown).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleShare {
    pub style: Option<CitationStyle>,
    pub count: usize,
    pub percentage: f64,
}

impl StyleShare {
    pub fn label(&self) -> &'static str {
        self.style.map(CitationStyle::name).unwrap_or("Unknown")
    }
}

/// The complete result of analyzing one document.
///
/// Produced in one piece by the analysis pipeline; re-analysis yields a new
/// value rather than patching an old one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub section: SectionOutcome,
    pub entries: Vec<AnalyzedEntry>,
    pub split_stats: SplitStats,
    pub consistency: ConsistencyVerdict,
    pub in_text: InTextCitations,
    /// Threshold the entries were classified with.
    pub min_confidence: f64,
}

impl Analysis {
    pub fn references_found(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Entry counts per style, most frequent first. Ties follow style
    /// priority with Unknown last.
    pub fn style_distribution(&self) -> Vec<StyleShare> {
        let total = self.entries.len();
        let mut counts: BTreeMap<usize, (Option<CitationStyle>, usize)> = BTreeMap::new();
        for e in &self.entries {
            let style = e.style_match.style;
            // Unknown sorts after every style
            let key = style.map(CitationStyle::priority).unwrap_or(usize::MAX);
            counts.entry(key).or_insert((style, 0)).1 += 1;
        }

        let mut shares: Vec<StyleShare> = counts
            .into_values()
            .map(|(style, count)| StyleShare {
                style,
                count,
                percentage: if total == 0 {
                    0.0
                } else {
                    count as f64 * 100.0 / total as f64
                },
            })
            .collect();
        // Stable sort keeps the priority order among equal counts
        shares.sort_by(|a, b| b.count.cmp(&a.count));
        shares
    }

    /// All links across entries.
    pub fn links(&self) -> impl Iterator<Item = &LinkCheck> {
        self.entries.iter().flat_map(|e| e.links.iter())
    }

    /// Mutable access to all links, for recording network verification.
    pub fn links_mut(&mut self) -> impl Iterator<Item = &mut LinkCheck> {
        self.entries.iter_mut().flat_map(|e| e.links.iter_mut())
    }
}
