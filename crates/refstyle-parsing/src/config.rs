use regex::Regex;

use crate::section::HeaderPatterns;

/// Controls how a list of values is overridden from its defaults.
#[derive(Debug, Clone, Default)]
pub enum ListOverride<T> {
    /// Use the built-in defaults.
    #[default]
    Default,
    /// Completely replace the defaults with these values.
    Replace(Vec<T>),
    /// Append these values to the defaults.
    Extend(Vec<T>),
}

impl<T: Clone> ListOverride<T> {
    /// Resolve this override against the given defaults.
    pub fn resolve(&self, defaults: &[T]) -> Vec<T> {
        match self {
            ListOverride::Default => defaults.to_vec(),
            ListOverride::Replace(v) => v.clone(),
            ListOverride::Extend(v) => {
                let mut result = defaults.to_vec();
                result.extend(v.iter().cloned());
                result
            }
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ListOverride::Default)
    }
}

/// Configuration for the reference analysis pipeline.
///
/// Regex fields are `Option<Regex>`; `None` means "use the built-in default".
/// Use [`ParsingConfigBuilder`] to construct with string patterns.
#[derive(Debug, Clone)]
pub struct ParsingConfig {
    // ── section.rs ──
    /// Words that title a reference section ("References", "Works Cited", ...).
    pub(crate) header_words: ListOverride<String>,
    /// Header patterns compiled from a non-default vocabulary.
    pub(crate) header_patterns: Option<HeaderPatterns>,
    /// Regex for lines that end the reference section (Appendix, Acknowledgments, ...).
    pub(crate) section_end_re: Option<Regex>,
    /// Trailing pages searched by the content-pattern fallback (default: 3).
    pub(crate) fallback_pages: usize,
    /// Trailing share of lines searched by the content-pattern fallback (default: 0.25).
    pub(crate) fallback_fraction: f64,
    /// Reference indicators needed in the lines after a fallback start (default: 3).
    pub(crate) min_indicator_hits: usize,

    // ── split.rs ──
    /// Phrases marking placeholder text rather than a reference.
    pub(crate) noise_phrases: ListOverride<String>,
    /// Entries of this many characters or fewer are noise (default: 20).
    pub(crate) min_entry_len: usize,

    // ── text_processing.rs ──
    /// Compound-word suffixes that should preserve the hyphen.
    pub(crate) compound_suffixes: ListOverride<String>,

    // ── classify.rs ──
    /// Confidence below which an entry's style is Unknown (default: 0.3).
    pub(crate) min_confidence: f64,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            header_words: ListOverride::Default,
            header_patterns: None,
            section_end_re: None,
            fallback_pages: 3,
            fallback_fraction: 0.25,
            min_indicator_hits: 3,
            noise_phrases: ListOverride::Default,
            min_entry_len: 20,
            compound_suffixes: ListOverride::Default,
            min_confidence: 0.3,
        }
    }
}

impl ParsingConfig {
    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }
}

/// Builder for [`ParsingConfig`] that accepts string patterns.
#[derive(Debug, Clone, Default)]
pub struct ParsingConfigBuilder {
    header_words: ListOverrideBuilder,
    section_end_re: Option<String>,
    fallback_pages: Option<usize>,
    fallback_fraction: Option<f64>,
    min_indicator_hits: Option<usize>,
    noise_phrases: ListOverrideBuilder,
    min_entry_len: Option<usize>,
    compound_suffixes: ListOverrideBuilder,
    min_confidence: Option<f64>,
}

#[derive(Debug, Clone, Default)]
enum ListOverrideBuilder {
    #[default]
    Default,
    Replace(Vec<String>),
    Extend(Vec<String>),
}

impl ListOverrideBuilder {
    fn push(&mut self, value: String) {
        match self {
            ListOverrideBuilder::Extend(v) | ListOverrideBuilder::Replace(v) => v.push(value),
            ListOverrideBuilder::Default => *self = ListOverrideBuilder::Extend(vec![value]),
        }
    }

    fn into_override(self) -> ListOverride<String> {
        match self {
            ListOverrideBuilder::Default => ListOverride::Default,
            ListOverrideBuilder::Replace(v) => ListOverride::Replace(v),
            ListOverrideBuilder::Extend(v) => ListOverride::Extend(v),
        }
    }
}

impl ParsingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Section detection ──

    pub fn set_header_words(mut self, words: Vec<String>) -> Self {
        self.header_words = ListOverrideBuilder::Replace(words);
        self
    }

    pub fn add_header_word(mut self, word: String) -> Self {
        self.header_words.push(word);
        self
    }

    pub fn section_end_regex(mut self, pattern: &str) -> Self {
        self.section_end_re = Some(pattern.to_string());
        self
    }

    pub fn fallback_pages(mut self, pages: usize) -> Self {
        self.fallback_pages = Some(pages);
        self
    }

    pub fn fallback_fraction(mut self, fraction: f64) -> Self {
        self.fallback_fraction = Some(fraction.clamp(0.0, 1.0));
        self
    }

    pub fn min_indicator_hits(mut self, hits: usize) -> Self {
        self.min_indicator_hits = Some(hits);
        self
    }

    // ── Splitting ──

    pub fn set_noise_phrases(mut self, phrases: Vec<String>) -> Self {
        self.noise_phrases = ListOverrideBuilder::Replace(phrases);
        self
    }

    pub fn add_noise_phrase(mut self, phrase: String) -> Self {
        self.noise_phrases.push(phrase);
        self
    }

    pub fn min_entry_len(mut self, len: usize) -> Self {
        self.min_entry_len = Some(len);
        self
    }

    // ── Compound suffixes ──

    pub fn set_compound_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.compound_suffixes = ListOverrideBuilder::Replace(suffixes);
        self
    }

    pub fn add_compound_suffix(mut self, suffix: String) -> Self {
        self.compound_suffixes.push(suffix);
        self
    }

    // ── Classification ──

    pub fn min_confidence(mut self, threshold: f64) -> Self {
        self.min_confidence = Some(threshold.clamp(0.0, 1.0));
        self
    }

    /// Compile all string patterns into regexes and produce a [`ParsingConfig`].
    pub fn build(self) -> Result<ParsingConfig, regex::Error> {
        let header_words = self.header_words.into_override();
        let header_patterns = if header_words.is_default() {
            None
        } else {
            let words = header_words.resolve(&crate::section::default_header_words());
            Some(HeaderPatterns::new(&words)?)
        };

        Ok(ParsingConfig {
            header_words,
            header_patterns,
            section_end_re: self
                .section_end_re
                .map(|p| Regex::new(&p))
                .transpose()?,
            fallback_pages: self.fallback_pages.unwrap_or(3),
            fallback_fraction: self.fallback_fraction.unwrap_or(0.25),
            min_indicator_hits: self.min_indicator_hits.unwrap_or(3),
            noise_phrases: self.noise_phrases.into_override(),
            min_entry_len: self.min_entry_len.unwrap_or(20),
            compound_suffixes: self.compound_suffixes.into_override(),
            min_confidence: self.min_confidence.unwrap_or(0.3),
        })
    }
}
