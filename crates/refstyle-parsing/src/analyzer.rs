use std::path::Path;

use refstyle_core::{
    Analysis, AnalyzedEntry, ComponentSet, Document, InTextCitations, LinkCheck, PdfBackend,
    ReferenceEntry, SectionOutcome, StyleMatch, ValidationResult, extract_links,
};

use crate::config::ParsingConfig;
use crate::split::SplitResult;
use crate::{ParsingError, citations, classify, components, section, split, validate};

/// A configurable reference analysis pipeline.
///
/// Holds a [`ParsingConfig`] and exposes each pipeline step as a method.
/// The default constructor uses built-in defaults; use
/// [`ReferenceAnalyzer::with_config`] to supply custom header words, noise
/// phrases and thresholds.
pub struct ReferenceAnalyzer {
    config: ParsingConfig,
}

impl Default for ReferenceAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceAnalyzer {
    /// Create an analyzer with default configuration.
    pub fn new() -> Self {
        Self {
            config: ParsingConfig::default(),
        }
    }

    /// Create an analyzer with a custom configuration.
    pub fn with_config(config: ParsingConfig) -> Self {
        Self { config }
    }

    /// Get a reference to the current config.
    pub fn config(&self) -> &ParsingConfig {
        &self.config
    }

    /// Locate the reference section (step 1).
    pub fn find_references_section(&self, doc: &Document) -> SectionOutcome {
        section::find_references_section_with_config(doc, &self.config)
    }

    /// Split a reference section into entries (step 2).
    pub fn split_references(&self, text: &str) -> SplitResult {
        split::split_references_with_config(text, &self.config)
    }

    /// Classify one entry's citation style (step 3).
    pub fn classify(&self, entry: &ReferenceEntry) -> StyleMatch {
        classify::classify_with_config(entry, &self.config)
    }

    /// Extract bibliographic components (step 4).
    pub fn extract_components(
        &self,
        entry: &ReferenceEntry,
        style_match: &StyleMatch,
        links: &[LinkCheck],
    ) -> ComponentSet {
        components::extract_components(entry, style_match, links)
    }

    /// Validate one entry against its style (step 5).
    pub fn validate(
        &self,
        entry: &ReferenceEntry,
        style_match: &StyleMatch,
        components: &ComponentSet,
        links: &[LinkCheck],
    ) -> ValidationResult {
        validate::validate(entry, style_match, components, links)
    }

    /// Run steps 3 to 5 on one entry.
    pub fn analyze_entry(&self, entry: ReferenceEntry) -> AnalyzedEntry {
        let style_match = self.classify(&entry);
        let links = extract_links(&entry.text);
        let components = self.extract_components(&entry, &style_match, &links);
        let validation = self.validate(&entry, &style_match, &components, &links);
        AnalyzedEntry {
            entry,
            style_match,
            components,
            validation,
            links,
        }
    }

    /// Run the full pipeline on a document.
    ///
    /// A document without a reference section is not an error: the result
    /// simply has no entries. Only a document with no text at all fails.
    pub fn analyze(&self, doc: &Document) -> Result<Analysis, ParsingError> {
        if doc.is_blank() {
            return Err(ParsingError::NoText);
        }

        let section = self.find_references_section(doc);
        let Some(found) = section.section() else {
            let in_text = citations::scan_citations(&doc.full_text(), &[]);
            return Ok(Analysis {
                section,
                entries: Vec::new(),
                split_stats: Default::default(),
                consistency: Default::default(),
                in_text,
                min_confidence: self.config.min_confidence,
            });
        };

        let SplitResult { entries, stats } = self.split_references(&found.text);
        let in_text = if found.body.trim().is_empty() {
            InTextCitations::default()
        } else {
            citations::scan_citations(&found.body, &entries)
        };
        let entries: Vec<AnalyzedEntry> = entries
            .into_iter()
            .map(|e| self.analyze_entry(e))
            .collect();
        let consistency = validate::check_consistency(&entries);

        tracing::info!(
            entries = entries.len(),
            noise = stats.noise,
            dominant = ?consistency.dominant,
            "analyzed reference list"
        );

        Ok(Analysis {
            section,
            entries,
            split_stats: stats,
            consistency,
            in_text,
            min_confidence: self.config.min_confidence,
        })
    }

    /// Run the pipeline on plain text, split into pages at
    /// `--- Page N ---` delimiter lines.
    pub fn analyze_text(&self, text: &str) -> Result<Analysis, ParsingError> {
        self.analyze(&Document::from_text(text))
    }

    /// Extract a PDF with `backend` and run the pipeline on it.
    pub fn analyze_file(
        &self,
        path: &Path,
        backend: &dyn PdfBackend,
    ) -> Result<Analysis, ParsingError> {
        let doc = backend.extract_document(path)?;
        self.analyze(&doc)
    }
}
