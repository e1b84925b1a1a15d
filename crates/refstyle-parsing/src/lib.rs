use std::path::Path;

use thiserror::Error;

pub mod analyzer;
pub mod citations;
pub mod classify;
pub mod components;
pub mod config;
pub mod section;
pub mod split;
pub mod text_processing;
pub mod validate;

pub use analyzer::ReferenceAnalyzer;
pub use citations::scan_citations;
pub use classify::{classify, score_styles};
pub use components::extract_components;
pub use config::{ListOverride, ParsingConfig, ParsingConfigBuilder};
pub use section::find_references_section;
pub use split::{SplitResult, split_references};
pub use validate::{check_consistency, check_style_consistency, validate};
// Re-export domain types from core (canonical definitions live there)
pub use refstyle_core::{Analysis, BackendError, Document, PdfBackend};

#[derive(Error, Debug)]
pub enum ParsingError {
    #[error("document contains no text")]
    NoText,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Analyze the references of a PDF file, using the given backend for text
/// extraction.
///
/// Pipeline:
/// 1. Extract page text via `backend`
/// 2. Locate the reference section
/// 3. Split it into entries, dropping noise
/// 4. Classify, extract components and validate each entry
/// 5. Check style consistency and scan the body for in-text citations
pub fn analyze_file(path: &Path, backend: &dyn PdfBackend) -> Result<Analysis, ParsingError> {
    ReferenceAnalyzer::new().analyze_file(path, backend)
}
