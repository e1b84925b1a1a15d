use std::path::Path;

use thiserror::Error;

use crate::Document;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open document: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for PDF text extraction backends.
///
/// Implementors turn a file into per-page text; everything after that
/// (section detection, splitting, classification) lives in
/// `refstyle_parsing::ReferenceAnalyzer`.
pub trait PdfBackend: Send + Sync {
    /// Extract the text of every page, in order.
    fn extract_document(&self, path: &Path) -> Result<Document, BackendError>;
}
