use std::path::Path;

use mupdf::{Rect, TextPageFlags};

use refstyle_core::{BackendError, Document, PdfBackend};

/// [`PdfBackend`] that reads page text with MuPDF.
///
/// Keeps the mupdf dependency (AGPL-3.0) out of every crate that only
/// analyzes text.
///
/// Running heads and page footers are dropped by position: blocks lying
/// wholly in the top `header_margin` of a page, or starting in the bottom
/// `footer_margin`, never reach the document. Otherwise a footer such as
/// "Proceedings of the 12th Workshop  417" would be glued into whichever
/// reference straddles the page break.
pub struct MupdfBackend {
    header_margin: Option<f32>,
    footer_margin: Option<f32>,
}

impl Default for MupdfBackend {
    fn default() -> Self {
        Self {
            header_margin: Some(0.04),
            footer_margin: Some(0.05),
        }
    }
}

impl MupdfBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of page height treated as running head. `0.0` keeps everything.
    pub fn with_header_margin(mut self, ratio: f32) -> Self {
        self.header_margin = margin(ratio);
        self
    }

    /// Fraction of page height treated as footer. `0.0` keeps everything.
    pub fn with_footer_margin(mut self, ratio: f32) -> Self {
        self.footer_margin = margin(ratio);
        self
    }

    fn page_text(&self, page: &mupdf::Page) -> Result<String, BackendError> {
        let text_page = page
            .to_text_page(TextPageFlags::empty())
            .map_err(extraction_error)?;
        let bounds = page.bounds().map_err(extraction_error)?;
        let height = bounds.y1 - bounds.y0;

        let head_limit = self.header_margin.map(|r| bounds.y0 + height * r);
        let foot_limit = self.footer_margin.map(|r| bounds.y1 - height * r);

        let mut text = String::new();
        for block in text_page.blocks() {
            if in_margin(&block.bounds(), head_limit, foot_limit) {
                continue;
            }
            for line in block.lines() {
                text.extend(line.chars().map(|c| c.char().unwrap_or('\u{FFFD}')));
                text.push('\n');
            }
        }
        // Document pages carry no trailing newline
        while text.ends_with('\n') {
            text.pop();
        }
        Ok(text)
    }
}

fn margin(ratio: f32) -> Option<f32> {
    (ratio > 0.0).then(|| ratio.min(0.5))
}

fn in_margin(b: &Rect, head_limit: Option<f32>, foot_limit: Option<f32>) -> bool {
    head_limit.is_some_and(|limit| b.y1 <= limit) || foot_limit.is_some_and(|limit| b.y0 >= limit)
}

fn extraction_error(e: mupdf::Error) -> BackendError {
    BackendError::ExtractionError(e.to_string())
}

impl PdfBackend for MupdfBackend {
    fn extract_document(&self, path: &Path) -> Result<Document, BackendError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| BackendError::OpenError("path is not valid UTF-8".into()))?;
        let pdf = mupdf::Document::open(path_str)
            .map_err(|e| BackendError::OpenError(format!("{}: {}", path.display(), e)))?;

        let mut pages = Vec::new();
        for page in pdf.pages().map_err(extraction_error)? {
            let page = page.map_err(extraction_error)?;
            pages.push(self.page_text(&page)?);
        }

        tracing::debug!(path = %path.display(), pages = pages.len(), "extracted PDF text");
        Ok(Document::from_pages(pages))
    }
}
