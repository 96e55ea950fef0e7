//! Page-ordered text extraction using lopdf and pdf-extract.

use lopdf::Document;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, trace};

use super::TextExtractor;
use crate::error::ExtractError;

/// Text extractor backed by pdf-extract.
#[derive(Debug, Clone, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Number of pages declared by the document's page tree.
    pub fn page_count(&self, document: &[u8]) -> Result<usize, ExtractError> {
        let doc = Document::load_mem(document).map_err(|e| ExtractError::Parse(e.to_string()))?;
        Ok(doc.get_pages().len())
    }

    /// Text of each page, in page order.
    pub fn extract_pages(&self, document: &[u8]) -> Result<Vec<String>, ExtractError> {
        let expected = self.page_count(document)?;
        if expected == 0 {
            return Err(ExtractError::NoPages);
        }

        // pdf-extract panics on some malformed fonts and content streams
        let pages = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(document)
        }))
        .map_err(|_| ExtractError::Panicked)?
        .map_err(|e| ExtractError::TextExtraction(e.to_string()))?;

        if pages.len() != expected {
            return Err(ExtractError::PageCount {
                expected,
                decoded: pages.len(),
            });
        }

        for (i, page) in pages.iter().enumerate() {
            trace!("page {}: {} chars", i, page.len());
        }
        Ok(pages)
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, document: &[u8]) -> Result<String, ExtractError> {
        let pages = self.extract_pages(document)?;
        let text = pages.concat();
        debug!("Extracted {} chars from {} pages", text.len(), pages.len());
        Ok(text)
    }
}
