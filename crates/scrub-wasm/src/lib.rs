//! WASM bindings for PDF certificate field extraction.
//!
//! Runs the in-process pipeline in the browser: uploads are unlocked in memory,
//! so nothing touches a filesystem.

use wasm_bindgen::prelude::*;

use scrub_core::export::Exporter;
use scrub_core::models::config::ExportConfig;
use scrub_core::{
    extract_fields, Batch, BatchProcessor, DocumentFailure, FieldPatternSet, InProcessUnlocker,
    InputDocument, PdfTextExtractor,
};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Extract the standard fields from already-extracted document text.
#[wasm_bindgen]
pub fn extract_fields_from_text(text: &str) -> Result<JsValue, JsValue> {
    let record = extract_fields(text, &FieldPatternSet::standard());
    serde_wasm_bindgen::to_value(&record).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Unlock one PDF, extract its text and return the standard fields.
#[wasm_bindgen]
pub fn process_pdf(name: &str, bytes: &[u8]) -> Result<JsValue, JsValue> {
    let processor = BatchProcessor::new(
        InProcessUnlocker::new(),
        PdfTextExtractor::new(),
        FieldPatternSet::standard(),
    );
    let record = processor
        .process_document(&InputDocument::new(name, bytes))
        .map_err(|failure| JsValue::from_str(&failure.to_string()))?;

    serde_wasm_bindgen::to_value(&record).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Accumulates uploaded files one at a time and exports them as one table.
#[wasm_bindgen]
pub struct BatchSession {
    processor: BatchProcessor<InProcessUnlocker, PdfTextExtractor>,
    batch: Batch,
    failures: Vec<DocumentFailure>,
}

#[wasm_bindgen]
impl BatchSession {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            processor: BatchProcessor::new(
                InProcessUnlocker::new(),
                PdfTextExtractor::new(),
                FieldPatternSet::standard(),
            ),
            batch: Batch::new(),
            failures: Vec::new(),
        }
    }

    /// Process one upload. Returns `false` and records the failure if it was skipped.
    #[wasm_bindgen]
    pub fn add(&mut self, name: &str, bytes: &[u8]) -> bool {
        match self.processor.process_document(&InputDocument::new(name, bytes)) {
            Ok(record) => {
                self.batch.push(record);
                true
            }
            Err(failure) => {
                web_sys::console::warn_1(&JsValue::from_str(&format!(
                    "Failed to process {}",
                    failure
                )));
                self.failures.push(failure);
                false
            }
        }
    }

    /// Number of successfully processed uploads.
    #[wasm_bindgen(js_name = rowCount)]
    pub fn row_count(&self) -> usize {
        self.batch.len()
    }

    /// Skipped uploads as `{ name, stage, reason }` objects.
    #[wasm_bindgen]
    pub fn failures(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.failures).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Extracted rows as an array of record objects.
    #[wasm_bindgen]
    pub fn records(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.batch).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Export file name for the download link.
    #[wasm_bindgen(js_name = fileName)]
    pub fn file_name(&self) -> String {
        ExportConfig::default().file_name
    }

    /// CSV bytes of every row added so far.
    #[wasm_bindgen(js_name = toCsv)]
    pub fn to_csv(&self) -> Result<js_sys::Uint8Array, JsValue> {
        let exporter = Exporter::new(&ExportConfig::default(), self.processor.rules())
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let bytes = exporter
            .to_table_bytes(&self.batch)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(js_sys::Uint8Array::from(bytes.as_slice()))
    }
}

impl Default for BatchSession {
    fn default() -> Self {
        Self::new()
    }
}
