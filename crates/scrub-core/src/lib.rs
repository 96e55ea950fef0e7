//! Core library for scrubbing structured fields out of PDF certificates.
//!
//! This crate provides:
//! - PDF unlocking (in-process via lopdf, or an external decrypt tool)
//! - Page-ordered text extraction
//! - Declarative regex field extraction with numeric coercion
//! - Batch aggregation with per-document failure isolation
//! - Delimited (CSV) export of the aggregated table

pub mod batch;
pub mod error;
pub mod export;
pub mod fields;
pub mod models;
pub mod pdf;

pub use batch::{
    process_batch, Batch, BatchObserver, BatchProcessor, BatchReport, DocumentFailure,
    FailureStage, InputDocument, NoopObserver, Progress,
};
pub use error::{ConfigError, ExtractError, ScrubError, UnlockError, Result};
pub use export::{to_table_bytes, ExportFile, Exporter};
pub use fields::{extract_fields, FieldPattern, FieldPatternSet};
pub use models::config::ScrubConfig;
pub use models::record::{ExtractedField, ExtractedRecord, FieldValue};
pub use pdf::{unlocker_from_config, InProcessUnlocker, PdfTextExtractor, TextExtractor, Unlocker};

#[cfg(feature = "native")]
pub use pdf::ExternalToolUnlocker;
