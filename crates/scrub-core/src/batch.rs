//! Batch aggregation with per-document failure isolation.
//!
//! Documents run one at a time through unlock, text extraction and field
//! extraction. A failing or panicking document is recorded and skipped; it never
//! aborts the batch.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::fields::FieldPatternSet;
use crate::models::config::ScrubConfig;
use crate::models::record::ExtractedRecord;
use crate::pdf::{unlocker_from_config, PdfTextExtractor, TextExtractor, Unlocker};

/// A named PDF buffer submitted for processing.
#[derive(Debug, Clone)]
pub struct InputDocument {
    /// Display name (usually the uploaded file name).
    pub name: String,
    /// Raw PDF bytes, possibly encrypted.
    pub bytes: Vec<u8>,
}

impl InputDocument {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Records of successfully processed documents, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Batch {
    records: Vec<ExtractedRecord>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ExtractedRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ExtractedRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExtractedRecord> {
        self.records.iter()
    }
}

impl From<Vec<ExtractedRecord>> for Batch {
    fn from(records: Vec<ExtractedRecord>) -> Self {
        Self { records }
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a ExtractedRecord;
    type IntoIter = std::slice::Iter<'a, ExtractedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Pipeline stage at which a document failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Decryption or restriction removal.
    Unlock,
    /// Opening the unlocked document or reading its text.
    Extract,
    /// Unexpected fault (panic) anywhere in the pipeline.
    Internal,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Unlock => f.write_str("unlock"),
            FailureStage::Extract => f.write_str("extract"),
            FailureStage::Internal => f.write_str("internal"),
        }
    }
}

/// A document that was skipped, with a short human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    pub name: String,
    pub stage: FailureStage,
    pub reason: String,
}

impl DocumentFailure {
    fn new(name: &str, stage: FailureStage, reason: impl fmt::Display) -> Self {
        Self {
            name: name.to_string(),
            stage,
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for DocumentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.reason)
    }
}

/// Advisory progress: documents attempted so far out of the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Completed fraction in `[0, 1]`. An empty batch counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Presentation hooks for a running batch. All methods default to no-ops.
pub trait BatchObserver {
    /// Called before a document enters the pipeline.
    fn on_start(&mut self, _name: &str, _index: usize, _total: usize) {}

    /// Called after each document, successful or not.
    fn on_progress(&mut self, _progress: Progress) {}

    /// Called when a document is skipped.
    fn on_failure(&mut self, _failure: &DocumentFailure) {}

    /// Checked before each document. Returning `false` stops the batch.
    fn should_continue(&self) -> bool {
        true
    }
}

/// Observer that ignores every event.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

/// Outcome of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Successfully extracted records.
    pub batch: Batch,
    /// Skipped documents, in submission order.
    pub failures: Vec<DocumentFailure>,
    /// Progress emitted after each attempted document.
    pub progress: Vec<Progress>,
    /// Documents submitted.
    pub total: usize,
    /// Documents attempted before completion or cancellation.
    pub attempted: usize,
    /// Whether the observer stopped the batch early.
    pub cancelled: bool,
    /// Wall time in milliseconds.
    pub processing_time_ms: u64,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.batch.len()
    }
}

/// Drives unlock, text extraction and field extraction over a batch.
pub struct BatchProcessor<U = Box<dyn Unlocker>, E = PdfTextExtractor> {
    unlocker: U,
    extractor: E,
    rules: FieldPatternSet,
}

impl BatchProcessor {
    /// Build a processor from configuration, compiling the field rules up front.
    pub fn from_config(config: &ScrubConfig) -> Result<Self, ConfigError> {
        let rules = FieldPatternSet::from_config(&config.extraction)?;
        Ok(Self::new(
            unlocker_from_config(&config.unlock),
            PdfTextExtractor::new(),
            rules,
        ))
    }
}

impl<U: Unlocker, E: TextExtractor> BatchProcessor<U, E> {
    pub fn new(unlocker: U, extractor: E, rules: FieldPatternSet) -> Self {
        Self {
            unlocker,
            extractor,
            rules,
        }
    }

    pub fn rules(&self) -> &FieldPatternSet {
        &self.rules
    }

    /// Run one document through the pipeline.
    pub fn process_document(&self, document: &InputDocument) -> Result<ExtractedRecord, DocumentFailure> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run_stages(document)));
        match result {
            Ok(outcome) => outcome,
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unexpected internal error".to_string());
                Err(DocumentFailure::new(&document.name, FailureStage::Internal, reason))
            }
        }
    }

    fn run_stages(&self, document: &InputDocument) -> Result<ExtractedRecord, DocumentFailure> {
        let unlocked = self
            .unlocker
            .unlock(&document.bytes)
            .map_err(|e| DocumentFailure::new(&document.name, FailureStage::Unlock, e))?;
        debug!("{} unlocked with {}", document.name, self.unlocker.name());

        let text = self
            .extractor
            .extract_text(&unlocked)
            .map_err(|e| DocumentFailure::new(&document.name, FailureStage::Extract, e))?;

        Ok(self.rules.extract(&document.name, &text))
    }

    /// Process `documents` strictly in order.
    ///
    /// Each document's buffers are dropped before the next one starts.
    pub fn process<I>(&self, documents: I, observer: &mut dyn BatchObserver) -> BatchReport
    where
        I: IntoIterator<Item = InputDocument>,
        I::IntoIter: ExactSizeIterator,
    {
        let start = Instant::now();
        let documents = documents.into_iter();
        let total = documents.len();

        let mut batch = Batch::new();
        let mut failures = Vec::new();
        let mut progress = Vec::with_capacity(total);
        let mut cancelled = false;

        for (index, document) in documents.enumerate() {
            if !observer.should_continue() {
                info!("Batch stopped after {} of {} documents", index, total);
                cancelled = true;
                break;
            }

            observer.on_start(&document.name, index, total);
            info!("Processing {} ({}/{})", document.name, index + 1, total);

            match self.process_document(&document) {
                Ok(record) => {
                    debug!(
                        "{}: matched {} of {} fields",
                        document.name,
                        record.matched_count(),
                        self.rules.len()
                    );
                    batch.push(record);
                }
                Err(failure) => {
                    warn!("Failed to process {} ({}): {}", failure.name, failure.stage, failure.reason);
                    observer.on_failure(&failure);
                    failures.push(failure);
                }
            }

            let step = Progress {
                completed: index + 1,
                total,
            };
            observer.on_progress(step);
            progress.push(step);
        }

        let attempted = progress.len();
        info!(
            "Batch complete: {} succeeded, {} failed, {} of {} attempted",
            batch.len(),
            failures.len(),
            attempted,
            total
        );

        BatchReport {
            batch,
            failures,
            progress,
            total,
            attempted,
            cancelled,
            processing_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Process `documents` with the unlocker, rules and defaults from `config`.
pub fn process_batch<I>(documents: I, config: &ScrubConfig) -> Result<BatchReport, ConfigError>
where
    I: IntoIterator<Item = InputDocument>,
    I::IntoIter: ExactSizeIterator,
{
    let processor = BatchProcessor::from_config(config)?;
    Ok(processor.process(documents, &mut NoopObserver))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractError, UnlockError};
    use crate::models::record::FieldValue;
    use crate::pdf::fixtures::{build_encrypted_pdf, build_pdf};
    use pretty_assertions::assert_eq;

    /// Fails on `LOCKED`, panics on `PANIC`, otherwise passes bytes through.
    struct StubUnlocker;

    impl Unlocker for StubUnlocker {
        fn name(&self) -> &str {
            "stub"
        }

        fn unlock(&self, document: &[u8]) -> Result<Vec<u8>, UnlockError> {
            if document.starts_with(b"LOCKED") {
                return Err(UnlockError::UnsupportedEncryption("AES-256 with user password".to_string()));
            }
            if document.starts_with(b"PANIC") {
                panic!("decoder blew up");
            }
            Ok(document.to_vec())
        }
    }

    /// Treats the bytes as the document text; fails on `BROKEN`.
    struct StubExtractor;

    impl TextExtractor for StubExtractor {
        fn extract_text(&self, document: &[u8]) -> Result<String, ExtractError> {
            if document.starts_with(b"BROKEN") {
                return Err(ExtractError::TextExtraction("bad content stream".to_string()));
            }
            String::from_utf8(document.to_vec()).map_err(|e| ExtractError::Parse(e.to_string()))
        }
    }

    fn stub_processor() -> BatchProcessor<StubUnlocker, StubExtractor> {
        BatchProcessor::new(StubUnlocker, StubExtractor, FieldPatternSet::standard())
    }

    fn doc(name: &str, text: &str) -> InputDocument {
        InputDocument::new(name, text.as_bytes())
    }

    #[derive(Default)]
    struct Recorder {
        started: Vec<String>,
        progress: Vec<Progress>,
        failures: Vec<String>,
        stop_after: Option<usize>,
    }

    impl BatchObserver for Recorder {
        fn on_start(&mut self, name: &str, _index: usize, _total: usize) {
            self.started.push(name.to_string());
        }

        fn on_progress(&mut self, progress: Progress) {
            self.progress.push(progress);
        }

        fn on_failure(&mut self, failure: &DocumentFailure) {
            self.failures.push(failure.to_string());
        }

        fn should_continue(&self) -> bool {
            self.stop_after.is_none_or(|n| self.started.len() < n)
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let docs = vec![
            doc("a.pdf", "Address line 1\n12 Main St\nTotal Floor Area\n88.5"),
            doc("b.pdf", "LOCKED"),
        ];

        let report = stub_processor().process(docs, &mut NoopObserver);

        assert_eq!(report.batch.len(), 1);
        let row = &report.batch.records()[0];
        assert_eq!(row.source, "a.pdf");
        assert_eq!(row.get("Address Line 1"), Some(&FieldValue::Text("12 Main St".to_string())));
        assert_eq!(row.get("Total Floor Area"), Some(&FieldValue::Number(88.5)));
        assert_eq!(row.matched_count(), 2);

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "b.pdf");
        assert_eq!(report.failures[0].stage, FailureStage::Unlock);
    }

    #[test]
    fn test_order_preserved_with_failures_skipped() {
        let docs: Vec<InputDocument> = (0..7)
            .map(|i| {
                if i == 2 || i == 5 {
                    doc(&format!("doc{}.pdf", i), "BROKEN")
                } else {
                    doc(&format!("doc{}.pdf", i), &format!("BER Number\n{}\n", 1000 + i))
                }
            })
            .collect();

        let report = stub_processor().process(docs, &mut NoopObserver);

        let sources: Vec<&str> = report.batch.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["doc0.pdf", "doc1.pdf", "doc3.pdf", "doc4.pdf", "doc6.pdf"]);

        let numbers: Vec<f64> = report
            .batch
            .iter()
            .filter_map(|r| r.get("BER Number").and_then(|v| v.as_number()))
            .collect();
        assert_eq!(numbers, vec![1000.0, 1001.0, 1003.0, 1004.0, 1006.0]);

        let failed: Vec<&str> = report.failures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(failed, vec!["doc2.pdf", "doc5.pdf"]);
        assert!(report.failures.iter().all(|f| f.stage == FailureStage::Extract));
    }

    #[test]
    fn test_schema_uniform_across_rows() {
        let docs = vec![
            doc("full.pdf", "Address line 1\nX\nEPC\n1\nCPC\n2\nBER Result\nA1\n"),
            doc("empty.pdf", ""),
        ];
        let processor = stub_processor();
        let report = processor.process(docs, &mut NoopObserver);

        let expected: Vec<&str> = processor.rules().names().collect();
        for record in &report.batch {
            assert_eq!(record.field_names().collect::<Vec<_>>(), expected);
        }
        assert_eq!(report.batch.records()[1].matched_count(), 0);
    }

    #[test]
    fn test_panic_is_isolated_to_one_document() {
        let docs = vec![doc("ok1.pdf", "EPC\n5"), doc("boom.pdf", "PANIC"), doc("ok2.pdf", "EPC\n6")];

        let report = stub_processor().process(docs, &mut NoopObserver);

        assert_eq!(report.batch.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, FailureStage::Internal);
        assert_eq!(report.failures[0].reason, "decoder blew up");
    }

    #[test]
    fn test_progress_is_monotonic_and_reported() {
        let docs = vec![doc("a", "x"), doc("b", "LOCKED"), doc("c", "y")];
        let mut recorder = Recorder::default();

        let report = stub_processor().process(docs, &mut recorder);

        let completed: Vec<usize> = recorder.progress.iter().map(|p| p.completed).collect();
        assert_eq!(completed, vec![1, 2, 3]);
        assert!(recorder.progress.iter().all(|p| p.total == 3));
        assert_eq!(report.progress, recorder.progress);
        assert_eq!(recorder.failures, vec!["b: unsupported encryption: AES-256 with user password"]);
        assert_eq!(recorder.progress.last().unwrap().fraction(), 1.0);
    }

    #[test]
    fn test_cooperative_cancellation() {
        let docs = vec![doc("a", "x"), doc("b", "y"), doc("c", "z"), doc("d", "w")];
        let mut recorder = Recorder {
            stop_after: Some(2),
            ..Recorder::default()
        };

        let report = stub_processor().process(docs, &mut recorder);

        assert!(report.cancelled);
        assert_eq!(report.attempted, 2);
        assert_eq!(report.total, 4);
        assert_eq!(report.batch.len(), 2);
        assert_eq!(recorder.started, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_batch() {
        let report = stub_processor().process(Vec::new(), &mut NoopObserver);
        assert!(report.batch.is_empty());
        assert!(report.failures.is_empty());
        assert_eq!(report.total, 0);
        assert!(!report.cancelled);
    }

    #[test]
    fn test_real_pipeline_isolates_malformed_document() {
        let good = build_pdf(&[&["Dwelling Type", "Detached house"]]);
        let docs = vec![
            InputDocument::new("good.pdf", good),
            InputDocument::new("garbage.pdf", b"definitely not a pdf".to_vec()),
        ];

        let report = process_batch(docs, &ScrubConfig::default()).unwrap();

        assert_eq!(report.batch.len(), 1);
        assert_eq!(report.batch.records()[0].source, "good.pdf");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "garbage.pdf");
        assert_eq!(report.failures[0].stage, FailureStage::Unlock);
    }

    #[test]
    fn test_real_pipeline_reads_restricted_document() {
        let restricted = build_encrypted_pdf(&[&["Dwelling Type", "Detached house"]]);
        let docs = vec![InputDocument::new("restricted.pdf", restricted)];

        let report = process_batch(docs, &ScrubConfig::default()).unwrap();

        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(report.batch.len(), 1);
        assert_eq!(report.batch.records()[0].source, "restricted.pdf");
    }

    #[test]
    fn test_invalid_rules_rejected_before_processing() {
        let mut config = ScrubConfig::default();
        config.extraction.fields[0].pattern = "no groups here".to_string();

        let err = process_batch(Vec::new(), &config).unwrap_err();
        assert!(matches!(err, ConfigError::CaptureGroups { .. }));
    }
}
