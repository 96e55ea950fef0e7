//! Delimited export of the aggregated table.

use serde::Serialize;

use crate::batch::Batch;
use crate::error::{ConfigError, Result};
use crate::fields::FieldPatternSet;
use crate::models::config::ExportConfig;

/// Header of the optional leading source column.
pub const SOURCE_COLUMN: &str = "Source File";

/// A serialized table ready to hand to a download affordance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportFile {
    pub file_name: String,
    pub mime_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Serializes batches as UTF-8 CSV with a header taken from the rule order.
#[derive(Debug, Clone)]
pub struct Exporter {
    columns: Vec<String>,
    delimiter: u8,
    include_source: bool,
    file_name: String,
    mime_type: String,
}

impl Exporter {
    pub fn new(config: &ExportConfig, rules: &FieldPatternSet) -> std::result::Result<Self, ConfigError> {
        if !config.delimiter.is_ascii() {
            return Err(ConfigError::Delimiter(config.delimiter));
        }

        Ok(Self {
            columns: rules.names().map(str::to_string).collect(),
            delimiter: config.delimiter as u8,
            include_source: config.include_source,
            file_name: config.file_name.clone(),
            mime_type: config.mime_type.clone(),
        })
    }

    /// Header row in output order.
    pub fn header(&self) -> Vec<&str> {
        let source = self.include_source.then_some(SOURCE_COLUMN);
        source
            .into_iter()
            .chain(self.columns.iter().map(String::as_str))
            .collect()
    }

    /// Serialize `batch`: one header row, then one row per record in batch order.
    ///
    /// Absent values are empty cells. Output is a pure function of the batch and
    /// column order.
    pub fn to_table_bytes(&self, batch: &Batch) -> Result<Vec<u8>> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(vec![]);

        wtr.write_record(self.header())?;

        for record in batch {
            let mut row: Vec<String> = Vec::with_capacity(self.columns.len() + 1);
            if self.include_source {
                row.push(record.source.clone());
            }
            row.extend(
                self.columns
                    .iter()
                    .map(|name| record.get(name).map(|v| v.to_string()).unwrap_or_default()),
            );
            wtr.write_record(&row)?;
        }

        let data = wtr.into_inner().map_err(|e| e.into_error())?;
        Ok(data)
    }

    /// Serialize `batch` together with its download file name and MIME type.
    pub fn export(&self, batch: &Batch) -> Result<ExportFile> {
        Ok(ExportFile {
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            bytes: self.to_table_bytes(batch)?,
        })
    }
}

/// Serialize `batch` as CSV with default export settings.
pub fn to_table_bytes(batch: &Batch, rules: &FieldPatternSet) -> Result<Vec<u8>> {
    Exporter::new(&ExportConfig::default(), rules)?.to_table_bytes(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::extract_fields;
    use crate::models::record::{ExtractedField, ExtractedRecord, FieldValue};
    use pretty_assertions::assert_eq;

    fn rules() -> FieldPatternSet {
        FieldPatternSet::from_pairs([
            ("Address Line 1", r"Address line 1\n(.+?)\s*\n"),
            ("Total Floor Area", r"Total Floor Area\n([\d.]+)"),
            ("BER Number", r"BER Number\n(\d+)\s*\n"),
        ])
        .unwrap()
    }

    fn record(source: &str, address: Option<&str>, area: Option<f64>) -> ExtractedRecord {
        ExtractedRecord::new(
            source,
            vec![
                ExtractedField {
                    name: "Address Line 1".to_string(),
                    value: address.map(|a| FieldValue::Text(a.to_string())),
                },
                ExtractedField {
                    name: "Total Floor Area".to_string(),
                    value: area.map(FieldValue::Number),
                },
                ExtractedField {
                    name: "BER Number".to_string(),
                    value: None,
                },
            ],
        )
    }

    #[test]
    fn test_header_and_rows() {
        let batch = Batch::from(vec![
            record("a.pdf", Some("12 Main St"), Some(88.5)),
            record("b.pdf", None, Some(120.0)),
        ]);

        let bytes = to_table_bytes(&batch, &rules()).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "Address Line 1,Total Floor Area,BER Number\n12 Main St,88.5,\n,120,\n"
        );
    }

    #[test]
    fn test_empty_batch_has_header_only() {
        let bytes = to_table_bytes(&Batch::new(), &rules()).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "Address Line 1,Total Floor Area,BER Number\n"
        );
    }

    #[test]
    fn test_escapes_delimiters_quotes_and_newlines() {
        let batch = Batch::from(vec![record("a.pdf", Some("Flat 2, \"The Mews\"\nDublin"), None)]);

        let bytes = to_table_bytes(&batch, &rules()).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "Address Line 1,Total Floor Area,BER Number\n\"Flat 2, \"\"The Mews\"\"\nDublin\",,\n"
        );
    }

    #[test]
    fn test_source_column_and_delimiter() {
        let config = ExportConfig {
            delimiter: ';',
            include_source: true,
            ..ExportConfig::default()
        };
        let exporter = Exporter::new(&config, &rules()).unwrap();
        let batch = Batch::from(vec![record("a.pdf", Some("12 Main St"), Some(88.5))]);

        let file = exporter.export(&batch).unwrap();
        assert_eq!(file.file_name, "extracted_data.csv");
        assert_eq!(file.mime_type, "text/csv");
        assert_eq!(
            String::from_utf8(file.bytes).unwrap(),
            "Source File;Address Line 1;Total Floor Area;BER Number\na.pdf;12 Main St;88.5;\n"
        );
    }

    #[test]
    fn test_rejects_non_ascii_delimiter() {
        let config = ExportConfig {
            delimiter: '§',
            ..ExportConfig::default()
        };
        assert!(matches!(
            Exporter::new(&config, &rules()),
            Err(ConfigError::Delimiter('§'))
        ));
    }

    #[test]
    fn test_export_is_deterministic() {
        let rules = FieldPatternSet::standard();
        let batch = Batch::from(vec![
            extract_fields("Address line 1\n12 Main St\nTotal Floor Area\n88.5", &rules),
            extract_fields("BER Result\nC1\nEPC\n250.75\n", &rules),
        ]);

        let first = to_table_bytes(&batch, &rules).unwrap();
        let second = to_table_bytes(&batch, &rules).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_columns_follow_rules_not_record_order() {
        let reversed = FieldPatternSet::from_pairs([
            ("BER Number", r"BER Number\n(\d+)\s*\n"),
            ("Address Line 1", r"Address line 1\n(.+?)\s*\n"),
        ])
        .unwrap();
        let batch = Batch::from(vec![record("a.pdf", Some("12 Main St"), Some(88.5))]);

        let bytes = to_table_bytes(&batch, &reversed).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "BER Number,Address Line 1\n,12 Main St\n"
        );
    }
}
