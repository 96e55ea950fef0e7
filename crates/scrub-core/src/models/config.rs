//! Configuration structures for the scrub pipeline.

use serde::{Deserialize, Serialize};

/// Main configuration for the scrub pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrubConfig {
    /// Unlock strategy configuration.
    pub unlock: UnlockConfig,

    /// Field extraction rules.
    pub extraction: ExtractionConfig,

    /// Export settings.
    pub export: ExportConfig,
}

/// Which unlocker implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockStrategy {
    /// Decrypt in memory with lopdf. No filesystem side effects.
    #[default]
    InProcess,
    /// Run an external decrypt tool (qpdf) against temporary files.
    ExternalTool,
}

/// Unlocker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlockConfig {
    /// Strategy used for every document in a batch.
    pub strategy: UnlockStrategy,

    /// External program for the `external_tool` strategy.
    pub tool: String,

    /// Arguments passed before the input and output paths.
    pub tool_args: Vec<String>,

    /// Maximum time to wait for the external tool, in seconds.
    pub timeout_secs: u64,
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            strategy: UnlockStrategy::InProcess,
            tool: "qpdf".to_string(),
            tool_args: vec!["--decrypt".to_string(), "--remove-restrictions".to_string()],
            timeout_secs: 30,
        }
    }
}

impl UnlockConfig {
    /// Maximum wait for the external tool.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

/// A single named extraction rule as written in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPatternConfig {
    /// Field name, used as the export column header.
    pub name: String,

    /// Regular expression with exactly one capture group.
    pub pattern: String,
}

impl FieldPatternConfig {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
        }
    }
}

/// Field extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Ordered field rules. Order defines the export header.
    pub fields: Vec<FieldPatternConfig>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            fields: crate::fields::patterns::STANDARD_FIELDS
                .iter()
                .map(|(name, pattern)| FieldPatternConfig::new(*name, *pattern))
                .collect(),
        }
    }
}

/// Export configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// File name offered for the export.
    pub file_name: String,

    /// MIME type offered for the export.
    pub mime_type: String,

    /// Field delimiter.
    pub delimiter: char,

    /// Emit a leading column with the source document name.
    pub include_source: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_name: "extracted_data.csv".to_string(),
            mime_type: "text/csv".to_string(),
            delimiter: ',',
            include_source: false,
        }
    }
}

impl ScrubConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
