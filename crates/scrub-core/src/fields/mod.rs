//! Declarative field extraction.

pub mod coerce;
pub mod patterns;

pub use coerce::{coerce, coerce_capture, is_numeric};
pub use patterns::{STANDARD_FIELDS, STANDARD_PATTERNS};

use std::collections::HashSet;

use regex::Regex;
use tracing::trace;

use crate::error::ConfigError;
use crate::models::config::ExtractionConfig;
use crate::models::record::{ExtractedField, ExtractedRecord, FieldValue};

/// Trait for single-field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the first (leftmost) occurrence of the field.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all non-overlapping occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// A named rule with exactly one capture group.
#[derive(Debug, Clone)]
pub struct FieldPattern {
    name: String,
    regex: Regex,
}

impl FieldPattern {
    /// Compile a rule, rejecting patterns without exactly one capture group.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, ConfigError> {
        let name = name.into();
        let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            field: name.clone(),
            reason: e.to_string(),
        })?;

        // captures_len counts the implicit whole-match group
        let groups = regex.captures_len() - 1;
        if groups != 1 {
            return Err(ConfigError::CaptureGroups {
                field: name,
                found: groups,
            });
        }

        Ok(Self { name, regex })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl FieldExtractor for FieldPattern {
    type Output = FieldValue;

    fn extract(&self, text: &str) -> Option<FieldValue> {
        let caps = self.regex.captures(text)?;
        let value = coerce_capture(caps.get(1)?.as_str())?;
        trace!("{} -> {:?}", self.name, value);
        Some(value)
    }

    fn extract_all(&self, text: &str) -> Vec<FieldValue> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).and_then(|m| coerce_capture(m.as_str())))
            .collect()
    }
}

/// An ordered, immutable set of field rules with unique names.
#[derive(Debug, Clone)]
pub struct FieldPatternSet {
    patterns: Vec<FieldPattern>,
}

impl FieldPatternSet {
    /// Build a set from already-compiled rules.
    pub fn new(patterns: Vec<FieldPattern>) -> Result<Self, ConfigError> {
        if patterns.is_empty() {
            return Err(ConfigError::EmptyRuleSet);
        }

        let mut seen = HashSet::new();
        for p in &patterns {
            if !seen.insert(p.name.as_str()) {
                return Err(ConfigError::DuplicateField(p.name.clone()));
            }
        }

        Ok(Self { patterns })
    }

    /// Compile `(name, pattern)` pairs in order.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let patterns = pairs
            .into_iter()
            .map(|(name, pattern)| FieldPattern::new(name, pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(patterns)
    }

    /// Compile the rules declared in configuration.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ConfigError> {
        Self::from_pairs(
            config
                .fields
                .iter()
                .map(|f| (f.name.as_str(), f.pattern.as_str())),
        )
    }

    /// The nine standard certificate fields.
    pub fn standard() -> Self {
        STANDARD_PATTERNS.clone()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldPattern> {
        self.patterns.iter()
    }

    /// Field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.name())
    }

    /// Run every rule independently against `text`.
    ///
    /// Never fails: an unmatched rule yields an absent value, so the record always
    /// carries the full field set.
    pub fn extract(&self, source: &str, text: &str) -> ExtractedRecord {
        let fields = self
            .patterns
            .iter()
            .map(|p| ExtractedField {
                name: p.name.clone(),
                value: p.extract(text),
            })
            .collect();
        ExtractedRecord::new(source, fields)
    }
}

impl Default for FieldPatternSet {
    fn default() -> Self {
        Self::standard()
    }
}

/// Extract a record from `text` with `rules`. The source name is left empty.
pub fn extract_fields(text: &str, rules: &FieldPatternSet) -> ExtractedRecord {
    rules.extract("", text)
}
