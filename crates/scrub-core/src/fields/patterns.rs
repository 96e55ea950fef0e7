//! Standard field rules for energy-rating certificates.

use lazy_static::lazy_static;

use super::FieldPatternSet;

/// Default `(field name, pattern)` table. Order is the export header order.
///
/// Labels sit on their own line with the value on the next one, so most patterns
/// capture the following line lazily up to its trailing whitespace.
pub const STANDARD_FIELDS: &[(&str, &str)] = &[
    ("Address Line 1", r"Address line 1\n(.+?)\s*\n"),
    ("Address Line 2", r"Address line 2\n(.+?)\s*\n"),
    ("Address Line 3", r"Address line 3\n(.+?)\s*\n"),
    ("Dwelling Type", r"Dwelling Type\n(.+?)\s*\n"),
    ("Total Floor Area", r"Total Floor Area\n([\d.]+)"),
    ("BER Result", r"BER Result\n(\w+)\s*\n"),
    ("BER Number", r"BER Number\n(\d+)\s*\n"),
    ("EPC", r"EPC\n([\d.]+)"),
    ("CPC", r"CPC\n([\d.]+)"),
];

lazy_static! {
    /// Compiled standard rule set, shared read-only.
    pub static ref STANDARD_PATTERNS: FieldPatternSet =
        FieldPatternSet::from_pairs(STANDARD_FIELDS.iter().copied()).unwrap();
}
