//! Type coercion for captured values.

use crate::models::record::FieldValue;

/// Whether a trimmed capture is treated as numeric.
///
/// Only the first `.` is removed before the digit check, so `"37.5"`, `".5"` and
/// `"5."` are numeric while `"1.2.3"` and `"."` are not.
pub fn is_numeric(s: &str) -> bool {
    let stripped = s.replacen('.', "", 1);
    !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit())
}

/// Trim a capture and coerce it to a number when it passes [`is_numeric`].
pub fn coerce(raw: &str) -> FieldValue {
    let trimmed = raw.trim();
    if is_numeric(trimmed) {
        if let Ok(n) = trimmed.parse::<f64>() {
            return FieldValue::Number(n);
        }
    }
    FieldValue::Text(trimmed.to_string())
}

/// Like [`coerce`], but a capture that is blank after trimming is no value.
pub fn coerce_capture(raw: &str) -> Option<FieldValue> {
    if raw.trim().is_empty() {
        return None;
    }
    Some(coerce(raw))
}
