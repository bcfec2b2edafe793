use chrono::{DateTime, Utc};

/// Compact `yymmdd` stamp used to prefix page titles.
pub fn date_stamp(when: DateTime<Utc>) -> String {
    when.format("%y%m%d").to_string()
}

/// Prefix `raw` with a date stamp.
///
/// A `-` separator is inserted only when the raw title itself starts with a
/// digit, so the stamp stays readable without padding every title.
pub fn stamp_title(raw: &str, stamp: &str) -> String {
    if raw.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        format!("{stamp}-{raw}")
    } else {
        format!("{stamp}{raw}")
    }
}
