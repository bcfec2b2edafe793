use chrono::{DateTime, Datelike, Utc};

/// Upper bound on how many destinations a single item may be offered to.
pub const MAX_CANDIDATES: usize = 3;

/// Resolve a logical destination name into the ordered list of physical
/// container names a publish attempt may fall through.
///
/// The first candidate is `base`, suffixed with the current year-month when
/// monthly rotation is on. Every further candidate appends an overflow
/// marker to the first. The list is fully determined by `(base, now)`.
pub fn candidates(base: &str, now: DateTime<Utc>, monthly_rotation: bool) -> Vec<String> {
    let first = if monthly_rotation {
        format!("{} {:04}-{:02}", base, now.year(), now.month())
    } else {
        base.to_string()
    };

    let mut names = Vec::with_capacity(MAX_CANDIDATES);
    names.push(first.clone());
    for ordinal in 2..=MAX_CANDIDATES {
        names.push(format!("{first} ({ordinal})"));
    }
    names
}
