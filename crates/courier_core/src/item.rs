use std::cmp::Ordering;

use chrono::{DateTime, Utc};

/// A single feed entry, normalised from any upstream feed.
///
/// Two items with equal `id` are the same delivery target, no matter how
/// their title or summary drifted between runs.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FeedItem {
    /// Stable identifier used for de-duplication: the upstream guid, falling
    /// back to the link, falling back to a digest of title and date.
    pub id: String,

    /// Human-readable headline.
    pub title: String,

    /// URL to the full content, when the feed provides one.
    pub link: Option<String>,

    /// Publication timestamp. `None` means the feed did not provide a usable
    /// date; such items sort after all dated ones.
    pub published: Option<DateTime<Utc>>,

    /// Display name of the feed this came from.
    pub source_name: String,

    /// The feed-provided summary markup, used when full-page extraction
    /// comes up empty.
    pub summary_html: Option<String>,
}

impl Ord for FeedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // `other` first so that `Some(newer) > Some(older)` gives newest-first,
        // and `None < Some(_)` sinks undated items to the bottom.
        other.published.cmp(&self.published)
    }
}

impl PartialOrd for FeedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
