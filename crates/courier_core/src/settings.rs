use std::time::Duration;

/// Run configuration handed to the sync engine at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Logical name of the destination container pages are filed under.
    pub base_section: String,
    /// Partition the destination by year-month instead of growing one
    /// container forever.
    pub monthly_rotation: bool,
    /// Ceiling on how many new items a single run will publish.
    pub batch_limit: usize,
    /// Pause between consecutive items, to stay friendly with upstream
    /// rate limits.
    pub item_delay: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            base_section: "Clippings".to_string(),
            monthly_rotation: true,
            batch_limit: 10,
            item_delay: Duration::from_secs(3),
        }
    }
}
