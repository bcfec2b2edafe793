//! Orchestrates one sync pass over all configured feeds.

use std::thread;

use chrono::Utc;
use engine_logging::{engine_info, engine_warn};

use courier_core::{candidates, date_stamp, stamp_title, FeedItem, SyncSettings};

use crate::extract::Extractor;
use crate::feeds::ItemSource;
use crate::ledger::Ledger;
use crate::publish::{PagePublisher, PublishOutcome};
use crate::sanitize::sanitize;

/// Published when neither the page nor the feed summary yielded anything.
const MISSING_CONTENT_PLACEHOLDER: &str = "<p>No content could be retrieved for this item.</p>";

/// Aggregate result of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub published: usize,
    pub failed: usize,
    /// Items the ledger already knew about.
    pub skipped: usize,
}

/// One full pass: pull candidates, drop what the ledger already has, publish
/// the rest newest-first, and record confirmed deliveries — only confirmed
/// ones, so an interrupted run re-offers exactly the unconfirmed items.
pub struct SyncEngine<'a> {
    settings: &'a SyncSettings,
    source: &'a dyn ItemSource,
    extractor: &'a dyn Extractor,
    publisher: &'a mut dyn PagePublisher,
    ledger: &'a Ledger,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        settings: &'a SyncSettings,
        source: &'a dyn ItemSource,
        extractor: &'a dyn Extractor,
        publisher: &'a mut dyn PagePublisher,
        ledger: &'a Ledger,
    ) -> Self {
        Self {
            settings,
            source,
            extractor,
            publisher,
            ledger,
        }
    }

    pub fn run(&mut self) -> RunSummary {
        let delivered_before = self.ledger.load();
        engine_info!(
            "ledger holds {} previously delivered items",
            delivered_before.len()
        );

        let mut items = self.source.fetch_items();
        let fetched = items.len();
        items.sort();
        let mut fresh: Vec<FeedItem> = items
            .into_iter()
            .filter(|item| !delivered_before.contains(&item.id))
            .collect();
        let skipped = fetched - fresh.len();

        if fresh.is_empty() {
            engine_info!("nothing new across {fetched} fetched items");
            return RunSummary {
                published: 0,
                failed: 0,
                skipped,
            };
        }
        if fresh.len() > self.settings.batch_limit {
            engine_info!(
                "{} new items, limiting this run to {}",
                fresh.len(),
                self.settings.batch_limit
            );
            fresh.truncate(self.settings.batch_limit);
        }

        let mut confirmed: Vec<String> = Vec::new();
        let mut failed = 0usize;
        let total = fresh.len();
        for (index, item) in fresh.iter().enumerate() {
            if self.deliver(item) {
                confirmed.push(item.id.clone());
            } else {
                failed += 1;
            }
            if index + 1 < total {
                thread::sleep(self.settings.item_delay);
            }
        }

        if let Err(err) = self.ledger.append(&confirmed) {
            engine_warn!("could not record {} deliveries: {err}", confirmed.len());
        }

        let summary = RunSummary {
            published: confirmed.len(),
            failed,
            skipped,
        };
        engine_info!(
            "run finished: {} published, {} failed, {} already delivered",
            summary.published,
            summary.failed,
            summary.skipped
        );
        summary
    }

    /// Publish a single item. A `false` here never aborts the batch.
    fn deliver(&mut self, item: &FeedItem) -> bool {
        let link = item.link.as_deref().unwrap_or("");
        let extracted = self.extractor.extract(link, &item.source_name);

        let best_time = extracted
            .as_ref()
            .and_then(|content| content.published)
            .or(item.published)
            .unwrap_or_else(Utc::now);
        let title = stamp_title(&item.title, &date_stamp(best_time));

        let body = match &extracted {
            Some(content) if !content.html.trim().is_empty() => content.html.clone(),
            _ => {
                let summary = item.summary_html.as_deref().unwrap_or("");
                let fallback = sanitize(summary);
                if fallback.trim().is_empty() {
                    engine_warn!(
                        "no content for '{}' ({link}), publishing placeholder",
                        item.title
                    );
                    MISSING_CONTENT_PLACEHOLDER.to_string()
                } else {
                    fallback
                }
            }
        };

        for destination in candidates(
            &self.settings.base_section,
            Utc::now(),
            self.settings.monthly_rotation,
        ) {
            match self.publisher.create_page(&destination, &title, &body) {
                PublishOutcome::Created => {
                    engine_info!("published '{title}' to '{destination}'");
                    return true;
                }
                // Only a capacity signal is recoverable by relocation.
                PublishOutcome::Full => continue,
                PublishOutcome::Failed => {
                    engine_warn!("publish failed for '{}' ({link})", item.title);
                    return false;
                }
            }
        }
        engine_warn!("every destination is full; '{}' was not published", item.title);
        false
    }
}
