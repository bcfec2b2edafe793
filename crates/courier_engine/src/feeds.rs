//! Downloads the configured feeds and normalises their entries.

use chrono::{DateTime, Utc};
use engine_logging::{engine_info, engine_warn};
use rss::Channel;
use sha2::{Digest, Sha256};

use courier_core::FeedItem;

use crate::transport::Transport;

/// One configured upstream feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSpec {
    pub name: String,
    pub url: String,
}

/// Anything that can produce candidate items for a run.
pub trait ItemSource {
    fn fetch_items(&self) -> Vec<FeedItem>;
}

/// The fixed feed list, downloaded through the resilient transport. A feed
/// that fails to download or parse contributes nothing; it never aborts the
/// run.
pub struct FeedSet<'a> {
    transport: &'a Transport,
    feeds: Vec<FeedSpec>,
}

impl<'a> FeedSet<'a> {
    pub fn new(transport: &'a Transport, feeds: Vec<FeedSpec>) -> Self {
        Self { transport, feeds }
    }

    fn fetch_one(&self, feed: &FeedSpec) -> Option<Vec<FeedItem>> {
        let response = self.transport.get(&feed.url)?;
        let status = response.status();
        if !status.is_success() {
            engine_warn!("feed '{}' returned {status}", feed.name);
            return None;
        }
        let bytes = match response.bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                engine_warn!("reading feed '{}' failed: {err}", feed.name);
                return None;
            }
        };
        let channel = match Channel::read_from(bytes.as_ref()) {
            Ok(channel) => channel,
            Err(err) => {
                engine_warn!("feed '{}' failed to parse: {err}", feed.name);
                return None;
            }
        };
        Some(parse_channel(&channel, &feed.name))
    }
}

impl ItemSource for FeedSet<'_> {
    fn fetch_items(&self) -> Vec<FeedItem> {
        let mut items = Vec::new();
        for feed in &self.feeds {
            match self.fetch_one(feed) {
                Some(parsed) => {
                    engine_info!("feed '{}' yielded {} items", feed.name, parsed.len());
                    items.extend(parsed);
                }
                None => engine_warn!("feed '{}' contributed no items this run", feed.name),
            }
        }
        items
    }
}

/// Parse an already-fetched channel into normalised items.
///
/// Pure, so identity derivation is testable without the network. Identity
/// prefers the upstream guid, then the link, then a digest of the fields
/// that are left.
pub fn parse_channel(channel: &Channel, source_name: &str) -> Vec<FeedItem> {
    channel
        .items()
        .iter()
        .map(|item| {
            let title = item.title().unwrap_or("(untitled)").to_string();
            let link = item
                .link()
                .map(str::trim)
                .filter(|link| !link.is_empty())
                .map(str::to_string);
            let published = item
                .pub_date()
                .and_then(|raw| DateTime::parse_from_rfc2822(raw).ok())
                .map(|parsed| parsed.with_timezone(&Utc));
            let id = item
                .guid()
                .map(|guid| guid.value().trim().to_string())
                .filter(|guid| !guid.is_empty())
                .or_else(|| link.clone())
                .unwrap_or_else(|| composite_id(&title, item.pub_date().unwrap_or_default()));

            FeedItem {
                id,
                title,
                link,
                published,
                source_name: source_name.to_string(),
                summary_html: item.description().map(str::to_string),
            }
        })
        .collect()
}

/// Last-resort identity when a feed carries neither guid nor link.
fn composite_id(title: &str, pub_date: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(pub_date.as_bytes());
    let digest = hasher.finalize();

    let mut id = String::with_capacity(21);
    id.push_str("item:");
    for byte in digest.iter().take(8) {
        use std::fmt::Write;
        let _ = write!(&mut id, "{byte:02x}");
    }
    id
}
