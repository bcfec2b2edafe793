//! Courier engine: feed ingestion, content extraction, and delivery.
mod auth;
mod decode;
mod extract;
mod feeds;
mod ledger;
mod publish;
mod sanitize;
mod sync;
mod transport;

pub use auth::{AuthProvider, AuthSettings, CredentialCache};
pub use decode::{decode_html, DecodedHtml};
pub use extract::{
    page_published_time, select_article_fragment, ContentExtractor, ExtractedContent, Extractor,
};
pub use feeds::{parse_channel, FeedSet, FeedSpec, ItemSource};
pub use ledger::{Ledger, LedgerError};
pub use publish::{NotebookPublisher, PagePublisher, PublishOutcome};
pub use sanitize::{sanitize, sanitize_with_base};
pub use sync::{RunSummary, SyncEngine};
pub use transport::{Transport, TransportSettings};
