mod config;
mod logging;

use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use engine_logging::engine_info;

use courier_core::SyncSettings;
use courier_engine::{
    AuthProvider, AuthSettings, ContentExtractor, FeedSet, FeedSpec, Ledger, NotebookPublisher,
    SyncEngine, Transport, TransportSettings,
};

fn main() -> anyhow::Result<()> {
    logging::initialize(logging::LogDestination::Both);

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "courier.ron".to_string());
    let config = config::load(Path::new(&config_path))?;
    if config.client_id.trim().is_empty() {
        bail!("client_id is not configured; refusing to start");
    }
    engine_info!(
        "configuration loaded from {config_path} ({} feeds)",
        config.feeds.len()
    );
    // CI environments have no browser to sign in with.
    let unattended = config.unattended
        || env::var("CI").map(|value| value == "true").unwrap_or(false);

    let transport = Transport::new(TransportSettings {
        request_timeout: Duration::from_secs(config.request_timeout_secs),
        ..TransportSettings::default()
    })
    .context("building HTTP transport")?;

    let mut auth_settings = AuthSettings::new(config.client_id.clone(), config.cache_path.clone());
    auth_settings.authority = config.authority.clone();
    auth_settings.unattended = unattended;
    auth_settings.http_timeout = Duration::from_secs(config.request_timeout_secs);
    let mut auth = AuthProvider::new(auth_settings).context("building auth provider")?;
    // Fail fast: without a token the whole run would be publish noise.
    if auth.get_token().is_none() {
        bail!("authentication failed; nothing can be published");
    }

    let feeds: Vec<FeedSpec> = config
        .feeds
        .iter()
        .map(|entry| FeedSpec {
            name: entry.name.clone(),
            url: entry.url.clone(),
        })
        .collect();
    let source = FeedSet::new(&transport, feeds);
    let extractor = ContentExtractor::new(&transport);
    let mut publisher = NotebookPublisher::new(&transport, auth, config.api_base.clone());
    let ledger = Ledger::new(config.ledger_path.clone());
    let settings = SyncSettings {
        base_section: config.base_section.clone(),
        monthly_rotation: config.monthly_rotation,
        batch_limit: config.batch_limit,
        item_delay: Duration::from_secs(config.item_delay_secs),
    };

    let mut engine = SyncEngine::new(&settings, &source, &extractor, &mut publisher, &ledger);
    let summary = engine.run();
    println!(
        "sync finished: {} published, {} failed, {} already delivered",
        summary.published, summary.failed, summary.skipped
    );
    Ok(())
}
