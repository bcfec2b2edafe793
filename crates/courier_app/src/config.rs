//! On-disk configuration for the courier binary, RON format.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// OAuth client identity; the one setting without a usable default.
    pub client_id: String,
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    #[serde(default = "default_base_section")]
    pub base_section: String,
    #[serde(default = "default_true")]
    pub monthly_rotation: bool,
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_delay_secs")]
    pub item_delay_secs: u64,
    #[serde(default)]
    pub unattended: bool,
    pub feeds: Vec<FeedEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedEntry {
    pub name: String,
    pub url: String,
}

pub fn load(path: &Path) -> anyhow::Result<AppConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read configuration file {path:?}"))?;
    ron::from_str(&text).with_context(|| format!("cannot parse configuration file {path:?}"))
}

fn default_authority() -> String {
    "https://login.microsoftonline.com/consumers".to_string()
}

fn default_api_base() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".courier_token_cache.json")
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from(".courier_ledger.txt")
}

fn default_base_section() -> String {
    "Clippings".to_string()
}

fn default_true() -> bool {
    true
}

fn default_batch_limit() -> usize {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_delay_secs() -> u64 {
    3
}
