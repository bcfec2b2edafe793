use chrono::{SecondsFormat, Utc};
use engine_logging::{engine_info, engine_warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use url::Url;

use courier_core::build_page_document;

use crate::auth::AuthProvider;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The page was created.
    Created,
    /// The destination container is at capacity; relocating may help.
    Full,
    /// Anything else; relocating will not help.
    Failed,
}

/// Seam between the sync engine and the notebook service.
pub trait PagePublisher {
    fn create_page(&mut self, destination: &str, title: &str, content_html: &str)
        -> PublishOutcome;
}

/// Publishes pages through the notebook service's pages endpoint.
pub struct NotebookPublisher<'a> {
    transport: &'a Transport,
    auth: AuthProvider,
    api_base: String,
}

impl<'a> NotebookPublisher<'a> {
    pub fn new(transport: &'a Transport, auth: AuthProvider, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self {
            transport,
            auth,
            api_base,
        }
    }

    /// The provider is owned here; the app borrows it once at startup to
    /// fail fast when no token can be acquired at all.
    pub fn auth_mut(&mut self) -> &mut AuthProvider {
        &mut self.auth
    }

    fn pages_url(&self, destination: &str) -> Option<String> {
        let mut url = Url::parse(&format!("{}/me/onenote/pages", self.api_base)).ok()?;
        // The service files the page into the named container, creating the
        // container on first use.
        url.query_pairs_mut().append_pair("sectionName", destination);
        Some(url.into())
    }
}

impl PagePublisher for NotebookPublisher<'_> {
    fn create_page(
        &mut self,
        destination: &str,
        title: &str,
        content_html: &str,
    ) -> PublishOutcome {
        let Some(token) = self.auth.get_token() else {
            return PublishOutcome::Failed;
        };
        let Some(url) = self.pages_url(destination) else {
            engine_warn!("invalid pages endpoint under {:?}", self.api_base);
            return PublishOutcome::Failed;
        };
        let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {token}")) else {
            return PublishOutcome::Failed;
        };

        let created = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let document = build_page_document(title, &created, content_html);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/xhtml+xml"));

        let Some(response) =
            self.transport
                .request(Method::POST, &url, headers, Some(document.into_bytes()))
        else {
            return PublishOutcome::Failed;
        };

        match response.status() {
            StatusCode::CREATED => PublishOutcome::Created,
            StatusCode::INSUFFICIENT_STORAGE => {
                engine_info!("destination '{destination}' reports it is full");
                PublishOutcome::Full
            }
            status => {
                let detail: String = response
                    .text()
                    .unwrap_or_default()
                    .chars()
                    .take(300)
                    .collect();
                engine_warn!("page create in '{destination}' failed with {status}: {detail}");
                PublishOutcome::Failed
            }
        }
    }
}
