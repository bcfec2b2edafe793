use std::thread;
use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, StatusCode};

/// Browser-like identification; several feed hosts serve reduced or empty
/// markup to obvious bots.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    /// Total send attempts per call, first try included.
    pub max_attempts: usize,
    /// First retry delay; doubled per attempt.
    pub backoff_base: Duration,
    /// Ceiling on a single backoff pause, server hints included.
    pub backoff_cap: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_attempts: 4,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(60),
        }
    }
}

/// Blocking HTTP transport that absorbs transient upstream failures.
///
/// Overload statuses (429, most 5xx) and network-level errors are retried
/// with exponential backoff; every other response, success and hard failure
/// alike, is handed back untouched on the first attempt. Exhausting the
/// attempt ceiling yields `None`, never a panic or an error the caller has
/// to unwind.
pub struct Transport {
    client: Client,
    settings: TransportSettings,
}

impl Transport {
    pub fn new(settings: TransportSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()?;
        Ok(Self { client, settings })
    }

    /// Plain GET with the default headers.
    pub fn get(&self, url: &str) -> Option<Response> {
        self.request(Method::GET, url, HeaderMap::new(), None)
    }

    pub fn request(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Option<Response> {
        let attempts = self.settings.max_attempts.max(1);
        for attempt in 0..attempts {
            let mut builder = self.client.request(method.clone(), url).headers(headers.clone());
            if let Some(bytes) = body.clone() {
                builder = builder.body(bytes);
            }

            match builder.send() {
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable_status(status) {
                        return Some(response);
                    }
                    if attempt + 1 == attempts {
                        engine_warn!(
                            "giving up on {method} {url}: status {status} after {attempts} attempts"
                        );
                        return None;
                    }
                    let pause = retry_after_hint(response.headers())
                        .unwrap_or_else(|| self.backoff(attempt))
                        .min(self.settings.backoff_cap);
                    engine_debug!(
                        "transient status {status} from {url}, retrying in {pause:?} \
                         (attempt {}/{attempts})",
                        attempt + 1
                    );
                    thread::sleep(pause);
                }
                Err(err) => {
                    if !is_retryable_error(&err) {
                        engine_warn!("request to {url} failed: {err}");
                        return None;
                    }
                    if attempt + 1 == attempts {
                        engine_warn!("giving up on {method} {url} after {attempts} attempts: {err}");
                        return None;
                    }
                    let pause = self.backoff(attempt);
                    engine_debug!(
                        "request to {url} failed ({err}), retrying in {pause:?} \
                         (attempt {}/{attempts})",
                        attempt + 1
                    );
                    thread::sleep(pause);
                }
            }
        }
        None
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.settings
            .backoff_base
            .saturating_mul(factor)
            .min(self.settings.backoff_cap)
    }
}

/// 429 and server errors signal transient overload. 507 is the one server
/// error that does not: it reports a full destination container, which no
/// amount of waiting fixes, so it is surfaced to the caller immediately.
fn is_retryable_status(status: StatusCode) -> bool {
    if status == StatusCode::INSUFFICIENT_STORAGE {
        return false;
    }
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    if err.is_redirect() || err.is_builder() {
        return false;
    }
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn retry_after_hint(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
