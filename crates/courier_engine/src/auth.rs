//! Bearer-token acquisition against an OAuth2 identity service.
//!
//! Every request for a token walks the same ladder: an unexpired cached
//! token, a silent refresh with the cached refresh token, and only then a
//! user-facing flow — device code when the process runs unattended,
//! authorization code with PKCE and a loopback redirect otherwise. A
//! successful sign-in is written to the credential cache immediately so a
//! crash later in the run cannot cost it.

use std::fmt;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use engine_logging::{engine_error, engine_info, engine_warn};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/consumers";
const SCOPES: &str = "Notes.Create Notes.ReadWrite offline_access";

/// Tokens this close to expiry are treated as already stale.
const EXPIRY_MARGIN_SECS: i64 = 120;

/// How long the loopback listener waits for the browser to come back.
const INTERACTIVE_WAIT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub client_id: String,
    pub authority: String,
    pub cache_path: PathBuf,
    /// Headless runs cannot open a browser; they get the device-code flow.
    pub unattended: bool,
    pub http_timeout: Duration,
}

impl AuthSettings {
    pub fn new(client_id: impl Into<String>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            client_id: client_id.into(),
            authority: DEFAULT_AUTHORITY.to_string(),
            cache_path: cache_path.into(),
            unattended: false,
            http_timeout: Duration::from_secs(30),
        }
    }
}

/// The durable half of the provider's state. Only the provider reads or
/// writes this; everything else sees derived bearer tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialCache {
    #[serde(default)]
    pub access_token: Option<String>,
    /// Unix seconds after which `access_token` is stale.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Cache plus its backing file, with an explicit save-if-dirty operation so
/// persistence is a decision rather than a side effect.
struct PersistedCache {
    path: PathBuf,
    cache: CredentialCache,
    dirty: bool,
}

impl PersistedCache {
    fn load(path: PathBuf) -> Self {
        let cache = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(cache) => cache,
                Err(err) => {
                    engine_warn!("credential cache {path:?} is unreadable, starting fresh: {err}");
                    CredentialCache::default()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => CredentialCache::default(),
            Err(err) => {
                engine_warn!("failed to read credential cache {path:?}: {err}");
                CredentialCache::default()
            }
        };
        Self {
            path,
            cache,
            dirty: false,
        }
    }

    fn record(&mut self, token: &TokenResponse, now: i64) {
        self.cache.access_token = Some(token.access_token.clone());
        self.cache.expires_at = token.expires_in.map(|secs| now + secs);
        if let Some(refresh) = &token.refresh_token {
            self.cache.refresh_token = Some(refresh.clone());
        }
        self.dirty = true;
    }

    fn save_if_dirty(&mut self) {
        if !self.dirty {
            return;
        }
        let text = match serde_json::to_string_pretty(&self.cache) {
            Ok(text) => text,
            Err(err) => {
                engine_warn!("failed to serialize credential cache: {err}");
                return;
            }
        };
        match fs::write(&self.path, text) {
            Ok(()) => {
                self.dirty = false;
                engine_info!("credential cache saved to {:?}", self.path);
            }
            Err(err) => engine_warn!("failed to save credential cache {:?}: {err}", self.path),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug)]
struct TokenFailure {
    code: String,
    description: Option<String>,
}

impl TokenFailure {
    fn transport(message: String) -> Self {
        Self {
            code: "transport".to_string(),
            description: Some(message),
        }
    }
}

impl fmt::Display for TokenFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{} ({description})", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

/// Owns the credential cache and produces bearer tokens on demand.
pub struct AuthProvider {
    settings: AuthSettings,
    client: reqwest::blocking::Client,
    credentials: PersistedCache,
}

impl AuthProvider {
    pub fn new(settings: AuthSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.http_timeout)
            .build()?;
        let credentials = PersistedCache::load(settings.cache_path.clone());
        Ok(Self {
            settings,
            client,
            credentials,
        })
    }

    /// Produce a bearer token, or `None` when every flow failed. Callers
    /// must treat `None` as fatal for the run; nothing can be published
    /// without a token.
    pub fn get_token(&mut self) -> Option<String> {
        if let Some(token) = self.silent_token() {
            return Some(token);
        }

        let acquired = if self.settings.unattended {
            self.device_code_flow()
        } else {
            self.interactive_flow()
        };
        match acquired {
            Some(response) => {
                let token = response.access_token.clone();
                self.credentials.record(&response, unix_now());
                self.credentials.save_if_dirty();
                Some(token)
            }
            None => {
                engine_error!("authentication failed; publishing is not possible without a token");
                None
            }
        }
    }

    fn silent_token(&mut self) -> Option<String> {
        if let (Some(token), Some(expires_at)) =
            (self.credentials.cache.access_token.clone(), self.credentials.cache.expires_at)
        {
            if expires_at - EXPIRY_MARGIN_SECS > unix_now() {
                return Some(token);
            }
        }

        let refresh = self.credentials.cache.refresh_token.clone()?;
        engine_info!("cached account found, attempting silent refresh");
        match self.token_request(&[
            ("client_id", self.settings.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh.as_str()),
            ("scope", SCOPES),
        ]) {
            Ok(response) => {
                let token = response.access_token.clone();
                self.credentials.record(&response, unix_now());
                self.credentials.save_if_dirty();
                Some(token)
            }
            Err(failure) => {
                engine_warn!("silent refresh failed: {failure}");
                None
            }
        }
    }

    fn device_code_flow(&self) -> Option<TokenResponse> {
        #[derive(Debug, Deserialize)]
        struct DeviceCodeResponse {
            device_code: String,
            user_code: String,
            verification_uri: String,
            #[serde(default)]
            expires_in: Option<u64>,
            #[serde(default)]
            interval: Option<u64>,
            #[serde(default)]
            message: Option<String>,
        }

        let url = format!("{}/oauth2/v2.0/devicecode", self.settings.authority);
        let response = match self
            .client
            .post(&url)
            .form(&[
                ("client_id", self.settings.client_id.as_str()),
                ("scope", SCOPES),
            ])
            .send()
        {
            Ok(response) => response,
            Err(err) => {
                engine_warn!("device code request failed: {err}");
                return None;
            }
        };
        if !response.status().is_success() {
            engine_warn!("device code request returned {}", response.status());
            return None;
        }
        let flow: DeviceCodeResponse = match response.json() {
            Ok(flow) => flow,
            Err(err) => {
                engine_warn!("device code response was malformed: {err}");
                return None;
            }
        };

        let instruction = flow.message.clone().unwrap_or_else(|| {
            format!(
                "open {} and enter the code {}",
                flow.verification_uri, flow.user_code
            )
        });
        engine_warn!("manual sign-in required: {instruction}");

        let deadline = Instant::now() + Duration::from_secs(flow.expires_in.unwrap_or(900));
        let mut pause = Duration::from_secs(flow.interval.unwrap_or(5));
        loop {
            if Instant::now() >= deadline {
                engine_warn!("device sign-in expired before it was completed");
                return None;
            }
            thread::sleep(pause);
            match self.token_request(&[
                ("client_id", self.settings.client_id.as_str()),
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                ("device_code", flow.device_code.as_str()),
            ]) {
                Ok(token) => return Some(token),
                Err(failure) if failure.code == "authorization_pending" => continue,
                Err(failure) if failure.code == "slow_down" => {
                    pause += Duration::from_secs(5);
                }
                Err(failure) => {
                    engine_warn!("device sign-in failed: {failure}");
                    return None;
                }
            }
        }
    }

    fn interactive_flow(&self) -> Option<TokenResponse> {
        let verifier = random_urlsafe();
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        let state = random_urlsafe();

        let listener = match TcpListener::bind(("127.0.0.1", 0)) {
            Ok(listener) => listener,
            Err(err) => {
                engine_warn!("cannot open loopback listener for sign-in: {err}");
                return None;
            }
        };
        let port = listener.local_addr().ok()?.port();
        let redirect_uri = format!("http://localhost:{port}/");

        let mut authorize =
            Url::parse(&format!("{}/oauth2/v2.0/authorize", self.settings.authority)).ok()?;
        authorize
            .query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("response_type", "code")
            .append_pair("response_mode", "query")
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("scope", SCOPES)
            .append_pair("state", &state)
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "S256");
        engine_warn!("manual sign-in required: open {authorize} in a browser");

        let code = wait_for_authorization_code(&listener, &state)?;
        match self.token_request(&[
            ("client_id", self.settings.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("code_verifier", verifier.as_str()),
            ("scope", SCOPES),
        ]) {
            Ok(token) => Some(token),
            Err(failure) => {
                engine_warn!("interactive sign-in failed: {failure}");
                None
            }
        }
    }

    fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse, TokenFailure> {
        let url = format!("{}/oauth2/v2.0/token", self.settings.authority);
        let response = self
            .client
            .post(&url)
            .form(params)
            .send()
            .map_err(|err| TokenFailure::transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| TokenFailure::transport(err.to_string()))?;

        if status.is_success() {
            serde_json::from_str(&body)
                .map_err(|err| TokenFailure::transport(format!("malformed token response: {err}")))
        } else {
            let parsed: TokenErrorBody = serde_json::from_str(&body).unwrap_or_default();
            let code = if parsed.error.is_empty() {
                status.to_string()
            } else {
                parsed.error
            };
            Err(TokenFailure {
                code,
                description: parsed.error_description,
            })
        }
    }
}

fn wait_for_authorization_code(listener: &TcpListener, expected_state: &str) -> Option<String> {
    if let Err(err) = listener.set_nonblocking(true) {
        engine_warn!("loopback listener setup failed: {err}");
        return None;
    }
    let deadline = Instant::now() + INTERACTIVE_WAIT;
    loop {
        match listener.accept() {
            Ok((mut stream, _)) => {
                if let Some(code) = read_redirect(&mut stream, expected_state) {
                    return Some(code);
                }
                // Stray request (favicon and friends); keep waiting.
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    engine_warn!("browser sign-in timed out");
                    return None;
                }
                thread::sleep(Duration::from_millis(200));
            }
            Err(err) => {
                engine_warn!("loopback accept failed: {err}");
                return None;
            }
        }
    }
}

fn read_redirect(stream: &mut TcpStream, expected_state: &str) -> Option<String> {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));

    let mut request_line = String::new();
    {
        let mut reader = BufReader::new(&mut *stream);
        if reader.read_line(&mut request_line).is_err() {
            return None;
        }
    }

    // "GET /?code=...&state=... HTTP/1.1"
    let target = request_line.split_whitespace().nth(1)?;
    let parsed = Url::parse(&format!("http://localhost{target}")).ok()?;
    let mut code = None;
    let mut state = None;
    let mut denial = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => denial = Some(value.into_owned()),
            _ => {}
        }
    }

    let body = if code.is_some() {
        "Sign-in complete. You can close this tab."
    } else {
        "No authorization code in request."
    };
    let _ = write!(
        stream,
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );

    if let Some(error) = denial {
        engine_warn!("authorization was denied: {error}");
        return None;
    }
    if state.as_deref() != Some(expected_state) {
        return None;
    }
    code
}

fn random_urlsafe() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn unix_now() -> i64 {
    Utc::now().timestamp()
}
