use std::env;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use serde::Serialize;
use tracing::debug;

use crate::cache::LocalCache;
use crate::error::{RequestFailure, TransportError};
use crate::page::{ACTION_EDIT, ACTION_SOURCE, PageReference};
use crate::profile::ServerProfile;

pub const DEFAULT_USER_AGENT: &str = concat!("pmwe/", env!("CARGO_PKG_VERSION"));

/// PmWiki answers with its login form instead of page source when the
/// credentials are missing or wrong.
pub const AUTH_WALL_PREFIX: &str = "<!DOCTYPE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushOutcome {
    /// Old and new text were identical; nothing was sent.
    Unchanged,
    Written,
    /// Delete against a page the server reported as not found.
    AlreadyMissing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormResponse {
    pub status: u16,
    /// Raw response bytes; decoding is left to the caller.
    pub body: Vec<u8>,
}

impl FormResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one url-encoded form POST and returns the raw response.
pub trait FormPoster {
    fn post_form(
        &mut self,
        url: &Url,
        fields: &[(&str, String)],
    ) -> Result<FormResponse, RequestFailure>;
    fn request_count(&self) -> usize;
}

impl<T: FormPoster + ?Sized> FormPoster for &mut T {
    fn post_form(
        &mut self,
        url: &Url,
        fields: &[(&str, String)],
    ) -> Result<FormResponse, RequestFailure> {
        (**self).post_form(url, fields)
    }

    fn request_count(&self) -> usize {
        (**self).request_count()
    }
}

#[derive(Debug, Clone)]
pub struct PmWikiClientConfig {
    pub user_agent: String,
    /// `None` leaves request timing to the HTTP stack.
    pub timeout_ms: Option<u64>,
}

impl Default for PmWikiClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: None,
        }
    }
}

impl PmWikiClientConfig {
    pub fn from_env() -> Self {
        let user_agent = env::var("PMWE_USER_AGENT")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let timeout_ms = env::var("PMWE_HTTP_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok());
        Self {
            user_agent,
            timeout_ms,
        }
    }
}

pub struct PmWikiClient {
    client: Client,
    request_count: usize,
}

impl PmWikiClient {
    pub fn from_env() -> Result<Self, TransportError> {
        Self::new(PmWikiClientConfig::from_env())
    }

    pub fn new(config: PmWikiClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout_ms.map(Duration::from_millis))
            .cookie_store(true)
            .build()
            .map_err(|error| TransportError::Client(error.to_string()))?;
        Ok(Self {
            client,
            request_count: 0,
        })
    }
}

impl FormPoster for PmWikiClient {
    fn post_form(
        &mut self,
        url: &Url,
        fields: &[(&str, String)],
    ) -> Result<FormResponse, RequestFailure> {
        self.request_count += 1;
        let response = self
            .client
            .post(url.clone())
            .form(fields)
            .send()
            .map_err(|error| RequestFailure::new(error.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|error| RequestFailure::new(format!("failed to read response: {error}")))?;
        Ok(FormResponse {
            status,
            body: body.to_vec(),
        })
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

/// Pull and push exchanges against one profile's PmWiki endpoint.
pub struct PmWikiTransport<P: FormPoster> {
    poster: P,
    author: String,
    password: Option<String>,
    delete_word: String,
    cache: LocalCache,
}

impl<P: FormPoster> PmWikiTransport<P> {
    pub fn new(poster: P, profile: &ServerProfile, cache: LocalCache) -> Self {
        Self {
            poster,
            author: profile.author.clone(),
            password: profile.password.clone(),
            delete_word: profile.delete_word.clone(),
            cache,
        }
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn request_count(&self) -> usize {
        self.poster.request_count()
    }

    /// Current page source. Credentials are always sent; empty means anonymous.
    pub fn pull(&mut self, page: &PageReference) -> Result<String, TransportError> {
        let url = page.action_url(ACTION_SOURCE)?;
        let fields = [
            ("authid", self.author.clone()),
            ("authpw", self.password.clone().unwrap_or_default()),
        ];
        debug!("pulling {url}");
        let response =
            self.poster
                .post_form(&url, &fields)
                .map_err(|error| TransportError::Unreachable {
                    url: url.to_string(),
                    message: error.message,
                })?;

        if response.body.starts_with(AUTH_WALL_PREFIX.as_bytes()) {
            return Err(TransportError::AuthRequired {
                url: url.to_string(),
            });
        }
        if !response.is_success() {
            return Err(TransportError::Unreachable {
                url: url.to_string(),
                message: format!("HTTP {}", response.status),
            });
        }
        // Page text is never transcoded; anything but UTF-8 is refused.
        String::from_utf8(response.body).map_err(|_| TransportError::NotUtf8 {
            url: url.to_string(),
        })
    }

    /// Write `new` unless it equals `old`. A failed write leaves `new` in the
    /// local cache and names that file in the error.
    pub fn push(
        &mut self,
        page: &PageReference,
        old: &str,
        new: &str,
    ) -> Result<PushOutcome, TransportError> {
        if old == new {
            return Ok(PushOutcome::Unchanged);
        }
        self.write(page, new, false)
    }

    /// Push the delete word. A 404 means the page is already gone.
    pub fn delete(&mut self, page: &PageReference) -> Result<PushOutcome, TransportError> {
        let delete_word = self.delete_word.clone();
        self.write(page, &delete_word, true)
    }

    fn write(
        &mut self,
        page: &PageReference,
        text: &str,
        missing_ok: bool,
    ) -> Result<PushOutcome, TransportError> {
        let url = page.action_url(ACTION_EDIT)?;
        let mut fields = vec![
            ("action", ACTION_EDIT.to_string()),
            ("author", self.author.clone()),
            ("n", page.qualified_name.clone()),
            ("post", "1".to_string()),
            ("text", text.to_string()),
        ];
        // Some servers reject edits that carry empty auth fields.
        if let Some(password) = &self.password {
            fields.push(("authid", self.author.clone()));
            fields.push(("authpw", password.clone()));
        }

        debug!("pushing {} bytes to {url}", text.len());
        let failure = match self.poster.post_form(&url, &fields) {
            Ok(response) if response.is_success() => return Ok(PushOutcome::Written),
            Ok(response) if missing_ok && response.status == 404 => {
                return Ok(PushOutcome::AlreadyMissing);
            }
            Ok(response) => format!("{url} answered HTTP {}", response.status),
            Err(error) => error.message,
        };

        match self.cache.save(page, text) {
            Ok(cache_file) => Err(TransportError::WriteFailed {
                message: failure,
                cache_file,
            }),
            Err(source) => Err(TransportError::RecoveryFailed {
                message: failure,
                source,
            }),
        }
    }
}
