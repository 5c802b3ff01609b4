use std::collections::{BTreeMap, VecDeque};

use reqwest::Url;

use crate::config::{ProfileSet, Settings};
use crate::error::RequestFailure;
use crate::page::PageReference;
use crate::profile::{KEY_API, KEY_AUTHOR, KEY_PASSWORD, ServerProfile, resolve_profile};
use crate::transport::{FormPoster, FormResponse};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub fields: BTreeMap<String, String>,
}

impl RecordedRequest {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Serves scripted responses in order and records every request.
#[derive(Debug, Default)]
pub struct MockPoster {
    pub responses: VecDeque<Result<FormResponse, RequestFailure>>,
    pub requests: Vec<RecordedRequest>,
}

impl MockPoster {
    pub fn with_responses(responses: Vec<Result<FormResponse, RequestFailure>>) -> Self {
        Self {
            responses: responses.into(),
            requests: Vec::new(),
        }
    }
}

impl FormPoster for MockPoster {
    fn post_form(
        &mut self,
        url: &Url,
        fields: &[(&str, String)],
    ) -> Result<FormResponse, RequestFailure> {
        self.requests.push(RecordedRequest {
            url: url.to_string(),
            fields: fields
                .iter()
                .map(|(key, value)| ((*key).to_string(), value.clone()))
                .collect(),
        });
        self.responses
            .pop_front()
            .unwrap_or_else(|| Err(RequestFailure::new("no scripted response left")))
    }

    fn request_count(&self) -> usize {
        self.requests.len()
    }
}

pub fn settings(password: Option<&str>) -> Settings {
    let settings = Settings::new()
        .with(KEY_API, "http://wiki.example/pmwiki.php")
        .with(KEY_AUTHOR, "alice");
    match password {
        Some(password) => settings.with(KEY_PASSWORD, password),
        None => settings,
    }
}

pub fn profile(password: Option<&str>) -> ServerProfile {
    resolve_profile(
        &ProfileSet::new().with("test", settings(password)),
        None,
    )
    .expect("resolve test profile")
}

pub fn page(profile: &ServerProfile, raw: &str) -> PageReference {
    PageReference::parse(profile, raw).expect("parse test page")
}
