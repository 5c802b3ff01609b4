use reqwest::Url;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::PageError;
use crate::profile::{Addressing, ServerProfile};

/// Suffix of locally cached page sources.
pub const CACHE_SUFFIX: &str = ".pmwiki";

pub const ACTION_SOURCE: &str = "source";
pub const ACTION_EDIT: &str = "edit";

/// A page identifier normalized against one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageReference {
    pub raw_input: String,
    pub group: String,
    pub short_name: String,
    pub qualified_name: String,
    pub resolved_url: String,
    #[serde(skip)]
    api_endpoint: String,
    #[serde(skip)]
    addressing: Addressing,
}

impl PageReference {
    pub fn parse(profile: &ServerProfile, raw: &str) -> Result<Self, PageError> {
        let raw_input = raw.trim().to_string();
        let mut page = raw_input
            .strip_suffix(CACHE_SUFFIX)
            .unwrap_or(&raw_input)
            .to_string();
        if page.is_empty() {
            page = profile.default_page.clone().ok_or(PageError::Empty)?;
        }

        let mut segments = page.split('.');
        let first = segments.next().unwrap_or_default();
        let (group, short_name) = match segments.next() {
            Some(name) => (first.to_string(), name.to_string()),
            None => {
                info!("no group specified, using \"{}\"", profile.default_group);
                (profile.default_group.clone(), first.to_string())
            }
        };
        let dropped = segments.collect::<Vec<_>>();
        if !dropped.is_empty() {
            warn!(
                "ignoring trailing page segments \".{}\" in \"{page}\"",
                dropped.join(".")
            );
        }
        if group.is_empty() || short_name.is_empty() {
            return Err(PageError::Empty);
        }

        let resolved_url = profile
            .url_template
            .replace("$Group", &group)
            .replace("$Name", &short_name);

        Ok(Self {
            raw_input,
            qualified_name: format!("{group}.{short_name}"),
            group,
            short_name,
            resolved_url,
            api_endpoint: profile.api_endpoint.clone(),
            addressing: profile.addressing,
        })
    }

    /// Concrete request target for `action` under the profile's addressing style.
    pub fn action_url(&self, action: &str) -> Result<Url, PageError> {
        let invalid = |message: String| PageError::InvalidEndpoint {
            endpoint: self.api_endpoint.clone(),
            message,
        };
        match self.addressing {
            Addressing::Query => {
                let base = self.api_endpoint.trim_end_matches('/');
                let mut url = Url::parse(base).map_err(|error| invalid(error.to_string()))?;
                url.query_pairs_mut()
                    .append_pair("n", &self.qualified_name.replace('/', "."))
                    .append_pair("action", action);
                Ok(url)
            }
            Addressing::Path => {
                let mut url = Url::parse(&self.api_endpoint)
                    .map_err(|error| invalid(error.to_string()))?;
                url.path_segments_mut()
                    .map_err(|()| invalid("endpoint cannot be a base URL".to_string()))?
                    .pop_if_empty()
                    .push(&self.group)
                    .push(&self.short_name);
                url.query_pairs_mut().append_pair("action", action);
                Ok(url)
            }
        }
    }

    /// Local file name for this page's cached source.
    pub fn cache_file_name(&self) -> String {
        format!("{}{CACHE_SUFFIX}", self.qualified_name.replace('/', "."))
    }
}
