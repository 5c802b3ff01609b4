use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::config::{ProfileSet, Settings};
use crate::error::ConfigError;

pub const DEFAULT_GROUP: &str = "Main";
pub const DEFAULT_DELETE_WORD: &str = "delete";

pub const KEY_API: &str = "api";
pub const KEY_URL: &str = "url";
pub const KEY_AUTHOR: &str = "author";
pub const KEY_PASSWORD: &str = "password";
pub const KEY_DEFAULT_GROUP: &str = "defaultgroup";
pub const KEY_DELETE_WORD: &str = "deleteword";
pub const KEY_EDITOR: &str = "editor";
pub const KEY_BROWSER: &str = "browser";
pub const KEY_KEEP: &str = "keep";
pub const KEY_PAGE: &str = "page";
pub const KEY_PATH_STYLE: &str = "pathstyle";

/// How action addresses are built from the api endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Addressing {
    /// `base?n=Group.Name&action=X`
    #[default]
    Query,
    /// `base/Group/Name?action=X`
    Path,
}

/// A validated remote profile. Built once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProfile {
    pub name: String,
    pub api_endpoint: String,
    pub url_template: String,
    pub author: String,
    pub password: Option<String>,
    pub default_group: String,
    pub delete_word: String,
    pub editor_command: Option<String>,
    pub browser_command: Option<String>,
    pub keep_local_copy: bool,
    pub default_page: Option<String>,
    pub addressing: Addressing,
}

impl ServerProfile {
    pub fn from_settings(name: &str, settings: &Settings) -> Result<Self, ConfigError> {
        let api_endpoint = settings.get_required_string(KEY_API)?;
        let author = settings.get_required_string(KEY_AUTHOR)?;
        let url_template = settings
            .get_string(KEY_URL)?
            .unwrap_or_else(|| api_endpoint.clone());

        let editor_command = settings.get_string(KEY_EDITOR)?;
        if let Some(command) = &editor_command {
            validate_command(KEY_EDITOR, command)?;
        }
        let browser_command = settings.get_string(KEY_BROWSER)?;
        if let Some(command) = &browser_command {
            validate_command(KEY_BROWSER, command)?;
        }

        let addressing = if settings.get_bool(KEY_PATH_STYLE)?.unwrap_or(false) {
            Addressing::Path
        } else {
            Addressing::Query
        };

        Ok(Self {
            name: name.to_string(),
            api_endpoint,
            url_template,
            author,
            password: settings.get_string(KEY_PASSWORD)?,
            default_group: settings
                .get_string(KEY_DEFAULT_GROUP)?
                .unwrap_or_else(|| DEFAULT_GROUP.to_string()),
            delete_word: settings
                .get_string(KEY_DELETE_WORD)?
                .unwrap_or_else(|| DEFAULT_DELETE_WORD.to_string()),
            editor_command,
            browser_command,
            keep_local_copy: settings.get_bool(KEY_KEEP)?.unwrap_or(false),
            default_page: settings.get_string(KEY_PAGE)?,
            addressing,
        })
    }

    /// The editor command, required only once `edit` actually needs it.
    pub fn require_editor(&self) -> Result<&str, ConfigError> {
        self.editor_command
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired(KEY_EDITOR.to_string()))
    }

    pub fn require_browser(&self) -> Result<&str, ConfigError> {
        self.browser_command
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired(KEY_BROWSER.to_string()))
    }
}

/// Pick and validate one profile out of the configured set.
pub fn resolve_profile(
    profiles: &ProfileSet,
    selected: Option<&str>,
) -> Result<ServerProfile, ConfigError> {
    let selected = selected.map(str::trim).filter(|name| !name.is_empty());
    let name = match selected {
        Some(name) => name.to_string(),
        None => {
            let mut names = profiles.names();
            match names.len() {
                0 => return Err(ConfigError::NoneConfigured),
                1 => {
                    let name = names.remove(0);
                    info!("no profile specified, using \"{name}\"");
                    name
                }
                _ => return Err(ConfigError::Ambiguous(names)),
            }
        }
    };

    let settings = profiles
        .get(&name)
        .ok_or_else(|| ConfigError::NotFound(name.clone()))?;
    ServerProfile::from_settings(&name, settings)
}

/// The first whitespace-delimited token of `command` must name an existing
/// executable file.
pub fn validate_command(key: &str, command: &str) -> Result<(), ConfigError> {
    let program = command.split_whitespace().next().unwrap_or_default();
    if is_executable_file(Path::new(program)) {
        return Ok(());
    }
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        Err(ConfigError::ExecutableNotFound {
            key: key.to_string(),
            path: program.to_string(),
        })
    } else {
        Err(ConfigError::MustBeAbsolutePath {
            key: key.to_string(),
            value: program.to_string(),
        })
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}
