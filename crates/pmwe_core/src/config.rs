use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use toml::Value;

use crate::error::ConfigError;

pub const CONFIG_ENV_VAR: &str = "PMWE_CONFIG";
pub const CONFIG_DIR_NAME: &str = "pmwe";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
struct ConfigFile {
    #[serde(default)]
    profiles: BTreeMap<String, toml::Table>,
}

/// Raw key-value settings of one profile, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: toml::Table,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// String setting; empty and whitespace-only values count as absent.
    pub fn get_string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::String(value)) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(trimmed.to_string()))
                }
            }
            Some(_) => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                expected: "a string",
            }),
        }
    }

    pub fn get_required_string(&self, key: &str) -> Result<String, ConfigError> {
        self.get_string(key)?
            .ok_or_else(|| ConfigError::MissingRequired(key.to_string()))
    }

    /// Boolean setting. Accepts TOML booleans and the usual ini spellings.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            expected: "a boolean",
        };
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::Boolean(value)) => Ok(Some(*value)),
            Some(Value::String(value)) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "yes" | "true" | "on" => Ok(Some(true)),
                "0" | "no" | "false" | "off" => Ok(Some(false)),
                _ => Err(invalid()),
            },
            Some(_) => Err(invalid()),
        }
    }
}

impl From<toml::Table> for Settings {
    fn from(values: toml::Table) -> Self {
        Self { values }
    }
}

/// All configured profiles, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileSet {
    profiles: BTreeMap<String, Settings>,
}

impl ProfileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, settings: Settings) {
        self.profiles.insert(name.into(), settings);
    }

    pub fn with(mut self, name: impl Into<String>, settings: Settings) -> Self {
        self.insert(name, settings);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Settings> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Resolve the config file location: explicit path > env PMWE_CONFIG > user config dir.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(value) = env::var(CONFIG_ENV_VAR) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load profiles from a TOML file. A missing file means no profiles are configured.
pub fn load_profiles(config_path: &Path) -> Result<ProfileSet, ConfigError> {
    if !config_path.exists() {
        return Ok(ProfileSet::default());
    }
    let content = fs::read_to_string(config_path).map_err(|error| ConfigError::Load {
        path: config_path.to_path_buf(),
        message: error.to_string(),
    })?;
    parse_profiles(&content).map_err(|message| ConfigError::Load {
        path: config_path.to_path_buf(),
        message,
    })
}

fn parse_profiles(content: &str) -> Result<ProfileSet, String> {
    let parsed: ConfigFile =
        toml::from_str(content).map_err(|error| format!("failed to parse: {error}"))?;
    let mut profiles = ProfileSet::default();
    for (name, table) in parsed.profiles {
        profiles.insert(name, Settings::from(table));
    }
    Ok(profiles)
}
