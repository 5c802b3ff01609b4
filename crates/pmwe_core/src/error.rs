use std::path::PathBuf;

use thiserror::Error;

/// Profile selection and validation failures. All of them are reported before
/// any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("profile \"{0}\" is not configured")]
    NotFound(String),
    #[error("no profile specified and multiple profiles are configured ({}), not guessing", .0.join(", "))]
    Ambiguous(Vec<String>),
    #[error("no profiles are configured")]
    NoneConfigured,
    #[error("the setting \"{0}\" is required")]
    MissingRequired(String),
    #[error("the setting \"{key}\" must be an absolute path to an executable, got \"{value}\"")]
    MustBeAbsolutePath { key: String, value: String },
    #[error("couldn't find executable \"{path}\" for setting \"{key}\"")]
    ExecutableNotFound { key: String, path: String },
    #[error("the setting \"{key}\" must be {expected}")]
    InvalidValue { key: String, expected: &'static str },
    #[error("failed to load {path}: {message}")]
    Load { path: PathBuf, message: String },
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("no page given and the profile has no default page")]
    Empty,
    #[error("invalid api endpoint {endpoint}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("could not write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no local source file to read from: {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A request that never produced a response.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RequestFailure {
    pub message: String,
}

impl RequestFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not access {url}: {message}")]
    Unreachable { url: String, message: String },
    #[error("authentication required for {url}")]
    AuthRequired { url: String },
    #[error("{url} returned page text that is not valid UTF-8")]
    NotUtf8 { url: String },
    #[error("failed to write to website: {message}\nchanges saved to \"{}\"", cache_file.display())]
    WriteFailed { message: String, cache_file: PathBuf },
    #[error("failed to write to website: {message}\nsaving a local copy also failed")]
    RecoveryFailed {
        message: String,
        #[source]
        source: CacheError,
    },
    #[error(transparent)]
    Address(#[from] PageError),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("edit step failed: {0}")]
    Edit(String),
}
