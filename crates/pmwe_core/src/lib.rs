pub mod cache;
pub mod config;
pub mod error;
pub mod page;
pub mod profile;
pub mod sync;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use cache::LocalCache;
pub use config::{ProfileSet, Settings, load_profiles};
pub use error::{CacheError, ConfigError, PageError, SyncError, TransportError};
pub use page::PageReference;
pub use profile::{ServerProfile, resolve_profile};
pub use sync::{Orchestrator, SyncCommand, SyncOutcome, SyncReport, UserActions};
pub use transport::{PmWikiClient, PmWikiTransport, PushOutcome};
