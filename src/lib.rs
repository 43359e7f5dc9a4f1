pub mod cli;
pub mod config;
pub mod logging;
pub mod memos;
pub mod migration;
pub mod models;
pub mod paths;
pub mod schema;
pub mod sessions;
pub mod stats;
pub mod storage;
pub mod store;
pub mod tags;
pub mod utils;

pub use config::Config;
pub use migration::{MergeReport, MigrationCounts, Migrator, StartupReport};
pub use models::{Category, Collection, Memo, Session};
pub use paths::{LegacyCandidate, PathResolver, Platform};
pub use store::Store;
pub use utils::Profile;

/// Version compared with the stored marker to detect installs and updates
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
