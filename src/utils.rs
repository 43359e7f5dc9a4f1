use chrono::{DateTime, Utc};
use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

impl Profile {
    /// Directory name used under the platform config/data roots
    pub fn app_name(self, product: &str) -> String {
        match self {
            Profile::Dev => format!("{}-dev", product),
            Profile::Prod => product.to_string(),
        }
    }
}

/// Get the configuration directory path
/// If profile is Dev, uses "<product>-dev" instead of "<product>"
pub fn get_config_dir(product: &str, profile: Profile) -> Option<PathBuf> {
    // On macOS, this will use ~/Library/Application Support/<product>/
    ProjectDirs::from("com", product, &profile.app_name(product))
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the per-user application data root (the folder that holds `data/`)
/// If profile is Dev, uses "<product>-dev" instead of "<product>"
pub fn get_app_data_root(product: &str, profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", product, &profile.app_name(product))
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Milliseconds since the Unix epoch, the unit record ids are derived from
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format a number of seconds as `MM:SS`
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Split minutes into whole hours and remaining minutes
pub fn split_minutes(minutes: i64) -> (i64, i64) {
    (minutes / 60, minutes % 60)
}

/// Minutes between two instants, rounded up
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let millis = (end - start).num_milliseconds();
    ceil_div(millis, 60_000)
}

pub(crate) fn ceil_div(value: i64, divisor: i64) -> i64 {
    let quotient = value / divisor;
    if value % divisor > 0 { quotient + 1 } else { quotient }
}
