use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tags::extract_tags;
use crate::utils::ceil_div;

/// A free-text memo. `tags` is always derived from `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memo {
    pub id: i64,
    pub content: String,
    pub order: i64,
    pub tags: Vec<String>,
}

/// One timer run. Title tags are derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: i64,
    pub title: String,
    pub duration: i64, // minutes; elapsed minutes for partial sessions
    pub completed: bool,
    pub in_progress: bool,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub end_time: DateTime<Utc>,
    pub partial: bool,
}

/// Marker of the last app version a migration pass was attempted for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppVersion {
    pub version: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DarkModeSetting {
    #[serde(default)]
    pub dark_mode: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DontAskDeleteSetting {
    #[serde(default)]
    pub dont_ask: bool,
}

/// A named collection persisted as its own file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Sessions,
    Memos,
    Tags,
    DarkMode,
    DontAskDelete,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Sessions,
        Category::Memos,
        Category::Tags,
        Category::DarkMode,
        Category::DontAskDelete,
    ];

    /// Suffix in `<product>-<suffix>.json`
    pub fn file_suffix(self) -> &'static str {
        match self {
            Category::Sessions => "sessions",
            Category::Memos => "memos",
            Category::Tags => "tags",
            Category::DarkMode => "darkmode",
            Category::DontAskDelete => "dont-ask-delete",
        }
    }

    pub fn is_setting(self) -> bool {
        matches!(self, Category::DarkMode | Category::DontAskDelete)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_suffix())
    }
}

/// The typed content of one category file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collection {
    Sessions(Vec<Session>),
    Memos(Vec<Memo>),
    Tags(Vec<String>),
    DarkMode(bool),
    DontAskDelete(bool),
}

impl Collection {
    pub fn category(&self) -> Category {
        match self {
            Collection::Sessions(_) => Category::Sessions,
            Collection::Memos(_) => Category::Memos,
            Collection::Tags(_) => Category::Tags,
            Collection::DarkMode(_) => Category::DarkMode,
            Collection::DontAskDelete(_) => Category::DontAskDelete,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Session title is empty")]
    EmptyTitle,
    #[error("Session has not started yet")]
    NotStarted,
}

impl Memo {
    pub fn new(id: i64, content: impl Into<String>, order: i64) -> Self {
        let content = content.into();
        let tags = extract_tags(&content);
        Self { id, content, order, tags }
    }

    /// Replace the content and re-derive tags
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.tags = extract_tags(&self.content);
    }
}

impl Session {
    /// A session that ran for its preset duration (or was abandoned at the end)
    pub fn finished(
        id: i64,
        title: impl Into<String>,
        duration: i64,
        completed: bool,
        started: DateTime<Utc>,
        ended: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            duration,
            completed,
            in_progress: false,
            timestamp: started,
            end_time: ended,
            partial: false,
        }
    }

    /// A session stopped early; `duration` is the elapsed time rounded up to minutes
    pub fn partial(
        id: i64,
        title: impl Into<String>,
        elapsed_seconds: i64,
        started: DateTime<Utc>,
        ended: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(RecordError::EmptyTitle);
        }
        let elapsed_minutes = ceil_div(elapsed_seconds, 60);
        if elapsed_minutes <= 0 {
            return Err(RecordError::NotStarted);
        }
        Ok(Self {
            id,
            title,
            duration: elapsed_minutes,
            completed: true,
            in_progress: false,
            timestamp: started,
            end_time: ended,
            partial: true,
        })
    }

    pub fn tags(&self) -> Vec<String> {
        extract_tags(&self.title)
    }

    /// End of the session interval, used for overlap computations.
    ///
    /// A duration that does not fit the calendar collapses to the start.
    pub fn effective_end(&self) -> DateTime<Utc> {
        if self.end_time > self.timestamp {
            return self.end_time;
        }
        chrono::Duration::try_minutes(self.duration)
            .and_then(|length| self.timestamp.checked_add_signed(length))
            .unwrap_or(self.timestamp)
    }
}

/// Serialize instants as RFC 3339 UTC with millisecond precision and accept
/// either RFC 3339 strings or epoch milliseconds on the way in.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, TimeZone, Timelike, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Drop sub-millisecond precision so values survive a write/read cycle
    pub fn truncate_millis(value: DateTime<Utc>) -> DateTime<Utc> {
        let nanos = value.nanosecond() / 1_000_000 * 1_000_000;
        value.with_nanosecond(nanos).unwrap_or(value)
    }

    pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
        let parsed = match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            _ => None,
        };
        parsed.map(truncate_millis)
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}
