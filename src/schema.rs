//! Record schema versions and the upgrades between them.
//!
//! Stored records carry no version field. Each record's version is sniffed
//! from its shape, the record is read into the matching shape, stepped up one
//! version at a time, and finally every required field is defaulted. Running
//! the whole pipeline over current data changes nothing.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::models::{Memo, Session, timestamp};
use crate::tags::extract_tags;

/// Structural schema version of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion(pub u32);

impl SchemaVersion {
    pub const V0: SchemaVersion = SchemaVersion(0);
    pub const V1: SchemaVersion = SchemaVersion(1);
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

pub const MEMO_SCHEMA_VERSION: SchemaVersion = SchemaVersion::V1;
pub const SESSION_SCHEMA_VERSION: SchemaVersion = SchemaVersion::V1;

/// Source of values for fields a record is missing.
///
/// Fallback ids start at the current epoch millisecond and increase by one
/// per use so records defaulted in the same batch stay distinct.
#[derive(Debug, Clone)]
pub struct Defaults {
    now: DateTime<Utc>,
    next_id: i64,
}

impl Defaults {
    pub fn at(now: DateTime<Utc>) -> Self {
        let now = timestamp::truncate_millis(now);
        Self {
            now,
            next_id: now.timestamp_millis(),
        }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn fallback_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// One record category's version history.
///
/// `Record` is a sum type with one variant per known shape. `upgrade` moves a
/// record exactly one version forward; `finish` turns a current-version record
/// into the output type, defaulting anything still missing.
pub trait Migration {
    type Record;
    type Output;

    const CURRENT: SchemaVersion;

    fn detect(raw: &Map<String, Value>) -> SchemaVersion;
    fn read(raw: &Map<String, Value>, version: SchemaVersion) -> Self::Record;
    fn version_of(record: &Self::Record) -> SchemaVersion;
    fn upgrade(record: Self::Record, defaults: &mut Defaults) -> Self::Record;
    fn finish(record: Self::Record, defaults: &mut Defaults) -> Self::Output;
}

/// Detect, upgrade and default one raw record. Non-objects yield `None`.
pub fn migrate_record<M: Migration>(raw: &Value, defaults: &mut Defaults) -> Option<M::Output> {
    let map = raw.as_object()?;
    let mut record = M::read(map, M::detect(map));
    loop {
        let version = M::version_of(&record);
        if version >= M::CURRENT {
            break;
        }
        record = M::upgrade(record, defaults);
        if M::version_of(&record) <= version {
            // no path forward from this version
            break;
        }
    }
    Some(M::finish(record, defaults))
}

/// Migrate every element of a raw collection; anything that is not an array
/// yields an empty collection and non-object elements are dropped.
pub fn migrate_array<M: Migration>(raw: &Value, defaults: &mut Defaults) -> Vec<M::Output> {
    match raw {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| migrate_record::<M>(item, defaults))
            .collect(),
        _ => Vec::new(),
    }
}

/// Version of a raw record; non-objects count as the oldest version
pub fn detect_version<M: Migration>(raw: &Value) -> SchemaVersion {
    raw.as_object().map_or(SchemaVersion::V0, M::detect)
}

// Lenient field readers. Falsy values (0, "", null, false) count as absent
// for ids and titles; the other fields only need the right JSON type.

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn read_int(raw: &Map<String, Value>, key: &str) -> Option<i64> {
    match raw.get(key)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_id(raw: &Map<String, Value>) -> Option<i64> {
    read_int(raw, "id").filter(|id| *id != 0)
}

fn read_string(raw: &Map<String, Value>, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

fn read_bool(raw: &Map<String, Value>, key: &str) -> Option<bool> {
    raw.get(key).and_then(Value::as_bool)
}

fn read_timestamp(raw: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    raw.get(key).and_then(timestamp::parse)
}

fn read_string_list(raw: &Map<String, Value>, key: &str) -> Vec<String> {
    raw.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Memo before tags existed: `{id, content, order}`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoV0 {
    pub id: Option<i64>,
    pub content: Option<String>,
    pub order: Option<i64>,
}

/// Memo with derived tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoV1 {
    pub id: Option<i64>,
    pub content: Option<String>,
    pub order: Option<i64>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoRecord {
    V0(MemoV0),
    V1(MemoV1),
}

pub struct MemoMigration;

impl MemoMigration {
    fn memo_v0_to_v1(memo: MemoV0, defaults: &mut Defaults) -> MemoV1 {
        let content = memo.content.unwrap_or_default();
        MemoV1 {
            id: Some(memo.id.unwrap_or_else(|| defaults.fallback_id())),
            tags: extract_tags(&content),
            content: Some(content),
            order: Some(memo.order.unwrap_or(0)),
        }
    }
}

impl Migration for MemoMigration {
    type Record = MemoRecord;
    type Output = Memo;

    const CURRENT: SchemaVersion = MEMO_SCHEMA_VERSION;

    fn detect(raw: &Map<String, Value>) -> SchemaVersion {
        if raw.get("tags").is_some_and(Value::is_array) {
            SchemaVersion::V1
        } else {
            SchemaVersion::V0
        }
    }

    fn read(raw: &Map<String, Value>, version: SchemaVersion) -> MemoRecord {
        let id = read_id(raw);
        let content = read_string(raw, "content");
        let order = read_int(raw, "order");
        if version >= SchemaVersion::V1 {
            MemoRecord::V1(MemoV1 {
                id,
                content,
                order,
                tags: read_string_list(raw, "tags"),
            })
        } else {
            MemoRecord::V0(MemoV0 { id, content, order })
        }
    }

    fn version_of(record: &MemoRecord) -> SchemaVersion {
        match record {
            MemoRecord::V0(_) => SchemaVersion::V0,
            MemoRecord::V1(_) => SchemaVersion::V1,
        }
    }

    fn upgrade(record: MemoRecord, defaults: &mut Defaults) -> MemoRecord {
        match record {
            MemoRecord::V0(memo) => MemoRecord::V1(Self::memo_v0_to_v1(memo, defaults)),
            current @ MemoRecord::V1(_) => current,
        }
    }

    fn finish(record: MemoRecord, defaults: &mut Defaults) -> Memo {
        let memo = match record {
            MemoRecord::V1(memo) => memo,
            MemoRecord::V0(memo) => Self::memo_v0_to_v1(memo, defaults),
        };
        let content = memo.content.unwrap_or_default();
        Memo {
            id: memo.id.unwrap_or_else(|| defaults.fallback_id()),
            // stored tags may have drifted from the content; content wins
            tags: extract_tags(&content),
            content,
            order: memo.order.unwrap_or(0),
        }
    }
}

/// Any session shape; every field may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDraft {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub duration: Option<i64>,
    pub completed: Option<bool>,
    pub in_progress: Option<bool>,
    pub timestamp: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub partial: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRecord {
    /// Missing one of `id`, `title` or `timestamp`
    V0(SessionDraft),
    V1(SessionDraft),
}

pub struct SessionMigration;

impl SessionMigration {
    fn fill(draft: SessionDraft, defaults: &mut Defaults) -> SessionDraft {
        let now = defaults.timestamp();
        SessionDraft {
            id: Some(draft.id.unwrap_or_else(|| defaults.fallback_id())),
            title: Some(draft.title.unwrap_or_default()),
            duration: Some(draft.duration.unwrap_or(0)),
            completed: Some(draft.completed.unwrap_or(false)),
            in_progress: Some(draft.in_progress.unwrap_or(false)),
            timestamp: Some(draft.timestamp.unwrap_or(now)),
            end_time: Some(draft.end_time.unwrap_or(now)),
            partial: Some(draft.partial.unwrap_or(false)),
        }
    }
}

impl Migration for SessionMigration {
    type Record = SessionRecord;
    type Output = Session;

    const CURRENT: SchemaVersion = SESSION_SCHEMA_VERSION;

    fn detect(raw: &Map<String, Value>) -> SchemaVersion {
        let complete = ["id", "title", "timestamp"]
            .iter()
            .all(|key| truthy(raw.get(*key)));
        if complete {
            SchemaVersion::V1
        } else {
            SchemaVersion::V0
        }
    }

    fn read(raw: &Map<String, Value>, version: SchemaVersion) -> SessionRecord {
        let draft = SessionDraft {
            id: read_id(raw),
            title: read_string(raw, "title").filter(|t| !t.is_empty()),
            duration: read_int(raw, "duration"),
            completed: read_bool(raw, "completed"),
            in_progress: read_bool(raw, "inProgress"),
            timestamp: read_timestamp(raw, "timestamp"),
            end_time: read_timestamp(raw, "endTime"),
            partial: read_bool(raw, "partial"),
        };
        if version >= SchemaVersion::V1 {
            SessionRecord::V1(draft)
        } else {
            SessionRecord::V0(draft)
        }
    }

    fn version_of(record: &SessionRecord) -> SchemaVersion {
        match record {
            SessionRecord::V0(_) => SchemaVersion::V0,
            SessionRecord::V1(_) => SchemaVersion::V1,
        }
    }

    fn upgrade(record: SessionRecord, defaults: &mut Defaults) -> SessionRecord {
        match record {
            SessionRecord::V0(draft) => SessionRecord::V1(Self::fill(draft, defaults)),
            current @ SessionRecord::V1(_) => current,
        }
    }

    fn finish(record: SessionRecord, defaults: &mut Defaults) -> Session {
        let draft = match record {
            SessionRecord::V0(draft) | SessionRecord::V1(draft) => Self::fill(draft, defaults),
        };
        let now = defaults.timestamp();
        Session {
            id: draft.id.unwrap_or_default(),
            title: draft.title.unwrap_or_default(),
            duration: draft.duration.unwrap_or(0),
            completed: draft.completed.unwrap_or(false),
            in_progress: draft.in_progress.unwrap_or(false),
            timestamp: draft.timestamp.unwrap_or(now),
            end_time: draft.end_time.unwrap_or(now),
            partial: draft.partial.unwrap_or(false),
        }
    }
}
