//! Startup migration: detect an install or update, find data left by an
//! earlier install and merge it into the current data directory.

use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{AppVersion, Category};
use crate::paths::PathResolver;
use crate::schema::{Defaults, MemoMigration, Migration, SessionMigration, detect_version, migrate_array};
use crate::storage::{StorageError, load_json, save_json};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Source path does not exist: {0:?}")]
    SourceMissing(PathBuf),
    #[error("Failed to create data directory {path:?}: {source}")]
    DataDirectory { path: PathBuf, source: io::Error },
    #[error("Failed to encode migrated record: {0}")]
    EncodeError(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Records merged per category in one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationCounts {
    pub sessions: usize,
    pub memos: usize,
    pub tags: usize,
    pub settings: usize,
}

impl MigrationCounts {
    fn record(&mut self, category: Category, count: usize) {
        if category.is_setting() {
            self.settings += count;
            return;
        }
        match category {
            Category::Sessions => self.sessions = count,
            Category::Memos => self.memos = count,
            _ => self.tags = count,
        }
    }

    /// True when sessions or memos came across; tags and settings alone don't count
    pub fn has_records(&self) -> bool {
        self.sessions > 0 || self.memos > 0
    }
}

/// Outcome of merging one legacy folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub success: bool,
    pub migrated: MigrationCounts,
    pub errors: Vec<String>,
}

impl Default for MergeReport {
    fn default() -> Self {
        Self {
            success: true,
            migrated: MigrationCounts::default(),
            errors: Vec::new(),
        }
    }
}

impl MergeReport {
    fn fail(&mut self, message: String) {
        self.success = false;
        self.errors.push(message);
    }

    fn record(&mut self, category: Category, result: Result<usize, MigrationError>) {
        match result {
            Ok(count) => self.migrated.record(category, count),
            Err(err) => {
                warn!(
                    target: "minit",
                    event = "category_merge_failed",
                    category = %category,
                    error = %err
                );
                self.fail(format!("{} migration failed: {}", category, err));
            }
        }
    }
}

/// Outcome of the once-per-launch migration check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartupReport {
    pub success: bool,
    pub migrated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<MigrationCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl StartupReport {
    fn nothing_migrated() -> Self {
        Self {
            success: true,
            migrated: false,
            path: None,
            details: None,
            errors: None,
        }
    }

    fn failed(errors: Vec<String>) -> Self {
        Self {
            success: false,
            errors: Some(errors),
            ..Self::nothing_migrated()
        }
    }
}

/// Decides whether a migration pass is due and runs it
#[derive(Debug, Clone)]
pub struct Migrator<'a> {
    paths: &'a PathResolver,
    current_version: String,
    scan_legacy: bool,
}

impl<'a> Migrator<'a> {
    pub fn new(paths: &'a PathResolver, current_version: impl Into<String>) -> Self {
        Self {
            paths,
            current_version: current_version.into(),
            scan_legacy: true,
        }
    }

    /// Skip the legacy folder search; only the version marker is maintained
    pub fn with_legacy_scan(mut self, enabled: bool) -> Self {
        self.scan_legacy = enabled;
        self
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// Version recorded by the last migration attempt, if any
    pub fn stored_version(&self) -> Option<String> {
        let path = self.paths.app_version_path();
        if !path.exists() {
            return None;
        }
        load_json(&path, Value::Null)
            .data
            .get("version")
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Due on first install (no marker) and on every version change
    pub fn is_due(&self) -> bool {
        match self.stored_version() {
            Some(stored) => stored != self.current_version,
            None => true,
        }
    }

    pub fn stamp_version(&self) -> Result<PathBuf, StorageError> {
        let marker = AppVersion {
            version: self.current_version.clone(),
            timestamp: Utc::now(),
        };
        save_json(&self.paths.app_version_path(), &marker)
    }

    fn stamp_or_warn(&self) {
        if let Err(err) = self.stamp_version() {
            warn!(target: "minit", event = "version_stamp_failed", error = %err);
        }
    }

    /// Run once per launch before any data is shown.
    ///
    /// Legacy folders are tried newest first; the first one that yields
    /// sessions or memos wins. The version marker is written in every case
    /// that gets past directory creation so the search is not repeated until
    /// the next version change.
    pub fn run_startup_migration(&self) -> StartupReport {
        if !self.is_due() {
            info!(target: "minit", event = "migration_not_due", version = %self.current_version);
            return StartupReport::nothing_migrated();
        }
        info!(target: "minit", event = "migration_due", version = %self.current_version);

        let current_dir = match self.paths.ensure_data_dir() {
            Ok(dir) => dir,
            Err(source) => {
                let err = MigrationError::DataDirectory {
                    path: self.paths.data_dir(),
                    source,
                };
                warn!(target: "minit", event = "migration_aborted", error = %err);
                return StartupReport::failed(vec![err.to_string()]);
            }
        };

        let candidates = if self.scan_legacy {
            self.paths.find_legacy_data_paths()
        } else {
            Vec::new()
        };

        if candidates.is_empty() {
            info!(target: "minit", event = "legacy_paths_not_found");
            self.stamp_or_warn();
            return StartupReport::nothing_migrated();
        }
        info!(target: "minit", event = "legacy_paths_found", count = candidates.len());

        let mut last_error = None;
        for candidate in &candidates {
            info!(target: "minit", event = "legacy_merge_attempt", path = %candidate.path.display());
            let report = self.migrate_from_path(&candidate.path, &current_dir);

            if report.success && report.migrated.has_records() {
                info!(
                    target: "minit",
                    event = "legacy_merge_succeeded",
                    path = %candidate.path.display(),
                    sessions = report.migrated.sessions,
                    memos = report.migrated.memos,
                    tags = report.migrated.tags,
                    settings = report.migrated.settings
                );
                self.stamp_or_warn();
                return StartupReport {
                    success: true,
                    migrated: true,
                    path: Some(candidate.path.clone()),
                    details: Some(report.migrated),
                    errors: (!report.errors.is_empty()).then_some(report.errors),
                };
            }

            if !report.errors.is_empty() {
                last_error = Some(report.errors.join(", "));
            }
        }

        match &last_error {
            Some(err) => warn!(target: "minit", event = "legacy_merge_failed", error = %err),
            None => info!(target: "minit", event = "legacy_data_empty"),
        }
        self.stamp_or_warn();
        StartupReport {
            success: last_error.is_none(),
            errors: last_error.map(|err| vec![err]),
            ..StartupReport::nothing_migrated()
        }
    }

    /// Merge every category found in `source` into `target`.
    ///
    /// Each category is isolated: a failure is recorded and the remaining
    /// categories still run.
    pub fn migrate_from_path(&self, source: &Path, target: &Path) -> MergeReport {
        let mut report = MergeReport::default();

        if !source.is_dir() {
            report.fail(MigrationError::SourceMissing(source.to_path_buf()).to_string());
            return report;
        }
        if let Err(source_err) = fs::create_dir_all(target) {
            let err = MigrationError::DataDirectory {
                path: target.to_path_buf(),
                source: source_err,
            };
            report.fail(err.to_string());
            return report;
        }

        report.record(
            Category::Sessions,
            self.merge_records::<SessionMigration>(Category::Sessions, source, target),
        );
        report.record(
            Category::Memos,
            self.merge_records::<MemoMigration>(Category::Memos, source, target),
        );
        report.record(Category::Tags, self.merge_tags(source, target));
        for setting in [Category::DarkMode, Category::DontAskDelete] {
            report.record(setting, self.copy_setting(setting, source, target));
        }

        report
    }

    /// Merge one record collection by id.
    ///
    /// Only the first source element is sniffed: a current-looking collection
    /// is copied as stored, anything older is migrated element by element.
    fn merge_records<M>(&self, category: Category, source: &Path, target: &Path) -> Result<usize, MigrationError>
    where
        M: Migration,
        M::Output: Serialize,
    {
        let source_path = self.paths.category_path_in(source, category);
        if !source_path.exists() {
            return Ok(0);
        }
        let items = array_or_empty(load_json(&source_path, json!([])).into_result()?, category, &source_path);
        let Some(first) = items.first() else {
            return Ok(0);
        };

        let incoming: Vec<Value> = if detect_version::<M>(first) != M::CURRENT {
            migrate_array::<M>(&Value::Array(items), &mut Defaults::now())
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<_, _>>()?
        } else {
            items
        };

        let target_path = self.paths.category_path_in(target, category);
        if !target_path.exists() {
            save_json(&target_path, &incoming)?;
            return Ok(incoming.len());
        }

        let mut existing = array_or_empty(load_json(&target_path, json!([])).into_result()?, category, &target_path);

        let mut known: HashSet<String> = existing.iter().filter_map(id_key).collect();
        let mut fresh: Vec<Value> = incoming
            .into_iter()
            .filter(|record| match id_key(record) {
                Some(id) => known.insert(id),
                None => true,
            })
            .collect();

        if fresh.is_empty() {
            return Ok(0);
        }

        if category == Category::Memos {
            let max_order = existing.iter().map(order_of).max().unwrap_or(-1);
            for (index, memo) in fresh.iter_mut().enumerate() {
                if let Some(fields) = memo.as_object_mut() {
                    fields.insert("order".to_string(), json!(max_order + 1 + index as i64));
                }
            }
        }

        let merged = fresh.len();
        existing.extend(fresh);
        save_json(&target_path, &existing)?;
        Ok(merged)
    }

    fn merge_tags(&self, source: &Path, target: &Path) -> Result<usize, MigrationError> {
        let source_path = self.paths.category_path_in(source, Category::Tags);
        if !source_path.exists() {
            return Ok(0);
        }
        let source_tags = string_list(load_json(&source_path, json!([])).into_result()?, &source_path);
        if source_tags.is_empty() {
            return Ok(0);
        }

        let target_path = self.paths.category_path_in(target, Category::Tags);
        let target_exists = target_path.exists();
        let mut merged = if target_exists {
            string_list(load_json(&target_path, json!([])).into_result()?, &target_path)
        } else {
            Vec::new()
        };

        let mut known: HashSet<String> = merged.iter().cloned().collect();
        let fresh: Vec<String> = source_tags
            .into_iter()
            .filter(|tag| known.insert(tag.clone()))
            .collect();

        if !target_exists || !fresh.is_empty() {
            merged.extend(fresh.iter().cloned());
            save_json(&target_path, &merged)?;
        }
        Ok(fresh.len())
    }

    /// Settings are copied only when the current install has none
    fn copy_setting(&self, category: Category, source: &Path, target: &Path) -> Result<usize, MigrationError> {
        let source_path = self.paths.category_path_in(source, category);
        let target_path = self.paths.category_path_in(target, category);
        if !source_path.exists() || target_path.exists() {
            return Ok(0);
        }
        let value = load_json(&source_path, Value::Null).into_result()?;
        save_json(&target_path, &value)?;
        Ok(1)
    }
}

/// Canonical text form of a record's `id`, so `1` and `1.0` compare equal
fn id_key(record: &Value) -> Option<String> {
    let id = record.get("id")?;
    match id {
        Value::Null => None,
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Some(i.to_string()),
            (None, Some(f)) if f.fract() == 0.0 => Some((f as i64).to_string()),
            _ => Some(n.to_string()),
        },
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn order_of(record: &Value) -> i64 {
    record
        .get("order")
        .and_then(|order| order.as_i64().or_else(|| order.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

/// Elements of a parsed category file; anything but an array counts as empty
fn array_or_empty(value: Value, category: Category, path: &Path) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        _ => {
            warn!(
                target: "minit",
                event = "category_not_an_array",
                category = %category,
                path = %path.display()
            );
            Vec::new()
        }
    }
}

fn string_list(value: Value, path: &Path) -> Vec<String> {
    array_or_empty(value, Category::Tags, path)
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn fixture() -> (TempDir, PathResolver) {
        let tmp = tempdir().unwrap();
        let resolver = PathResolver::new("minit", tmp.path().join("appdata"));
        (tmp, resolver)
    }

    fn write(path: &Path, value: Value) {
        save_json(path, &value).unwrap();
    }

    fn read(path: &Path) -> Value {
        load_json(path, Value::Null).into_result().unwrap()
    }

    #[test]
    fn id_keys_normalize_numbers() {
        assert_eq!(id_key(&json!({"id": 1})), Some("1".to_string()));
        assert_eq!(id_key(&json!({"id": 1.0})), Some("1".to_string()));
        assert_eq!(id_key(&json!({"id": "abc"})), Some("abc".to_string()));
        assert_eq!(id_key(&json!({"id": null})), None);
        assert_eq!(id_key(&json!({})), None);
    }

    #[test]
    fn sessions_merge_by_id() {
        let (tmp, resolver) = fixture();
        let source = tmp.path().join("legacy");
        let target = resolver.data_dir();
        let stamp = "2024-01-01T09:00:00.000Z";
        let session = |id: i64| json!({"id": id, "title": format!("s{}", id), "timestamp": stamp});
        write(&source.join("minit-sessions.json"), json!([session(2), session(3), session(4)]));
        write(&target.join("minit-sessions.json"), json!([session(1), session(2), session(3)]));

        let report = Migrator::new(&resolver, "1.0.0").migrate_from_path(&source, &target);
        assert!(report.success, "{:?}", report.errors);
        assert_eq!(report.migrated.sessions, 1);

        let merged = read(&target.join("minit-sessions.json"));
        let ids: Vec<i64> = merged.as_array().unwrap().iter().map(|s| s["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn memos_continue_after_max_order() {
        let (tmp, resolver) = fixture();
        let source = tmp.path().join("legacy");
        let target = resolver.data_dir();
        write(
            &source.join("minit-memos.json"),
            json!([
                {"id": 5, "content": "new #x", "order": 0},
                {"id": 1, "content": "dup", "order": 1},
                {"id": 6, "content": "another", "order": 7}
            ]),
        );
        write(
            &target.join("minit-memos.json"),
            json!([
                {"id": 1, "content": "a", "order": 0, "tags": []},
                {"id": 2, "content": "b", "order": 2, "tags": []}
            ]),
        );

        let report = Migrator::new(&resolver, "1.0.0").migrate_from_path(&source, &target);
        assert_eq!(report.migrated.memos, 2);

        let merged = read(&target.join("minit-memos.json"));
        let memos = merged.as_array().unwrap();
        assert_eq!(memos.len(), 4);
        assert_eq!(memos[2]["id"], json!(5));
        assert_eq!(memos[2]["order"], json!(3));
        assert_eq!(memos[2]["tags"], json!(["x"]));
        assert_eq!(memos[3]["id"], json!(6));
        assert_eq!(memos[3]["order"], json!(4));
    }

    #[test]
    fn current_sessions_copy_verbatim_into_empty_target() {
        let (tmp, resolver) = fixture();
        let source = tmp.path().join("legacy");
        let target = resolver.data_dir();
        let sessions = json!([
            {"id": 1, "title": "A", "timestamp": "2024-01-01T09:00:00.000Z"},
            {"id": 2, "title": "B", "timestamp": "2024-01-01T10:00:00.000Z", "duration": 25}
        ]);
        write(&source.join("minit-sessions.json"), sessions.clone());

        let report = Migrator::new(&resolver, "1.0.0").migrate_from_path(&source, &target);
        assert_eq!(report.migrated.sessions, 2);
        assert_eq!(read(&target.join("minit-sessions.json")), sessions);
    }

    #[test]
    fn tags_merge_without_duplicates() {
        let (tmp, resolver) = fixture();
        let source = tmp.path().join("legacy");
        let target = resolver.data_dir();
        write(&source.join("minit-tags.json"), json!(["work", "read", "gym", 4]));
        write(&target.join("minit-tags.json"), json!(["read"]));

        let report = Migrator::new(&resolver, "1.0.0").migrate_from_path(&source, &target);
        assert_eq!(report.migrated.tags, 2);
        assert_eq!(read(&target.join("minit-tags.json")), json!(["read", "work", "gym"]));
    }

    #[test]
    fn settings_never_overwrite() {
        let (tmp, resolver) = fixture();
        let source = tmp.path().join("legacy");
        let target = resolver.data_dir();
        write(&source.join("minit-darkmode.json"), json!({"darkMode": true}));
        write(&source.join("minit-dont-ask-delete.json"), json!({"dontAsk": true}));
        write(&target.join("minit-dont-ask-delete.json"), json!({"dontAsk": false}));

        let report = Migrator::new(&resolver, "1.0.0").migrate_from_path(&source, &target);
        assert_eq!(report.migrated.settings, 1);
        assert_eq!(read(&target.join("minit-darkmode.json")), json!({"darkMode": true}));
        assert_eq!(read(&target.join("minit-dont-ask-delete.json")), json!({"dontAsk": false}));
    }

    #[test]
    fn broken_category_does_not_stop_the_others() {
        let (tmp, resolver) = fixture();
        let source = tmp.path().join("legacy");
        let target = resolver.data_dir();
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("minit-sessions.json"), "{oops").unwrap();
        write(&source.join("minit-memos.json"), json!([{"id": 9, "content": "kept"}]));

        let report = Migrator::new(&resolver, "1.0.0").migrate_from_path(&source, &target);
        assert!(!report.success);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("sessions migration failed"));
        assert_eq!(report.migrated.sessions, 0);
        assert_eq!(report.migrated.memos, 1);
    }

    #[test]
    fn non_array_files_count_as_empty() {
        let (tmp, resolver) = fixture();
        let source = tmp.path().join("legacy");
        let target = resolver.data_dir();
        write(&source.join("minit-sessions.json"), json!({"not": "array"}));
        write(&source.join("minit-tags.json"), json!("work"));
        write(&source.join("minit-memos.json"), json!([{"id": 5, "content": "kept"}]));
        write(&target.join("minit-memos.json"), json!({"stale": true}));

        let report = Migrator::new(&resolver, "1.0.0").migrate_from_path(&source, &target);
        assert!(report.success, "{:?}", report.errors);
        assert_eq!(report.migrated.sessions, 0);
        assert_eq!(report.migrated.tags, 0);
        assert_eq!(report.migrated.memos, 1);
        assert!(!target.join("minit-sessions.json").exists());

        let memos = read(&target.join("minit-memos.json"));
        assert_eq!(memos.as_array().unwrap().len(), 1);
        assert_eq!(memos[0]["id"], json!(5));
        assert_eq!(memos[0]["order"], json!(0));
    }

    #[test]
    fn missing_source_is_reported() {
        let (tmp, resolver) = fixture();
        let report = Migrator::new(&resolver, "1.0.0")
            .migrate_from_path(&tmp.path().join("nowhere"), &resolver.data_dir());
        assert!(!report.success);
        assert_eq!(report.migrated, MigrationCounts::default());
    }

    #[test]
    fn due_until_stamped_with_same_version() {
        let (_tmp, resolver) = fixture();
        let migrator = Migrator::new(&resolver, "2.1.0");
        assert!(migrator.is_due());
        migrator.stamp_version().unwrap();
        assert_eq!(migrator.stored_version().as_deref(), Some("2.1.0"));
        assert!(!migrator.is_due());
        assert!(Migrator::new(&resolver, "2.2.0").is_due());
    }
}
