#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde_json::{Value, json};
use tempfile::{TempDir, tempdir};

use minit::storage::{load_json, save_json};
use minit::{Category, Migrator, PathResolver, Platform, Store};

const VERSION: &str = "1.4.0";

struct Fixture {
    tmp: TempDir,
    resolver: PathResolver,
}

impl Fixture {
    fn new(legacy_dirs: &[&str]) -> Self {
        let tmp = tempdir().unwrap();
        let dirs: Vec<PathBuf> = legacy_dirs.iter().map(|d| tmp.path().join(d)).collect();
        let resolver = PathResolver::new("minit", tmp.path().join("appdata"))
            .with_platform(Platform::Linux)
            .with_extra_legacy_dirs(dirs);
        Self { tmp, resolver }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.tmp.path().join(relative)
    }

    fn migrator(&self) -> Migrator<'_> {
        Migrator::new(&self.resolver, VERSION)
    }

    fn current(&self, category: Category) -> Value {
        load_json(&self.resolver.category_path(category), Value::Null)
            .into_result()
            .unwrap()
    }
}

fn write_aged(path: &Path, value: Value, age_secs: u64) {
    save_json(path, &value).unwrap();
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
        .unwrap();
}

fn session(id: i64, title: &str) -> Value {
    json!({"id": id, "title": title, "timestamp": "2024-02-01T09:00:00.000Z"})
}

#[test]
fn fresh_install_without_legacy_data_stamps_version() {
    let fx = Fixture::new(&[]);

    let report = fx.migrator().run_startup_migration();

    assert!(report.success);
    assert!(!report.migrated);
    assert!(report.errors.is_none());
    let marker = load_json(&fx.resolver.app_version_path(), Value::Null).data;
    assert_eq!(marker["version"], json!(VERSION));
    assert!(marker["timestamp"].is_string());
}

#[test]
fn same_version_short_circuits() {
    let fx = Fixture::new(&["old/data"]);
    fx.migrator().stamp_version().unwrap();
    write_aged(&fx.path("old/data/minit-sessions.json"), json!([session(1, "A")]), 10);

    let report = fx.migrator().run_startup_migration();

    assert!(report.success);
    assert!(!report.migrated);
    assert!(!fx.resolver.category_path(Category::Sessions).exists());
}

#[test]
fn legacy_sessions_are_copied_into_empty_install() {
    let fx = Fixture::new(&["old/data"]);
    let sessions = json!([session(1, "A"), session(2, "B #tag")]);
    write_aged(&fx.path("old/data/minit-sessions.json"), sessions.clone(), 10);
    write_aged(&fx.path("old/data/minit-tags.json"), json!(["tag"]), 10);

    let report = fx.migrator().run_startup_migration();

    assert!(report.success);
    assert!(report.migrated);
    assert_eq!(report.path, Some(fs::canonicalize(fx.path("old/data")).unwrap()));
    let details = report.details.unwrap();
    assert_eq!(details.sessions, 2);
    assert_eq!(details.tags, 1);
    assert_eq!(fx.current(Category::Sessions), sessions);
    assert!(!fx.migrator().is_due());
}

#[test]
fn newest_candidate_wins() {
    let fx = Fixture::new(&["older/data", "newer/data"]);
    write_aged(&fx.path("older/data/minit-memos.json"), json!([{"id": 1, "content": "old"}]), 500);
    write_aged(&fx.path("newer/data/minit-memos.json"), json!([{"id": 2, "content": "new"}]), 5);

    let report = fx.migrator().run_startup_migration();

    assert!(report.migrated);
    assert_eq!(report.path, Some(fs::canonicalize(fx.path("newer/data")).unwrap()));
    let memos = fx.current(Category::Memos);
    assert_eq!(memos.as_array().unwrap().len(), 1);
    assert_eq!(memos[0]["id"], json!(2));
}

#[test]
fn candidates_without_records_fall_through() {
    let fx = Fixture::new(&["settings-only/data", "real/data"]);
    write_aged(&fx.path("settings-only/data/minit-darkmode.json"), json!({"darkMode": true}), 1);
    write_aged(&fx.path("real/data/minit-sessions.json"), json!([session(7, "kept")]), 100);

    let report = fx.migrator().run_startup_migration();

    assert!(report.migrated);
    assert_eq!(report.path, Some(fs::canonicalize(fx.path("real/data")).unwrap()));
    // the settings copied from the first candidate stay
    assert_eq!(fx.current(Category::DarkMode), json!({"darkMode": true}));
}

#[test]
fn failing_candidates_are_reported_and_version_still_stamped() {
    let fx = Fixture::new(&["broken/data"]);
    write_aged(&fx.path("broken/data/minit-sessions.json"), json!([]), 1);
    fs::write(fx.path("broken/data/minit-memos.json"), "not json").unwrap();

    let report = fx.migrator().run_startup_migration();

    assert!(!report.success);
    assert!(!report.migrated);
    let errors = report.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("memos migration failed"));
    assert!(!fx.migrator().is_due());
}

#[test]
fn junk_category_file_does_not_sink_the_candidate() {
    let fx = Fixture::new(&["older/data", "junk/data"]);
    write_aged(&fx.path("older/data/minit-sessions.json"), json!([session(1, "older")]), 500);
    write_aged(&fx.path("junk/data/minit-sessions.json"), json!({"not": "array"}), 5);
    write_aged(&fx.path("junk/data/minit-memos.json"), json!([{"id": 5, "content": "kept"}]), 5);

    let report = fx.migrator().run_startup_migration();

    assert!(report.success);
    assert!(report.migrated);
    assert!(report.errors.is_none());
    assert_eq!(report.path, Some(fs::canonicalize(fx.path("junk/data")).unwrap()));
    assert_eq!(report.details.unwrap().memos, 1);
    // the older candidate is never reached
    assert!(!fx.resolver.category_path(Category::Sessions).exists());
}

#[test]
fn version_bump_merges_again_without_duplicates() {
    let fx = Fixture::new(&["old/data"]);
    write_aged(&fx.path("old/data/minit-sessions.json"), json!([session(1, "A"), session(2, "B")]), 10);
    assert!(fx.migrator().run_startup_migration().migrated);

    write_aged(
        &fx.path("old/data/minit-sessions.json"),
        json!([session(1, "A"), session(2, "B"), session(3, "C")]),
        5,
    );
    let report = Migrator::new(&fx.resolver, "1.5.0").run_startup_migration();

    assert!(report.migrated);
    assert_eq!(report.details.unwrap().sessions, 1);
    let ids: Vec<i64> = fx
        .current(Category::Sessions)
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn store_loads_fully_migrated_records_after_copy() {
    let fx = Fixture::new(&["old/data"]);
    write_aged(&fx.path("old/data/minit-sessions.json"), json!([session(1, "A")]), 10);

    let store = Store::new(fx.resolver.clone()).with_app_version(VERSION);
    let report = store.run_startup_migration();
    assert!(report.migrated);

    let sessions = store.load_sessions().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].duration, 0);
    assert!(!sessions[0].completed);
    // defaults are written back on first load
    let on_disk = fx.current(Category::Sessions);
    assert_eq!(on_disk[0]["endTime"], json!(minit::models::timestamp::format(&sessions[0].end_time)));
    assert_eq!(on_disk[0]["partial"], json!(false));
}

#[test]
fn report_serializes_for_the_shell() {
    let fx = Fixture::new(&[]);
    let report = fx.migrator().run_startup_migration();
    assert_eq!(
        serde_json::to_value(&report).unwrap(),
        json!({"success": true, "migrated": false})
    );
}
