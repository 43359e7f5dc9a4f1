use serde::Serialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::migration::{Migrator, StartupReport};
use crate::models::{
    Category, Collection, DarkModeSetting, DontAskDeleteSetting, Memo, Session,
};
use crate::paths::PathResolver;
use crate::schema::{Defaults, MemoMigration, Migration, SessionMigration, migrate_array};
use crate::sessions::add_session;
use crate::storage::{StorageError, load_json, save_json};
use crate::tags::TagRegistry;
use crate::utils::now_millis;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Failed to encode {category}: {source}")]
    EncodeError {
        category: Category,
        source: serde_json::Error,
    },
}

/// The operations the application shell calls: load and save each category,
/// plus the once-per-launch migration.
#[derive(Debug, Clone)]
pub struct Store {
    paths: PathResolver,
    app_version: String,
    scan_legacy: bool,
}

impl Store {
    pub fn new(paths: PathResolver) -> Self {
        Self {
            paths,
            app_version: crate::APP_VERSION.to_string(),
            scan_legacy: true,
        }
    }

    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    pub fn with_legacy_scan(mut self, enabled: bool) -> Self {
        self.scan_legacy = enabled;
        self
    }

    pub fn paths(&self) -> &PathResolver {
        &self.paths
    }

    /// Canonical data directory
    pub fn data_path(&self) -> PathBuf {
        self.paths.data_dir()
    }

    pub fn migrator(&self) -> Migrator<'_> {
        Migrator::new(&self.paths, self.app_version.clone()).with_legacy_scan(self.scan_legacy)
    }

    pub fn run_startup_migration(&self) -> StartupReport {
        self.migrator().run_startup_migration()
    }

    pub fn load_category(&self, category: Category) -> Result<Collection, StoreError> {
        Ok(match category {
            Category::Sessions => Collection::Sessions(self.load_sessions()?),
            Category::Memos => Collection::Memos(self.load_memos()?),
            Category::Tags => Collection::Tags(self.load_tags()?.into_vec()),
            Category::DarkMode => Collection::DarkMode(self.load_dark_mode()),
            Category::DontAskDelete => Collection::DontAskDelete(self.load_dont_ask_delete()),
        })
    }

    pub fn save_category(&self, collection: &Collection) -> Result<PathBuf, StoreError> {
        let category = collection.category();
        match collection {
            Collection::Sessions(sessions) => self.save(category, sessions),
            Collection::Memos(memos) => self.save(category, memos),
            Collection::Tags(tags) => self.save(category, tags),
            Collection::DarkMode(dark_mode) => self.save(category, &DarkModeSetting { dark_mode: *dark_mode }),
            Collection::DontAskDelete(dont_ask) => {
                self.save(category, &DontAskDeleteSetting { dont_ask: *dont_ask })
            }
        }
    }

    fn save<T: Serialize + ?Sized>(&self, category: Category, data: &T) -> Result<PathBuf, StoreError> {
        Ok(save_json(&self.paths.category_path(category), data)?)
    }

    /// Load a record collection, migrate every element and write the result
    /// back if migration changed anything
    fn load_records<M>(&self, category: Category) -> Result<Vec<M::Output>, StoreError>
    where
        M: Migration,
        M::Output: Serialize,
    {
        let path = self.paths.category_path(category);
        let raw = load_json(&path, json!([])).into_result()?;
        let records = migrate_array::<M>(&raw, &mut Defaults::now());
        self.persist_if_changed(category, &path, &raw, &records)?;
        Ok(records)
    }

    fn persist_if_changed<T: Serialize>(
        &self,
        category: Category,
        path: &Path,
        raw: &Value,
        records: &[T],
    ) -> Result<(), StoreError> {
        let migrated = serde_json::to_value(records)
            .map_err(|source| StoreError::EncodeError { category, source })?;
        if &migrated != raw {
            save_json(path, &migrated)?;
            info!(target: "minit", event = "category_upgraded", category = %category, records = records.len());
        }
        Ok(())
    }

    pub fn load_sessions(&self) -> Result<Vec<Session>, StoreError> {
        self.load_records::<SessionMigration>(Category::Sessions)
    }

    pub fn save_sessions(&self, sessions: &[Session]) -> Result<PathBuf, StoreError> {
        self.save(Category::Sessions, sessions)
    }

    /// Memos, converting the pre-list single memo file when no list exists yet
    pub fn load_memos(&self) -> Result<Vec<Memo>, StoreError> {
        let path = self.paths.category_path(Category::Memos);
        let legacy = self.paths.legacy_memo_path();
        if !path.exists() && legacy.exists() {
            return self.convert_single_memo(&legacy);
        }
        self.load_records::<MemoMigration>(Category::Memos)
    }

    fn convert_single_memo(&self, legacy: &Path) -> Result<Vec<Memo>, StoreError> {
        let raw = load_json(legacy, Value::Null).into_result()?;
        let text = raw.get("text").and_then(Value::as_str).unwrap_or_default();
        let memos = if text.trim().is_empty() {
            Vec::new()
        } else {
            vec![Memo::new(now_millis(), text, 0)]
        };
        self.save_memos(&memos)?;
        info!(target: "minit", event = "single_memo_converted", memos = memos.len());
        Ok(memos)
    }

    pub fn save_memos(&self, memos: &[Memo]) -> Result<PathBuf, StoreError> {
        self.save(Category::Memos, memos)
    }

    /// Tag registry; non-string entries and duplicates are dropped
    pub fn load_tags(&self) -> Result<TagRegistry, StoreError> {
        let raw = load_json(&self.paths.category_path(Category::Tags), json!([])).into_result()?;
        let tags = raw
            .as_array()
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect::<Vec<_>>())
            .unwrap_or_default();
        Ok(TagRegistry::from_tags(tags))
    }

    pub fn save_tags(&self, registry: &TagRegistry) -> Result<PathBuf, StoreError> {
        self.save(Category::Tags, registry)
    }

    /// Unreadable settings fall back to `false`
    pub fn load_dark_mode(&self) -> bool {
        load_json(&self.paths.category_path(Category::DarkMode), DarkModeSetting::default())
            .data
            .dark_mode
    }

    pub fn save_dark_mode(&self, dark_mode: bool) -> Result<PathBuf, StoreError> {
        self.save(Category::DarkMode, &DarkModeSetting { dark_mode })
    }

    pub fn load_dont_ask_delete(&self) -> bool {
        load_json(
            &self.paths.category_path(Category::DontAskDelete),
            DontAskDeleteSetting::default(),
        )
        .data
        .dont_ask
    }

    pub fn save_dont_ask_delete(&self, dont_ask: bool) -> Result<PathBuf, StoreError> {
        self.save(Category::DontAskDelete, &DontAskDeleteSetting { dont_ask })
    }

    /// Prepend a finished session and register its title tags
    pub fn record_session(&self, session: Session) -> Result<(), StoreError> {
        let mut registry = self.load_tags()?;
        let new_tags = registry.register_from(&session.title);

        let mut sessions = self.load_sessions()?;
        add_session(&mut sessions, session);
        self.save_sessions(&sessions)?;

        if new_tags > 0 {
            self.save_tags(&registry)?;
        }
        Ok(())
    }
}
