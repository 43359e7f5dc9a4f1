use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

use crate::models::Category;

/// Ancestors of the executable's directory probed for a sibling `data` folder
const EXE_ANCESTOR_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }
}

/// A data folder left behind by an earlier install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyCandidate {
    pub path: PathBuf,
    /// Newest modification time among the folder's data files
    pub last_modified: SystemTime,
}

/// Computes every on-disk location the app reads or writes.
///
/// Built once from explicit inputs so nothing below it consults ambient
/// process state.
#[derive(Debug, Clone)]
pub struct PathResolver {
    product: String,
    app_data_root: PathBuf,
    exe_dir: Option<PathBuf>,
    platform: Platform,
    env: HashMap<String, String>,
    extra_legacy_dirs: Vec<PathBuf>,
}

impl PathResolver {
    pub fn new(product: impl Into<String>, app_data_root: impl Into<PathBuf>) -> Self {
        Self {
            product: product.into(),
            app_data_root: app_data_root.into(),
            exe_dir: None,
            platform: Platform::current(),
            env: HashMap::new(),
            extra_legacy_dirs: Vec::new(),
        }
    }

    /// Snapshot the running process: executable location and environment
    pub fn from_environment(product: impl Into<String>, app_data_root: impl Into<PathBuf>) -> Self {
        let resolver = Self::new(product, app_data_root).with_env(std::env::vars());
        match std::env::current_exe() {
            Ok(exe) => resolver.with_executable(&exe),
            Err(e) => {
                debug!(target: "minit", event = "current_exe_unavailable", error = %e);
                resolver
            }
        }
    }

    pub fn with_executable(mut self, exe_path: &Path) -> Self {
        self.exe_dir = exe_path.parent().map(Path::to_path_buf);
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub fn with_extra_legacy_dirs<I>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.extra_legacy_dirs = dirs.into_iter().collect();
        self
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn app_data_root(&self) -> &Path {
        &self.app_data_root
    }

    /// `<root>/data`
    pub fn data_dir(&self) -> PathBuf {
        self.app_data_root.join("data")
    }

    pub fn file_name(&self, category: Category) -> String {
        format!("{}-{}.json", self.product, category.file_suffix())
    }

    pub fn category_path(&self, category: Category) -> PathBuf {
        self.category_path_in(&self.data_dir(), category)
    }

    /// Path of a category file inside an arbitrary data folder
    pub fn category_path_in(&self, data_dir: &Path, category: Category) -> PathBuf {
        data_dir.join(self.file_name(category))
    }

    pub fn app_version_path(&self) -> PathBuf {
        self.data_dir().join(format!("{}-app-version.json", self.product))
    }

    /// Single-memo file written before memos became a list
    pub fn legacy_memo_path(&self) -> PathBuf {
        self.data_dir().join(format!("{}-memo.json", self.product))
    }

    /// Create the data directory if absent
    pub fn ensure_data_dir(&self) -> io::Result<PathBuf> {
        let dir = self.data_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }

    /// True for `<product>-*.json`
    fn is_data_file(&self, name: &str) -> bool {
        name.starts_with(&format!("{}-", self.product)) && name.ends_with(".json")
    }

    /// Every location an earlier install may have kept its `data` folder
    fn candidate_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();

        if let Some(exe_dir) = &self.exe_dir {
            for ancestor in exe_dir.ancestors().take(EXE_ANCESTOR_DEPTH + 1) {
                dirs.push(ancestor.join("data"));
            }
        }

        if self.platform == Platform::Windows {
            let install_roots = [
                self.env.get("ProgramFiles").map(PathBuf::from),
                self.env.get("ProgramFiles(x86)").map(PathBuf::from),
                self.env
                    .get("LOCALAPPDATA")
                    .map(|p| Path::new(p).join("Programs")),
                self.env
                    .get("USERPROFILE")
                    .map(|p| Path::new(p).join("Desktop")),
                self.env
                    .get("USERPROFILE")
                    .map(|p| Path::new(p).join("Documents")),
            ];
            for root in install_roots.into_iter().flatten() {
                dirs.push(root.join(&self.product).join("data"));
            }
        }

        dirs.extend(self.extra_legacy_dirs.iter().cloned());
        dirs
    }

    /// Newest mtime among matching files, or `None` when the folder holds none
    fn latest_data_file_mtime(&self, dir: &Path) -> Option<SystemTime> {
        let entries = fs::read_dir(dir).ok()?;
        let mut latest: Option<SystemTime> = None;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !self.is_data_file(name) {
                continue;
            }
            let Ok(metadata) = entry.metadata() else { continue };
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            latest = Some(latest.map_or(modified, |current| current.max(modified)));
        }
        latest
    }

    /// Legacy data folders, newest first.
    ///
    /// A folder qualifies when it holds at least one `<product>-*.json` file
    /// and is not the current data directory.
    pub fn find_legacy_data_paths(&self) -> Vec<LegacyCandidate> {
        let current = canonical(&self.data_dir());
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for dir in self.candidate_dirs() {
            if !dir.is_dir() {
                continue;
            }
            let key = canonical(&dir);
            if key == current || !seen.insert(key.clone()) {
                continue;
            }
            if let Some(last_modified) = self.latest_data_file_mtime(&dir) {
                found.push(LegacyCandidate {
                    path: key,
                    last_modified,
                });
            }
        }

        found.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        found
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
