use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create directory {path:?}: {source}")]
    DirectoryError { path: PathBuf, source: io::Error },
    #[error("Failed to read {path:?}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("Failed to write {path:?}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("Failed to parse JSON in {path:?}: {source}")]
    ParseError { path: PathBuf, source: serde_json::Error },
    #[error("Failed to serialize data for {path:?}: {source}")]
    SerializeError { path: PathBuf, source: serde_json::Error },
}

/// Result of a load: the data is always present, falling back to the
/// caller's default when the file was unreadable or malformed.
#[derive(Debug)]
pub struct Loaded<T> {
    pub data: T,
    pub error: Option<StorageError>,
}

impl<T> Loaded<T> {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<T, StorageError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }
}

/// Write `data` as pretty-printed JSON, creating the parent directory first.
/// Returns the written path.
pub fn save_json<T>(path: &Path, data: &T) -> Result<PathBuf, StorageError>
where
    T: Serialize + ?Sized,
{
    write_json(path, data).inspect_err(|err| {
        warn!(target: "minit", event = "storage_save_failed", path = %path.display(), error = %err);
    })
}

fn write_json<T>(path: &Path, data: &T) -> Result<PathBuf, StorageError>
where
    T: Serialize + ?Sized,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|source| StorageError::DirectoryError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let json = serde_json::to_string_pretty(data).map_err(|source| StorageError::SerializeError {
        path: path.to_path_buf(),
        source,
    })?;

    fs::write(path, json).map_err(|source| StorageError::WriteError {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(path.to_path_buf())
}

/// Read and parse a JSON document. A missing file is not an error and yields
/// `default`.
pub fn load_json<T>(path: &Path, default: T) -> Loaded<T>
where
    T: DeserializeOwned,
{
    if !path.exists() {
        return Loaded { data: default, error: None };
    }

    let result = fs::read_to_string(path)
        .map_err(|source| StorageError::ReadError {
            path: path.to_path_buf(),
            source,
        })
        .and_then(|contents| {
            serde_json::from_str(&contents).map_err(|source| StorageError::ParseError {
                path: path.to_path_buf(),
                source,
            })
        });

    match result {
        Ok(data) => Loaded { data, error: None },
        Err(err) => {
            warn!(target: "minit", event = "storage_load_failed", path = %path.display(), error = %err);
            Loaded {
                data: default,
                error: Some(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{Map, Value, json};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;
    use tracing::subscriber::{self, DefaultGuard};
    use tracing_subscriber::{EnvFilter, fmt};

    struct BufferWriter(Arc<Mutex<Vec<u8>>>);

    impl io::Write for BufferWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture_logs() -> (Arc<Mutex<Vec<u8>>>, DefaultGuard) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let writer = buffer.clone();
        let subscriber = fmt()
            .with_env_filter(EnvFilter::new("minit=debug"))
            .with_ansi(false)
            .with_writer(move || BufferWriter(writer.clone()))
            .finish();
        (buffer, subscriber::set_default(subscriber))
    }

    fn save_failures_logged(buffer: &Arc<Mutex<Vec<u8>>>) -> usize {
        String::from_utf8(buffer.lock().unwrap().clone())
            .unwrap()
            .matches("storage_save_failed")
            .count()
    }

    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            // quarters are exact in binary, so they survive the text form
            (-4_000i32..4_000).prop_map(|n| Value::from(f64::from(n) / 4.0)),
            "[a-z #\u{e9}\"]{0,12}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::vec(("[a-zA-Z]{1,6}", inner), 0..4)
                    .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
            ]
        })
    }

    proptest! {
        #[test]
        fn any_json_value_round_trips(value in json_value()) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("data/value.json");
            save_json(&path, &value).unwrap();
            let loaded = load_json(&path, Value::Null);
            prop_assert!(loaded.is_success());
            prop_assert_eq!(loaded.data, value);
        }
    }

    #[test]
    fn every_save_failure_is_logged() {
        let (buffer, _guard) = capture_logs();
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        let err = save_json(&blocker.join("sub/child.json"), &json!(1)).unwrap_err();
        assert!(matches!(err, StorageError::DirectoryError { .. }));
        assert_eq!(save_failures_logged(&buffer), 1);

        let tuple_keys = HashMap::from([((1, 2), 3)]);
        let err = save_json(&dir.path().join("keys.json"), &tuple_keys).unwrap_err();
        assert!(matches!(err, StorageError::SerializeError { .. }));
        assert_eq!(save_failures_logged(&buffer), 2);

        let err = save_json(&blocker.join("child.json"), &json!(1)).unwrap_err();
        assert!(matches!(err, StorageError::WriteError { .. }));
        assert_eq!(save_failures_logged(&buffer), 3);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/data/minit-sessions.json");
        let value = json!([{"id": 1, "title": "A", "nested": {"list": [1, 2.5, null]}}]);

        let written = save_json(&path, &value).unwrap();
        assert_eq!(written, path);

        let loaded = load_json(&path, Value::Null);
        assert!(loaded.is_success());
        assert_eq!(loaded.data, value);
    }

    #[test]
    fn writes_two_space_indent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flag.json");
        save_json(&path, &json!({"darkMode": true})).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"darkMode\": true\n}");
    }

    #[test]
    fn missing_file_yields_default() {
        let dir = tempdir().unwrap();
        let loaded = load_json(&dir.path().join("absent.json"), vec![1, 2, 3]);
        assert!(loaded.is_success());
        assert_eq!(loaded.data, vec![1, 2, 3]);
    }

    #[test]
    fn malformed_file_yields_default_with_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let loaded = load_json(&path, json!([]));
        assert!(!loaded.is_success());
        assert_eq!(loaded.data, json!([]));
        assert!(matches!(loaded.error, Some(StorageError::ParseError { .. })));
    }

    #[test]
    fn unwritable_parent_is_reported() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = save_json(&blocker.join("child.json"), &json!(1)).unwrap_err();
        assert!(matches!(
            err,
            StorageError::WriteError { .. } | StorageError::DirectoryError { .. }
        ));
    }
}
