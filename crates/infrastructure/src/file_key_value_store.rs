//! Key/value store persisted as one JSON object on disk.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use retrofit_application::KeyValueStore;
use retrofit_core::{AppError, AppResult};
use tracing::warn;

type Document = BTreeMap<String, String>;

/// File-backed key/value store.
///
/// Every write replaces the whole document through a temporary file and a
/// rename, so readers never observe a half-written file.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKeyValueStore {
    /// Creates a store backed by `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> AppResult<Document> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Document::new()),
            Err(error) => {
                return Err(AppError::PersistenceCorruption(format!(
                    "failed to read session store '{}': {error}",
                    self.path.display()
                )));
            }
        };

        if contents.trim().is_empty() {
            return Ok(Document::new());
        }

        serde_json::from_str(&contents).map_err(|error| {
            AppError::PersistenceCorruption(format!(
                "session store '{}' is not a JSON object of strings: {error}",
                self.path.display()
            ))
        })
    }

    /// Reads the document for a write. An unreadable document is replaced.
    fn read_document_for_write(&self) -> Document {
        match self.read_document() {
            Ok(document) => document,
            Err(error) => {
                warn!(error = %error, "discarding unreadable session store");
                Document::new()
            }
        }
    }

    fn write_document(&self, document: &Document) -> AppResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|error| {
                AppError::Internal(format!(
                    "failed to create session store directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }

        let serialized = serde_json::to_string_pretty(document).map_err(|error| {
            AppError::Internal(format!("failed to serialize session store: {error}"))
        })?;

        let temporary = self.temporary_path();
        fs::write(&temporary, serialized).map_err(|error| {
            AppError::Internal(format!(
                "failed to write session store '{}': {error}",
                temporary.display()
            ))
        })?;
        fs::rename(&temporary, &self.path).map_err(|error| {
            AppError::Internal(format!(
                "failed to replace session store '{}': {error}",
                self.path.display()
            ))
        })
    }

    fn temporary_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_document()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut document = self.read_document_for_write();
        document.insert(key.to_owned(), value.to_owned());
        self.write_document(&document)
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut document = match self.read_document() {
            Ok(document) => document,
            Err(error) => {
                warn!(error = %error, "discarding unreadable session store");
                return self.write_document(&Document::new());
            }
        };

        if document.remove(key).is_none() {
            return Ok(());
        }
        self.write_document(&document)
    }
}
