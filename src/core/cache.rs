// src/core/cache.rs

use crate::{
    constants::{APP_DIR_NAME, CACHE_FILENAME},
    core::paths,
    models::CacheRecord,
};
use log::{debug, warn};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to access cache file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Cache file '{path}' is not a valid parameter map: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The last-used parameter set, stored as one flat JSON object.
///
/// Every public operation is best effort: failures are logged and never
/// interrupt a launch.
#[derive(Debug, Clone)]
pub struct ValueCache {
    path: PathBuf,
}

impl ValueCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Opens the cache at its standard per-user location, falling back to the
    /// temp directory when the system has no config directory.
    pub fn at_default_location() -> Self {
        match paths::get_cache_path() {
            Ok(path) => Self::new(path),
            Err(e) => {
                warn!("{} Keeping the parameter cache in the temp directory.", e);
                Self::new(std::env::temp_dir().join(APP_DIR_NAME).join(CACHE_FILENAME))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the record, degrading to an empty one on any failure.
    pub fn load(&self) -> CacheRecord {
        match self.try_load() {
            Ok(Some(record)) => {
                debug!(
                    "Loaded {} cached value(s) from '{}'",
                    record.values.len(),
                    self.path.display()
                );
                record
            }
            Ok(None) => {
                debug!("No cache file at '{}'", self.path.display());
                CacheRecord::default()
            }
            Err(e) => {
                warn!("Ignoring unreadable cache: {}", e);
                CacheRecord::default()
            }
        }
    }

    /// Persists the record, creating parent directories as needed.
    /// Returns whether the write succeeded.
    pub fn save(&self, record: &CacheRecord) -> bool {
        match self.try_save(record) {
            Ok(()) => {
                debug!("Saved {} value(s) to '{}'", record.values.len(), self.path.display());
                true
            }
            Err(e) => {
                warn!("Could not save parameter cache: {}", e);
                false
            }
        }
    }

    /// Deletes the cache file. A missing file counts as cleared.
    pub fn clear(&self) -> bool {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed cache file '{}'", self.path.display());
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!("Could not remove cache file '{}': {}", self.path.display(), e);
                false
            }
        }
    }

    fn try_load(&self) -> Result<Option<CacheRecord>, CacheError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CacheError::Parse {
                path: self.path.display().to_string(),
                source: e,
            })
    }

    fn try_save(&self, record: &CacheRecord) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string_pretty(record).map_err(|e| CacheError::Parse {
            path: self.path.display().to_string(),
            source: e,
        })?;
        fs::write(&self.path, json).map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParamValue;
    use tempfile::TempDir;

    fn sample_record() -> CacheRecord {
        let mut record = CacheRecord::default();
        record.values.insert("cuda_idx".into(), ParamValue::Integer(1));
        record.values.insert("repetition_penalty".into(), ParamValue::Float(1.15));
        record.values.insert("stage1_use_exl2".into(), ParamValue::Boolean(false));
        record.values.insert("output_dir".into(), ParamValue::String("./out".into()));
        record
    }

    #[test]
    fn test_save_then_load_preserves_types() {
        // --- Setup ---
        let dir = TempDir::new().unwrap();
        let cache = ValueCache::new(dir.path().join("nested").join("last_run.json"));
        let record = sample_record();

        // --- Execute ---
        assert!(cache.save(&record));
        let loaded = cache.load();

        // --- Assert ---
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = ValueCache::new(dir.path().join("absent.json"));
        assert!(cache.load().values.is_empty());
    }

    #[test]
    fn test_load_corrupt_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_run.json");
        fs::write(&path, "{ this is not json").unwrap();

        let cache = ValueCache::new(&path);
        assert!(cache.load().values.is_empty());
    }

    #[test]
    fn test_load_non_object_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_run.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(ValueCache::new(&path).load().values.is_empty());
    }

    #[test]
    fn test_file_is_a_flat_json_object() {
        let dir = TempDir::new().unwrap();
        let cache = ValueCache::new(dir.path().join("last_run.json"));
        cache.save(&sample_record());

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(cache.path()).unwrap()).unwrap();
        assert_eq!(raw["cuda_idx"], serde_json::json!(1));
        assert_eq!(raw["stage1_use_exl2"], serde_json::json!(false));
        assert_eq!(raw["output_dir"], serde_json::json!("./out"));
    }

    #[test]
    fn test_clear_removes_file_and_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let cache = ValueCache::new(dir.path().join("last_run.json"));
        cache.save(&sample_record());

        assert!(cache.clear());
        assert!(!cache.path().exists());
        assert!(cache.clear());
    }

    #[test]
    fn test_save_failure_is_reported_not_raised() {
        // A directory in place of the file makes the write fail.
        let dir = TempDir::new().unwrap();
        let cache = ValueCache::new(dir.path());
        assert!(!cache.save(&sample_record()));
    }
}
