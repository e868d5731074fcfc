// src/core/paths.rs

use crate::constants::{APP_DIR_NAME, CACHE_FILENAME, CACHE_PATH_ENV};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Could not expand '{input}': {reason}")]
    Expansion { input: String, reason: String },
    #[error("Could not determine the current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
    #[error("Could not create directory '{path}': {source}")]
    DirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Path not found: '{0}'")]
    NotFound(String),
}

/// Returns the per-user configuration directory (`~/.config/infer-launch` on Linux).
/// The directory is not created here; the cache creates it on first save.
pub fn get_app_config_dir() -> Result<PathBuf, PathError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or(PathError::ConfigDirNotFound)
}

/// Returns the location of the last-used parameters file.
/// `INFER_LAUNCH_CACHE` takes precedence over the config directory.
pub fn get_cache_path() -> Result<PathBuf, PathError> {
    if let Some(custom) = env::var_os(CACHE_PATH_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(custom));
    }
    get_app_config_dir().map(|dir| dir.join(CACHE_FILENAME))
}

/// Expands environment references (`$VAR`, `${VAR}`) and a leading `~`.
pub fn expand_path(path_like: &str) -> Result<PathBuf, PathError> {
    // `shellexpand::full` expands variables first, then the home shorthand.
    let expanded = shellexpand::full(path_like).map_err(|e| PathError::Expansion {
        input: path_like.to_string(),
        reason: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Turns a user-supplied path into an absolute one.
///
/// Existing paths are canonicalized. Missing paths are made absolute against the
/// current directory and then created (`create_dir`), accepted (`allow_missing`),
/// or rejected with [`PathError::NotFound`].
pub fn resolve(path_like: &str, allow_missing: bool, create_dir: bool) -> Result<PathBuf, PathError> {
    let expanded = expand_path(path_like)?;

    if expanded.exists() {
        // `dunce` keeps Windows paths free of the `\\?\` prefix.
        if let Ok(canonical) = dunce::canonicalize(&expanded) {
            return Ok(canonical);
        }
    }

    let absolute = absolutize(&expanded)?;

    if create_dir {
        fs::create_dir_all(&absolute).map_err(|e| PathError::DirCreation {
            path: absolute.display().to_string(),
            source: e,
        })?;
        log::debug!("Created directory '{}'", absolute.display());
        return Ok(dunce::canonicalize(&absolute).unwrap_or(absolute));
    }

    if allow_missing {
        return Ok(absolute);
    }

    Err(PathError::NotFound(absolute.display().to_string()))
}

fn absolutize(path: &Path) -> Result<PathBuf, PathError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir().map_err(PathError::CurrentDir)?;
    Ok(dunce::simplified(&cwd).join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_existing_path_is_canonical() {
        // --- Setup ---
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("genre.txt");
        fs::write(&file, "pop").unwrap();

        // --- Execute ---
        let resolved = resolve(file.to_str().unwrap(), false, false).unwrap();

        // --- Assert ---
        assert!(resolved.is_absolute());
        assert_eq!(resolved, dunce::canonicalize(&file).unwrap());
    }

    #[test]
    fn test_resolve_missing_path_fails_with_computed_path() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.txt");

        let result = resolve(missing.to_str().unwrap(), false, false);

        match result {
            Err(PathError::NotFound(path)) => assert!(path.ends_with("nope.txt")),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_missing_path_allowed() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("later.txt");

        let resolved = resolve(missing.to_str().unwrap(), true, false).unwrap();

        assert_eq!(resolved, missing);
        assert!(!resolved.exists());
    }

    #[test]
    fn test_resolve_creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("output").join("run1");

        let resolved = resolve(target.to_str().unwrap(), false, true).unwrap();

        assert!(resolved.is_dir());
        assert!(resolved.ends_with(Path::new("output").join("run1")));
    }

    #[test]
    fn test_resolve_relative_path_is_absolute() {
        let resolved = resolve("definitely-missing-relative-dir/file.txt", true, false).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with(Path::new("definitely-missing-relative-dir").join("file.txt")));
    }

    #[test]
    fn test_expand_path_home_shorthand() {
        let home = dirs::home_dir().unwrap();
        let expanded = expand_path("~/models").unwrap();
        assert_eq!(expanded, home.join("models"));
    }

    #[test]
    fn test_expand_path_undefined_variable_is_an_error() {
        let result = expand_path("$INFER_LAUNCH_SURELY_UNDEFINED_VAR/x");
        assert!(matches!(result, Err(PathError::Expansion { .. })));
    }
}
