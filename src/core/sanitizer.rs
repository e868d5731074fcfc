// src/core/sanitizer.rs

use crate::{
    constants::{CONDA_ENVS_DIR, CONDA_PREFIX_ENV},
    models::CondaContext,
    system::environment::ProcessEnvironment,
};
use std::path::Path;
use thiserror::Error;

/// Separator of the executable search path on this platform.
#[cfg(target_os = "windows")]
pub const SEARCH_PATH_SEPARATOR: char = ';';

#[cfg(not(target_os = "windows"))]
pub const SEARCH_PATH_SEPARATOR: char = ':';

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ContextError {
    #[error("Cannot infer the installation root from {var}='{prefix}'.")]
    NoInstallRoot { var: &'static str, prefix: String },
}

impl CondaContext {
    /// Derives the context from `CONDA_PREFIX`.
    ///
    /// A prefix inside an `envs` directory belongs to the installation two
    /// levels up; otherwise the prefix is the base installation itself.
    /// Returns `Ok(None)` when no environment is active.
    pub fn from_env(env: &ProcessEnvironment) -> Result<Option<Self>, ContextError> {
        let Some(prefix) = env.get_string(CONDA_PREFIX_ENV).filter(|p| !p.trim().is_empty()) else {
            return Ok(None);
        };
        Self::from_prefix(Path::new(trim_trailing_separators(&prefix))).map(Some)
    }

    pub fn from_prefix(prefix: &Path) -> Result<Self, ContextError> {
        let parent = prefix.parent().filter(|p| !p.as_os_str().is_empty());
        let install_root = match parent {
            Some(dir) if dir.file_name().is_some_and(|n| n == CONDA_ENVS_DIR) => dir
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf),
            Some(_) => Some(prefix.to_path_buf()),
            None => None,
        };

        match install_root {
            Some(install_root) => Ok(Self {
                env_prefix: prefix.to_path_buf(),
                install_root,
            }),
            None => Err(ContextError::NoInstallRoot {
                var: CONDA_PREFIX_ENV,
                prefix: prefix.display().to_string(),
            }),
        }
    }
}

/// Filters `current` so the child does not pick up native libraries from the
/// base installation.
///
/// An entry is dropped when it lives under `install_root` but not under
/// `env_prefix`. Remaining entries keep their order. Paths are compared
/// component by component; on Windows the comparison ignores ASCII case.
pub fn compute_sanitized_search_path(
    current: &str,
    env_prefix: &str,
    install_root: &str,
    separator: char,
) -> String {
    let env_prefix = trim_trailing_separators(env_prefix);
    let install_root = trim_trailing_separators(install_root);

    current
        .split(separator)
        .filter(|entry| {
            !is_under(entry, install_root, FOLD_CASE) || is_under(entry, env_prefix, FOLD_CASE)
        })
        .collect::<Vec<_>>()
        .join(&separator.to_string())
}

/// Convenience wrapper over [`compute_sanitized_search_path`] for a context.
pub fn sanitize_for_context(current: &str, context: &CondaContext) -> String {
    compute_sanitized_search_path(
        current,
        &context.env_prefix.to_string_lossy(),
        &context.install_root.to_string_lossy(),
        SEARCH_PATH_SEPARATOR,
    )
}

fn trim_trailing_separators(entry: &str) -> &str {
    entry.trim_end_matches(['\\', '/'])
}

const FOLD_CASE: bool = cfg!(target_os = "windows");

/// Splits on both separators, collapsing repeats but keeping the empty
/// leading component of an absolute Unix path.
fn components(path: &str) -> impl Iterator<Item = &str> {
    trim_trailing_separators(path)
        .split(['\\', '/'])
        .enumerate()
        .filter(|(i, c)| *i == 0 || !c.is_empty())
        .map(|(_, c)| c)
}

/// Whether `entry` is `root` or lies below it.
fn is_under(entry: &str, root: &str, fold_case: bool) -> bool {
    if trim_trailing_separators(root).is_empty() {
        return false;
    }
    let mut entry_parts = components(entry);
    components(root).all(|root_part| {
        entry_parts.next().is_some_and(|part| {
            if fold_case {
                part.eq_ignore_ascii_case(root_part)
            } else {
                part == root_part
            }
        })
    })
}
