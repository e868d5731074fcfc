// src/system/environment.rs

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

/// An explicit copy of the process environment that the launcher mutates
/// instead of the real one. The child is spawned with exactly these variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessEnvironment {
    vars: BTreeMap<OsString, OsString>,
}

/// Values of selected variables as they were before a mutation.
/// `None` means the variable was unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSnapshot {
    saved: Vec<(OsString, Option<OsString>)>,
}

impl ProcessEnvironment {
    /// Captures the environment of the current process.
    pub fn capture() -> Self {
        Self::from_vars(std::env::vars_os())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&OsStr> {
        self.vars.get(OsStr::new(key)).map(OsString::as_os_str)
    }

    /// Lossy UTF-8 view of a variable, for path-like values.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string_lossy().into_owned())
    }

    pub fn set(&mut self, key: &str, value: impl Into<OsString>) {
        self.vars.insert(OsString::from(key), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    /// Records the current values of `keys` so they can be put back later.
    pub fn snapshot(&self, keys: &[&str]) -> EnvSnapshot {
        EnvSnapshot {
            saved: keys
                .iter()
                .map(|k| (OsString::from(*k), self.get(k).map(OsStr::to_os_string)))
                .collect(),
        }
    }

    /// Puts back every variable recorded in `snapshot`, unsetting those that
    /// did not exist when it was taken.
    pub fn restore(&mut self, snapshot: EnvSnapshot) {
        for (key, value) in snapshot.saved {
            match value {
                Some(v) => {
                    self.vars.insert(key, v);
                }
                None => {
                    self.vars.remove(&key);
                }
            }
        }
    }
}
