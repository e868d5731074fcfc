// src/models.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

// --- PARAMETER MODELS ---

/// The declared type of a run parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Float,
    Boolean,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A single parameter value. Serialized as a plain JSON scalar so the cache
/// file stays a flat `name -> value` object.
///
/// Variant order matters for untagged deserialization: `3000` must become an
/// `Integer` and `1.1` a `Float`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Boolean(_) => ParamKind::Boolean,
            Self::Integer(_) => ParamKind::Integer,
            Self::Float(_) => ParamKind::Float,
            Self::String(_) => ParamKind::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The text offered as the suggested answer when prompting.
    /// Booleans use the same `y`/`n` vocabulary the prompt accepts.
    pub fn prompt_text(&self) -> String {
        match self {
            Self::Boolean(true) => "y".to_string(),
            Self::Boolean(false) => "n".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// How a parameter ends up in the child's command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgRole {
    /// The program that runs the script. Never part of the argument list.
    Interpreter,
    /// The positional script path, always the first argument.
    Script,
    /// Emitted as a bare `--name` only when the value is true.
    PresenceFlag,
    /// Emitted as `--name value`.
    Valued,
}

/// Declarative description of one run parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: ParamValue,
    pub role: ArgRole,
    /// Prompted even when interactive mode is not forced.
    pub prompt_eligible: bool,
}

impl ParameterSpec {
    /// The interpreter and script paths are resolved from flags, cache or defaults only.
    pub fn never_prompted(&self) -> bool {
        matches!(self.role, ArgRole::Interpreter | ArgRole::Script)
    }
}

/// The final value of every declared parameter, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParameters {
    entries: Vec<(&'static str, ParamValue)>,
}

impl ResolvedParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a value, keeping the original position on replace.
    pub fn set(&mut self, name: &'static str, value: ParamValue) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    /// Converts the resolved set into the record persisted after a successful run.
    pub fn to_cache_record(&self) -> CacheRecord {
        CacheRecord {
            values: self
                .entries
                .iter()
                .map(|(n, v)| ((*n).to_string(), v.clone()))
                .collect(),
        }
    }
}

/// The durable last-used parameter set.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct CacheRecord {
    pub values: BTreeMap<String, ParamValue>,
}

impl CacheRecord {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }
}

// --- ENVIRONMENT MODELS ---

/// What the diagnostic routine reported about the ML runtime.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ProbeFields {
    #[serde(default)]
    pub torch_version: Option<String>,
    #[serde(default)]
    pub cuda_version: Option<String>,
    #[serde(default)]
    pub cuda_available: bool,
    #[serde(default)]
    pub cuda_home: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Transient result of one runtime probe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeResult {
    pub fields: ProbeFields,
    /// Combined stdout and stderr of the probe.
    pub diagnostic_text: String,
    /// `None` when the probe could not be spawned or was killed by a signal.
    pub exit_code: Option<i32>,
}

impl ProbeResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// The active isolated environment and the installation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondaContext {
    pub env_prefix: PathBuf,
    pub install_root: PathBuf,
}

/// Everything needed to spawn the inference process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub interpreter: String,
    pub script: PathBuf,
    /// Full argument list; the script path is the first element.
    pub args: Vec<String>,
}
