// src/core/parameters.rs

use crate::models::{CacheRecord, ParamKind, ParamValue, ParameterSpec, ResolvedParameters};
use anyhow::Result;
use colored::*;
use dialoguer::{Input, theme::ColorfulTheme};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref YES_RE: Regex = Regex::new(r"^(?i)y(es)?$").expect("valid yes pattern");
    static ref NO_RE: Regex = Regex::new(r"^(?i)no?$").expect("valid no pattern");
}

// --- PURE COERCION ---

/// Parses raw text into a value of `kind`, or `None` if it does not fit.
/// Booleans only accept `y`, `yes`, `n` and `no` in any case.
pub fn parse_or_none(input: &str, kind: ParamKind) -> Option<ParamValue> {
    let trimmed = input.trim();
    match kind {
        ParamKind::String => Some(ParamValue::String(trimmed.to_string())),
        ParamKind::Integer => trimmed.parse::<i64>().ok().map(ParamValue::Integer),
        ParamKind::Float => trimmed
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .map(ParamValue::Float),
        ParamKind::Boolean => {
            if YES_RE.is_match(trimmed) {
                Some(ParamValue::Boolean(true))
            } else if NO_RE.is_match(trimmed) {
                Some(ParamValue::Boolean(false))
            } else {
                None
            }
        }
    }
}

/// Converts a cached value to the declared kind. Integers widen to floats;
/// strings are parsed; anything else is a miss.
pub fn coerce_cached(value: &ParamValue, kind: ParamKind) -> Option<ParamValue> {
    match (value, kind) {
        (v, k) if v.kind() == k => Some(v.clone()),
        (ParamValue::Integer(i), ParamKind::Float) => Some(ParamValue::Float(*i as f64)),
        (ParamValue::String(s), k) => parse_or_none(s, k),
        _ => None,
    }
}

// --- PROMPTING ---

/// Asks the user for one parameter value. Implementations return the raw line;
/// an empty answer must be replaced by `default_text`.
pub trait Prompter {
    fn ask(&mut self, name: &str, default_text: &str) -> Result<String>;

    /// Whether prompts can actually reach a user.
    fn is_attended(&self) -> bool {
        true
    }
}

/// Prompts on the terminal with `dialoguer`.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, name: &str, default_text: &str) -> Result<String> {
        let answer = Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(name)
            .default(default_text.to_string())
            .allow_empty(true)
            .interact_text()?;
        Ok(answer)
    }

    fn is_attended(&self) -> bool {
        use std::io::IsTerminal;
        terminal_attached(std::io::stdin().is_terminal(), std::io::stderr().is_terminal())
    }
}

/// dialoguer reads from stdin and draws on stderr; both must be terminals.
fn terminal_attached(stdin_is_tty: bool, stderr_is_tty: bool) -> bool {
    stdin_is_tty && stderr_is_tty
}

/// Prompts until the answer parses as `kind`.
pub fn prompt_until_valid(
    prompter: &mut dyn Prompter,
    spec: &ParameterSpec,
    base: &ParamValue,
) -> Result<ParamValue> {
    let default_text = base.prompt_text();
    loop {
        let answer = prompter.ask(spec.name, &default_text)?;
        let answer = if answer.trim().is_empty() {
            default_text.as_str()
        } else {
            answer.as_str()
        };

        match parse_or_none(answer, spec.kind) {
            Some(value) => return Ok(value),
            None => {
                let hint = match spec.kind {
                    ParamKind::Boolean => "y/n".to_string(),
                    other => other.to_string(),
                };
                log::warn!("Invalid value '{}' for '{}'", answer, spec.name);
                println!(
                    "{}",
                    format!(t!("params.error.invalid_value"), value = answer, expected = hint).red()
                );
            }
        }
    }
}

// --- RESOLUTION ---

/// Mode switches that steer resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Ignore the cache and prompts; take declared defaults.
    pub use_defaults: bool,
    /// Prompt for every promptable parameter.
    pub interactive: bool,
}

/// Resolves every spec in declaration order.
///
/// Precedence: explicit override, then `use_defaults`, then cached value or
/// default as the base, optionally confirmed through a prompt.
pub fn resolve_parameters(
    specs: &[ParameterSpec],
    overrides: &HashMap<&'static str, ParamValue>,
    cache: &CacheRecord,
    options: ResolveOptions,
    prompter: &mut dyn Prompter,
) -> Result<ResolvedParameters> {
    let mut resolved = ResolvedParameters::new();
    for spec in specs {
        let value = resolve_one(spec, overrides.get(spec.name), cache, options, prompter)?;
        log::debug!("Resolved '{}' = {}", spec.name, value);
        resolved.set(spec.name, value);
    }
    Ok(resolved)
}

fn resolve_one(
    spec: &ParameterSpec,
    explicit: Option<&ParamValue>,
    cache: &CacheRecord,
    options: ResolveOptions,
    prompter: &mut dyn Prompter,
) -> Result<ParamValue> {
    if let Some(value) = explicit {
        return Ok(value.clone());
    }

    if options.use_defaults {
        return Ok(spec.default.clone());
    }

    let base = match cache.get(spec.name) {
        Some(cached) => coerce_cached(cached, spec.kind).unwrap_or_else(|| {
            log::warn!(
                "Cached value '{}' for '{}' is not a valid {}; using the default.",
                cached,
                spec.name,
                spec.kind
            );
            spec.default.clone()
        }),
        None => spec.default.clone(),
    };

    if spec.never_prompted() {
        return Ok(base);
    }

    // Prompt-eligible parameters only block when someone can answer.
    let should_prompt =
        options.interactive || (spec.prompt_eligible && prompter.is_attended());
    if should_prompt {
        return prompt_until_valid(prompter, spec, &base);
    }

    if spec.prompt_eligible {
        log::debug!("No terminal attached; '{}' keeps {}", spec.name, base);
    }
    Ok(base)
}
