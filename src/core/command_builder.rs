// src/core/command_builder.rs

use crate::models::{ArgRole, CommandInvocation, ParamValue, ParameterSpec, ResolvedParameters};
use anyhow::{Result, anyhow};
use std::path::Path;

/// Assembles the child's argument list.
///
/// Layout: the script path, then every presence flag whose value is true,
/// then `--name value` for each valued parameter in declaration order.
pub fn build(
    specs: &[ParameterSpec],
    params: &ResolvedParameters,
    interpreter: &str,
    script: &Path,
) -> Result<CommandInvocation> {
    let mut args = vec![script.display().to_string()];

    for spec in specs.iter().filter(|s| s.role == ArgRole::PresenceFlag) {
        let value = lookup(params, spec)?;
        match value {
            ParamValue::Boolean(true) => args.push(format!("--{}", spec.name)),
            ParamValue::Boolean(false) => {}
            other => {
                return Err(anyhow!(
                    "Flag '{}' must be a boolean, got '{}'.",
                    spec.name,
                    other
                ));
            }
        }
    }

    for spec in specs.iter().filter(|s| s.role == ArgRole::Valued) {
        let value = lookup(params, spec)?;
        args.push(format!("--{}", spec.name));
        args.push(render_value(value));
    }

    Ok(CommandInvocation {
        interpreter: interpreter.to_string(),
        script: script.to_path_buf(),
        args,
    })
}

/// Renders a value as a command-line token. Numbers use Rust's
/// locale-independent formatting.
pub fn render_value(value: &ParamValue) -> String {
    value.to_string()
}

/// A copy-pasteable rendering of the invocation.
pub fn preview(invocation: &CommandInvocation) -> String {
    std::iter::once(invocation.interpreter.as_str())
        .chain(invocation.args.iter().map(String::as_str))
        .map(|token| match shlex::try_quote(token) {
            Ok(quoted) => quoted.into_owned(),
            Err(_) => format!("{:?}", token),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn lookup<'a>(params: &'a ResolvedParameters, spec: &ParameterSpec) -> Result<&'a ParamValue> {
    params
        .get(spec.name)
        .ok_or_else(|| anyhow!("Internal error: parameter '{}' was not resolved.", spec.name))
}
