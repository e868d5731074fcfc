// src/system/probe.rs

use crate::{
    constants::{OMP_DUPLICATE_SIGNATURE, PROBE_SCRIPT},
    models::{ProbeFields, ProbeResult},
    system::executor,
};
use log::{debug, warn};

/// Observable status of the interpreter and host tools.
pub trait EnvironmentProbe {
    /// Runs the diagnostic routine through `interpreter`. Never fails: problems
    /// are reported inside the result.
    fn probe_runtime(&self, interpreter: &str) -> ProbeResult;

    /// Whether `name` resolves to an executable on the search path.
    fn has_aux_tool(&self, name: &str) -> bool;

    /// Whether `import <package>` succeeds through `interpreter`.
    fn has_package(&self, interpreter: &str, package: &str) -> bool;
}

/// Returns true when the text carries the duplicate OpenMP runtime signature.
pub fn detect_duplicate_runtime_conflict(diagnostic_text: &str) -> bool {
    diagnostic_text.contains(OMP_DUPLICATE_SIGNATURE)
}

/// Probes the real interpreter and the host search path.
#[derive(Debug, Default)]
pub struct InterpreterProbe;

impl EnvironmentProbe for InterpreterProbe {
    fn probe_runtime(&self, interpreter: &str) -> ProbeResult {
        let output = match executor::execute_and_capture_output(interpreter, &["-c", PROBE_SCRIPT]) {
            Ok(output) => output,
            Err(e) => {
                return ProbeResult {
                    fields: ProbeFields::default(),
                    diagnostic_text: e.to_string(),
                    exit_code: None,
                };
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("Probe exited with {:?}", output.status.code());

        ProbeResult {
            fields: parse_probe_output(&stdout),
            diagnostic_text: format!("{}{}", stdout, stderr),
            exit_code: output.status.code(),
        }
    }

    fn has_aux_tool(&self, name: &str) -> bool {
        match which::which(name) {
            Ok(path) => {
                debug!("Found '{}' at '{}'", name, path.display());
                true
            }
            Err(e) => {
                debug!("'{}' not found on the search path: {}", name, e);
                false
            }
        }
    }

    fn has_package(&self, interpreter: &str, package: &str) -> bool {
        let statement = format!("import {}", package);
        match executor::execute_and_capture_output(interpreter, &["-c", &statement]) {
            Ok(output) => output.status.success(),
            Err(e) => {
                debug!("Package check for '{}' could not run: {}", package, e);
                false
            }
        }
    }
}

/// Parses the JSON line printed by the diagnostic routine.
/// The last non-empty line wins, so stray runtime chatter above it is ignored.
/// A parse failure is logged and yields empty fields.
pub fn parse_probe_output(stdout: &str) -> ProbeFields {
    let Some(line) = stdout.lines().map(str::trim).filter(|l| !l.is_empty()).last() else {
        warn!("Runtime probe printed nothing to stdout.");
        return ProbeFields::default();
    };

    match serde_json::from_str::<ProbeFields>(line) {
        Ok(fields) => fields,
        Err(e) => {
            warn!("Could not parse runtime probe output '{}': {}", line, e);
            ProbeFields::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_duplicate_runtime_conflict() {
        let text = "OMP: Error #15: Initializing libiomp5md.dll, but found libiomp5md.dll already initialized.";
        assert!(detect_duplicate_runtime_conflict(text));
        assert!(!detect_duplicate_runtime_conflict("OMP: Info #276: omp_set_nested deprecated"));
        assert!(!detect_duplicate_runtime_conflict(""));
    }

    #[test]
    fn test_parse_probe_output_full_line() {
        let stdout = r#"{"torch_version": "2.5.1+cu124", "cuda_version": "12.4", "cuda_available": true, "cuda_home": "/usr/local/cuda", "error": null}"#;
        let fields = parse_probe_output(stdout);
        assert_eq!(fields.torch_version.as_deref(), Some("2.5.1+cu124"));
        assert_eq!(fields.cuda_version.as_deref(), Some("12.4"));
        assert!(fields.cuda_available);
        assert_eq!(fields.cuda_home.as_deref(), Some("/usr/local/cuda"));
        assert!(fields.error.is_none());
    }

    #[test]
    fn test_parse_probe_output_ignores_leading_noise() {
        let stdout = "some warning from the runtime\n{\"cuda_available\": false, \"error\": \"ModuleNotFoundError: No module named 'torch'\"}\n\n";
        let fields = parse_probe_output(stdout);
        assert!(!fields.cuda_available);
        assert!(fields.error.unwrap().contains("torch"));
    }

    #[test]
    fn test_parse_probe_output_garbage_degrades_to_defaults() {
        assert_eq!(parse_probe_output("not json"), ProbeFields::default());
        assert_eq!(parse_probe_output(""), ProbeFields::default());
    }
}
