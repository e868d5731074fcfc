// src/core/preflight.rs

use crate::{
    constants::{BUILD_ACCEL_PACKAGE, CXX_DRIVER, GPU_TOOL},
    models::ProbeResult,
    system::probe::{EnvironmentProbe, detect_duplicate_runtime_conflict},
};
use colored::*;
use thiserror::Error;

/// The first unmet requirement found by the gate.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PreflightError {
    #[error("The ML runtime was built without CUDA support (no CUDA version reported).")]
    NoCudaBuild,
    #[error("CUDA is not available to the ML runtime. Check the driver and the selected GPU.")]
    GpuUnavailable,
    #[error("CUDA_HOME is not configured; native extensions cannot be compiled.")]
    CudaHomeMissing,
    #[error("The runtime probe failed:\n{0}")]
    ProbeFailed(String),
    #[error("'{0}' was not found on the search path. Install the GPU driver utilities.")]
    GpuToolMissing(&'static str),
    #[error("Python package '{0}' is not installed in the selected interpreter.")]
    PackageMissing(&'static str),
    #[error("C++ compiler '{0}' was not found on the search path.")]
    CompilerMissing(&'static str),
}

/// What a passing gate learned about the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreflightReport {
    pub duplicate_runtime_detected: bool,
    pub gpu_checks_skipped: bool,
    pub probe: ProbeResult,
}

/// Checks that the host can run the inference script.
///
/// The probe always runs first so the duplicate OpenMP runtime is reported even
/// when GPU checks are skipped. Checks fail fast in a fixed order.
pub fn run(
    probe: &dyn EnvironmentProbe,
    interpreter: &str,
    skip_gpu_checks: bool,
) -> Result<PreflightReport, PreflightError> {
    log::debug!("Running preflight with interpreter '{}'", interpreter);

    let result = probe.probe_runtime(interpreter);
    let duplicate_runtime_detected = detect_duplicate_runtime_conflict(&result.diagnostic_text);
    if duplicate_runtime_detected {
        log::warn!("Duplicate OpenMP runtime detected during the probe.");
        println!("{}", t!("preflight.warn.duplicate_runtime").yellow());
    }

    if !skip_gpu_checks {
        check_gpu(&result, duplicate_runtime_detected)?;

        if !probe.has_aux_tool(GPU_TOOL) {
            return Err(PreflightError::GpuToolMissing(GPU_TOOL));
        }
    }

    if !probe.has_package(interpreter, BUILD_ACCEL_PACKAGE) {
        return Err(PreflightError::PackageMissing(BUILD_ACCEL_PACKAGE));
    }

    if !probe.has_aux_tool(CXX_DRIVER) {
        return Err(PreflightError::CompilerMissing(CXX_DRIVER));
    }

    Ok(PreflightReport {
        duplicate_runtime_detected,
        gpu_checks_skipped: skip_gpu_checks,
        probe: result,
    })
}

fn check_gpu(result: &ProbeResult, duplicate_runtime_detected: bool) -> Result<(), PreflightError> {
    if result.succeeded() {
        let fields = &result.fields;
        if fields.cuda_version.as_deref().is_none_or(str::is_empty) {
            return Err(PreflightError::NoCudaBuild);
        }
        if !fields.cuda_available {
            return Err(PreflightError::GpuUnavailable);
        }
        if fields.cuda_home.as_deref().is_none_or(|h| h.trim().is_empty()) {
            return Err(PreflightError::CudaHomeMissing);
        }
        return Ok(());
    }

    if duplicate_runtime_detected {
        // The sanitized environment is expected to fix what made the probe fail.
        log::warn!("Runtime probe failed, continuing because of the duplicate runtime mitigation.");
        return Ok(());
    }

    let detail = match &result.fields.error {
        Some(error) if !result.diagnostic_text.contains(error.as_str()) => {
            format!("{}\n{}", error, result.diagnostic_text.trim())
        }
        _ => result.diagnostic_text.trim().to_string(),
    };
    Err(PreflightError::ProbeFailed(detail))
}

/// Prints a short summary of a passing gate.
pub fn print_report(report: &PreflightReport, cuda_idx: Option<i64>) {
    println!("{}", t!("preflight.info.passed").green().bold());
    if report.gpu_checks_skipped {
        println!("  {}", t!("preflight.info.gpu_skipped").dimmed());
        return;
    }
    println!("  {}", summary_line(report, cuda_idx).cyan());
}

fn summary_line(report: &PreflightReport, cuda_idx: Option<i64>) -> String {
    let fields = &report.probe.fields;
    format!(
        t!("preflight.info.summary"),
        torch = fields.torch_version.as_deref().unwrap_or("?"),
        cuda = fields.cuda_version.as_deref().unwrap_or("?"),
        gpu = cuda_idx.map_or_else(|| "?".to_string(), |i| i.to_string())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProbeFields;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Canned prober that also records which checks were performed.
    struct FakeProbe {
        result: ProbeResult,
        tools: HashSet<&'static str>,
        packages: HashSet<&'static str>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeProbe {
        fn healthy() -> Self {
            Self {
                result: ProbeResult {
                    fields: ProbeFields {
                        torch_version: Some("2.5.1".into()),
                        cuda_version: Some("12.4".into()),
                        cuda_available: true,
                        cuda_home: Some("/usr/local/cuda".into()),
                        error: None,
                    },
                    diagnostic_text: String::new(),
                    exit_code: Some(0),
                },
                tools: HashSet::from([GPU_TOOL, CXX_DRIVER]),
                packages: HashSet::from([BUILD_ACCEL_PACKAGE]),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl EnvironmentProbe for FakeProbe {
        fn probe_runtime(&self, _interpreter: &str) -> ProbeResult {
            self.calls.borrow_mut().push("probe".into());
            self.result.clone()
        }

        fn has_aux_tool(&self, name: &str) -> bool {
            self.calls.borrow_mut().push(format!("tool:{}", name));
            self.tools.contains(name)
        }

        fn has_package(&self, _interpreter: &str, package: &str) -> bool {
            self.calls.borrow_mut().push(format!("package:{}", package));
            self.packages.contains(package)
        }
    }

    #[test]
    fn test_healthy_host_passes() {
        let probe = FakeProbe::healthy();
        let report = run(&probe, "python", false).unwrap();
        assert!(!report.duplicate_runtime_detected);
        assert_eq!(report.probe.fields.cuda_version.as_deref(), Some("12.4"));
    }

    #[test]
    fn test_gpu_unavailable_fails() {
        let mut probe = FakeProbe::healthy();
        probe.result.fields.cuda_available = false;
        assert_eq!(run(&probe, "python", false), Err(PreflightError::GpuUnavailable));
    }

    #[test]
    fn test_gpu_checks_fail_in_fixed_order() {
        let mut probe = FakeProbe::healthy();
        probe.result.fields.cuda_version = None;
        probe.result.fields.cuda_available = false;
        probe.result.fields.cuda_home = None;
        assert_eq!(run(&probe, "python", false), Err(PreflightError::NoCudaBuild));

        probe.result.fields.cuda_version = Some("12.4".into());
        assert_eq!(run(&probe, "python", false), Err(PreflightError::GpuUnavailable));

        probe.result.fields.cuda_available = true;
        assert_eq!(run(&probe, "python", false), Err(PreflightError::CudaHomeMissing));
    }

    #[test]
    fn test_failed_probe_surfaces_diagnostics() {
        let mut probe = FakeProbe::healthy();
        probe.result = ProbeResult {
            fields: ProbeFields {
                error: Some("ModuleNotFoundError: No module named 'torch'".into()),
                ..ProbeFields::default()
            },
            diagnostic_text: "{\"error\": \"ModuleNotFoundError: No module named 'torch'\"}\n".into(),
            exit_code: Some(2),
        };

        match run(&probe, "python", false) {
            Err(PreflightError::ProbeFailed(text)) => assert!(text.contains("No module named 'torch'")),
            other => panic!("expected ProbeFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_probe_with_duplicate_runtime_continues() {
        let mut probe = FakeProbe::healthy();
        probe.result = ProbeResult {
            fields: ProbeFields::default(),
            diagnostic_text: "OMP: Error #15: Initializing libiomp5md.dll, but found libiomp5md.dll already initialized.".into(),
            exit_code: Some(3),
        };

        let report = run(&probe, "python", false).unwrap();

        assert!(report.duplicate_runtime_detected);
        assert!(probe.calls.borrow().contains(&format!("tool:{}", GPU_TOOL)));
    }

    #[test]
    fn test_duplicate_runtime_still_requires_gpu_tool() {
        let mut probe = FakeProbe::healthy();
        probe.result.exit_code = Some(3);
        probe.result.diagnostic_text = "OMP: Error #15".into();
        probe.tools.remove(GPU_TOOL);

        assert_eq!(run(&probe, "python", false), Err(PreflightError::GpuToolMissing(GPU_TOOL)));
    }

    #[test]
    fn test_missing_package_and_compiler() {
        let mut probe = FakeProbe::healthy();
        probe.packages.clear();
        assert_eq!(
            run(&probe, "python", false),
            Err(PreflightError::PackageMissing(BUILD_ACCEL_PACKAGE))
        );

        let mut probe = FakeProbe::healthy();
        probe.tools.remove(CXX_DRIVER);
        assert_eq!(
            run(&probe, "python", false),
            Err(PreflightError::CompilerMissing(CXX_DRIVER))
        );
    }

    #[test]
    fn test_skip_gpu_checks_still_probes_and_checks_toolchain() {
        let mut probe = FakeProbe::healthy();
        probe.result.fields.cuda_available = false;
        probe.tools.remove(GPU_TOOL);

        let report = run(&probe, "python", true).unwrap();

        assert!(report.gpu_checks_skipped);
        let calls = probe.calls.borrow();
        assert_eq!(calls.first().map(String::as_str), Some("probe"));
        assert!(!calls.contains(&format!("tool:{}", GPU_TOOL)));
        assert!(calls.contains(&format!("package:{}", BUILD_ACCEL_PACKAGE)));
    }

    #[test]
    fn test_summary_names_versions_and_gpu() {
        let report = PreflightReport {
            probe: ProbeResult {
                fields: ProbeFields {
                    torch_version: Some("2.5.1".into()),
                    cuda_version: Some("12.4".into()),
                    ..ProbeFields::default()
                },
                ..ProbeResult::default()
            },
            ..PreflightReport::default()
        };

        let line = summary_line(&report, Some(1));
        assert!(line.contains("2.5.1") && line.contains("12.4") && line.contains("#1"));

        let unknown = summary_line(&PreflightReport::default(), None);
        assert!(unknown.contains("#?"));
    }
}
