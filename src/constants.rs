// src/constants.rs

/// The name of the per-user configuration directory (inside the system config dir).
pub const APP_DIR_NAME: &str = "infer-launch";

/// The name of the last-used parameters file (inside the app config dir).
pub const CACHE_FILENAME: &str = "last_run.json";

/// Overrides the location of the last-used parameters file.
pub const CACHE_PATH_ENV: &str = "INFER_LAUNCH_CACHE";

/// The ambient variable naming the active isolated environment.
pub const CONDA_PREFIX_ENV: &str = "CONDA_PREFIX";

/// The directory that holds named environments below an installation root.
pub const CONDA_ENVS_DIR: &str = "envs";

/// The executable search path variable handed to the child.
pub const SEARCH_PATH_ENV: &str = "PATH";

/// Setting this to `TRUE` disables the OpenMP duplicate-runtime abort.
pub const OMP_DUPLICATE_GUARD_ENV: &str = "KMP_DUPLICATE_LIB_OK";

/// The log fragment printed when a second OpenMP runtime gets initialized.
pub const OMP_DUPLICATE_SIGNATURE: &str = "OMP: Error #15";

/// GPU management tool that must be on the search path.
pub const GPU_TOOL: &str = "nvidia-smi";

/// Package required to JIT-compile the runtime's native extensions.
pub const BUILD_ACCEL_PACKAGE: &str = "ninja";

/// Native C++ compiler driver required by the extension build.
#[cfg(target_os = "windows")]
pub const CXX_DRIVER: &str = "cl";

#[cfg(not(target_os = "windows"))]
pub const CXX_DRIVER: &str = "c++";

/// Exit status the diagnostic routine uses when the runtime cannot be queried.
pub const PROBE_FAILURE_STATUS: i32 = 2;

/// Inline routine run through the interpreter to report the ML runtime status.
/// It must print exactly one JSON line.
pub const PROBE_SCRIPT: &str = r#"
import json, sys
out = {"torch_version": None, "cuda_version": None, "cuda_available": False, "cuda_home": None, "error": None}
try:
    import torch
    out["torch_version"] = torch.__version__
    out["cuda_version"] = torch.version.cuda
    out["cuda_available"] = bool(torch.cuda.is_available())
    from torch.utils.cpp_extension import CUDA_HOME
    out["cuda_home"] = CUDA_HOME
except Exception as exc:
    out["error"] = "%s: %s" % (type(exc).__name__, exc)
    print(json.dumps(out))
    sys.exit(2)
print(json.dumps(out))
"#;
