// src/core/launcher.rs

use crate::{
    constants::{OMP_DUPLICATE_GUARD_ENV, SEARCH_PATH_ENV},
    core::{
        cache::ValueCache,
        command_builder,
        parameters::{self, Prompter, ResolveOptions},
        paths::{self, PathError},
        preflight::{self, PreflightError},
        sanitizer::{self, ContextError},
    },
    models::{
        ArgRole, CacheRecord, CommandInvocation, CondaContext, ParamKind, ParamValue, ParameterSpec,
        ResolvedParameters,
    },
    system::{
        environment::ProcessEnvironment,
        executor::{ChildExit, ExecutionError, ProcessRunner},
        probe::EnvironmentProbe,
    },
};
use anyhow::{Context, Result};
use colored::*;
use log::{debug, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

// --- Parameter catalog ---

pub const PARAM_PYTHON: &str = "python";
pub const PARAM_SCRIPT: &str = "script";
pub const PARAM_CUDA_IDX: &str = "cuda_idx";
pub const PARAM_OUTPUT_DIR: &str = "output_dir";
pub const PARAM_GENRE_TXT: &str = "genre_txt";
pub const PARAM_LYRICS_TXT: &str = "lyrics_txt";

/// Every parameter the launcher resolves, in command-line order.
pub fn declared_parameters() -> Vec<ParameterSpec> {
    use ParamValue::{Boolean, Float, Integer, String as Text};

    let p = |name: &'static str, kind: ParamKind, default: ParamValue, role: ArgRole| ParameterSpec {
        name,
        kind,
        default,
        role,
        prompt_eligible: false,
    };

    vec![
        p(PARAM_PYTHON, ParamKind::String, Text("python".into()), ArgRole::Interpreter),
        p(PARAM_SCRIPT, ParamKind::String, Text("infer.py".into()), ArgRole::Script),
        p("stage1_use_exl2", ParamKind::Boolean, Boolean(true), ArgRole::PresenceFlag),
        p("stage2_use_exl2", ParamKind::Boolean, Boolean(true), ArgRole::PresenceFlag),
        p("stage2_cache_size", ParamKind::Integer, Integer(32768), ArgRole::Valued),
        p("stage2_batch_size", ParamKind::Integer, Integer(4), ArgRole::Valued),
        p(PARAM_CUDA_IDX, ParamKind::Integer, Integer(0), ArgRole::Valued),
        p("stage1_model", ParamKind::String, Text("m-a-p/YuE-s1-7B-anneal-en-cot".into()), ArgRole::Valued),
        p("stage2_model", ParamKind::String, Text("m-a-p/YuE-s2-1B-general".into()), ArgRole::Valued),
        p("run_n_segments", ParamKind::Integer, Integer(2), ArgRole::Valued),
        p(PARAM_OUTPUT_DIR, ParamKind::String, Text("./output".into()), ArgRole::Valued),
        p("max_new_tokens", ParamKind::Integer, Integer(3000), ArgRole::Valued),
        p("repetition_penalty", ParamKind::Float, Float(1.1), ArgRole::Valued),
        ParameterSpec {
            prompt_eligible: true,
            ..p(PARAM_GENRE_TXT, ParamKind::String, Text("prompt_egs/genre.txt".into()), ArgRole::Valued)
        },
        ParameterSpec {
            prompt_eligible: true,
            ..p(PARAM_LYRICS_TXT, ParamKind::String, Text("prompt_egs/lyrics.txt".into()), ArgRole::Valued)
        },
    ]
}

/// How each filesystem parameter is checked before launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathMode {
    MustExist,
    CreateDir,
}

const PATH_PARAMS: &[(&str, PathMode)] = &[
    (PARAM_SCRIPT, PathMode::MustExist),
    (PARAM_GENRE_TXT, PathMode::MustExist),
    (PARAM_LYRICS_TXT, PathMode::MustExist),
    (PARAM_OUTPUT_DIR, PathMode::CreateDir),
];

// --- Errors and state ---

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Invalid path for '{name}': {source}")]
    Path {
        name: &'static str,
        #[source]
        source: PathError,
    },
    #[error("Preflight failed: {0}")]
    Preflight(#[from] PreflightError),
    #[error("{0}")]
    Context(#[from] ContextError),
    #[error("{0}")]
    Spawn(#[from] ExecutionError),
    #[error("The inference process failed with exit code {}.", describe_exit_code(.code))]
    ChildFailed { code: Option<i32> },
}

fn describe_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "unknown (terminated by a signal)".to_string(),
    }
}

impl LaunchError {
    /// The exit code the launcher itself should end with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ChildFailed { code: Some(code) } if *code != 0 => *code,
            _ => 1,
        }
    }
}

/// Progress of a single launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStage {
    Init,
    CacheLoaded,
    ParametersResolved,
    PathsResolved,
    PreflightPassed,
    CommandBuilt,
    Executing,
    DryRunCompleted,
    Succeeded,
    Failed,
}

/// Mode switches for one launch.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaunchOptions {
    pub use_defaults: bool,
    pub interactive: bool,
    pub reset_cache: bool,
    pub dry_run: bool,
    pub skip_preflight: bool,
    /// Run the preflight without the GPU checks.
    pub skip_gpu_checks: bool,
    pub allow_omp_duplicate: bool,
}

/// How a launch ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchOutcome {
    DryRun {
        invocation: CommandInvocation,
        preview: String,
    },
    Succeeded {
        invocation: CommandInvocation,
        parameters: ResolvedParameters,
    },
}

/// Drives one launch from cache loading to the child's exit.
pub struct Launcher<'a> {
    cache: ValueCache,
    probe: &'a dyn EnvironmentProbe,
    prompter: &'a mut dyn Prompter,
    runner: &'a mut dyn ProcessRunner,
    specs: Vec<ParameterSpec>,
    stage: LaunchStage,
}

impl std::fmt::Debug for Launcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("cache", &self.cache)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

impl<'a> Launcher<'a> {
    pub fn new(
        cache: ValueCache,
        probe: &'a dyn EnvironmentProbe,
        prompter: &'a mut dyn Prompter,
        runner: &'a mut dyn ProcessRunner,
    ) -> Self {
        Self {
            cache,
            probe,
            prompter,
            runner,
            specs: declared_parameters(),
            stage: LaunchStage::Init,
        }
    }

    pub fn stage(&self) -> LaunchStage {
        self.stage
    }

    fn advance(&mut self, next: LaunchStage) {
        debug!("Launch stage: {:?} -> {:?}", self.stage, next);
        self.stage = next;
    }

    /// Runs the whole pipeline. `env` is the environment handed to the child;
    /// it is left exactly as it was on return.
    pub fn run(
        &mut self,
        overrides: &HashMap<&'static str, ParamValue>,
        options: LaunchOptions,
        env: &mut ProcessEnvironment,
    ) -> Result<LaunchOutcome> {
        let result = self.run_stages(overrides, options, env);
        if result.is_err() {
            self.advance(LaunchStage::Failed);
        }
        result
    }

    fn run_stages(
        &mut self,
        overrides: &HashMap<&'static str, ParamValue>,
        options: LaunchOptions,
        env: &mut ProcessEnvironment,
    ) -> Result<LaunchOutcome> {
        // 1. Cache. Never fatal. A dry run leaves the file alone.
        let cached = if options.reset_cache {
            if !options.dry_run && self.cache.clear() {
                println!("{}", t!("launch.info.cache_reset").dimmed());
            }
            CacheRecord::default()
        } else {
            self.cache.load()
        };
        self.advance(LaunchStage::CacheLoaded);

        // 2. Parameters.
        let resolve_options = ResolveOptions {
            use_defaults: options.use_defaults,
            interactive: options.interactive,
        };
        let params = parameters::resolve_parameters(
            &self.specs,
            overrides,
            &cached,
            resolve_options,
            &mut *self.prompter,
        )
        .context("Failed to resolve run parameters")?;
        self.advance(LaunchStage::ParametersResolved);

        // 3. Paths. Always required, even without preflight.
        let (for_command, script) = resolve_paths(&params, options.dry_run)?;
        self.advance(LaunchStage::PathsResolved);

        let interpreter = params
            .get_str(PARAM_PYTHON)
            .context("Internal error: interpreter was not resolved.")?
            .to_string();

        // 4. Preflight.
        if options.skip_preflight {
            println!("{}", t!("launch.warn.preflight_skipped").yellow());
        } else {
            let report = preflight::run(self.probe, &interpreter, options.skip_gpu_checks)
                .map_err(LaunchError::from)?;
            let cuda_idx = match params.get(PARAM_CUDA_IDX) {
                Some(ParamValue::Integer(i)) => Some(*i),
                _ => None,
            };
            preflight::print_report(&report, cuda_idx);
            self.advance(LaunchStage::PreflightPassed);
        }

        // 5. Command.
        let invocation = command_builder::build(&self.specs, &for_command, &interpreter, &script)?;
        self.advance(LaunchStage::CommandBuilt);

        if options.dry_run {
            let preview = command_builder::preview(&invocation);
            println!("{}", t!("launch.info.dry_run").cyan().bold());
            println!("{}", preview);
            self.advance(LaunchStage::DryRunCompleted);
            return Ok(LaunchOutcome::DryRun {
                invocation,
                preview,
            });
        }

        // 6. Execution.
        self.advance(LaunchStage::Executing);
        println!("{}", format!(t!("launch.info.running"), script = script.display()).green());
        let exit = self.execute(&invocation, options.allow_omp_duplicate, env)?;
        if !exit.success() {
            return Err(LaunchError::ChildFailed { code: exit.code }.into());
        }

        // 7. Persist only a configuration that is known to work.
        self.advance(LaunchStage::Succeeded);
        self.cache.save(&params.to_cache_record());
        println!("{}", t!("launch.info.succeeded").green().bold());

        Ok(LaunchOutcome::Succeeded {
            invocation,
            parameters: params,
        })
    }

    /// Spawns the child with a sanitized copy of `env`. The search path and
    /// the OpenMP guard are restored on every exit path.
    fn execute(
        &mut self,
        invocation: &CommandInvocation,
        allow_omp_duplicate: bool,
        env: &mut ProcessEnvironment,
    ) -> Result<ChildExit, LaunchError> {
        let context = CondaContext::from_env(env)?;

        let saved = env.snapshot(&[SEARCH_PATH_ENV, OMP_DUPLICATE_GUARD_ENV]);
        let mut env = scopeguard::guard(env, move |env| {
            env.restore(saved);
            debug!("Restored {} and {}", SEARCH_PATH_ENV, OMP_DUPLICATE_GUARD_ENV);
        });

        if let Some(context) = &context {
            let current = env.get_string(SEARCH_PATH_ENV).unwrap_or_default();
            let sanitized = sanitizer::sanitize_for_context(&current, context);
            debug!(
                "Excluding '{}' (except '{}') from {}",
                context.install_root.display(),
                context.env_prefix.display(),
                SEARCH_PATH_ENV
            );
            env.set(SEARCH_PATH_ENV, sanitized);
        }

        if allow_omp_duplicate {
            warn!("{}=TRUE set for the child process.", OMP_DUPLICATE_GUARD_ENV);
            println!("{}", t!("launch.warn.omp_guard_disabled").yellow());
            env.set(OMP_DUPLICATE_GUARD_ENV, "TRUE");
        }

        Ok(self.runner.run(invocation, &**env)?)
    }
}

/// Resolves the filesystem parameters. Returns the parameter set with absolute
/// paths substituted (for the command line) and the script path.
/// In a dry run the output directory is not created.
fn resolve_paths(params: &ResolvedParameters, dry_run: bool) -> Result<(ResolvedParameters, PathBuf)> {
    let mut for_command = params.clone();
    let mut script = None;

    for &(name, mode) in PATH_PARAMS {
        let raw = params
            .get_str(name)
            .with_context(|| format!("Internal error: path parameter '{}' was not resolved.", name))?;
        let (allow_missing, create_dir) = match mode {
            PathMode::MustExist => (false, false),
            PathMode::CreateDir => (dry_run, !dry_run),
        };
        let resolved = paths::resolve(raw, allow_missing, create_dir)
            .map_err(|source| LaunchError::Path { name, source })?;
        debug!("Path '{}' -> '{}'", name, resolved.display());

        if name == PARAM_SCRIPT {
            script = Some(resolved.clone());
        }
        for_command.set(name, ParamValue::String(resolved.display().to_string()));
    }

    let script = script.context("Internal error: script path was not resolved.")?;
    Ok((for_command, script))
}
