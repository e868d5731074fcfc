// src/system/executor.rs

use crate::models::CommandInvocation;
use crate::system::environment::ProcessEnvironment;
use std::process::{Command as StdCommand, Output, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, #[source] std::io::Error),
}

/// How the child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ChildExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Spawns the inference process and waits for it.
pub trait ProcessRunner {
    fn run(
        &mut self,
        invocation: &CommandInvocation,
        env: &ProcessEnvironment,
    ) -> Result<ChildExit, ExecutionError>;
}

/// Runs the child for real, inheriting stdio.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(
        &mut self,
        invocation: &CommandInvocation,
        env: &ProcessEnvironment,
    ) -> Result<ChildExit, ExecutionError> {
        execute_with_env(&invocation.interpreter, &invocation.args, env)
    }
}

/// Executes `program` with exactly the variables held in `env` and blocks until it exits.
/// Output streams go straight to the user's terminal.
pub fn execute_with_env(
    program: &str,
    args: &[String],
    env: &ProcessEnvironment,
) -> Result<ChildExit, ExecutionError> {
    log::debug!("Spawning '{}' with {} argument(s)", program, args.len());

    let status = StdCommand::new(program)
        .args(args)
        .env_clear()
        .envs(env.iter())
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| ExecutionError::CommandFailed(program.to_string(), e))?;

    log::debug!("'{}' exited with {:?}", program, status.code());
    Ok(ChildExit {
        code: status.code(),
    })
}

/// Executes a short-lived command and captures both output streams.
/// A non-zero exit is not an error here; callers inspect `Output::status`.
pub fn execute_and_capture_output(program: &str, args: &[&str]) -> Result<Output, ExecutionError> {
    log::debug!("Capturing output of '{}' {:?}", program, args);

    StdCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| ExecutionError::CommandFailed(program.to_string(), e))
}
