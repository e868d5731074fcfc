// src/bin/infer-launch.rs

use anyhow::Result;
use colored::*;
use infer_launch::{
    cli::Cli,
    core::{cache::ValueCache, launcher::{LaunchError, Launcher}, parameters::TerminalPrompter},
    system::{environment::ProcessEnvironment, executor::SystemRunner, probe::InterpreterProbe},
};
use clap::Parser;

/// The main entry point of the `infer-launch` application.
/// It sets up logging, parses arguments, runs the launcher,
/// and maps failures to exit codes.
fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(e) = run_cli(cli) {
        // A failed child keeps its own exit code; every other failure is 1.
        // Launch errors already embed their cause in the message.
        match e.downcast_ref::<LaunchError>() {
            Some(launch_err) => {
                eprintln!("\n{}: {}", "Error".red().bold(), launch_err);
                std::process::exit(launch_err.exit_code());
            }
            None => {
                eprintln!("\n{}: {:#}", "Error".red().bold(), e);
                std::process::exit(1);
            }
        }
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let cache = ValueCache::at_default_location();
    log::debug!("Using parameter cache at '{}'", cache.path().display());

    let probe = InterpreterProbe;
    let mut prompter = TerminalPrompter;
    let mut runner = SystemRunner;
    let mut env = ProcessEnvironment::capture();

    let mut launcher = Launcher::new(cache, &probe, &mut prompter, &mut runner);
    launcher.run(&cli.overrides(), cli.launch_options(), &mut env)?;
    Ok(())
}
