// src/cli/mod.rs

use crate::{core::launcher::LaunchOptions, models::ParamValue};
use clap::{Parser, builder::BoolishValueParser};
use std::collections::HashMap;

/// infer-launch: preflights a GPU inference environment and runs the inference script.
///
/// Values come from explicit flags first, then the last successful run, then
/// interactive prompts, then built-in defaults.
#[derive(Parser, Debug, Default)]
#[command(
    author,
    version,
    about,
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
pub struct Cli {
    // --- Modes ---
    /// Ignore cached values and prompts; use built-in defaults for unspecified values.
    #[arg(long)]
    pub use_defaults: bool,

    /// Prompt for every parameter (except the interpreter and script paths).
    #[arg(long, short)]
    pub interactive: bool,

    /// Forget the values of the last successful run before resolving.
    #[arg(long)]
    pub reset_cache: bool,

    /// Print the command that would run, then stop.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the environment checks. Paths are still validated.
    #[arg(long)]
    pub skip_preflight: bool,

    /// Run the environment checks without the GPU requirements.
    #[arg(long)]
    pub skip_gpu_checks: bool,

    /// Last resort: let the child tolerate a duplicate OpenMP runtime.
    #[arg(long)]
    pub allow_omp_duplicate: bool,

    /// Enable debug logging.
    #[arg(long, short)]
    pub verbose: bool,

    // --- Value overrides ---
    /// Interpreter used for the probe and the inference script.
    #[arg(long, value_name = "PATH")]
    pub python: Option<String>,

    /// Inference script to run.
    #[arg(long, value_name = "PATH")]
    pub script: Option<String>,

    /// Use the quantized backend for stage 1.
    #[arg(long, value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub stage1_use_exl2: Option<bool>,

    /// Use the quantized backend for stage 2.
    #[arg(long, value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub stage2_use_exl2: Option<bool>,

    /// Stage 2 cache size in tokens.
    #[arg(long, value_name = "N")]
    pub stage2_cache_size: Option<i64>,

    /// Stage 2 batch size.
    #[arg(long, value_name = "N")]
    pub stage2_batch_size: Option<i64>,

    /// Index of the GPU to run on.
    #[arg(long, value_name = "N")]
    pub cuda_idx: Option<i64>,

    /// Stage 1 model location.
    #[arg(long, value_name = "PATH")]
    pub stage1_model: Option<String>,

    /// Stage 2 model location.
    #[arg(long, value_name = "PATH")]
    pub stage2_model: Option<String>,

    /// Number of segments to generate.
    #[arg(long, value_name = "N")]
    pub run_n_segments: Option<i64>,

    /// Directory for the generated files. Created if missing.
    #[arg(long, value_name = "PATH")]
    pub output_dir: Option<String>,

    /// Maximum number of new tokens per segment.
    #[arg(long, value_name = "N")]
    pub max_new_tokens: Option<i64>,

    /// Repetition penalty applied during sampling.
    #[arg(long, value_name = "X")]
    pub repetition_penalty: Option<f64>,

    /// Text file describing the genre.
    #[arg(long, value_name = "PATH")]
    pub genre_txt: Option<String>,

    /// Text file with the lyrics.
    #[arg(long, value_name = "PATH")]
    pub lyrics_txt: Option<String>,
}

impl Cli {
    /// The mode switches for the launcher.
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            use_defaults: self.use_defaults,
            interactive: self.interactive,
            reset_cache: self.reset_cache,
            dry_run: self.dry_run,
            skip_preflight: self.skip_preflight,
            skip_gpu_checks: self.skip_gpu_checks,
            allow_omp_duplicate: self.allow_omp_duplicate,
        }
    }

    /// Explicit values keyed by parameter name. Only flags the user passed appear.
    pub fn overrides(&self) -> HashMap<&'static str, ParamValue> {
        let text = |v: &Option<String>| v.clone().map(ParamValue::String);
        let int = |v: &Option<i64>| v.map(ParamValue::Integer);
        let flag = |v: &Option<bool>| v.map(ParamValue::Boolean);

        [
            ("python", text(&self.python)),
            ("script", text(&self.script)),
            ("stage1_use_exl2", flag(&self.stage1_use_exl2)),
            ("stage2_use_exl2", flag(&self.stage2_use_exl2)),
            ("stage2_cache_size", int(&self.stage2_cache_size)),
            ("stage2_batch_size", int(&self.stage2_batch_size)),
            ("cuda_idx", int(&self.cuda_idx)),
            ("stage1_model", text(&self.stage1_model)),
            ("stage2_model", text(&self.stage2_model)),
            ("run_n_segments", int(&self.run_n_segments)),
            ("output_dir", text(&self.output_dir)),
            ("max_new_tokens", int(&self.max_new_tokens)),
            ("repetition_penalty", self.repetition_penalty.map(ParamValue::Float)),
            ("genre_txt", text(&self.genre_txt)),
            ("lyrics_txt", text(&self.lyrics_txt)),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::launcher::declared_parameters;

    #[test]
    fn test_only_passed_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "infer-launch",
            "--cuda-idx",
            "1",
            "--repetition-penalty",
            "1.2",
            "--stage1-use-exl2",
            "no",
            "--lyrics-txt",
            "~/songs/lyrics.txt",
        ])
        .unwrap();

        let overrides = cli.overrides();

        assert_eq!(overrides.len(), 4);
        assert_eq!(overrides["cuda_idx"], ParamValue::Integer(1));
        assert_eq!(overrides["repetition_penalty"], ParamValue::Float(1.2));
        assert_eq!(overrides["stage1_use_exl2"], ParamValue::Boolean(false));
        assert_eq!(overrides["lyrics_txt"], ParamValue::String("~/songs/lyrics.txt".into()));
    }

    #[test]
    fn test_mode_flags() {
        let cli = Cli::try_parse_from(["infer-launch", "--dry-run", "--use-defaults", "-i"]).unwrap();
        let options = cli.launch_options();
        assert!(options.dry_run && options.use_defaults && options.interactive);
        assert!(!options.skip_preflight && !options.allow_omp_duplicate && !options.reset_cache);
    }

    #[test]
    fn test_override_names_match_declared_parameters() {
        let cli = Cli {
            python: Some("py".into()),
            script: Some("s.py".into()),
            stage1_use_exl2: Some(true),
            stage2_use_exl2: Some(true),
            stage2_cache_size: Some(1),
            stage2_batch_size: Some(1),
            cuda_idx: Some(0),
            stage1_model: Some("m1".into()),
            stage2_model: Some("m2".into()),
            run_n_segments: Some(1),
            output_dir: Some("o".into()),
            max_new_tokens: Some(1),
            repetition_penalty: Some(1.0),
            genre_txt: Some("g".into()),
            lyrics_txt: Some("l".into()),
            ..Cli::default()
        };

        let overrides = cli.overrides();
        let specs = declared_parameters();

        assert_eq!(overrides.len(), specs.len());
        for spec in &specs {
            let value = overrides.get(spec.name).unwrap();
            assert_eq!(value.kind(), spec.kind, "override for '{}'", spec.name);
        }
    }

    #[test]
    fn test_invalid_number_is_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["infer-launch", "--max-new-tokens", "lots"]).is_err());
    }
}
