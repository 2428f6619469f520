//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that parses CLI
//! arguments, builds the run configuration and dispatches to a stage (or to
//! the orchestrator).

use clap::Parser;

use crate::cli::{Command, PipelineArgs};
use crate::data::resolve_source_url;
use crate::domain::{DEFAULT_SOURCE_URL, PipelineConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `covid` binary.
pub fn run() -> Result<(), AppError> {
    // `covid` and `covid --offline` behave like `covid run ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Run(args) => handle_run(&args),
        Command::Download(args) => {
            pipeline::stage_download(&config_from_args(&args)).map(|_| ())
        }
        Command::Analyze(args) => pipeline::stage_analyze(&config_from_args(&args)).map(|_| ()),
        Command::Sql(args) => pipeline::stage_sql(&config_from_args(&args)).map(|_| ()),
    }
}

fn handle_run(args: &PipelineArgs) -> Result<(), AppError> {
    let config = config_from_args(args);
    let summary = pipeline::run_all(&config);
    print!("{}", pipeline::format_run_summary(&summary, &config));
    // Stage failures are reported in the summary, not the exit status.
    Ok(())
}

pub fn config_from_args(args: &PipelineArgs) -> PipelineConfig {
    PipelineConfig {
        data_dir: args.data_dir.clone(),
        charts_dir: args.charts_dir.clone(),
        powerbi_dir: args.powerbi_dir.clone(),
        source_url: resolve_source_url(args.source_url.clone(), DEFAULT_SOURCE_URL),
        source_dir: args.source_dir.clone(),
        offline: args.offline,
        http_timeout_secs: args.http_timeout,
        seed: args.seed,
        top_n: args.top,
        export_insights: args.export_insights.clone(),
    }
}

/// Rewrite argv so `covid` defaults to `covid run`.
///
/// Rules:
/// - `covid`                      -> `covid run`
/// - `covid --offline ...`        -> `covid run --offline ...`
/// - `covid --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "run" | "download" | "analyze" | "sql");
    if is_subcommand {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
        return argv;
    }

    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_binary_runs_everything() {
        assert_eq!(rewrite_args(argv(&["covid"])), argv(&["covid", "run"]));
        assert_eq!(
            rewrite_args(argv(&["covid", "--offline"])),
            argv(&["covid", "run", "--offline"])
        );
    }

    #[test]
    fn subcommands_and_help_pass_through() {
        assert_eq!(rewrite_args(argv(&["covid", "sql"])), argv(&["covid", "sql"]));
        assert_eq!(rewrite_args(argv(&["covid", "--help"])), argv(&["covid", "--help"]));
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = crate::cli::Cli::parse_from(argv(&[
            "covid",
            "download",
            "--data-dir",
            "/tmp/d",
            "--source-url",
            "http://mirror/",
            "--offline",
            "--top",
            "5",
        ]));
        let Command::Download(args) = cli.command else {
            panic!("expected download");
        };
        let config = config_from_args(&args);
        assert_eq!(config.data_dir, std::path::PathBuf::from("/tmp/d"));
        assert_eq!(config.source_url, "http://mirror/");
        assert!(config.offline);
        assert_eq!(config.top_n, 5);
        assert_eq!(config.seed, 42);
        assert_eq!(config.charts_dir, std::path::PathBuf::from("outputs/charts"));
    }
}
