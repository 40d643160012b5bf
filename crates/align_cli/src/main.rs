//! track-align - command line front end for align_core.

mod cli;
mod run;

use std::path::Path;
use std::process::ExitCode;

use align_core::config::{ConfigManager, Settings};
use align_core::logging::{init_tracing, StatusEmitter};
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use cli::{Cli, Mode};
use run::TrackReport;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.return_only {
        return ExitCode::SUCCESS;
    }

    match try_main(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main(cli: Cli) -> Result<ExitCode> {
    let mode = match cli.mode() {
        Ok(mode) => mode,
        Err(message) => {
            eprintln!("ERROR: {message}");
            eprintln!("{}", Cli::command().render_usage());
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut settings = load_settings(cli.config.as_deref())?;
    cli.apply_overrides(&mut settings);

    let _guard = init_tracing(settings.logging.level, settings.logging.log_dir.as_deref())
        .context("Failed to initialize logging")?;
    tracing::debug!(?settings, "Effective settings");

    let status = StatusEmitter::stdout(settings.logging.send_messages);

    match mode {
        Mode::Test { base } => {
            let result = run::noise_test(&base, &settings)?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "critical_sigma": result.sigma,
                        "db": result.db,
                        "trials": result.trials,
                        "saturated": result.saturated,
                    })
                );
            } else {
                println!("Critical noise {} ({} db)", result.sigma, result.db);
            }
            Ok(ExitCode::SUCCESS)
        }
        Mode::CanOpen { base } => {
            if run::can_open(&base, &status) {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Mode::Process { base, jobs } => {
            let json = cli.json;
            let quiet = cli.quiet;
            run::process(&base, &jobs, &settings, &status, |report| {
                print_report(report, json, quiet)
            })?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let mut manager = ConfigManager::new(path);
    manager
        .load_or_default()
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    Ok(manager.into_settings())
}

fn print_report(report: &TrackReport, json: bool, quiet: bool) {
    if json {
        match serde_json::to_string(report) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!(error = %e, "Failed to serialize report"),
        }
    } else if !quiet {
        println!(
            "{}: in {} ({:.3} s), length {} ({:.3} s)",
            report.file, report.offset, report.offset_secs, report.length, report.length_secs
        );
    }
}
