//! dupdup - concurrent duplicate file finder
//!
//! Walks a directory tree, discards every file whose size is unique, hashes
//! the rest with BLAKE3 on a pool of worker threads and reports the files
//! whose content matches at least one other file.
//!
//! The stages are connected by bounded channels and share one cancellation
//! flag; see [`duplicates::finder`] for the pipeline itself.

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod scanner;
pub mod signal;

use std::io::{self, Write};
use std::path::Path;

use anyhow::Context;

use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::duplicates::{DuplicateFinder, FinderError, ScanOutcome};
use crate::error::ExitCode;
use crate::output::JsonOutput;
use crate::signal::ShutdownHandler;

/// Run the binary: logging, configuration, Ctrl+C handling, scan, report.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the root cannot be
/// scanned, the walk stops on a traversal error (after the partial report
/// has been written) or the scan is interrupted.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let config = Config::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .with_cli_overrides(&cli);
    config.validate()?;
    log::debug!("Effective configuration: {:?}", config);

    let shutdown = signal::install_handler().context("Failed to install Ctrl+C handler")?;

    run_scan(
        &cli.path,
        &config,
        cli.output,
        shutdown,
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
    )
}

/// Scan `root` and write the report.
///
/// The report goes to `out`; unreadable files are listed on `diagnostics`
/// in text mode and inside the document in JSON mode.
///
/// # Errors
///
/// See [`run_app`].
pub fn run_scan<W: Write, E: Write>(
    root: &Path,
    config: &Config,
    format: OutputFormat,
    shutdown: ShutdownHandler,
    out: &mut W,
    diagnostics: &mut E,
) -> anyhow::Result<ExitCode> {
    let finder = DuplicateFinder::new(config.finder_config(shutdown));

    let outcome = match finder.find_duplicates(root) {
        Ok(outcome) => outcome,
        Err(FinderError::Interrupted) => return Err(FinderError::Interrupted.into()),
        Err(e) => return Err(e).with_context(|| format!("Failed to scan {}", root.display())),
    };

    write_report(root, outcome, format, out, diagnostics)
}

/// Write the report for a finished scan and pick the exit code.
///
/// Duplicates are always written, including the partial result of a walk
/// that stopped on a traversal error; that error is returned afterwards.
///
/// # Errors
///
/// Returns the outcome's traversal error, or an error if writing fails.
pub fn write_report<W: Write, E: Write>(
    root: &Path,
    outcome: ScanOutcome,
    format: OutputFormat,
    out: &mut W,
    diagnostics: &mut E,
) -> anyhow::Result<ExitCode> {
    let exit_code = if !outcome.is_complete() {
        ExitCode::GeneralError
    } else if outcome.failures.is_empty() {
        ExitCode::Success
    } else {
        ExitCode::PartialSuccess
    };

    match format {
        OutputFormat::Text => {
            output::write_duplicates(out, &outcome.duplicates)
                .context("Failed to write report")?;
            output::write_failures(diagnostics, &outcome.failures)
                .context("Failed to write error list")?;
        }
        OutputFormat::Json => {
            JsonOutput::new(&outcome, exit_code)
                .write_to(out)
                .context("Failed to write JSON report")?;
        }
    }

    if let Some(walk_error) = outcome.walk_error {
        return Err(FinderError::Scan(walk_error))
            .with_context(|| format!("Scan of {} was incomplete", root.display()));
    }

    Ok(exit_code)
}
