//! Logging setup on top of the `log` facade and `env_logger`.
//!
//! Diagnostics always go to stderr so that stdout carries nothing but the
//! duplicate report. The level is chosen in this order:
//!
//! 1. `RUST_LOG`, if set
//! 2. `--quiet` (errors only)
//! 3. `--verbose` count: one for debug, two or more for trace
//! 4. info
//!
//! # Example
//!
//! ```rust,no_run
//! use dupdup::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("visible with -v");
//! ```

use env_logger::{Builder, Target};
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Environment variable that overrides the CLI verbosity flags.
pub const LOG_ENV: &str = "RUST_LOG";

/// Initialize the global logger from the CLI verbosity flags.
///
/// Calling it a second time is harmless: the first logger stays installed.
pub fn init_logging(verbose: u8, quiet: bool) {
    let from_env = env::var_os(LOG_ENV).is_some();

    let mut builder = Builder::new();
    builder.target(Target::Stderr);

    if from_env {
        builder.parse_env(LOG_ENV);
    } else {
        builder.filter_level(level_for(verbose, quiet));
    }

    let show_module = verbose >= 1;
    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        if show_module {
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                buf.timestamp_millis(),
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        }
    });

    if builder.try_init().is_err() {
        return;
    }

    if from_env {
        log::debug!("Logging configured from {}", LOG_ENV);
    } else {
        log::debug!("Logging initialized at level {}", level_for(verbose, quiet));
    }
}

/// Map the CLI flags to a level filter. `quiet` wins over `verbose`.
#[must_use]
pub fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
