//! Report formatters for scan results.
//!
//! - [`text`]: tab-separated lines, one per duplicate file
//! - [`json`]: a single document for automation
//!
//! # Example
//!
//! ```no_run
//! use dupdup::duplicates::DuplicateFinder;
//! use dupdup::error::ExitCode;
//! use dupdup::output::json::JsonOutput;
//! use std::path::Path;
//!
//! let outcome = DuplicateFinder::with_defaults()
//!     .find_duplicates(Path::new("."))
//!     .unwrap();
//!
//! let output = JsonOutput::new(&outcome, ExitCode::Success);
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

pub mod json;
pub mod text;

pub use json::JsonOutput;
pub use text::{write_duplicates, write_failures};
