//! Line-oriented text report.
//!
//! Each duplicate file is printed as `path<TAB>size<TAB>hash` in report
//! order, so the members of a group are on consecutive lines. Unreadable
//! files go to a separate writer as `error<TAB>path<TAB>message`.

use std::io::{self, Write};

use crate::scanner::FileEntry;

/// Write one line per duplicate entry.
///
/// # Errors
///
/// Returns any error from the underlying writer.
pub fn write_duplicates<W: Write>(writer: &mut W, duplicates: &[FileEntry]) -> io::Result<()> {
    for entry in duplicates {
        let Some(hex) = entry.hash_hex() else {
            continue;
        };
        writeln!(writer, "{}\t{}\t{}", entry.path.display(), entry.size, hex)?;
    }
    writer.flush()
}

/// Write one line per file that could not be hashed.
///
/// # Errors
///
/// Returns any error from the underlying writer.
pub fn write_failures<W: Write>(writer: &mut W, failures: &[FileEntry]) -> io::Result<()> {
    for entry in failures {
        match &entry.error {
            Some(e) => writeln!(writer, "error\t{}\t{}", entry.path.display(), e)?,
            None => writeln!(writer, "error\t{}\tnot hashed", entry.path.display())?,
        }
    }
    writer.flush()
}
