//! Domain matching.
//!
//! Decides which resolved names are interesting enough to whitelist their
//! addresses, using an ordered list of case-insensitive regular expressions.

mod patterns;

pub use patterns::{MatchMode, Patterns};

use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Read patterns from a file, one per line.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn load_patterns_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::PatternsFile {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(parse_patterns(&contents))
}

fn parse_patterns(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            Some(line.to_string())
        })
        .collect()
}
