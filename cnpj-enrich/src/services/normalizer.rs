//! Identifier normalization
//!
//! Input lines may carry any punctuation (`12.345.678/0001-95`); only the
//! decimal digits are kept. Lines with no digits are dropped before they
//! count toward the batch total.

use cnpj_common::Result;
use std::path::Path;

/// Keep only ASCII decimal digits; empty string if there are none
pub fn normalize_identifier(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalize every line, dropping the ones that end up empty
///
/// Order is preserved and in-batch duplicates are kept.
pub fn normalize_batch<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines
        .iter()
        .map(|line| normalize_identifier(line.as_ref()))
        .filter(|id| !id.is_empty())
        .collect()
}

/// Read an input file, one raw identifier per line
pub fn read_input_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().map(str::to_string).collect())
}
