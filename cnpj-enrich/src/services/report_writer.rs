//! CSV report writer
//!
//! Rows are ordered by category priority (`NonDeveloper`, `AlreadyQueried`,
//! `Developer`, `NotFound`), keeping discovery order within a category.
//! The file is UTF-8 with a byte-order mark and is replaced wholesale via a
//! temp file + rename. An empty result set writes nothing.

use crate::types::ClassifiedRecord;
use cnpj_common::config::temp_path_for;
use cnpj_common::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// UTF-8 byte-order mark, so spreadsheet tools pick the right encoding
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Stable sort by report priority
pub fn sort_for_report(records: &mut [ClassifiedRecord]) {
    records.sort_by_key(|record| record.category.report_priority());
}

/// Sort and write `records` to `path`
///
/// Returns `Ok(false)` without touching the filesystem when there are no rows.
pub fn write_report(records: &[ClassifiedRecord], path: &Path) -> Result<bool> {
    if records.is_empty() {
        info!("No results to write, skipping report");
        return Ok(false);
    }

    let mut sorted = records.to_vec();
    sort_for_report(&mut sorted);

    let temp = temp_path_for(path);
    if let Err(e) = write_csv(&sorted, &temp) {
        let _ = std::fs::remove_file(&temp);
        return Err(e);
    }
    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(e.into());
    }

    info!(path = %path.display(), rows = sorted.len(), "Report written");
    Ok(true)
}

fn write_csv(records: &[ClassifiedRecord], path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    let file = writer
        .into_inner()
        .map_err(|e| cnpj_common::Error::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}
