//! Error types for cnpj-enrich
//!
//! Only run-level failures live here. Per-identifier failures never escape the
//! pipeline: they are downgraded to `NotFound` rows.
//!
//! - **Startup-fatal**: input unreadable or empty, data folder not
//!   creatable, dedup file unreadable. Nothing is processed.
//! - **Finalization-fatal**: the report could not be written. The run's
//!   in-memory results are discarded.

use std::path::PathBuf;
use thiserror::Error;

/// Run-level error
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to read input file {path}: {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: cnpj_common::Error,
    },

    #[error("input file {path} contains no CNPJ digits")]
    EmptyInput { path: PathBuf },

    #[error("failed to create data folder {path}: {source}")]
    DataFolder {
        path: PathBuf,
        #[source]
        source: cnpj_common::Error,
    },

    #[error("failed to load already-queried list {path}: {source}")]
    DedupStoreUnreadable {
        path: PathBuf,
        #[source]
        source: cnpj_common::Error,
    },

    #[error("failed to write report {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: cnpj_common::Error,
    },
}

impl RunError {
    /// Single user-facing message; the `Display` output is the cause string
    pub fn user_message(&self) -> &'static str {
        match self {
            RunError::InputUnreadable { .. } => "Could not read the input file.",
            RunError::EmptyInput { .. } => {
                "The selected file is empty or contains no valid CNPJs."
            }
            RunError::DataFolder { .. } => "Could not create the data folder.",
            RunError::DedupStoreUnreadable { .. } => {
                "Could not read the list of already-queried CNPJs."
            }
            RunError::ReportWrite { .. } => "Could not save the results file.",
        }
    }

    /// Whether the error happened before any identifier was processed
    pub fn is_startup(&self) -> bool {
        !matches!(self, RunError::ReportWrite { .. })
    }
}
