//! Enrichment run orchestration
//!
//! `run_enrichment` is the I/O boundary around the pipeline:
//! 1. Read and normalize the input file
//! 2. Prepare the data folder and load the already-queried list
//! 3. Run the pipeline (pure apart from the store appends)
//! 4. Sort and write the report
//!
//! Startup failures abort before any identifier is processed. A report write
//! failure discards the run's results. Both are reported once as `RunFailed`.

pub mod pipeline;

pub use pipeline::{Pipeline, PipelineConfig, RunOutcome};

use crate::config::EnrichSettings;
use crate::error::RunError;
use crate::services::dedup_store::FileDedupStore;
use crate::services::normalizer::{normalize_batch, read_input_lines};
use crate::services::report_writer::write_report;
use crate::types::{CnpjLookup, RunCounters};
use chrono::Utc;
use cnpj_common::config::DataFolderInitializer;
use cnpj_common::events::{EnrichEvent, EventBus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// Outcome of a run that reached finalization
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub counters: RunCounters,
    /// Set when rows were written
    pub report_path: Option<PathBuf>,
    pub total: usize,
    pub processed: usize,
    pub live_calls: usize,
    pub cancelled: bool,
}

/// Execute one enrichment run over `input_path`
pub async fn run_enrichment(
    settings: &EnrichSettings,
    input_path: &Path,
    lookup: Arc<dyn CnpjLookup>,
    event_bus: Option<EventBus>,
    cancel: CancellationToken,
) -> Result<RunSummary, RunError> {
    let run_id = Uuid::new_v4();

    match execute(settings, input_path, lookup, event_bus.clone(), cancel, run_id).await {
        Ok(summary) => Ok(summary),
        Err(e) => {
            error!(run_id = %run_id, error = %e, "{}", e.user_message());
            if let Some(bus) = &event_bus {
                bus.emit_lossy(EnrichEvent::RunFailed {
                    run_id,
                    message: e.user_message().to_string(),
                    cause: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
            Err(e)
        }
    }
}

async fn execute(
    settings: &EnrichSettings,
    input_path: &Path,
    lookup: Arc<dyn CnpjLookup>,
    event_bus: Option<EventBus>,
    cancel: CancellationToken,
    run_id: Uuid,
) -> Result<RunSummary, RunError> {
    let lines = read_input_lines(input_path).map_err(|source| RunError::InputUnreadable {
        path: input_path.to_path_buf(),
        source,
    })?;

    let identifiers = normalize_batch(&lines);
    if identifiers.is_empty() {
        return Err(RunError::EmptyInput {
            path: input_path.to_path_buf(),
        });
    }
    info!(
        input = %input_path.display(),
        lines = lines.len(),
        identifiers = identifiers.len(),
        "Input loaded"
    );

    DataFolderInitializer::new(settings.data_folder.clone())
        .ensure_directory_exists()
        .map_err(|source| RunError::DataFolder {
            path: settings.data_folder.clone(),
            source,
        })?;

    let mut store = FileDedupStore::load(&settings.dedup_path).map_err(|source| {
        RunError::DedupStoreUnreadable {
            path: settings.dedup_path.clone(),
            source,
        }
    })?;

    let config = PipelineConfig {
        rate_delay: settings.rate_delay,
    };
    let pipeline = match &event_bus {
        Some(bus) => Pipeline::with_events(lookup, config, bus.clone()),
        None => Pipeline::new(lookup, config),
    }
    .with_cancellation(cancel)
    .with_run_id(run_id);

    let outcome = pipeline.run(&identifiers, &mut store).await;

    let written = write_report(&outcome.records, &settings.report_path).map_err(|source| {
        RunError::ReportWrite {
            path: settings.report_path.clone(),
            source,
        }
    })?;
    let report_path = written.then(|| settings.report_path.clone());

    if !outcome.cancelled {
        if let Some(bus) = &event_bus {
            bus.emit_lossy(EnrichEvent::RunCompleted {
                run_id,
                counters: outcome.counters.clone(),
                report_path: report_path.clone(),
                timestamp: Utc::now(),
            });
        }
    }

    info!(
        run_id = %run_id,
        counters = %outcome.counters.display_string(),
        cancelled = outcome.cancelled,
        "Enrichment run finished"
    );

    Ok(RunSummary {
        run_id,
        counters: outcome.counters,
        report_path,
        total: outcome.total,
        processed: outcome.processed,
        live_calls: outcome.live_calls,
        cancelled: outcome.cancelled,
    })
}
