//! Run aggregator
//!
//! Drives one enrichment run: for each identifier, in input order, consult the
//! dedup store, pace and perform the live lookup on a miss, classify the
//! response and accumulate exactly one row and one counter increment.
//!
//! # Error Handling
//! - Per-item error isolation: a failed store append, lookup or classification
//!   (including a panic) turns that identifier into a `NotFound` row and the
//!   loop moves on
//! - Only the caller's I/O boundary (`workflow::run_enrichment`) can fail a run
//!
//! # Example
//! ```rust,ignore
//! let pipeline = Pipeline::with_events(lookup, PipelineConfig::default(), event_bus);
//! let outcome = pipeline.run(&identifiers, &mut store).await;
//! ```

use crate::services::classifier::{classify, finalize_record};
use crate::services::dedup_store::DedupStore;
use crate::services::rate_governor::RateGovernor;
use crate::types::{Category, ClassifiedRecord, CnpjLookup, RunCounters};
use anyhow::Context;
use chrono::Utc;
use cnpj_common::events::{EnrichEvent, EventBus};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default spacing between live lookups
pub const DEFAULT_RATE_DELAY: Duration = Duration::from_secs(12);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum delay between the end of one live lookup and the start of the next
    pub rate_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rate_delay: DEFAULT_RATE_DELAY,
        }
    }
}

/// Result of a pipeline run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    /// One row per processed identifier, in discovery order
    pub records: Vec<ClassifiedRecord>,
    pub counters: RunCounters,
    /// Identifiers in the batch
    pub total: usize,
    /// Identifiers that reached a terminal category
    pub processed: usize,
    /// Lookups actually attempted
    pub live_calls: usize,
    pub cancelled: bool,
}

/// Enrichment pipeline
pub struct Pipeline {
    lookup: Arc<dyn CnpjLookup>,
    config: PipelineConfig,
    event_bus: Option<EventBus>,
    cancel: CancellationToken,
    run_id: Uuid,
}

impl Pipeline {
    /// Create new pipeline without event reporting
    pub fn new(lookup: Arc<dyn CnpjLookup>, config: PipelineConfig) -> Self {
        Self {
            lookup,
            config,
            event_bus: None,
            cancel: CancellationToken::new(),
            run_id: Uuid::new_v4(),
        }
    }

    /// Create pipeline that reports progress on `event_bus`
    pub fn with_events(
        lookup: Arc<dyn CnpjLookup>,
        config: PipelineConfig,
        event_bus: EventBus,
    ) -> Self {
        Self {
            event_bus: Some(event_bus),
            ..Self::new(lookup, config)
        }
    }

    /// Stop between identifiers (or during a pacing wait) once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Use a caller-chosen run id so events from setup and the loop correlate
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Process normalized identifiers
    ///
    /// `identifiers` must already be digit-only and non-empty (see
    /// `services::normalizer::normalize_batch`). Duplicates are allowed: after
    /// the first live lookup an identifier is in the store, so later copies
    /// come out as `AlreadyQueried`.
    pub async fn run(&self, identifiers: &[String], store: &mut dyn DedupStore) -> RunOutcome {
        let total = identifiers.len();
        let mut governor = RateGovernor::new(self.config.rate_delay);
        let mut counters = RunCounters::new();
        let mut records = Vec::with_capacity(total);
        let mut live_calls = 0;
        let mut cancelled = false;

        info!(
            run_id = %self.run_id,
            total,
            lookup = self.lookup.name(),
            known = store.len(),
            "Enrichment run started"
        );
        self.emit(EnrichEvent::RunStarted {
            run_id: self.run_id,
            total,
            timestamp: Utc::now(),
        });

        for (position, cnpj) in identifiers.iter().enumerate() {
            let index = position + 1;

            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            self.emit(EnrichEvent::Progress {
                run_id: self.run_id,
                index,
                total,
                message: format!("Consultando {}...", cnpj),
                counters: counters.clone(),
                timestamp: Utc::now(),
            });

            let record = if store.contains(cnpj) {
                debug!(cnpj = %cnpj, "Already queried, skipping lookup");
                Ok(ClassifiedRecord::already_queried(cnpj.as_str()))
            } else {
                if !self.wait_for_turn(&governor).await {
                    cancelled = true;
                    break;
                }

                live_calls += 1;
                let attempt = AssertUnwindSafe(self.resolve_live(cnpj, &mut *store))
                    .catch_unwind()
                    .await;
                governor.mark_call_finished();

                // A panic may have skipped the append
                if !store.contains(cnpj) {
                    if let Err(e) = store.record(cnpj) {
                        warn!(cnpj = %cnpj, error = %e, "Failed to record queried CNPJ");
                    }
                }

                match attempt {
                    Ok(result) => result,
                    Err(panic) => Err(anyhow::anyhow!(
                        "lookup panicked: {}",
                        panic_message(panic.as_ref())
                    )),
                }
            };

            let record = match record {
                Ok(record) => {
                    info!(cnpj = %cnpj, category = %record.category, "CNPJ classified");
                    self.emit(EnrichEvent::ItemClassified {
                        run_id: self.run_id,
                        index,
                        cnpj: cnpj.clone(),
                        category: record.category,
                    });
                    record
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    warn!(cnpj = %cnpj, error = %message, "CNPJ processing failed, marking NotFound");
                    self.emit(EnrichEvent::ItemFailed {
                        run_id: self.run_id,
                        index,
                        cnpj: cnpj.clone(),
                        message,
                    });
                    ClassifiedRecord::not_found(cnpj.as_str())
                }
            };

            counters.increment(record.category);
            records.push(record);
        }

        let processed = records.len();
        if cancelled {
            info!(run_id = %self.run_id, processed, total, "Enrichment run cancelled");
            self.emit(EnrichEvent::RunCancelled {
                run_id: self.run_id,
                processed,
                total,
                timestamp: Utc::now(),
            });
        } else {
            info!(
                run_id = %self.run_id,
                live_calls,
                counters = %counters.display_string(),
                "Enrichment loop finished"
            );
        }

        RunOutcome {
            run_id: self.run_id,
            records,
            counters,
            total,
            processed,
            live_calls,
            cancelled,
        }
    }

    /// Lookup, durable append, classification
    async fn resolve_live(
        &self,
        cnpj: &str,
        store: &mut dyn DedupStore,
    ) -> anyhow::Result<ClassifiedRecord> {
        let response = self.lookup.lookup(cnpj).await;

        store
            .record(cnpj)
            .with_context(|| format!("failed to record {} as queried", cnpj))?;

        let payload = match response {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!(cnpj = %cnpj, reason = e.reason(), "Lookup returned no data");
                None
            }
        };

        let (category, contact) = classify(payload.as_ref());
        let record = finalize_record(cnpj, category, contact);
        if category != Category::NotFound && record.category == Category::NotFound {
            debug!(cnpj = %cnpj, "No phone or email on record, downgraded to NotFound");
        }
        Ok(record)
    }

    /// Returns false if cancelled while waiting
    async fn wait_for_turn(&self, governor: &RateGovernor) -> bool {
        tokio::select! {
            _ = governor.wait_turn() => true,
            _ = self.cancel.cancelled() => false,
        }
    }

    fn emit(&self, event: EnrichEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(event);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
