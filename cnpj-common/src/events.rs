//! Run event types and the broadcast event bus
//!
//! The enrichment pipeline reports progress by emitting [`EnrichEvent`]s on an
//! [`EventBus`]. Emitting never blocks and never fails the run: observers that
//! lag or are absent simply miss events.

use crate::category::{Category, RunCounters};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted during an enrichment run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EnrichEvent {
    /// Input loaded, processing about to begin
    RunStarted {
        run_id: Uuid,
        /// Number of non-empty identifiers in the batch
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// Work on one identifier is starting
    ///
    /// `counters` is the snapshot taken before this identifier is resolved.
    Progress {
        run_id: Uuid,
        /// 1-based position in the batch
        index: usize,
        total: usize,
        message: String,
        counters: RunCounters,
        timestamp: DateTime<Utc>,
    },

    /// Identifier reached its terminal category
    ItemClassified {
        run_id: Uuid,
        index: usize,
        cnpj: String,
        category: Category,
    },

    /// Identifier hit a per-item failure and was forced to `NotFound`
    ItemFailed {
        run_id: Uuid,
        index: usize,
        cnpj: String,
        message: String,
    },

    /// Run finished and the report (if any rows) was written
    RunCompleted {
        run_id: Uuid,
        counters: RunCounters,
        report_path: Option<PathBuf>,
        timestamp: DateTime<Utc>,
    },

    /// Run stopped early at the caller's request
    RunCancelled {
        run_id: Uuid,
        processed: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// Run aborted by a startup or finalization error
    RunFailed {
        run_id: Uuid,
        /// User-facing message
        message: String,
        /// Underlying cause
        cause: String,
        timestamp: DateTime<Utc>,
    },
}

impl EnrichEvent {
    /// Event type name, matching the serde tag
    pub fn event_type(&self) -> &'static str {
        match self {
            EnrichEvent::RunStarted { .. } => "RunStarted",
            EnrichEvent::Progress { .. } => "Progress",
            EnrichEvent::ItemClassified { .. } => "ItemClassified",
            EnrichEvent::ItemFailed { .. } => "ItemFailed",
            EnrichEvent::RunCompleted { .. } => "RunCompleted",
            EnrichEvent::RunCancelled { .. } => "RunCancelled",
            EnrichEvent::RunFailed { .. } => "RunFailed",
        }
    }

    pub fn run_id(&self) -> Uuid {
        match self {
            EnrichEvent::RunStarted { run_id, .. }
            | EnrichEvent::Progress { run_id, .. }
            | EnrichEvent::ItemClassified { run_id, .. }
            | EnrichEvent::ItemFailed { run_id, .. }
            | EnrichEvent::RunCompleted { run_id, .. }
            | EnrichEvent::RunCancelled { run_id, .. }
            | EnrichEvent::RunFailed { run_id, .. } => *run_id,
        }
    }
}

/// Broadcast bus for run events
///
/// Cloning the bus shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EnrichEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    ///
    /// ```
    /// use cnpj_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<EnrichEvent> {
        self.tx.subscribe()
    }

    /// Emit an event
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: EnrichEvent,
    ) -> Result<usize, broadcast::error::SendError<EnrichEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: EnrichEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(run_id: Uuid) -> EnrichEvent {
        EnrichEvent::RunStarted {
            run_id,
            total: 3,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_err_but_lossy_is_silent() {
        let bus = EventBus::new(8);
        assert!(bus.emit(started(Uuid::new_v4())).is_err());
        bus.emit_lossy(started(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let run_id = Uuid::new_v4();

        bus.emit(started(run_id)).unwrap();
        bus.emit(EnrichEvent::ItemFailed {
            run_id,
            index: 1,
            cnpj: "12345678000195".to_string(),
            message: "boom".to_string(),
        })
        .unwrap();

        assert_eq!(rx.recv().await.unwrap().event_type(), "RunStarted");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.event_type(), "ItemFailed");
        assert_eq!(second.run_id(), run_id);
    }

    #[test]
    fn test_progress_serializes_with_type_tag_and_counters() {
        let mut counters = RunCounters::new();
        counters.increment(Category::Developer);
        let event = EnrichEvent::Progress {
            run_id: Uuid::nil(),
            index: 2,
            total: 5,
            message: "Consultando 12345678000195...".to_string(),
            counters,
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "Progress");
        assert_eq!(value["index"], 2);
        assert_eq!(value["counters"]["Developer"], 1);
    }
}
