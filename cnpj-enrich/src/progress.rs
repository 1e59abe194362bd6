//! Console progress rendering
//!
//! Turns `Progress` events into a single status line:
//! `42% (5 de 12) | ETA 01:24 | Developer=1 NonDeveloper=2 AlreadyQueried=1 NotFound=0`
//!
//! `Progress` for item `index` is emitted before that item is resolved, so
//! `index - 1` items are finished and `total - index + 1` remain. The ETA is
//! the average time per finished item times the items remaining.

use cnpj_common::RunCounters;
use std::time::{Duration, Instant};

/// Tracks elapsed time for one run
#[derive(Debug)]
pub struct ProgressTracker {
    started: Instant,
}

impl ProgressTracker {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn render(&self, index: usize, total: usize, counters: &RunCounters) -> String {
        format_progress_line(index, total, self.started.elapsed(), counters)
    }
}

/// Whole-number percentage of `index` over `total`
pub fn percent(index: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((index.min(total) as f64 / total as f64) * 100.0) as u32
}

/// Remaining time estimate when item `index` (1-based) is about to start
///
/// `None` until at least one item has finished.
pub fn estimate_remaining(index: usize, total: usize, elapsed: Duration) -> Option<Duration> {
    if index <= 1 || elapsed.is_zero() {
        return None;
    }
    let finished = index - 1;
    let per_item = elapsed.as_secs_f64() / finished as f64;
    let remaining = (total + 1).saturating_sub(index) as f64 * per_item;
    Some(Duration::from_secs_f64(remaining))
}

/// `mm:ss`, minutes are not capped at 59
pub fn format_eta(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn format_progress_line(
    index: usize,
    total: usize,
    elapsed: Duration,
    counters: &RunCounters,
) -> String {
    let eta = estimate_remaining(index, total, elapsed)
        .map(|remaining| format!(" | ETA {}", format_eta(remaining)))
        .unwrap_or_default();

    format!(
        "{}% ({} de {}){} | {}",
        percent(index, total),
        index,
        total,
        eta,
        counters.display_string()
    )
}
