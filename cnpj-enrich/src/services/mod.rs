//! Pipeline building blocks
//!
//! Each service is independent of the control loop and testable on its own.

pub mod classifier;
pub mod cnpja_client;
pub mod dedup_store;
pub mod normalizer;
pub mod rate_governor;
pub mod report_writer;

pub use classifier::{classify, finalize_record};
pub use cnpja_client::CnpjaClient;
pub use dedup_store::{DedupStore, FileDedupStore, MemoryDedupStore};
pub use normalizer::{normalize_batch, normalize_identifier, read_input_lines};
pub use rate_governor::RateGovernor;
pub use report_writer::{sort_for_report, write_report};
