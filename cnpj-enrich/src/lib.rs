//! cnpj-enrich library interface
//!
//! Resumable CNPJ enrichment: normalize a list of identifiers, skip the ones
//! already queried in earlier runs, look the rest up at a fixed pace,
//! classify each company and write one ordered CSV report.

pub mod config;
pub mod error;
pub mod progress;
pub mod services;
pub mod types;
pub mod workflow;

pub use crate::error::RunError;
pub use crate::workflow::{run_enrichment, RunSummary};
