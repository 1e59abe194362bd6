//! # cnpj-common
//!
//! Shared code for the CNPJ enrichment tools:
//! - Error type
//! - Business categories and per-run counters
//! - Run event types and the broadcast event bus
//! - Configuration loading and data folder resolution

pub mod category;
pub mod config;
pub mod error;
pub mod events;

pub use category::{Category, RunCounters};
pub use error::{Error, Result};
