//! Settings resolution for cnpj-enrich
//!
//! Each setting resolves as: command line (clap also reads the matching
//! environment variable) → TOML config → compiled default. The data folder
//! follows the shared resolver in `cnpj_common::config`.

use cnpj_common::config::{CompiledDefaults, DataFolderResolver, TomlConfig};
use cnpj_common::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Values supplied on the command line (or their env vars)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub data_folder: Option<PathBuf>,
    pub delay_secs: Option<u64>,
    pub base_url: Option<String>,
}

/// Lookup client settings
#[derive(Debug, Clone, PartialEq)]
pub struct LookupSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

/// Fully resolved run settings
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichSettings {
    pub data_folder: PathBuf,
    /// Already-queried list
    pub dedup_path: PathBuf,
    /// CSV report
    pub report_path: PathBuf,
    /// Minimum spacing between live lookups
    pub rate_delay: Duration,
    pub lookup: LookupSettings,
}

impl EnrichSettings {
    pub fn resolve(overrides: &CliOverrides, toml: Option<&TomlConfig>) -> Result<Self> {
        let defaults = CompiledDefaults::new();

        let data_folder = DataFolderResolver::new()
            .with_cli_arg(overrides.data_folder.clone())
            .with_toml(toml)
            .resolve();

        let dedup_file = toml
            .and_then(|t| t.dedup_file_name.clone())
            .unwrap_or(defaults.dedup_file_name);
        let report_file = toml
            .and_then(|t| t.report_file_name.clone())
            .unwrap_or(defaults.report_file_name);
        validate_file_name(&dedup_file)?;
        validate_file_name(&report_file)?;

        let delay_secs = overrides
            .delay_secs
            .or_else(|| toml.and_then(|t| t.pacing.delay_secs))
            .unwrap_or(defaults.rate_delay_secs);

        let base_url = overrides
            .base_url
            .clone()
            .or_else(|| toml.and_then(|t| t.lookup.base_url.clone()))
            .unwrap_or(defaults.lookup_base_url);
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Lookup base URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        let timeout_secs = toml
            .and_then(|t| t.lookup.timeout_secs)
            .unwrap_or(defaults.lookup_timeout_secs);
        if timeout_secs == 0 {
            return Err(Error::Config("Lookup timeout must be at least 1 second".to_string()));
        }

        let user_agent = toml
            .and_then(|t| t.lookup.user_agent.clone())
            .unwrap_or_else(default_user_agent);

        let settings = Self {
            dedup_path: data_folder.join(dedup_file),
            report_path: data_folder.join(report_file),
            data_folder,
            rate_delay: Duration::from_secs(delay_secs),
            lookup: LookupSettings {
                base_url,
                timeout: Duration::from_secs(timeout_secs),
                user_agent,
            },
        };

        info!(
            data_folder = %settings.data_folder.display(),
            rate_delay = ?settings.rate_delay,
            base_url = %settings.lookup.base_url,
            "Settings resolved"
        );

        Ok(settings)
    }
}

pub fn default_user_agent() -> String {
    format!("cnpj-enrich/{}", env!("CARGO_PKG_VERSION"))
}

/// A file name, not a path
fn validate_file_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.contains('/') || name.contains('\\') {
        return Err(Error::Config(format!("Invalid file name '{}'", name)));
    }
    Ok(())
}
