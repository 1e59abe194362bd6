//! Configuration loading and data folder resolution
//!
//! Bootstrap settings come from an optional TOML file. A missing file is
//! never fatal: the tools log a warning and run on compiled defaults.
//!
//! Data folder priority (highest first):
//! 1. Command-line argument
//! 2. `CNPJ_DATA_FOLDER` environment variable
//! 3. TOML `data_folder`
//! 4. Compiled default (`data`, relative to the working directory)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "CNPJ_DATA_FOLDER";

/// Environment variable pointing at the TOML config file
pub const CONFIG_PATH_ENV: &str = "CNPJ_ENRICH_CONFIG";

/// Config file name inside the platform config directory
pub const CONFIG_FILE_NAME: &str = "cnpj-enrich.toml";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the dedup file and the report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_folder: Option<PathBuf>,

    /// File name of the already-queried list inside the data folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_file_name: Option<String>,

    /// File name of the CSV report inside the data folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_file_name: Option<String>,

    // Tables last: TOML requires plain values before sub-tables
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub lookup: LookupConfig,

    #[serde(default)]
    pub pacing: PacingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// External lookup service settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Outbound call pacing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Minimum delay between two live lookups, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_secs: Option<u64>,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Compiled defaults used when nothing else is configured
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDefaults {
    pub data_folder: PathBuf,
    pub log_level: String,
    pub dedup_file_name: String,
    pub report_file_name: String,
    pub lookup_base_url: String,
    pub lookup_timeout_secs: u64,
    pub rate_delay_secs: u64,
}

impl CompiledDefaults {
    pub fn new() -> Self {
        Self {
            data_folder: PathBuf::from("data"),
            log_level: default_log_level(),
            dedup_file_name: "ja_consultados.txt".to_string(),
            report_file_name: "resultado_final.csv".to_string(),
            lookup_base_url: "https://open.cnpja.com/office".to_string(),
            lookup_timeout_secs: 15,
            rate_delay_secs: 12,
        }
    }
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self::new()
    }
}

impl TomlConfig {
    /// Every setting spelled out with its compiled default, for `init-config`
    pub fn with_compiled_defaults() -> Self {
        let defaults = CompiledDefaults::new();
        Self {
            data_folder: Some(defaults.data_folder),
            dedup_file_name: Some(defaults.dedup_file_name),
            report_file_name: Some(defaults.report_file_name),
            logging: LoggingConfig {
                level: defaults.log_level,
            },
            lookup: LookupConfig {
                base_url: Some(defaults.lookup_base_url),
                timeout_secs: Some(defaults.lookup_timeout_secs),
                user_agent: None,
            },
            pacing: PacingConfig {
                delay_secs: Some(defaults.rate_delay_secs),
            },
        }
    }
}

/// Platform config file location (`~/.config/cnpj-enrich/cnpj-enrich.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cnpj-enrich").join(CONFIG_FILE_NAME))
}

/// Resolve which TOML file to read: explicit path, then env var, then platform default
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    default_config_path()
}

/// Load TOML config from `path`
///
/// Returns `Ok(None)` when the file does not exist. A file that exists but
/// cannot be read or parsed is an error.
pub fn load_toml_config(path: &Path) -> Result<Option<TomlConfig>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                "Config file not found at {}, using compiled defaults",
                path.display()
            );
            return Ok(None);
        }
        Err(e) => {
            return Err(Error::Config(format!(
                "Read {} failed: {}",
                path.display(),
                e
            )))
        }
    };

    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    debug!("Loaded config from {}", path.display());
    Ok(Some(config))
}

/// Write TOML config atomically (temp file + rename)
///
/// On Unix the file is restricted to the owner (0600).
pub fn write_toml_config(config: &TomlConfig, target: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp = temp_path_for(target);
    {
        let mut file = std::fs::File::create(&temp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp, std::fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = std::fs::rename(&temp, target) {
        let _ = std::fs::remove_file(&temp);
        return Err(Error::Io(e));
    }
    Ok(())
}

/// Sibling temp path used for atomic writes (`report.csv` → `report.csv.tmp`)
pub fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Data folder resolver following the CLI → ENV → TOML → default priority
#[derive(Debug, Clone, Default)]
pub struct DataFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl DataFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, config: Option<&TomlConfig>) -> Self {
        self.toml_value = config.and_then(|c| c.data_folder.clone());
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            return path.clone();
        }

        CompiledDefaults::new().data_folder
    }
}

/// Creates the data folder and derives file paths inside it
#[derive(Debug, Clone)]
pub struct DataFolderInitializer {
    root: PathBuf,
}

impl DataFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the folder if missing; safe to call repeatedly
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        debug!("Data folder ready at {}", self.root.display());
        Ok(())
    }

    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }
}
