//! Already-queried store
//!
//! A durable set of CNPJs that have been charged against the lookup
//! service's quota. Loaded once per run, consulted before every lookup and
//! appended to right after each live call, so a crash never re-queries an
//! identifier that already cost a request.
//!
//! File format: plain UTF-8 text, one identifier per line, append-only.

use cnpj_common::{Error, Result};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Membership test plus the single mutation path
pub trait DedupStore: Send {
    fn contains(&self, cnpj: &str) -> bool;

    /// Add to the set and persist
    ///
    /// The in-memory set is updated even if persisting fails, so the same
    /// identifier is not queried twice within one run.
    fn record(&mut self, cnpj: &str) -> Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// File-backed store
#[derive(Debug)]
pub struct FileDedupStore {
    path: PathBuf,
    seen: HashSet<String>,
    /// File exists, is non-empty and lacks a trailing newline
    needs_separator: bool,
}

impl FileDedupStore {
    /// Load the store from `path`
    ///
    /// A missing file is an empty store. Any other read failure is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let (seen, needs_separator) = match std::fs::read_to_string(path) {
            Ok(content) => {
                let seen: HashSet<String> = content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect();
                (seen, !content.is_empty() && !content.ends_with('\n'))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No already-queried file yet, starting empty");
                (HashSet::new(), false)
            }
            Err(e) => return Err(Error::Io(e)),
        };

        debug!(
            path = %path.display(),
            entries = seen.len(),
            "Loaded already-queried list"
        );

        Ok(Self {
            path: path.to_path_buf(),
            seen,
            needs_separator,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DedupStore for FileDedupStore {
    fn contains(&self, cnpj: &str) -> bool {
        self.seen.contains(cnpj)
    }

    fn record(&mut self, cnpj: &str) -> Result<()> {
        self.seen.insert(cnpj.to_string());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let line = if self.needs_separator {
            format!("\n{}\n", cnpj)
        } else {
            format!("{}\n", cnpj)
        };
        file.write_all(line.as_bytes())?;
        file.flush()?;
        // Durable before the rate governor's wait starts
        file.sync_data()?;

        self.needs_separator = false;
        Ok(())
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}

/// In-memory store for tests and dry runs
#[derive(Debug, Default, Clone)]
pub struct MemoryDedupStore {
    seen: HashSet<String>,
    recorded: Vec<String>,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            seen: entries.into_iter().map(Into::into).collect(),
            recorded: Vec::new(),
        }
    }

    /// Identifiers passed to `record`, in call order
    pub fn recorded(&self) -> &[String] {
        &self.recorded
    }
}

impl DedupStore for MemoryDedupStore {
    fn contains(&self, cnpj: &str) -> bool {
        self.seen.contains(cnpj)
    }

    fn record(&mut self, cnpj: &str) -> Result<()> {
        self.seen.insert(cnpj.to_string());
        self.recorded.push(cnpj.to_string());
        Ok(())
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileDedupStore::load(&temp_dir.path().join("ja_consultados.txt")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_unreadable_path_is_error() {
        // A directory cannot be read as a text file
        let temp_dir = TempDir::new().unwrap();
        assert!(FileDedupStore::load(temp_dir.path()).is_err());
    }

    #[test]
    fn test_load_trims_and_skips_blank_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ja_consultados.txt");
        std::fs::write(&path, "11222333000181\n\n  44555666000199 \n").unwrap();

        let store = FileDedupStore::load(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains("44555666000199"));
    }

    #[test]
    fn test_record_appends_and_survives_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ja_consultados.txt");
        std::fs::write(&path, "11222333000181\n").unwrap();

        let mut store = FileDedupStore::load(&path).unwrap();
        store.record("44555666000199").unwrap();
        assert!(store.contains("44555666000199"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "11222333000181\n44555666000199\n");

        let reloaded = FileDedupStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_record_adds_separator_after_unterminated_last_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ja_consultados.txt");
        std::fs::write(&path, "11222333000181").unwrap();

        let mut store = FileDedupStore::load(&path).unwrap();
        store.record("44555666000199").unwrap();
        store.record("77888999000100").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "11222333000181\n44555666000199\n77888999000100\n");
    }

    #[test]
    fn test_memory_store_tracks_recorded_order() {
        let mut store = MemoryDedupStore::with_entries(["1"]);
        store.record("2").unwrap();
        store.record("3").unwrap();
        assert!(store.contains("1"));
        assert_eq!(store.recorded(), &["2".to_string(), "3".to_string()]);
        assert_eq!(store.len(), 3);
    }
}
