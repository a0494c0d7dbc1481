//! Append-only ledger of successfully ingested sources
//!
//! One source id per line. The ledger file is scoped to a single
//! (provider, embedding model) combination by its filename, so switching
//! providers never reuses another scope's progress.

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use crate::error::Result;

/// Set of source identifiers already ingested into the current index scope
pub struct IngestLedger {
    path: PathBuf,
    entries: HashSet<String>,
}

impl IngestLedger {
    /// Load the ledger for a scope. A missing file starts an empty ledger;
    /// an unreadable file is logged and treated as empty, never fatal.
    pub fn load(path: PathBuf) -> Self {
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ledger unreadable, starting empty");
                HashSet::new()
            }
        };
        Self { path, entries }
    }

    /// Whether a source was already ingested in this scope
    pub fn contains(&self, source_id: &str) -> bool {
        self.entries.contains(source_id)
    }

    /// Number of recorded sources
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Durably record a successfully ingested source
    pub fn record(&mut self, source_id: &str) -> Result<()> {
        if self.entries.contains(source_id) {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{source_id}")?;
        file.flush()?;
        self.entries.insert(source_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ledger_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = IngestLedger::load(dir.path().join("ledger.log"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn records_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.log");

        let mut ledger = IngestLedger::load(path.clone());
        ledger.record("tema1.pdf").unwrap();
        ledger.record("tema2.pdf").unwrap();
        ledger.record("tema1.pdf").unwrap();

        let reloaded = IngestLedger::load(path);
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("tema1.pdf"));
        assert!(reloaded.contains("tema2.pdf"));
        assert!(!reloaded.contains("tema3.pdf"));
    }

    #[test]
    fn scopes_do_not_share_entries() {
        let dir = tempfile::tempdir().unwrap();

        let mut gemini = IngestLedger::load(dir.path().join("ledger-gemini-embedding-001.log"));
        gemini.record("tema1.pdf").unwrap();

        let ollama = IngestLedger::load(dir.path().join("ledger-ollama-nomic-embed-text.log"));
        assert!(!ollama.contains("tema1.pdf"));
    }
}
