use crate::history::{HistoryError, HistoryStore, InteractionRecord};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const LOG_TARGET: &str = "history::file";

#[derive(Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    conversations: Vec<InteractionRecord>,
}

/// History kept in a single JSON document, rewritten on every change.
///
/// Reads always go back to disk, so each call sees a fresh snapshot. The lock
/// only serializes access from within this process.
pub struct JsonFileHistoryStore {
    path: PathBuf,
    capacity: usize,
    lock: Mutex<()>,
}

impl JsonFileHistoryStore {
    /// Creates the file (and its parent directories) when missing.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, HistoryError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let store = Self {
            path,
            capacity: capacity.max(1),
            lock: Mutex::new(()),
        };
        if !store.path.exists() {
            store.save(&HistoryFile::default())?;
            tracing::debug!(target: LOG_TARGET, path = %store.path.display(), "created history file");
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HistoryFile, HistoryError> {
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(HistoryFile::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    /// Replaces the document atomically through a sibling temp file.
    fn save(&self, file: &HistoryFile) -> Result<(), HistoryError> {
        let raw = serde_json::to_string_pretty(file)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(raw.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut Vec<InteractionRecord>)) -> Result<(), HistoryError> {
        let _guard = self.lock.lock();
        let mut file = self.load()?;
        f(&mut file.conversations);
        let overflow = file.conversations.len().saturating_sub(self.capacity);
        file.conversations.drain(..overflow);
        self.save(&file)
    }
}

impl HistoryStore for JsonFileHistoryStore {
    fn append(&self, record: InteractionRecord) -> Result<(), HistoryError> {
        self.modify(|records| records.push(record))
    }

    fn recent(&self, n: usize) -> Result<Vec<InteractionRecord>, HistoryError> {
        let _guard = self.lock.lock();
        let mut records = self.load()?.conversations;
        let skip = records.len().saturating_sub(n);
        Ok(records.split_off(skip))
    }

    fn set_final_decision(&self, decision: &str) -> Result<(), HistoryError> {
        self.modify(|records| {
            if let Some(newest) = records.last_mut() {
                newest.decision = Some(decision.to_owned());
            }
        })
    }

    fn clear(&self) -> Result<(), HistoryError> {
        let _guard = self.lock.lock();
        self.save(&HistoryFile::default())?;
        tracing::info!(target: LOG_TARGET, path = %self.path.display(), "history cleared");
        Ok(())
    }
}
