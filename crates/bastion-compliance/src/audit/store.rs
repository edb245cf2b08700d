//! Audit event storage backends.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::event::AuditEvent;
use crate::error::{ComplianceError, ComplianceResult};

/// Append-only audit event storage.
///
/// Implementations must be thread-safe.
pub trait AuditStore: Send + Sync {
    /// Returns the backend name for logging.
    fn backend_name(&self) -> &'static str;

    /// Appends one sealed event.
    fn append(&self, event: &AuditEvent) -> ComplianceResult<()>;

    /// Loads every stored event in insertion order.
    fn load(&self) -> ComplianceResult<Vec<AuditEvent>>;
}

/// In-memory audit store.
///
/// Events are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl AuditStore for MemoryAuditStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn append(&self, event: &AuditEvent) -> ComplianceResult<()> {
        self.events.write().push(event.clone());
        Ok(())
    }

    fn load(&self) -> ComplianceResult<Vec<AuditEvent>> {
        Ok(self.events.read().clone())
    }
}

/// Audit store backed by a JSON-lines file.
///
/// Each event is one line. Lines that fail to parse are logged and skipped
/// on load.
#[derive(Debug)]
pub struct JsonlAuditStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditStore {
    /// Creates a store at `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the parent directory cannot be created.
    pub fn open(path: impl AsRef<Path>) -> ComplianceResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditStore for JsonlAuditStore {
    fn backend_name(&self) -> &'static str {
        "jsonl"
    }

    fn append(&self, event: &AuditEvent) -> ComplianceResult<()> {
        let line = serde_json::to_string(event)?;
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                ComplianceError::storage(format!("cannot open {}: {e}", self.path.display()))
            })?;
        writeln!(file, "{line}")?;
        debug!(event_id = %event.event_id, path = %self.path.display(), "audit event appended");
        Ok(())
    }

    fn load(&self) -> ComplianceResult<Vec<AuditEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut events = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEvent>(&line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "skipping malformed audit line"
                ),
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::event::{AuditEventType, AuditSeverity};
    use tempfile::TempDir;

    fn event(action: &str) -> AuditEvent {
        let mut event = AuditEvent::new(
            AuditEventType::SystemEvent,
            AuditSeverity::Info,
            "tests",
            action,
            "test event",
        );
        event.seal();
        event
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryAuditStore::new();
        assert!(store.is_empty());
        store.append(&event("a")).unwrap();
        store.append(&event("b")).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(loaded[1].action, "b");
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn test_jsonl_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonlAuditStore::open(dir.path().join("audit/trail.jsonl")).unwrap();
        assert!(store.load().unwrap().is_empty());

        let first = event("start");
        store.append(&first).unwrap();
        store.append(&event("stop")).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], first);
    }

    #[test]
    fn test_jsonl_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trail.jsonl");
        let store = JsonlAuditStore::open(&path).unwrap();
        store.append(&event("ok")).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file).unwrap();
        store.append(&event("also ok")).unwrap();

        assert_eq!(store.load().unwrap().len(), 2);
    }
}
