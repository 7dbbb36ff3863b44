//! Thin durable key-value storage with an in-memory fallback.
//!
//! Reconciliation correctness must not depend on storage availability, so
//! nothing here ever raises to callers: every I/O failure is logged and
//! swallowed, and the value is still held in memory so `get` keeps answering
//! for the life of the process. Persistence is a durability optimization for
//! restarts, not a correctness dependency.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::warn;

/// Narrow storage contract the registries persist through.
///
/// Implementations must never raise; a failed write degrades to in-memory
/// only, a failed read returns whatever the fallback holds.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Pure in-memory store. Used in tests and when no data directory exists.
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.map.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.map.lock().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.map.lock().remove(key);
    }
}

/// File-backed store: one file per key under a data directory, with atomic
/// writes (temp file in the same directory, then rename).
///
/// Doubles as its own fallback: every `set` lands in the in-memory map first,
/// so a dead disk degrades to [`MemoryStore`] behavior instead of erroring.
pub struct FileStore {
    dir: PathBuf,
    fallback: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// Directory creation failure is not fatal — the store still works, it
    /// just never persists.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!("state dir {:?} unavailable, running memory-only: {e}", dir);
        }
        Self {
            dir,
            fallback: Mutex::new(HashMap::new()),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are engine-chosen identifiers, safe as file names.
        self.dir.join(format!("{key}.json"))
    }

    fn write_atomic(&self, key: &str, value: &str) -> std::io::Result<()> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.tmp"));
        {
            let mut f = std::fs::File::create(&tmp)?;
            f.write_all(value.as_bytes())?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp, &path)
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        if let Some(v) = self.fallback.lock().get(key) {
            return Some(v.clone());
        }
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(v) => {
                self.fallback.lock().insert(key.to_string(), v.clone());
                Some(v)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("read of state key {key:?} failed, treating as absent: {e}");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        self.fallback
            .lock()
            .insert(key.to_string(), value.to_string());
        if let Err(e) = self.write_atomic(key, value) {
            warn!("persist of state key {key:?} failed, kept in memory only: {e}");
        }
    }

    fn remove(&self, key: &str) {
        self.fallback.lock().remove(key);
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("removal of state key {key:?} failed: {e}"),
        }
    }
}
