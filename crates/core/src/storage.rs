//! Slot-based persistence adapter.
//!
//! Every logical slot holds one JSON blob, read and written wholesale.
//! [`SafeStorage`] is the adapter handed to stores: it never fails. When the
//! underlying backend errors (storage blocked, disk unavailable) it logs a
//! warning and degrades to a process-local memory mirror, which survives
//! only for the lifetime of the session. The degradation is observable via
//! [`SafeStorage::is_degraded`] so callers and tests can assert on it.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use log::warn;

/// Durable key-value backend. `write(key, None)` removes the slot.
pub trait StorageBackend: Send + Sync {
    fn read(&self, key: &str) -> io::Result<Option<String>>;
    fn write(&self, key: &str, value: Option<&str>) -> io::Result<()>;
}

/// One file per slot under a root directory.
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{}.json", safe))
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.slot_path(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn write(&self, key: &str, value: Option<&str>) -> io::Result<()> {
        match value {
            Some(raw) => {
                std::fs::create_dir_all(&self.root)?;
                std::fs::write(self.slot_path(key), raw)
            }
            None => match std::fs::remove_file(self.slot_path(key)) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err),
            },
        }
    }
}

/// Purely in-memory backend, used standalone in tests and as the fallback
/// target inside [`SafeStorage`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.slots.lock().unwrap().get(key).cloned())
    }

    fn write(&self, key: &str, value: Option<&str>) -> io::Result<()> {
        let mut slots = self.slots.lock().unwrap();
        match value {
            Some(raw) => {
                slots.insert(key.to_string(), raw.to_string());
            }
            None => {
                slots.remove(key);
            }
        }
        Ok(())
    }
}

/// Never-failing storage adapter with an in-memory fallback.
///
/// Writes always land in the memory mirror, so a later backend failure can
/// still serve the value written during this session.
pub struct SafeStorage {
    backend: Box<dyn StorageBackend>,
    mirror: Mutex<HashMap<String, String>>,
    degraded: AtomicBool,
}

impl SafeStorage {
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            mirror: Mutex::new(HashMap::new()),
            degraded: AtomicBool::new(false),
        }
    }

    /// Adapter backed by memory only; durability degraded from the start.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::default()))
    }

    /// True once any backend access has failed and the adapter started
    /// serving from the memory mirror.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    pub fn read(&self, key: &str) -> Option<String> {
        match self.backend.read(key) {
            Ok(value) => value,
            Err(err) => {
                warn!("storage read failed for {key}; using in-memory fallback: {err}");
                self.degraded.store(true, Ordering::Relaxed);
                self.mirror.lock().unwrap().get(key).cloned()
            }
        }
    }

    pub fn write(&self, key: &str, value: Option<&str>) {
        {
            let mut mirror = self.mirror.lock().unwrap();
            match value {
                Some(raw) => {
                    mirror.insert(key.to_string(), raw.to_string());
                }
                None => {
                    mirror.remove(key);
                }
            }
        }
        if let Err(err) = self.backend.write(key, value) {
            warn!(
                "storage write failed for {key}; value kept in memory only (lost on reload): {err}"
            );
            self.degraded.store(true, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStorage;

    impl StorageBackend for BrokenStorage {
        fn read(&self, _key: &str) -> io::Result<Option<String>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "blocked"))
        }

        fn write(&self, _key: &str, _value: Option<&str>) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "blocked"))
        }
    }

    #[test]
    fn file_storage_round_trips_and_removes_slots() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        assert_eq!(storage.read("finance_data_v1").unwrap(), None);
        storage.write("finance_data_v1", Some("{\"a\":1}")).unwrap();
        assert_eq!(
            storage.read("finance_data_v1").unwrap().as_deref(),
            Some("{\"a\":1}")
        );

        storage.write("finance_data_v1", None).unwrap();
        assert_eq!(storage.read("finance_data_v1").unwrap(), None);
        // removing an absent slot is not an error
        storage.write("finance_data_v1", None).unwrap();
    }

    #[test]
    fn safe_storage_absorbs_backend_failures() {
        let storage = SafeStorage::new(Box::new(BrokenStorage));
        assert!(!storage.is_degraded());

        storage.write("slot", Some("payload"));
        assert!(storage.is_degraded());

        // the blocked backend is invisible to callers; the session still
        // sees what it wrote
        assert_eq!(storage.read("slot").as_deref(), Some("payload"));

        storage.write("slot", None);
        assert_eq!(storage.read("slot"), None);
    }

    #[test]
    fn memory_backed_adapter_never_degrades() {
        let storage = SafeStorage::in_memory();
        storage.write("slot", Some("x"));
        assert_eq!(storage.read("slot").as_deref(), Some("x"));
        assert!(!storage.is_degraded());
    }
}
