//! Keyed snapshot store over a pluggable key-value backend.
//!
//! Durability is best-effort: storage that is absent, throwing (quota,
//! disabled, private mode) or holding malformed JSON is all treated as "no
//! stored state", and a failed write is silently dropped. Whole-snapshot
//! overwrites, last-writer-wins, no merge.

use crate::state::SavedState;

/// Backend contract: implementations swallow storage errors so the store
/// never sees a failure, only absence.
pub trait SnapshotBackend {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// In-memory backend for native tests and headless use.
#[derive(Default)]
pub struct MemoryBackend {
    cells: std::cell::RefCell<std::collections::HashMap<String, String>>,
}

impl SnapshotBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.cells.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.cells.borrow_mut().insert(key.to_string(), value.to_string());
    }
}

/// `window.localStorage` backend for browser contexts. Missing window or
/// storage (extension popups can disable it) degrades to absence.
pub struct LocalStorageBackend;

impl LocalStorageBackend {
    fn storage() -> Option<web_sys::Storage> {
        web_sys::window()?.local_storage().ok().flatten()
    }
}

impl SnapshotBackend for LocalStorageBackend {
    fn get(&self, key: &str) -> Option<String> {
        Self::storage()?.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) {
        if let Some(storage) = Self::storage() {
            let _ = storage.set_item(key, value);
        }
    }
}

pub struct Store<B: SnapshotBackend> {
    backend: B,
}

impl<B: SnapshotBackend> Store<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Read and validate the raw snapshot without applying catch-up decay.
    /// Companion contexts need the pre-decay `lastSavedAt` for their
    /// staleness check.
    pub fn load_raw(&self, key: &str, now: f64) -> Option<SavedState> {
        SavedState::parse(&self.backend.get(key)?, now)
    }

    /// Read, validate and catch up to `now`, so every caller sees up-to-date
    /// stats without running its own decay tick first.
    pub fn load(&self, key: &str, now: f64) -> Option<SavedState> {
        Some(self.load_raw(key, now)?.catch_up(now))
    }

    pub fn load_or_fresh(&self, key: &str, now: f64) -> SavedState {
        self.load(key, now).unwrap_or_else(|| SavedState::fresh_default(now))
    }

    /// Overwrite the full snapshot for `key` (last-writer-wins).
    pub fn save(&self, key: &str, state: &SavedState) {
        self.backend.set(key, &state.to_json());
    }
}
