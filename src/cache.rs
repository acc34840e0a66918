//! Reconstruction cache
//!
//! Process-local memoization of the last reconstructed text per resource.
//! Purely an optimization: every `get` may miss and force a full chain
//! replay without changing any result. Entries are never evicted; the
//! cache lives exactly as long as the session that owns it. Unbounded
//! growth is acceptable because the tracked resource set is small and
//! fixed by configuration, not by request volume.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::key::ResourceKey;

/// Last-known reconstructed text per resource key.
#[derive(Debug, Default)]
pub struct ReconstructionCache {
    entries: Mutex<HashMap<ResourceKey, String>>,
}

impl ReconstructionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last text this process reconstructed for `key`, if any.
    pub fn get(&self, key: &ResourceKey) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Remember `text` as the current state of `key`.
    pub fn put(&self, key: &ResourceKey, text: &str) {
        self.entries.lock().insert(key.clone(), text.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
