//! Snapshot session orchestrator
//!
//! One observation in: derive the key, serialize on it, reconstruct the
//! prior text (cache first, chain replay otherwise), append the delta,
//! refresh the cache. The first observation of a resource stores the base
//! snapshot and nothing else — there is no prior state to diff against.
//!
//! A failure for one resource never aborts others: each `observe` call
//! returns its own `Result` and leaves every other chain untouched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::cache::ReconstructionCache;
use crate::error::Result;
use crate::key::ResourceKey;
use crate::store::{ChainMetadata, ChainStore, DeltaId};

/// How a session persists each observation after the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// Base snapshot once, then one reversible delta per observation.
    #[default]
    DeltaChain,
    /// A full compressed copy per observation; no chain is built.
    RawCopies,
}

/// What [`SnapshotSession::observe`] did with an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// First observation: stored verbatim as the base snapshot.
    BaseStored,
    /// Stored as a delta against the reconstructed prior text.
    DeltaAppended(DeltaId),
    /// Stored as a standalone full copy (raw mode).
    RawStored(DeltaId),
}

/// Orchestrates observations over a [`ChainStore`].
///
/// Appends for one key are serialized through a per-key lock: an append
/// reads the prior text and writes a new delta non-atomically, so two
/// concurrent writers on the same key could chain a delta onto a stale
/// base. Distinct keys proceed fully in parallel.
pub struct SnapshotSession {
    store: ChainStore,
    cache: ReconstructionCache,
    mode: SessionMode,
    locks: RwLock<HashMap<ResourceKey, Arc<Mutex<()>>>>,
}

impl SnapshotSession {
    /// Delta-chain session over `store` with an empty cache.
    pub fn new(store: ChainStore) -> Self {
        Self::with_mode(store, SessionMode::DeltaChain)
    }

    pub fn with_mode(store: ChainStore, mode: SessionMode) -> Self {
        Self {
            store,
            cache: ReconstructionCache::new(),
            mode,
            locks: RwLock::new(HashMap::new()),
        }
    }

    fn key_lock(&self, key: &ResourceKey) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().get(key) {
            return Arc::clone(lock);
        }
        let mut locks = self.locks.write();
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Record one observation of `name` captured at `timestamp`.
    pub fn observe(&self, name: &str, text: &str, timestamp: DateTime<Utc>) -> Result<SaveOutcome> {
        let key = ResourceKey::from_name(name);
        let lock = self.key_lock(&key);
        let _guard = lock.lock();

        if self.mode == SessionMode::RawCopies {
            let record = self.store.store_raw(&key, text, timestamp)?;
            return Ok(SaveOutcome::RawStored(record.id));
        }

        let prior = match self.cache.get(&key) {
            Some(prior) => {
                debug!(key = %key, "using cached reconstruction");
                prior
            }
            None if self.store.has_base(&key) => self.store.replay(&key)?,
            None => {
                self.store.ensure_base(&key, text)?;
                self.cache.put(&key, text);
                info!(key = %key, "first observation, base stored");
                return Ok(SaveOutcome::BaseStored);
            }
        };

        let record = self.store.append(&key, &prior, text, timestamp)?;
        self.cache.put(&key, text);
        Ok(SaveOutcome::DeltaAppended(record.id))
    }

    /// Authoritative reconstruction straight from persistent storage.
    /// Never consults the cache, so the result reflects exactly what a
    /// fresh process would see.
    pub fn reconstruct(&self, name: &str) -> Result<String> {
        let key = ResourceKey::from_name(name);
        let lock = self.key_lock(&key);
        let _guard = lock.lock();
        self.store.replay(&key)
    }

    /// Chain diagnostics for the reporting layer.
    pub fn chain_metadata(&self, name: &str) -> Result<ChainMetadata> {
        self.store.metadata(&ResourceKey::from_name(name))
    }
}
