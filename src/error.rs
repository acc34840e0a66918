//! Chain error taxonomy
//!
//! Separates three failure classes the caller must tell apart: a broken
//! history (`ChainCorruption`), a delta that does not match the text it is
//! replayed onto (`ReplayMismatch`), and an append that would not sort
//! after the existing chain (`TimestampCollision`). A key with no recorded
//! history at all is `UnknownKey`, never corruption.

use std::io;

use thiserror::Error;

use crate::key::ResourceKey;
use crate::store::DeltaId;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the chain store and session.
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem failure outside the chain payloads themselves.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Replay was requested for a key with no snapshot and no deltas.
    #[error("no chain recorded for '{key}'")]
    UnknownKey { key: ResourceKey },

    /// The stored history for a key is unreadable.
    #[error("chain corruption for '{key}': {kind}")]
    ChainCorruption {
        key: ResourceKey,
        kind: CorruptionKind,
    },

    /// A decoded delta does not fit the text it is being applied to.
    #[error("replay mismatch for '{key}' at delta {delta}: {detail}")]
    ReplayMismatch {
        key: ResourceKey,
        delta: DeltaId,
        detail: String,
    },

    /// An append whose identifier does not sort strictly after the newest
    /// stored delta. Accepting it would corrupt replay order.
    #[error("timestamp collision for '{key}': {delta} does not sort after {latest}")]
    TimestampCollision {
        key: ResourceKey,
        delta: DeltaId,
        latest: DeltaId,
    },
}

/// Why a chain is considered corrupt.
#[derive(Debug, Error)]
pub enum CorruptionKind {
    /// Delta files exist but the snapshot they build on is gone.
    #[error("deltas exist but the snapshot is missing")]
    MissingSnapshot,

    /// The snapshot file exists but cannot be read back.
    #[error("snapshot cannot be read: {detail}")]
    UnreadableSnapshot { detail: String },

    /// A delta file cannot be decompressed or decoded.
    #[error("delta {id} cannot be decoded: {detail}")]
    UndecodableDelta { id: DeltaId, detail: String },
}
