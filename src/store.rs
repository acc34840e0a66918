//! Persistent chain store
//!
//! One directory per resource key: a gzip-compressed snapshot written
//! exactly once, plus zero or more gzip-compressed delta files named by
//! sortable timestamp identifiers. Lexical filename order is chronological
//! order; replay is snapshot + every delta in ascending order, with the
//! base and result digests of each delta verified along the way.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info};

use crate::codec::{decode_delta, encode_delta, text_digest};
use crate::delta::{apply, diff};
use crate::error::{CorruptionKind, Error, Result};
use crate::key::ResourceKey;

/// Snapshot filename inside a key directory.
const SNAPSHOT_FILE: &str = "snapshot.gz";

/// Suffix distinguishing delta files from the snapshot.
const DELTA_SUFFIX: &str = ".delta.gz";

/// Suffix for full copies stored in raw mode.
const RAW_SUFFIX: &str = ".raw.gz";

/// Fixed-width UTC timestamp; lexical order equals chronological order.
const DELTA_ID_FORMAT: &str = "%Y%m%dT%H%M%S%3f";

/// Sortable identifier of one delta record, derived from its capture time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeltaId(String);

impl DeltaId {
    /// Identifier for a capture at `timestamp` (millisecond resolution).
    pub fn from_timestamp(timestamp: DateTime<Utc>) -> Self {
        DeltaId(timestamp.format(DELTA_ID_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeltaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One persisted record, returned by [`ChainStore::append`] and
/// [`ChainStore::store_raw`].
#[derive(Debug, Clone)]
pub struct DeltaRecord {
    pub key: ResourceKey,
    pub id: DeltaId,
    /// Compressed size on disk, for diagnostics.
    pub stored_bytes: u64,
}

/// Chain diagnostics exposed to the reporting layer.
#[derive(Debug, Clone)]
pub struct ChainMetadata {
    pub key: ResourceKey,
    pub has_snapshot: bool,
    /// Delta identifiers in ascending chronological order.
    pub delta_ids: Vec<DeltaId>,
}

impl ChainMetadata {
    pub fn delta_count(&self) -> usize {
        self.delta_ids.len()
    }
}

/// Disk-backed store of one base snapshot and an append-only delta chain
/// per resource key.
pub struct ChainStore {
    root: PathBuf,
}

impl ChainStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn key_dir(&self, key: &ResourceKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    fn snapshot_path(&self, key: &ResourceKey) -> PathBuf {
        self.key_dir(key).join(SNAPSHOT_FILE)
    }

    fn delta_path(&self, key: &ResourceKey, id: &DeltaId) -> PathBuf {
        self.key_dir(key).join(format!("{id}{DELTA_SUFFIX}"))
    }

    /// Whether a snapshot has been stored for `key`.
    pub fn has_base(&self, key: &ResourceKey) -> bool {
        self.snapshot_path(key).exists()
    }

    /// Persist `text` as the snapshot unless one already exists. Returns
    /// whether the snapshot was created. The stored snapshot is never
    /// rewritten, even if `text` differs from it.
    pub fn ensure_base(&self, key: &ResourceKey, text: &str) -> Result<bool> {
        let path = self.snapshot_path(key);
        if path.exists() {
            return Ok(false);
        }
        fs::create_dir_all(self.key_dir(key))?;
        write_gzip(&path, text)?;
        info!(key = %key, chars = text.chars().count(), "stored base snapshot");
        Ok(true)
    }

    /// All delta identifiers for `key`, ascending.
    pub fn list_deltas(&self, key: &ResourceKey) -> Result<Vec<DeltaId>> {
        let dir = self.key_dir(key);
        let mut ids = Vec::new();
        if !dir.exists() {
            return Ok(ids);
        }
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(DELTA_SUFFIX) {
                ids.push(DeltaId(stem.to_string()));
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Reconstruct the current text for `key` by loading the snapshot and
    /// applying every delta in ascending order.
    ///
    /// Fails with [`Error::ChainCorruption`] when a payload cannot be read
    /// or decoded, or when deltas exist without a snapshot; with
    /// [`Error::ReplayMismatch`] when a delta's digests do not match the
    /// text being rebuilt; with [`Error::UnknownKey`] when nothing at all
    /// has been stored for `key`.
    pub fn replay(&self, key: &ResourceKey) -> Result<String> {
        let ids = self.list_deltas(key)?;
        let snapshot_path = self.snapshot_path(key);
        if !snapshot_path.exists() {
            if ids.is_empty() {
                return Err(Error::UnknownKey { key: key.clone() });
            }
            return Err(Error::ChainCorruption {
                key: key.clone(),
                kind: CorruptionKind::MissingSnapshot,
            });
        }

        let start = Instant::now();
        let mut text = read_gzip(&snapshot_path).map_err(|e| Error::ChainCorruption {
            key: key.clone(),
            kind: CorruptionKind::UnreadableSnapshot {
                detail: e.to_string(),
            },
        })?;

        for id in &ids {
            let payload =
                read_gzip(&self.delta_path(key, id)).map_err(|e| Error::ChainCorruption {
                    key: key.clone(),
                    kind: CorruptionKind::UndecodableDelta {
                        id: id.clone(),
                        detail: e.to_string(),
                    },
                })?;
            let decoded = decode_delta(&payload).map_err(|e| Error::ChainCorruption {
                key: key.clone(),
                kind: CorruptionKind::UndecodableDelta {
                    id: id.clone(),
                    detail: e.to_string(),
                },
            })?;

            if text_digest(&text) != decoded.base_digest {
                return Err(Error::ReplayMismatch {
                    key: key.clone(),
                    delta: id.clone(),
                    detail: String::from("base digest does not match reconstructed text"),
                });
            }
            let next = apply(&text, &decoded.ops).map_err(|e| Error::ReplayMismatch {
                key: key.clone(),
                delta: id.clone(),
                detail: e.to_string(),
            })?;
            if text_digest(&next) != decoded.out_digest {
                return Err(Error::ReplayMismatch {
                    key: key.clone(),
                    delta: id.clone(),
                    detail: String::from("result digest does not match decoded delta"),
                });
            }
            text = next;
        }

        debug!(key = %key, deltas = ids.len(), elapsed = ?start.elapsed(), "replayed chain");
        Ok(text)
    }

    /// Diff `before` against `after` and persist the encoded result as a
    /// new delta tagged with `timestamp`.
    ///
    /// The timestamp must sort strictly after every delta already stored
    /// for `key`; anything else fails with [`Error::TimestampCollision`].
    pub fn append(
        &self,
        key: &ResourceKey,
        before: &str,
        after: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<DeltaRecord> {
        if !self.has_base(key) {
            return Err(Error::ChainCorruption {
                key: key.clone(),
                kind: CorruptionKind::MissingSnapshot,
            });
        }
        let id = DeltaId::from_timestamp(timestamp);
        let ids = self.list_deltas(key)?;
        if let Some(latest) = ids.last() {
            if *latest >= id {
                return Err(Error::TimestampCollision {
                    key: key.clone(),
                    delta: id,
                    latest: latest.clone(),
                });
            }
        }

        let ops = diff(before, after);
        let payload = encode_delta(before, after, &ops);
        let path = self.delta_path(key, &id);
        write_gzip(&path, &payload)?;
        let stored_bytes = fs::metadata(&path)?.len();

        debug!(key = %key, id = %id, ops = ops.len(), stored_bytes, "appended delta");
        Ok(DeltaRecord {
            key: key.clone(),
            id,
            stored_bytes,
        })
    }

    /// Store a standalone full compressed copy, bypassing the chain.
    /// Used by raw-mode sessions.
    pub fn store_raw(
        &self,
        key: &ResourceKey,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<DeltaRecord> {
        let id = DeltaId::from_timestamp(timestamp);
        let dir = self.key_dir(key);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{id}{RAW_SUFFIX}"));
        write_gzip(&path, text)?;
        let stored_bytes = fs::metadata(&path)?.len();

        debug!(key = %key, id = %id, stored_bytes, "stored raw copy");
        Ok(DeltaRecord {
            key: key.clone(),
            id,
            stored_bytes,
        })
    }

    /// Chain diagnostics for `key`.
    pub fn metadata(&self, key: &ResourceKey) -> Result<ChainMetadata> {
        Ok(ChainMetadata {
            key: key.clone(),
            has_snapshot: self.has_base(key),
            delta_ids: self.list_deltas(key)?,
        })
    }
}

// ── Gzip framing ───────────────────────────────────────────────────────

fn write_gzip(path: &Path, text: &str) -> io::Result<()> {
    let file = File::create(path)?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(text.as_bytes())?;
    encoder.finish()?;
    Ok(())
}

fn read_gzip(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(file);
    let mut text = String::new();
    decoder.read_to_string(&mut text)?;
    Ok(text)
}
