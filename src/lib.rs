//! Permadiff — append-only delta-chained snapshot store
//!
//! Keep the first capture of a text resource verbatim; store every later
//! capture as a reversible delta against the reconstructed previous state;
//! rebuild the current state on demand by replaying the chain. History is
//! permanent: snapshots and deltas are written once and never rewritten.
//!
//! Fetching, content cleanup, scheduling and reporting are collaborators
//! outside this crate; it only ever sees `(name, text, timestamp)`.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`key`] | Resource name → filesystem-safe, hash-disambiguated key |
//! | [`delta`] | Char-level diff engine (Equal, Delete, Insert) with exact apply |
//! | [`codec`] | Self-describing textual delta encoding with base/result digests |
//! | [`store`] | Gzip-persisted snapshot + ordered delta chain per key |
//! | [`cache`] | Process-local reconstruction memoization |
//! | [`session`] | Thin orchestrator: observe → diff → append, per-key serialized |
//! | [`error`] | Chain error taxonomy |
//!
//! # Quick Start
//!
//! ```no_run
//! use chrono::{TimeZone, Utc};
//! use permadiff::{ChainStore, SnapshotSession};
//!
//! # fn main() -> permadiff::Result<()> {
//! let store = ChainStore::open("snapshots")?;
//! let session = SnapshotSession::new(store);
//!
//! let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
//! let t1 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap();
//!
//! session.observe("https://example.com/", "<html>v1</html>", t0)?;
//! session.observe("https://example.com/", "<html>v2</html>", t1)?;
//!
//! assert_eq!(session.reconstruct("https://example.com/")?, "<html>v2</html>");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod codec;
pub mod delta;
pub mod error;
pub mod key;
pub mod session;
pub mod store;

pub use cache::ReconstructionCache;
pub use codec::{decode_delta, encode_delta, text_digest, DecodeError, DecodedDelta};
pub use delta::{apply, diff, ApplyError, DeltaOp};
pub use error::{CorruptionKind, Error, Result};
pub use key::ResourceKey;
pub use session::{SaveOutcome, SessionMode, SnapshotSession};
pub use store::{ChainMetadata, ChainStore, DeltaId, DeltaRecord};
