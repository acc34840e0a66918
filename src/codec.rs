//! Textual delta codec
//!
//! Serializes an op sequence into a self-describing payload that can be
//! persisted and decoded by a later process:
//!
//! ```text
//! pd1 <base-digest> <out-digest>
//! =12<TAB>-3<TAB>+replacement text
//! ```
//!
//! `=N` copies N chars of the base, `-N` skips N chars, `+TEXT` inserts
//! TEXT with `%`, TAB, LF and CR percent-escaped. The header digests are
//! SHA-256 truncated to 16 hex chars over the base text and the resulting
//! text; replay verifies both, so a delta applied against the wrong base
//! is a reported mismatch instead of silent garbage.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::delta::DeltaOp;

/// Format marker; first header field.
const MAGIC: &str = "pd1";

/// Separator between serialized ops.
const OP_SEP: char = '\t';

/// Digest bytes kept from SHA-256 (16 hex chars).
const DIGEST_BYTES: usize = 8;

/// Truncated content digest as embedded in delta headers.
pub fn text_digest(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(&digest[..DIGEST_BYTES])
}

/// A payload that is not a well-formed encoded delta.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing header line")]
    MissingHeader,
    #[error("bad header: {0:?}")]
    BadHeader(String),
    #[error("unknown op token: {0:?}")]
    UnknownOp(String),
    #[error("bad op count: {0:?}")]
    BadCount(String),
    #[error("bad escape sequence in: {0:?}")]
    BadEscape(String),
}

/// Decoded payload: the op sequence plus the digests it was encoded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDelta {
    /// Digest of the text the ops must be applied to.
    pub base_digest: String,
    /// Digest of the text the ops must produce.
    pub out_digest: String,
    pub ops: Vec<DeltaOp>,
}

/// Encode ops computed from `base` to `target`.
pub fn encode_delta(base: &str, target: &str, ops: &[DeltaOp]) -> String {
    let mut payload = format!("{MAGIC} {} {}\n", text_digest(base), text_digest(target));
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            payload.push(OP_SEP);
        }
        match op {
            DeltaOp::Equal(n) => {
                payload.push('=');
                payload.push_str(&n.to_string());
            }
            DeltaOp::Delete(n) => {
                payload.push('-');
                payload.push_str(&n.to_string());
            }
            DeltaOp::Insert(text) => {
                payload.push('+');
                payload.push_str(&escape(text));
            }
        }
    }
    payload
}

/// Decode a payload produced by [`encode_delta`]. Strict: anything
/// malformed is an error, never a partial result.
pub fn decode_delta(payload: &str) -> Result<DecodedDelta, DecodeError> {
    let (header, body) = payload.split_once('\n').ok_or(DecodeError::MissingHeader)?;

    let mut fields = header.split(' ');
    match fields.next() {
        Some(magic) if magic == MAGIC => {}
        _ => return Err(DecodeError::BadHeader(header.to_string())),
    }
    let base_digest = parse_digest(fields.next(), header)?;
    let out_digest = parse_digest(fields.next(), header)?;
    if fields.next().is_some() {
        return Err(DecodeError::BadHeader(header.to_string()));
    }

    let mut ops = Vec::new();
    if !body.is_empty() {
        for token in body.split(OP_SEP) {
            ops.push(parse_op(token)?);
        }
    }

    Ok(DecodedDelta {
        base_digest,
        out_digest,
        ops,
    })
}

fn parse_digest(field: Option<&str>, header: &str) -> Result<String, DecodeError> {
    match field {
        Some(d) if d.len() == DIGEST_BYTES * 2 && d.chars().all(|c| c.is_ascii_hexdigit()) => {
            Ok(d.to_string())
        }
        _ => Err(DecodeError::BadHeader(header.to_string())),
    }
}

fn parse_op(token: &str) -> Result<DeltaOp, DecodeError> {
    let mut chars = token.chars();
    match chars.next() {
        Some('=') => parse_count(chars.as_str()).map(DeltaOp::Equal),
        Some('-') => parse_count(chars.as_str()).map(DeltaOp::Delete),
        Some('+') => unescape(chars.as_str()).map(DeltaOp::Insert),
        _ => Err(DecodeError::UnknownOp(token.to_string())),
    }
}

fn parse_count(digits: &str) -> Result<usize, DecodeError> {
    digits
        .parse::<usize>()
        .map_err(|_| DecodeError::BadCount(digits.to_string()))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '%' => out.push_str("%25"),
            '\t' => out.push_str("%09"),
            '\n' => out.push_str("%0A"),
            '\r' => out.push_str("%0D"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(text: &str) -> Result<String, DecodeError> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match (chars.next(), chars.next()) {
            (Some('2'), Some('5')) => out.push('%'),
            (Some('0'), Some('9')) => out.push('\t'),
            (Some('0'), Some('A')) => out.push('\n'),
            (Some('0'), Some('D')) => out.push('\r'),
            _ => return Err(DecodeError::BadEscape(text.to_string())),
        }
    }
    Ok(out)
}

// ── Tests ──────────────────────────────────────────────────────────────
