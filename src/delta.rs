//! Character-level delta engine
//!
//! Computes reversible edit operations between two texts. Produces
//! {Equal, Delete, Insert} runs sufficient to rebuild `new` from `old`
//! exactly, including whitespace and non-ASCII content.
//!
//! The algorithm trims the common prefix and suffix, then runs a Myers
//! O(ND) greedy search over the remaining middle. The search is capped at
//! [`MAX_EDIT_DISTANCE`]; past the cap the middle is emitted as one Delete
//! plus one Insert, trading minimality for bounded time and memory.
//! Reconstruction is exact either way.

use thiserror::Error;

/// One run of an edit script. Counts are in Unicode scalar values, so an
/// op can never split a code point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOp {
    /// Copy the next `n` chars of the old text.
    Equal(usize),
    /// Skip the next `n` chars of the old text.
    Delete(usize),
    /// Emit text that does not come from the old text.
    Insert(String),
}

/// Edit-distance cap for the Myers search. Bounds the trace memory at
/// roughly `cap * (2 * cap)` words regardless of input size.
const MAX_EDIT_DISTANCE: usize = 1024;

/// Ops applied to a base text they were not computed against.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delta does not fit base text: {0}")]
pub struct ApplyError(String);

/// Compute edit operations transforming `old` into `new`.
///
/// Guarantees `apply(old, &diff(old, new)) == Ok(new)` for all inputs,
/// including empty strings and strings differing only in whitespace.
pub fn diff(old: &str, new: &str) -> Vec<DeltaOp> {
    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();

    let prefix = common_prefix(&old_chars, &new_chars);
    let suffix = common_suffix(&old_chars[prefix..], &new_chars[prefix..]);

    let mid_old = &old_chars[prefix..old_chars.len() - suffix];
    let mid_new = &new_chars[prefix..new_chars.len() - suffix];

    let mut ops = Vec::new();
    if prefix > 0 {
        ops.push(DeltaOp::Equal(prefix));
    }

    if mid_old.is_empty() && !mid_new.is_empty() {
        ops.push(DeltaOp::Insert(mid_new.iter().collect()));
    } else if !mid_old.is_empty() && mid_new.is_empty() {
        ops.push(DeltaOp::Delete(mid_old.len()));
    } else if !mid_old.is_empty() {
        match myers(mid_old, mid_new) {
            Some(mid_ops) => ops.extend(mid_ops),
            None => {
                // Past the cap: replace the whole middle.
                ops.push(DeltaOp::Delete(mid_old.len()));
                ops.push(DeltaOp::Insert(mid_new.iter().collect()));
            }
        }
    }

    if suffix > 0 {
        ops.push(DeltaOp::Equal(suffix));
    }
    coalesce(ops)
}

/// Apply edit operations to `old`, reproducing the text they were diffed
/// against. Exact: ops that overrun or underrun `old` are an error.
pub fn apply(old: &str, ops: &[DeltaOp]) -> Result<String, ApplyError> {
    let old_chars: Vec<char> = old.chars().collect();
    let mut pos = 0usize;
    let mut out = String::with_capacity(old.len());

    for op in ops {
        match op {
            DeltaOp::Equal(n) => {
                let end = checked_end(pos, *n, old_chars.len(), "equal")?;
                out.extend(&old_chars[pos..end]);
                pos = end;
            }
            DeltaOp::Delete(n) => {
                pos = checked_end(pos, *n, old_chars.len(), "delete")?;
            }
            DeltaOp::Insert(text) => out.push_str(text),
        }
    }

    if pos != old_chars.len() {
        return Err(ApplyError(format!(
            "ops consumed {pos} of {} base chars",
            old_chars.len()
        )));
    }
    Ok(out)
}

fn checked_end(pos: usize, n: usize, len: usize, what: &str) -> Result<usize, ApplyError> {
    pos.checked_add(n)
        .filter(|&end| end <= len)
        .ok_or_else(|| ApplyError(format!("{what} run of {n} chars overruns base at {pos}")))
}

fn common_prefix(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[char], b: &[char]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Merge adjacent runs of the same kind.
fn coalesce(ops: Vec<DeltaOp>) -> Vec<DeltaOp> {
    let mut out: Vec<DeltaOp> = Vec::with_capacity(ops.len());
    for op in ops {
        let merged = match (out.last_mut(), &op) {
            (Some(DeltaOp::Equal(a)), DeltaOp::Equal(b)) => {
                *a += *b;
                true
            }
            (Some(DeltaOp::Delete(a)), DeltaOp::Delete(b)) => {
                *a += *b;
                true
            }
            (Some(DeltaOp::Insert(a)), DeltaOp::Insert(b)) => {
                a.push_str(b);
                true
            }
            _ => false,
        };
        if !merged {
            out.push(op);
        }
    }
    out
}

// ── Myers O(ND) ───────────────────────────────────────────────────────

/// Greedy shortest-edit-script search. Returns `None` when no script of
/// length <= the cap exists; the caller falls back to a whole replace.
fn myers(old: &[char], new: &[char]) -> Option<Vec<DeltaOp>> {
    let n = old.len() as i64;
    let m = new.len() as i64;
    let cap = MAX_EDIT_DISTANCE.min((n + m) as usize) as i64;
    let offset = cap;
    let width = (2 * cap + 2) as usize;

    // v[k + offset] = furthest x reached on diagonal k.
    let mut v = vec![0i64; width];
    let mut trace: Vec<Vec<i64>> = Vec::with_capacity(cap as usize + 1);

    for d in 0..=cap {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let ki = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[ki - 1] < v[ki + 1]) {
                v[ki + 1]
            } else {
                v[ki - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && old[x as usize] == new[y as usize] {
                x += 1;
                y += 1;
            }
            v[ki] = x;
            if x >= n && y >= m {
                return Some(backtrack(&trace, d, offset, old, new));
            }
            k += 2;
        }
    }
    None
}

/// Walk the trace back from (n, m) to (0, 0), emitting per-char ops.
fn backtrack(trace: &[Vec<i64>], d_final: i64, offset: i64, old: &[char], new: &[char]) -> Vec<DeltaOp> {
    let mut x = old.len() as i64;
    let mut y = new.len() as i64;
    let mut rev: Vec<DeltaOp> = Vec::new();

    for d in (0..=d_final).rev() {
        let v = &trace[d as usize];
        let k = x - y;
        let ki = (k + offset) as usize;
        let prev_k = if k == -d || (k != d && v[ki - 1] < v[ki + 1]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[(prev_k + offset) as usize];
        let prev_y = prev_x - prev_k;

        // Diagonal snake back to the point the d-th move landed on.
        while x > prev_x && y > prev_y {
            rev.push(DeltaOp::Equal(1));
            x -= 1;
            y -= 1;
        }
        if d > 0 {
            if x == prev_x {
                rev.push(DeltaOp::Insert(new[(y - 1) as usize].to_string()));
                y -= 1;
            } else {
                rev.push(DeltaOp::Delete(1));
                x -= 1;
            }
        }
    }

    rev.reverse();
    rev
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(old: &str, new: &str) {
        let ops = diff(old, new);
        assert_eq!(
            apply(old, &ops).unwrap(),
            new,
            "roundtrip failed for {old:?} -> {new:?} via {ops:?}"
        );
    }

    fn edit_size(ops: &[DeltaOp]) -> usize {
        ops.iter()
            .map(|op| match op {
                DeltaOp::Equal(_) => 0,
                DeltaOp::Delete(n) => *n,
                DeltaOp::Insert(s) => s.chars().count(),
            })
            .sum()
    }

    #[test]
    fn test_identical_is_single_equal() {
        let ops = diff("hello world", "hello world");
        assert_eq!(ops, vec![DeltaOp::Equal(11)]);
    }

    #[test]
    fn test_both_empty() {
        assert!(diff("", "").is_empty());
        assert_eq!(apply("", &[]).unwrap(), "");
    }

    #[test]
    fn test_empty_to_text_is_insert() {
        let ops = diff("", "abc");
        assert_eq!(ops, vec![DeltaOp::Insert(String::from("abc"))]);
    }

    #[test]
    fn test_text_to_empty_is_delete() {
        let ops = diff("abc", "");
        assert_eq!(ops, vec![DeltaOp::Delete(3)]);
    }

    #[test]
    fn test_middle_replacement() {
        let ops = diff("abcdef", "abXdef");
        assert_eq!(
            ops,
            vec![
                DeltaOp::Equal(2),
                DeltaOp::Delete(1),
                DeltaOp::Insert(String::from("X")),
                DeltaOp::Equal(3),
            ]
        );
    }

    #[test]
    fn test_roundtrip_basic_cases() {
        roundtrip("", "");
        roundtrip("", "abc");
        roundtrip("abc", "");
        roundtrip("abc", "abc");
        roundtrip("abc", "abd");
        roundtrip("kitten", "sitting");
        roundtrip("ABCABBA", "CBABAC");
    }

    #[test]
    fn test_roundtrip_whitespace_only_change() {
        roundtrip("a b c", "a  b\tc");
        roundtrip("line1\nline2\n", "line1\r\nline2\r\n");
        roundtrip("trailing", "trailing   ");
    }

    #[test]
    fn test_roundtrip_unicode() {
        roundtrip("héllo wörld", "héllo wörld!");
        roundtrip("日本語のテキスト", "日本語の別のテキスト");
        roundtrip("mixed ascii и кириллица", "mixed ascii и ЛАТИНИЦА");
        roundtrip("emoji 🎉 here", "emoji 🎊🎉 there");
    }

    #[test]
    fn test_roundtrip_repeated_substrings() {
        roundtrip("aaaa", "aaaaaa");
        roundtrip("abababab", "babababa");
        roundtrip("xyxyxy", "yxyxyx");
        roundtrip("<div><div><div>", "<div><span><div>");
    }

    #[test]
    fn test_roundtrip_html_like() {
        let old = "<html><body><p>old text</p><p>same</p></body></html>";
        let new = "<html><body><p>new text!</p><p>same</p></body></html>";
        roundtrip(old, new);
    }

    #[test]
    fn test_myers_is_minimal_on_classic_case() {
        // ABCABBA -> CBABAC has shortest edit script length 5.
        let ops = diff("ABCABBA", "CBABAC");
        assert_eq!(edit_size(&ops), 5);
    }

    #[test]
    fn test_single_char_change_is_small() {
        let old = format!("{}X{}", "a".repeat(500), "b".repeat(500));
        let new = format!("{}Y{}", "a".repeat(500), "b".repeat(500));
        let ops = diff(&old, &new);
        assert_eq!(edit_size(&ops), 2);
        assert_eq!(apply(&old, &ops).unwrap(), new);
    }

    #[test]
    fn test_capped_fallback_still_roundtrips() {
        // No common content and more edits than the cap allows: the diff
        // degrades to Delete + Insert of the whole text.
        let old = "x".repeat(2000);
        let new = "y".repeat(2000);
        let ops = diff(&old, &new);
        assert_eq!(
            ops,
            vec![DeltaOp::Delete(2000), DeltaOp::Insert(new.clone())]
        );
        assert_eq!(apply(&old, &ops).unwrap(), new);
    }

    #[test]
    fn test_apply_overrun_is_error() {
        assert!(apply("abc", &[DeltaOp::Equal(10)]).is_err());
        assert!(apply("abc", &[DeltaOp::Delete(4)]).is_err());
    }

    #[test]
    fn test_apply_underrun_is_error() {
        // Ops must consume the whole base text.
        assert!(apply("abcd", &[DeltaOp::Equal(2)]).is_err());
    }

    #[test]
    fn test_apply_insert_only_onto_empty() {
        let ops = vec![DeltaOp::Insert(String::from("fresh"))];
        assert_eq!(apply("", &ops).unwrap(), "fresh");
    }

    #[test]
    fn test_ops_are_coalesced() {
        for op_pair in diff("aXbYc", "aZbWc").windows(2) {
            let same_kind = matches!(
                (&op_pair[0], &op_pair[1]),
                (DeltaOp::Equal(_), DeltaOp::Equal(_))
                    | (DeltaOp::Delete(_), DeltaOp::Delete(_))
                    | (DeltaOp::Insert(_), DeltaOp::Insert(_))
            );
            assert!(!same_kind, "adjacent ops of same kind: {op_pair:?}");
        }
    }

    #[test]
    fn test_chain_of_diffs() {
        // Simulates a delta chain: each state diffs against the previous.
        let states = [
            "",
            "first version",
            "first version, extended",
            "FIRST version, extended",
            "FIRST version",
            "",
        ];
        for pair in states.windows(2) {
            roundtrip(pair[0], pair[1]);
        }
    }
}
