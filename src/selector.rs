//! Path-hash backend selection.
//!
//! The request path is hashed with SHA-256 and the first byte of the
//! digest, reduced modulo the number of healthy backends, picks the
//! index. The same path always lands on the same backend while the
//! healthy set is unchanged.
//!
//! This is plain modulo hashing, not a consistent-hash ring: when a
//! backend joins or leaves the healthy set most paths move to a
//! different backend. Reducing the digest to one byte also biases the
//! choice slightly whenever the set size does not divide 256.

use sha2::{Digest, Sha256};

/// Hash of a request key, in `0..=255`.
#[must_use]
pub fn hash(key: &str) -> usize {
    let digest = Sha256::digest(key.as_bytes());
    usize::from(digest[0])
}

/// Index into a healthy snapshot of `len` backends.
///
/// `len` must be non-zero; callers handle the empty snapshot first.
#[must_use]
pub fn select_index(key: &str, len: usize) -> usize {
    debug_assert!(len > 0, "selector invoked with an empty snapshot");
    hash(key) % len
}

/// Pick the element of `snapshot` that serves `key`, or `None` when
/// the snapshot is empty.
#[must_use]
pub fn select<'a, T>(snapshot: &'a [T], key: &str) -> Option<&'a T> {
    if snapshot.is_empty() {
        return None;
    }
    snapshot.get(select_index(key, snapshot.len()))
}
