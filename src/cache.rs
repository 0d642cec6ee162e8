//! Subtree hash cache.
//!
//! Every node memoizes a content hash of its whole subtree in a [`HashCell`].
//! The hash is a deterministic function of the node's kind, key, canonical
//! props and the ordered hashes of its children, so two subtrees with equal
//! hashes render the same and the diff can skip them.
//!
//! # Concurrency
//!
//! Nodes reachable from a shared snapshot are immutable, so the only write a
//! shared node ever sees is the memo store. Racing threads compute the same
//! value and store it with one atomic write; no lock is needed.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::algo::StableHasher;
use crate::node::{normalize_props, Kind, Node};

/// Sentinel for "not computed yet".
const UNSET: u64 = 0;

// =============================================================================
// HashCell
// =============================================================================

/// Memo slot for a subtree hash.
pub struct HashCell(AtomicU64);

impl HashCell {
    pub const fn new() -> Self {
        Self(AtomicU64::new(UNSET))
    }

    /// Memoized hash, if computed since the last invalidation
    #[inline]
    pub fn get(&self) -> Option<u64> {
        match self.0.load(Ordering::Relaxed) {
            UNSET => None,
            hash => Some(hash),
        }
    }

    #[inline]
    fn store(&self, hash: u64) {
        self.0.store(hash, Ordering::Relaxed);
    }

    /// Clear the memo; requires exclusive access to the node.
    #[inline]
    pub fn invalidate(&mut self) {
        *self.0.get_mut() = UNSET;
    }
}

impl Default for HashCell {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for HashCell {
    fn clone(&self) -> Self {
        Self(AtomicU64::new(self.0.load(Ordering::Relaxed)))
    }
}

impl fmt::Debug for HashCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(hash) => write!(f, "HashCell({hash:016x})"),
            None => f.write_str("HashCell(dirty)"),
        }
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Content hash of a subtree, computed once and memoized on each node.
pub fn compute_hash(node: &Node) -> u64 {
    if let Some(hash) = node.hash.get() {
        return hash;
    }

    let mut hasher = hash_kind(StableHasher::new(), node.kind());
    hasher = match node.key() {
        Some(key) => hasher.update_tag(1).update_str(key.as_str()),
        None => hasher.update_tag(0),
    };
    hasher = normalize_props(node.props()).hash_into(hasher);
    hasher = hasher.update_usize(node.children().len());
    for child in node.children() {
        hasher = hasher.update_u64(compute_hash(child));
    }

    // 0 is the "unset" sentinel
    let hash = match hasher.finish() {
        UNSET => 1,
        hash => hash,
    };
    node.hash.store(hash);
    hash
}

/// Same component kind; props and children are not compared.
#[inline]
pub fn equal_shape(a: &Node, b: &Node) -> bool {
    a.kind() == b.kind()
}

/// Whether two subtrees are interchangeable for rendering purposes.
pub fn subtree_equal(a: &Arc<Node>, b: &Arc<Node>) -> bool {
    Arc::ptr_eq(a, b) || compute_hash(a) == compute_hash(b)
}

fn hash_kind(hasher: StableHasher, kind: &Kind) -> StableHasher {
    match kind {
        Kind::Custom(name) => hasher.update_tag(1).update_str(name),
        builtin => hasher.update_tag(0).update_str(builtin.name()),
    }
}
