//! Versioned tree.
//!
//! A [`Tree`] owns the canonical root and a version counter behind a
//! `parking_lot::RwLock`. Readers take cheap snapshots (an `Arc` clone of the
//! root); the patcher is the only writer and bumps the version exactly once
//! per applied batch.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::VdomResult;
use crate::node::Node;

/// Lock-protected state of a tree.
#[derive(Debug, Default)]
pub(crate) struct TreeState {
    pub(crate) root: Option<Arc<Node>>,
    pub(crate) version: u64,
}

/// Immutable view of a tree at one version.
#[derive(Debug, Clone, Default)]
pub struct TreeSnapshot {
    root: Option<Arc<Node>>,
    version: u64,
}

impl TreeSnapshot {
    #[inline]
    pub fn root(&self) -> Option<&Arc<Node>> {
        self.root.as_ref()
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn into_root(self) -> Option<Arc<Node>> {
        self.root
    }
}

/// The unit of mutual exclusion for reconciliation.
///
/// Uses `parking_lot::RwLock`, which keeps a queued writer from being starved
/// by a stream of snapshot readers.
#[derive(Debug, Default)]
pub struct Tree {
    state: RwLock<TreeState>,
}

/// Create a tree at version 0, validating sibling keys throughout.
pub fn create_tree(initial_root: Node) -> VdomResult<Tree> {
    initial_root.validate()?;
    Ok(Tree {
        state: RwLock::new(TreeState {
            root: Some(Arc::new(initial_root)),
            version: 0,
        }),
    })
}

impl Tree {
    /// A tree with no root yet.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Execute a closure with read access to the state.
    pub(crate) fn with_read<R>(&self, f: impl FnOnce(&TreeState) -> R) -> R {
        let guard = self.state.read();
        f(&guard)
    }

    /// Execute a closure with write access to the state.
    ///
    /// The lock is held for the closure only; never call back into
    /// collaborator code from inside it.
    pub(crate) fn with_write<R>(&self, f: impl FnOnce(&mut TreeState) -> R) -> R {
        let mut guard = self.state.write();
        f(&mut guard)
    }

    pub fn snapshot(&self) -> TreeSnapshot {
        self.with_read(|state| TreeSnapshot {
            root: state.root.clone(),
            version: state.version,
        })
    }

    pub fn version(&self) -> u64 {
        self.with_read(|state| state.version)
    }

    pub fn root(&self) -> Option<Arc<Node>> {
        self.with_read(|state| state.root.clone())
    }

    /// Nodes in the current tree.
    pub fn node_count(&self) -> usize {
        self.root().map_or(0, |root| root.subtree_len())
    }
}
