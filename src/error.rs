//! Error types for tola-reconcile.
//!
//! Structural errors describe malformed input trees and are returned to the
//! caller as-is. Patch application errors mean a batch no longer matches the
//! tree it is applied to; the reconciler answers them by diffing again.

use thiserror::Error;

use crate::node::{Key, Path};

/// Errors that can occur while diffing, patching or reconciling.
#[derive(Debug, Error)]
pub enum VdomError {
    /// Duplicate keys among siblings of an existing tree
    #[error("invalid tree structure at {path}: {reason}")]
    InvalidTreeStructure {
        /// Parent of the offending sibling group
        path: Path,
        /// What is wrong
        reason: String,
    },

    /// Keyed diffing requested for a group where a child has no key
    #[error("keyed diff at {path}: child {index} has no key")]
    MissingKey {
        /// Parent of the sibling group
        path: Path,
        /// Position of the first unkeyed child
        index: usize,
    },

    /// Two children of the new tree share a key within one sibling group
    #[error("key collision at {path}: key `{key}` appears more than once")]
    KeyCollision {
        /// Parent of the sibling group
        path: Path,
        /// The repeated key
        key: Key,
    },

    /// A patch batch does not fit the tree's current state
    #[error(transparent)]
    PatchApplication(#[from] PatchApplicationError),

    /// The stale-batch retry loop ran out of attempts
    #[error("reconciliation gave up after {attempts} attempts: {last}")]
    Reconciliation {
        /// Number of diff/apply attempts made
        attempts: u32,
        /// Error of the final attempt
        #[source]
        last: PatchApplicationError,
    },
}

/// Why a patch batch could not be applied.
///
/// Every variant means the batch is stale: discard it and diff again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchApplicationError {
    /// The tree moved on since the batch was computed
    #[error("stale patch batch: computed against version {expected}, tree is at version {found}")]
    Stale {
        /// Version the batch was computed against
        expected: u64,
        /// Current version of the tree
        found: u64,
    },

    /// A key or path referenced by a patch is absent
    #[error("patch target {path} does not exist")]
    MissingTarget {
        /// The unresolved path
        path: Path,
    },

    /// Structural patches of one sibling group do not describe a valid layout
    #[error("conflicting layout under {parent}: {detail}")]
    LayoutConflict {
        /// Parent of the sibling group
        parent: Path,
        /// What conflicted
        detail: String,
    },
}

/// Result type alias for reconciliation operations.
pub type VdomResult<T> = Result<T, VdomError>;

impl VdomError {
    /// Create an invalid-structure error with a message.
    pub fn invalid_structure(path: Path, reason: impl Into<String>) -> Self {
        Self::InvalidTreeStructure {
            path,
            reason: reason.into(),
        }
    }

    /// Whether this error is caused by a malformed input tree.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidTreeStructure { .. } | Self::MissingKey { .. } | Self::KeyCollision { .. }
        )
    }
}

impl PatchApplicationError {
    pub(crate) fn missing(path: Path) -> Self {
        Self::MissingTarget { path }
    }

    pub(crate) fn conflict(parent: Path, detail: impl Into<String>) -> Self {
        Self::LayoutConflict {
            parent,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::PathStep;

    #[test]
    fn test_error_display() {
        let err = VdomError::from(PatchApplicationError::Stale { expected: 2, found: 3 });
        assert_eq!(
            err.to_string(),
            "stale patch batch: computed against version 2, tree is at version 3"
        );

        let err = VdomError::KeyCollision {
            path: Path::root().child(PathStep::Index(1)),
            key: Key::from("row-4"),
        };
        assert_eq!(err.to_string(), "key collision at /#1: key `row-4` appears more than once");
    }

    #[test]
    fn test_structural_classification() {
        assert!(VdomError::invalid_structure(Path::root(), "dup").is_structural());
        assert!(VdomError::MissingKey { path: Path::root(), index: 0 }.is_structural());
        let stale = VdomError::from(PatchApplicationError::missing(Path::root()));
        assert!(!stale.is_structural());
    }

    #[test]
    fn test_error_is_send_sync() {
        static_assertions::assert_impl_all!(VdomError: Send, Sync);
        static_assertions::assert_impl_all!(PatchApplicationError: Send, Sync, Clone);
    }
}
