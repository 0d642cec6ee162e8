//! tola-reconcile - Tree reconciliation core for component-tree renderers
//!
//! ## Core Concepts
//!
//! **Hash-shortcut diffing**: every node memoizes a content hash of its
//! subtree; equal hashes end the comparison at any depth. Sibling groups that
//! are fully keyed are matched by key with a minimal set of moves, all other
//! groups by position.
//!
//! **Versioned trees**: a [`Tree`] carries a version bumped once per applied
//! batch. A batch computed against an older version is rejected and the
//! [`Reconciler`] diffs again, falling back to a whole-root replace when
//! retries run out.
//!
//! ## Modules
//! - `node`: Node model, kinds, props and paths
//! - `cache`: Subtree hash memoization
//! - `algo`: Diff engine and move selection
//! - `pool`: Patch record recycling
//! - `patcher`: Batch application and lifecycle effects
//! - `reconciler`: Diff/apply retry loop
//! - `scheduler`: Deferred effect delivery
//!
//! ## Usage
//!
//! ```ignore
//! use tola_reconcile::prelude::*;
//!
//! let tree = create_tree(render(&state))?;
//! let reconciler = Reconciler::new(ReconcilerConfig::default());
//! let mut scheduler = EffectScheduler::new();
//!
//! let applied = reconciler.reconcile_and_render(&tree, Some(render(&next)), |patches| {
//!     backend.paint(patches);
//! })?;
//! scheduler.enqueue(applied.effects);
//! scheduler.tick(&reconciler, |effect, ctx| host.notify(effect, ctx))?;
//! ```

mod macros;

// =============================================================================
// Core modules
// =============================================================================

/// Node types: Node, Kind, Props, Path
pub mod node;

/// Subtree hash memoization
pub mod cache;

/// Versioned tree
pub mod tree;

/// Patch records and batches
pub mod patch;

/// Algorithms: diff, stable moves, hashing
pub mod algo;

/// Patch object pool
pub mod pool;

/// Batch application
pub mod patcher;

/// Lifecycle effect descriptors
pub mod effect;

/// Diff/apply driver
pub mod reconciler;

/// Deferred effect delivery
pub mod scheduler;

/// Error types
pub mod error;

/// Prelude for common imports
pub mod prelude;

// =============================================================================
// Re-exports
// =============================================================================

// Node types
pub use node::{Children, Key, Kind, KindBehavior, KindFlags, KindRegistry, Node, Path, PathStep, PropValue, Props};

// Tree
pub use tree::{create_tree, Tree, TreeSnapshot};

// Algorithms
pub use algo::{diff, diff_with_config, DiffConfig, DiffEngine, DiffResult, DiffStats, StableHasher, Strategy};

// Patches
pub use patch::{Anchor, Patch, PatchBatch, PatchKind, PropChange};

// Pool
pub use pool::{
    FlushReport, LocalPatchPool, PatchAllocator, PatchHandle, PoolConfig, PoolStats, SharedPatchPool, ThreadMode,
};

// Application
pub use patcher::TreePatcher;
pub use reconciler::{Applied, Reconciler, ReconcilerConfig};

// Effects
pub use effect::{Effect, EffectTarget, Priority};
pub use scheduler::{EffectContext, EffectScheduler, TickReport};

// Error types
pub use error::{PatchApplicationError, VdomError, VdomResult};

// =============================================================================
// Tests
// =============================================================================
