//! Prelude module for common imports.
//!
//! ```ignore
//! use tola_reconcile::prelude::*;
//! ```

// Node types
pub use crate::node::{Children, Key, Kind, KindBehavior, KindRegistry, Node, Path, PathStep, PropValue, Props};

// Tree
pub use crate::tree::{create_tree, Tree, TreeSnapshot};

// Algorithms
pub use crate::algo::{diff, diff_with_config, DiffConfig, DiffResult, DiffStats, Strategy};

// Patches
pub use crate::patch::{Anchor, Patch, PatchBatch, PatchKind, PropChange};

// Pool
pub use crate::pool::{LocalPatchPool, PatchAllocator, PoolConfig, PoolStats, SharedPatchPool, ThreadMode};

// Reconciliation
pub use crate::reconciler::{Applied, Reconciler, ReconcilerConfig};

// Effects
pub use crate::effect::Effect;
pub use crate::scheduler::{EffectContext, EffectScheduler, TickReport};

// Error
pub use crate::error::{PatchApplicationError, VdomError, VdomResult};
