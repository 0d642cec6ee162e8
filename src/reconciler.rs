//! Reconciliation driver.
//!
//! One pass diffs a snapshot of the tree against the new root, then applies
//! the batch under the tree's write lock. A batch computed against a version
//! that has since moved on is discarded and the diff runs again against the
//! newer root. After `max_retries` rejected retries the tree is replaced
//! wholesale, or the call fails when `fallback_to_replace` is off.
//!
//! # Example
//!
//! ```ignore
//! let tree = create_tree(initial)?;
//! let reconciler = Reconciler::new(ReconcilerConfig::default());
//! let applied = reconciler.reconcile_and_apply(&tree, Some(next))?;
//! scheduler.enqueue(applied.effects);
//! ```

use std::sync::Arc;

use crate::algo::{full_replace, DiffConfig, DiffEngine, DiffResult};
use crate::effect::Effect;
use crate::error::{PatchApplicationError, VdomError, VdomResult};
use crate::node::{KindRegistry, Node};
use crate::patch::{Patch, PatchBatch};
use crate::patcher::TreePatcher;
use crate::pool::{LocalPatchPool, PatchAllocator, PoolConfig, PoolStats, SharedPatchPool, ThreadMode};
use crate::tree::Tree;

/// Default number of re-diffs after a stale batch.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

// =============================================================================
// Configuration
// =============================================================================

/// Reconciler configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcilerConfig {
    pub diff: DiffConfig,
    pub pool: PoolConfig,
    /// Re-diffs allowed after the first attempt is rejected as stale
    pub max_retries: u32,
    /// Replace the whole root once retries run out, instead of failing
    pub fallback_to_replace: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            diff: DiffConfig::default(),
            pool: PoolConfig::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            fallback_to_replace: true,
        }
    }
}

impl ReconcilerConfig {
    /// Surface retry exhaustion as [`VdomError::Reconciliation`].
    pub fn strict() -> Self {
        Self {
            fallback_to_replace: false,
            ..Self::default()
        }
    }

    pub fn with_diff(mut self, diff: DiffConfig) -> Self {
        self.diff = diff;
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

// =============================================================================
// Applied
// =============================================================================

/// Outcome of a successful reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct Applied {
    /// Tree version after the pass
    pub version: u64,
    /// Lifecycle effects for the scheduler
    pub effects: Vec<Effect>,
    /// Patches in the applied batch
    pub patch_count: usize,
    /// Diff/apply attempts made (1 when nothing raced)
    pub attempts: u32,
    /// Whether the root was replaced wholesale after retries ran out
    pub fell_back: bool,
}

impl Applied {
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.patch_count == 0
    }
}

// =============================================================================
// Reconciler
// =============================================================================

/// Drives diff and apply for any number of trees.
///
/// Owns the per-kind behavior registry and the patch pool; trees are passed
/// in by reference, so one reconciler serves many trees without cross-talk.
/// `Reconciler<SharedPatchPool>` (the default) may be shared across threads;
/// `Reconciler<LocalPatchPool>` stays on one.
#[derive(Debug)]
pub struct Reconciler<A: PatchAllocator = SharedPatchPool> {
    config: ReconcilerConfig,
    registry: KindRegistry,
    pool: A,
}

impl Reconciler<SharedPatchPool> {
    /// Reconciler for hosts that run passes on several threads.
    pub fn new(config: ReconcilerConfig) -> Self {
        Self::with_pool(config, SharedPatchPool::new(config.pool))
    }
}

impl Default for Reconciler<SharedPatchPool> {
    fn default() -> Self {
        Self::new(ReconcilerConfig::default())
    }
}

impl Reconciler<LocalPatchPool> {
    /// Reconciler confined to one thread, backed by an unsynchronized pool.
    pub fn serialized(config: ReconcilerConfig) -> Self {
        Self::with_pool(config, LocalPatchPool::new(config.pool))
    }
}

impl<A: PatchAllocator> Reconciler<A> {
    pub fn with_pool(config: ReconcilerConfig, pool: A) -> Self {
        Self {
            config,
            registry: KindRegistry::default(),
            pool,
        }
    }

    pub fn with_registry(mut self, registry: KindRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[inline]
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    #[inline]
    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    #[inline]
    pub fn pool(&self) -> &A {
        &self.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn thread_mode(&self) -> ThreadMode {
        self.pool.thread_mode()
    }

    /// Diff two roots with this reconciler's registry and pool.
    ///
    /// Hand the patches back through [`Reconciler::release`] once consumed.
    pub fn diff(&self, old: Option<&Arc<Node>>, new: Option<&Arc<Node>>) -> VdomResult<DiffResult> {
        DiffEngine::new(self.config.diff, &self.registry, &self.pool).run(old, new)
    }

    pub fn release(&self, patches: Vec<Patch>) {
        self.pool.recycle_all(patches);
    }

    /// Bring `tree` up to date with `new_root` (`None` clears it).
    pub fn reconcile_and_apply(&self, tree: &Tree, new_root: Option<Node>) -> VdomResult<Applied> {
        self.run(tree, new_root, |_| {}, |_| {})
    }

    /// Like [`Reconciler::reconcile_and_apply`], handing the applied batch to
    /// `render` after the write lock is released and before the patches go
    /// back to the pool.
    pub fn reconcile_and_render<R>(&self, tree: &Tree, new_root: Option<Node>, render: R) -> VdomResult<Applied>
    where
        R: FnOnce(&[Patch]),
    {
        self.run(tree, new_root, render, |_| {})
    }

    /// The retry loop. `interleave` runs between diff and apply.
    fn run<R, I>(&self, tree: &Tree, new_root: Option<Node>, render: R, mut interleave: I) -> VdomResult<Applied>
    where
        R: FnOnce(&[Patch]),
        I: FnMut(&Tree),
    {
        let new_root = new_root.map(Arc::new);
        let patcher = TreePatcher::new(&self.registry);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let batch = {
                let snapshot = tree.snapshot();
                self.diff(snapshot.root(), new_root.as_ref())?
                    .into_batch(snapshot.version())
            };
            interleave(tree);

            match patcher.apply(tree, &batch) {
                Ok((version, effects)) => {
                    let patch_count = batch.len();
                    render(batch.patches());
                    self.release(batch.into_patches());
                    log::debug!("reconcile: version {version} after {attempts} attempt(s), {patch_count} patches");
                    return Ok(Applied {
                        version,
                        effects,
                        patch_count,
                        attempts,
                        fell_back: false,
                    });
                }
                Err(err) => {
                    self.release(batch.into_patches());
                    if attempts > self.config.max_retries {
                        if self.config.fallback_to_replace {
                            return self.replace_root(tree, new_root, render, attempts, &err);
                        }
                        log::warn!("reconcile: giving up after {attempts} attempts: {err}");
                        return Err(VdomError::Reconciliation { attempts, last: err });
                    }
                    log::debug!("reconcile: attempt {attempts} rejected ({err}), diffing again");
                }
            }
        }
    }

    /// Replace the root in one locked step, against whatever version is current.
    fn replace_root<R>(
        &self,
        tree: &Tree,
        new_root: Option<Arc<Node>>,
        render: R,
        attempts: u32,
        last: &PatchApplicationError,
    ) -> VdomResult<Applied>
    where
        R: FnOnce(&[Patch]),
    {
        log::warn!("reconcile: {attempts} attempts rejected (last: {last}), replacing root");
        let patcher = TreePatcher::new(&self.registry);
        let (batch, outcome) = tree.with_write(|state| {
            let patches = full_replace(&self.pool, state.root.as_ref(), new_root.as_ref());
            let batch = PatchBatch::new(state.version, patches);
            let outcome = patcher.apply_locked(state, &batch);
            (batch, outcome)
        });

        let result = match outcome {
            Ok((version, effects)) => {
                render(batch.patches());
                Ok(Applied {
                    version,
                    effects,
                    patch_count: batch.len(),
                    attempts,
                    fell_back: true,
                })
            }
            Err(err) => Err(err.into()),
        };
        self.release(batch.into_patches());
        result
    }
}

#[cfg(feature = "parallel")]
impl Reconciler<SharedPatchPool> {
    /// Reconcile independent trees in parallel.
    ///
    /// Each tree is still updated under its own lock; passing the same tree
    /// twice serializes those two requests through the retry loop.
    pub fn reconcile_many(&self, requests: Vec<(&Tree, Option<Node>)>) -> Vec<VdomResult<Applied>> {
        use rayon::prelude::*;

        requests
            .into_par_iter()
            .map(|(tree, root)| self.reconcile_and_apply(tree, root))
            .collect()
    }
}
