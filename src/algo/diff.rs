//! Tree Diff Algorithm
//!
//! Computes the patches that turn one tree version into the next. This is a
//! **pure algorithm module**: it reads both trees, never mutates them, and
//! takes the kind registry and patch pool by reference, so any number of
//! diffs can run concurrently against shared snapshots.
//!
//! # Algorithm
//!
//! 1. Hash shortcut at every level: equal subtree hashes (or the same `Arc`)
//!    mean no patches and no recursion
//! 2. Different kind or key: `Replace`
//! 3. Same kind: `UpdateProps` for the prop difference, then the children
//! 4. Children are paired by key when both sibling groups are fully keyed,
//!    by position otherwise
//!
//! # Keyed groups
//!
//! Old children are indexed by key. Walking the new children in order, an
//! unknown key is an `Insert` and a known key is diffed against its old node.
//! Matched keys whose old indices lie on the longest increasing run keep
//! their place; the others get a `Move(key, new_index)`. Old keys never seen
//! become `Remove`. Reordering `[a, b, c]` into `[c, a, b]` is therefore a
//! single move, and removing `b` from `[a, b, c]` moves nothing.
//!
//! # Complexity
//!
//! - Time: O(n log k) over visited nodes, where k is the largest keyed group
//! - Unchanged subtrees cost one hash comparison each

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::cache::compute_hash;
use crate::error::{VdomError, VdomResult};
use crate::node::{duplicate_key, first_duplicate, Key, KindRegistry, Node, Path, PathStep, Props};
use crate::patch::{Patch, PatchBatch, PatchKind, PropChange};
use crate::pool::{LocalPatchPool, PatchAllocator, PoolConfig};

use super::lis::stable_mask;

/// Default maximum depth for recursive diffing before fallback to replace.
const DEFAULT_MAX_DIFF_DEPTH: usize = 500;

/// Default maximum number of patches before fallback to a root replace.
const DEFAULT_MAX_PATCHES: usize = 2000;

// =============================================================================
// Public Types
// =============================================================================

/// How sibling groups are paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// Pair children by index
    Positional,
    /// Pair children by key; every child must carry one
    Keyed,
    /// Keyed where both groups are fully keyed, positional elsewhere
    #[default]
    Incremental,
}

/// Configuration for the diff engine.
///
/// Use presets to tune for specific tree shapes:
/// - `large()` for deep or very wide trees
/// - `small()` for faster fallback on complex changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffConfig {
    /// Sibling pairing strategy.
    /// Default: `Incremental`
    pub strategy: Strategy,
    /// Depth beyond which a changed subtree is replaced instead of diffed.
    /// Default: 500
    pub max_depth: usize,
    /// Patch count beyond which the whole root is replaced.
    /// Default: 2000
    pub max_patches: usize,
    /// Skip subtrees with equal hashes. Disabling it must not change the
    /// converged result, only the amount of work.
    /// Default: true
    pub use_hash_shortcut: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            max_depth: DEFAULT_MAX_DIFF_DEPTH,
            max_patches: DEFAULT_MAX_PATCHES,
            use_hash_shortcut: true,
        }
    }
}

impl DiffConfig {
    /// Default limits with a specific strategy.
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Create config for large trees (higher limits).
    pub fn large() -> Self {
        Self {
            max_depth: 1000,
            max_patches: 10_000,
            ..Self::default()
        }
    }

    /// Create config for small trees (lower limits, faster fallback).
    pub fn small() -> Self {
        Self {
            max_depth: 100,
            max_patches: 500,
            ..Self::default()
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_patches(mut self, max_patches: usize) -> Self {
        self.max_patches = max_patches;
        self
    }

    pub fn without_hash_shortcut(mut self) -> Self {
        self.use_hash_shortcut = false;
        self
    }
}

/// Statistics from a diff
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct DiffStats {
    /// Node pairs compared
    pub compared: usize,
    /// Pairs skipped as unchanged without recursing
    pub skipped: usize,
    /// Keyed children moved
    pub moved: usize,
    /// Subtrees inserted
    pub inserted: usize,
    /// Subtrees removed
    pub removed: usize,
    /// Subtrees replaced
    pub replaced: usize,
    /// Nodes whose props changed
    pub prop_updates: usize,
}

impl DiffStats {
    pub fn patch_count(&self) -> usize {
        self.moved + self.inserted + self.removed + self.replaced + self.prop_updates
    }
}

/// Result of a diff
#[derive(Debug, Default)]
#[must_use]
pub struct DiffResult {
    /// Ordered patches
    pub patches: Vec<Patch>,
    /// Statistics about the diff
    pub stats: DiffStats,
    /// Whether `max_patches` was exceeded and the root replaced wholesale
    pub replaced_root: bool,
}

impl DiffResult {
    /// Check if any changes were detected
    pub fn has_changes(&self) -> bool {
        !self.patches.is_empty()
    }

    /// Wrap the patches for application to a tree at `base_version`.
    pub fn into_batch(self, base_version: u64) -> PatchBatch {
        PatchBatch::new(base_version, self.patches)
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Diff two trees with the default configuration and kind registry.
///
/// Read-only entry point for tooling and debugging; reconciliation goes
/// through [`crate::Reconciler`], which owns a registry and a patch pool.
///
/// # Example
///
/// ```ignore
/// let patches = diff(Some(&old_root), Some(&new_root))?;
/// assert!(patches.iter().all(Patch::is_move));
/// ```
pub fn diff(old: Option<&Node>, new: Option<&Node>) -> VdomResult<Vec<Patch>> {
    Ok(diff_with_config(old, new, &DiffConfig::default())?.patches)
}

/// Diff two trees with a custom configuration.
pub fn diff_with_config(old: Option<&Node>, new: Option<&Node>, config: &DiffConfig) -> VdomResult<DiffResult> {
    let registry = KindRegistry::default();
    let pool = LocalPatchPool::new(PoolConfig::disabled());
    // Shallow: children stay shared
    let old = old.map(|node| Arc::new(node.clone()));
    let new = new.map(|node| Arc::new(node.clone()));
    DiffEngine::new(*config, &registry, &pool).run(old.as_ref(), new.as_ref())
}

/// Patches replacing the whole tree in one step.
pub(crate) fn full_replace<A>(pool: &A, old: Option<&Arc<Node>>, new: Option<&Arc<Node>>) -> Vec<Patch>
where
    A: PatchAllocator + ?Sized,
{
    let root = Path::root();
    match (old, new) {
        (None, None) => Vec::new(),
        (None, Some(new)) => vec![pool.acquire(PatchKind::Insert).insert_root(Arc::clone(new))],
        (Some(_), None) => vec![pool.acquire(PatchKind::Remove).remove(&root)],
        (Some(_), Some(new)) => vec![pool.acquire(PatchKind::Replace).replace(&root, Arc::clone(new))],
    }
}

// =============================================================================
// DiffEngine
// =============================================================================

/// One diff pass.
///
/// Borrowed state is the only state: the registry decides per-kind behavior
/// and the pool supplies patch records.
pub struct DiffEngine<'a, A: PatchAllocator + ?Sized = LocalPatchPool> {
    config: DiffConfig,
    registry: &'a KindRegistry,
    pool: &'a A,
    patches: Vec<Patch>,
    stats: DiffStats,
    /// Prop changes of the node being compared
    scratch: Vec<PropChange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupMode {
    Positional,
    Keyed,
}

impl<'a, A: PatchAllocator + ?Sized> DiffEngine<'a, A> {
    pub fn new(config: DiffConfig, registry: &'a KindRegistry, pool: &'a A) -> Self {
        Self {
            config,
            registry,
            pool,
            patches: Vec::new(),
            stats: DiffStats::default(),
            scratch: Vec::new(),
        }
    }

    /// Diff `old` against `new`.
    ///
    /// On error every patch produced so far goes back to the pool.
    pub fn run(mut self, old: Option<&Arc<Node>>, new: Option<&Arc<Node>>) -> VdomResult<DiffResult> {
        let pool = self.pool;
        if let Err(err) = self.diff_root(old, new) {
            pool.recycle_all(self.patches);
            return Err(err);
        }

        let mut replaced_root = false;
        if self.patches.len() > self.config.max_patches {
            log::debug!(
                "diff: {} patches exceed limit {}, replacing root",
                self.patches.len(),
                self.config.max_patches
            );
            pool.recycle_all(std::mem::take(&mut self.patches));
            self.patches = full_replace(pool, old, new);
            replaced_root = true;
        }

        log::debug!(
            "diff: {} patches ({} compared, {} skipped, {} moved)",
            self.patches.len(),
            self.stats.compared,
            self.stats.skipped,
            self.stats.moved
        );
        Ok(DiffResult {
            patches: self.patches,
            stats: self.stats,
            replaced_root,
        })
    }

    fn diff_root(&mut self, old: Option<&Arc<Node>>, new: Option<&Arc<Node>>) -> VdomResult<()> {
        let mut path = Path::root();
        match (old, new) {
            (None, None) => Ok(()),
            (None, Some(new)) => {
                check_new_subtree(new, &path)?;
                self.stats.inserted += 1;
                let patch = self.pool.acquire(PatchKind::Insert).insert_root(Arc::clone(new));
                self.patches.push(patch);
                Ok(())
            }
            (Some(_), None) => {
                self.remove(&path);
                Ok(())
            }
            (Some(old), Some(new)) => self.diff_node(old, new, &mut path, 0),
        }
    }

    /// Diff a paired node. `path` addresses it and is restored on return.
    fn diff_node(&mut self, old: &Arc<Node>, new: &Arc<Node>, path: &mut Path, depth: usize) -> VdomResult<()> {
        self.stats.compared += 1;

        if Arc::ptr_eq(old, new) || (self.config.use_hash_shortcut && compute_hash(old) == compute_hash(new)) {
            self.stats.skipped += 1;
            log::trace!("diff: {path} unchanged");
            return Ok(());
        }

        if old.kind() != new.kind() || old.key() != new.key() {
            return self.replace(path, new);
        }

        let kind = new.kind();
        if self.registry.is_atomic(kind) || depth >= self.config.max_depth {
            // Without the hash shortcut equality must be established the slow way
            if !self.config.use_hash_shortcut && **old == **new {
                self.stats.skipped += 1;
                return Ok(());
            }
            return self.replace(path, new);
        }

        diff_props(old.props(), new.props(), &mut self.scratch);
        if self
            .registry
            .forces_replace(kind, self.scratch.iter().map(|change| &change.name))
        {
            self.scratch.clear();
            return self.replace(path, new);
        }
        if !self.scratch.is_empty() {
            self.stats.prop_updates += 1;
            log::trace!("diff: {path} props changed ({})", self.scratch.len());
            let patch = self
                .pool
                .acquire(PatchKind::UpdateProps)
                .update_props(path, self.scratch.drain(..));
            self.patches.push(patch);
        }

        self.diff_children(old, new, path, depth + 1)
    }

    fn diff_children(&mut self, old: &Node, new: &Node, path: &mut Path, depth: usize) -> VdomResult<()> {
        let (old_group, new_group) = (old.children(), new.children());
        if old_group.is_empty() && new_group.is_empty() {
            return Ok(());
        }
        if let Some(key) = duplicate_key(old_group) {
            return Err(VdomError::invalid_structure(
                path.clone(),
                format!("duplicate sibling key `{key}`"),
            ));
        }
        if let Some(key) = duplicate_key(new_group) {
            return Err(VdomError::KeyCollision {
                path: path.clone(),
                key: key.clone(),
            });
        }

        match self.group_mode(old_group, new_group, path)? {
            GroupMode::Keyed => self.diff_keyed(old_group, new_group, path, depth),
            GroupMode::Positional => self.diff_positional(old_group, new_group, path, depth),
        }
    }

    fn group_mode(&self, old_group: &[Arc<Node>], new_group: &[Arc<Node>], path: &Path) -> VdomResult<GroupMode> {
        let unkeyed = |group: &[Arc<Node>]| group.iter().position(|child| child.key().is_none());
        match self.config.strategy {
            Strategy::Positional => Ok(GroupMode::Positional),
            Strategy::Incremental => match (unkeyed(old_group), unkeyed(new_group)) {
                (None, None) => Ok(GroupMode::Keyed),
                _ => Ok(GroupMode::Positional),
            },
            Strategy::Keyed => match unkeyed(new_group).or_else(|| unkeyed(old_group)) {
                Some(index) => Err(VdomError::MissingKey {
                    path: path.clone(),
                    index,
                }),
                None => Ok(GroupMode::Keyed),
            },
        }
    }

    fn diff_positional(
        &mut self,
        old_group: &[Arc<Node>],
        new_group: &[Arc<Node>],
        path: &mut Path,
        depth: usize,
    ) -> VdomResult<()> {
        let paired = old_group.len().min(new_group.len());

        for (idx, (old, new)) in old_group.iter().zip(new_group).enumerate() {
            path.push(PathStep::Index(idx));
            let result = self.diff_node(old, new, path, depth);
            path.pop();
            result?;
        }

        for (idx, node) in new_group.iter().enumerate().skip(paired) {
            self.insert(path, idx, node)?;
        }

        for idx in paired..old_group.len() {
            path.push(PathStep::Index(idx));
            self.remove(path);
            path.pop();
        }
        Ok(())
    }

    fn diff_keyed(
        &mut self,
        old_group: &[Arc<Node>],
        new_group: &[Arc<Node>],
        path: &mut Path,
        depth: usize,
    ) -> VdomResult<()> {
        let old_index: FxHashMap<&Key, usize> = old_group
            .iter()
            .enumerate()
            .filter_map(|(idx, child)| child.key().map(|key| (key, idx)))
            .collect();
        let sources: Vec<Option<usize>> = new_group
            .iter()
            .map(|child| child.key().and_then(|key| old_index.get(key).copied()))
            .collect();
        let stable = stable_mask(&sources);
        let mut seen = vec![false; old_group.len()];

        for (new_idx, node) in new_group.iter().enumerate() {
            let Some((key, old_idx)) = node.key().zip(sources[new_idx]) else {
                self.insert(path, new_idx, node)?;
                continue;
            };
            seen[old_idx] = true;

            if !stable[new_idx] {
                self.stats.moved += 1;
                log::trace!("diff: move {key} under {path} to {new_idx}");
                let patch = self.pool.acquire(PatchKind::Move).moved(path, key.clone(), new_idx);
                self.patches.push(patch);
            }

            path.push(PathStep::Key(key.clone()));
            let result = self.diff_node(&old_group[old_idx], node, path, depth);
            path.pop();
            result?;
        }

        for (old_idx, node) in old_group.iter().enumerate() {
            if let (false, Some(key)) = (seen[old_idx], node.key()) {
                path.push(PathStep::Key(key.clone()));
                self.remove(path);
                path.pop();
            }
        }
        Ok(())
    }

    fn insert(&mut self, parent: &Path, index: usize, node: &Arc<Node>) -> VdomResult<()> {
        check_new_subtree(node, &parent.child(PathStep::Index(index)))?;
        self.stats.inserted += 1;
        log::trace!("diff: insert {} under {parent} at {index}", node.kind());
        let patch = self
            .pool
            .acquire(PatchKind::Insert)
            .insert(parent, index, Arc::clone(node));
        self.patches.push(patch);
        Ok(())
    }

    fn remove(&mut self, target: &Path) {
        self.stats.removed += 1;
        log::trace!("diff: remove {target}");
        let patch = self.pool.acquire(PatchKind::Remove).remove(target);
        self.patches.push(patch);
    }

    fn replace(&mut self, target: &Path, node: &Arc<Node>) -> VdomResult<()> {
        check_new_subtree(node, target)?;
        self.stats.replaced += 1;
        log::trace!("diff: replace {target} with {}", node.kind());
        let patch = self
            .pool
            .acquire(PatchKind::Replace)
            .replace(target, Arc::clone(node));
        self.patches.push(patch);
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Inserted and replacing subtrees are never diffed, so check their keys here.
fn check_new_subtree(node: &Node, path: &Path) -> VdomResult<()> {
    match first_duplicate(node, &mut path.clone()) {
        Some((path, key)) => Err(VdomError::KeyCollision { path, key }),
        None => Ok(()),
    }
}

/// Prop difference, sorted by name so output is deterministic.
fn diff_props(old: &Props, new: &Props, out: &mut Vec<PropChange>) {
    out.clear();
    for (name, value) in new {
        if old.get(name) != Some(value) {
            out.push(PropChange {
                name: name.clone(),
                value: Some(value.clone()),
            });
        }
    }
    for name in old.keys() {
        if !new.contains_key(name) {
            out.push(PropChange {
                name: name.clone(),
                value: None,
            });
        }
    }
    out.sort_unstable_by(|a, b| a.name.cmp(&b.name));
}
