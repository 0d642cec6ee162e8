//! Patch object pool.
//!
//! Diffing at interactive frame rates produces many short-lived patches. The
//! pool recycles their heap buffers (path step vectors, prop change lists)
//! through bounded per-kind free lists.
//!
//! # Variants
//!
//! - [`LocalPatchPool`]: confined to one thread, no synchronization at all.
//!   Use it when the host runtime serializes rendering.
//! - [`SharedPatchPool`]: one sub-pool per thread. A thread only ever locks
//!   its own sub-pool, so the lock is uncontended in the common case;
//!   [`SharedPatchPool::flush`] takes every sub-pool at once to merge and
//!   trim them.
//!
//! Both count hits, misses and checked-out handles with relaxed atomics. The
//! pooled count is read from the free lists themselves, so it stays exact
//! while a flush races with acquire and release.

use std::cell::RefCell;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::node::{Key, Node, Path, PathStep};
use crate::patch::{Anchor, Patch, PatchKind, PropChange};

/// Default free-list capacity for every patch kind.
pub const DEFAULT_PER_KIND_CAPACITY: usize = 256;

// =============================================================================
// Configuration
// =============================================================================

/// Free-list bounds.
///
/// Released handles beyond a kind's capacity are dropped, not retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Capacity of each kind without an override
    pub per_kind_capacity: usize,
    /// Per-kind overrides, indexed by [`PatchKind::index`]
    pub kind_capacity: [Option<usize>; PatchKind::COUNT],
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PER_KIND_CAPACITY)
    }
}

impl PoolConfig {
    /// Same capacity for every kind.
    pub fn new(per_kind_capacity: usize) -> Self {
        Self {
            per_kind_capacity,
            kind_capacity: [None; PatchKind::COUNT],
        }
    }

    /// Large free lists for big, frequently updated trees.
    pub fn large() -> Self {
        Self::new(4096)
    }

    /// Small free lists for memory-constrained hosts.
    pub fn small() -> Self {
        Self::new(32)
    }

    /// No pooling: every acquire allocates, every release drops.
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Override the capacity of one kind.
    pub fn with_kind_capacity(mut self, kind: PatchKind, capacity: usize) -> Self {
        self.kind_capacity[kind.index()] = Some(capacity);
        self
    }

    #[inline]
    pub fn capacity(&self, kind: PatchKind) -> usize {
        self.kind_capacity[kind.index()].unwrap_or(self.per_kind_capacity)
    }
}

/// Whether the host runs reconciliation on one thread or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ThreadMode {
    /// One thread at a time (single global lock equivalent)
    #[default]
    Serialized,
    /// Independent threads, no implicit mutual exclusion
    Parallel,
}

// =============================================================================
// Statistics
// =============================================================================

/// Pool counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct PoolStats {
    /// Acquisitions served from a free list
    pub hits: usize,
    /// Acquisitions that allocated a fresh record
    pub misses: usize,
    /// Handles currently checked out
    pub live_count: usize,
    /// Handles given back
    pub returned: usize,
    /// Returned handles dropped because the free list was full
    pub evicted: usize,
    /// Records currently sitting in free lists
    pub pooled: usize,
}

impl PoolStats {
    pub fn acquired(&self) -> usize {
        self.hits + self.misses
    }

    /// Fraction of acquisitions served from a free list
    pub fn hit_rate(&self) -> f64 {
        match self.acquired() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicUsize,
    misses: AtomicUsize,
    live: AtomicUsize,
    returned: AtomicUsize,
    evicted: AtomicUsize,
}

impl Counters {
    fn on_acquire(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        self.live.fetch_add(1, Ordering::Relaxed);
    }

    fn on_release(&self, kept: bool) {
        // Handles reclaimed from patches built elsewhere were never counted live
        let _ = self
            .live
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)));
        self.returned.fetch_add(1, Ordering::Relaxed);
        if !kept {
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.live,
            &self.returned,
            &self.evicted,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn snapshot(&self, pooled: usize) -> PoolStats {
        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            live_count: self.live.load(Ordering::Relaxed),
            returned: self.returned.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            pooled,
        }
    }
}

// =============================================================================
// PatchHandle
// =============================================================================

/// A checked-out patch record.
///
/// Consuming one of the builder methods turns it into a [`Patch`] that reuses
/// the record's buffers; [`PatchAllocator::recycle`] takes them back.
#[derive(Debug)]
pub struct PatchHandle {
    kind: PatchKind,
    path: Vec<PathStep>,
    changes: Vec<PropChange>,
}

impl PatchHandle {
    fn fresh(kind: PatchKind) -> Self {
        Self {
            kind,
            path: Vec::new(),
            changes: Vec::new(),
        }
    }

    #[inline]
    pub fn kind(&self) -> PatchKind {
        self.kind
    }

    /// Take the buffers of a consumed patch.
    pub fn reclaim(patch: Patch) -> Self {
        let kind = patch.kind();
        let (path, changes) = match patch {
            Patch::Insert { at: Anchor::Root, .. } => (Vec::new(), Vec::new()),
            Patch::Insert { at: Anchor::Child { parent, .. }, .. } => (parent.into_buffer(), Vec::new()),
            Patch::Move { parent, .. } => (parent.into_buffer(), Vec::new()),
            Patch::Remove { target } | Patch::Replace { target, .. } => (target.into_buffer(), Vec::new()),
            Patch::UpdateProps { target, mut changes } => {
                changes.clear();
                (target.into_buffer(), changes)
            }
        };
        Self { kind, path, changes }
    }

    fn path(&mut self, path: &Path) -> Path {
        Path::from_buffer(mem::take(&mut self.path), path.steps())
    }

    pub fn insert_root(self, node: Arc<Node>) -> Patch {
        debug_assert_eq!(self.kind, PatchKind::Insert);
        Patch::Insert { at: Anchor::Root, node }
    }

    pub fn insert(mut self, parent: &Path, index: usize, node: Arc<Node>) -> Patch {
        debug_assert_eq!(self.kind, PatchKind::Insert);
        Patch::Insert {
            at: Anchor::Child { parent: self.path(parent), index },
            node,
        }
    }

    pub fn remove(mut self, target: &Path) -> Patch {
        debug_assert_eq!(self.kind, PatchKind::Remove);
        Patch::Remove { target: self.path(target) }
    }

    pub fn moved(mut self, parent: &Path, key: Key, to_index: usize) -> Patch {
        debug_assert_eq!(self.kind, PatchKind::Move);
        Patch::Move { parent: self.path(parent), key, to_index }
    }

    pub fn update_props(mut self, target: &Path, changes: impl IntoIterator<Item = PropChange>) -> Patch {
        debug_assert_eq!(self.kind, PatchKind::UpdateProps);
        let mut buf = mem::take(&mut self.changes);
        buf.clear();
        buf.extend(changes);
        Patch::UpdateProps { target: self.path(target), changes: buf }
    }

    pub fn replace(mut self, target: &Path, node: Arc<Node>) -> Patch {
        debug_assert_eq!(self.kind, PatchKind::Replace);
        Patch::Replace { target: self.path(target), node }
    }
}

// =============================================================================
// PatchAllocator
// =============================================================================

/// Source of patch records for the diff engine.
pub trait PatchAllocator {
    /// Check out a record, recycled if one of this kind is free.
    fn acquire(&self, kind: PatchKind) -> PatchHandle;

    /// Give a record back; dropped if the kind's free list is full.
    fn release(&self, handle: PatchHandle);

    fn stats(&self) -> PoolStats;

    /// Drop every pooled record and reset the counters.
    fn clear(&self);

    fn thread_mode(&self) -> ThreadMode;

    /// Return a consumed patch's buffers to the pool.
    fn recycle(&self, patch: Patch) {
        self.release(PatchHandle::reclaim(patch));
    }

    fn recycle_all(&self, patches: Vec<Patch>) {
        for patch in patches {
            self.recycle(patch);
        }
    }
}

/// Per-kind free lists.
#[derive(Debug, Default)]
struct FreeLists {
    lists: [Vec<PatchHandle>; PatchKind::COUNT],
}

impl FreeLists {
    fn pop(&mut self, kind: PatchKind) -> Option<PatchHandle> {
        self.lists[kind.index()].pop()
    }

    /// Returns `false` when the list is full and the handle was dropped.
    fn push(&mut self, handle: PatchHandle, config: &PoolConfig) -> bool {
        let list = &mut self.lists[handle.kind.index()];
        if list.len() < config.capacity(handle.kind) {
            list.push(handle);
            true
        } else {
            false
        }
    }

    fn len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    fn clear(&mut self) {
        for list in &mut self.lists {
            list.clear();
        }
    }
}

// =============================================================================
// LocalPatchPool
// =============================================================================

/// Single-thread pool (`!Sync`).
#[derive(Debug, Default)]
pub struct LocalPatchPool {
    config: PoolConfig,
    free: RefCell<FreeLists>,
    counters: Counters,
}

impl LocalPatchPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            free: RefCell::default(),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl PatchAllocator for LocalPatchPool {
    fn acquire(&self, kind: PatchKind) -> PatchHandle {
        let recycled = self.free.borrow_mut().pop(kind);
        self.counters.on_acquire(recycled.is_some());
        recycled.unwrap_or_else(|| PatchHandle::fresh(kind))
    }

    fn release(&self, handle: PatchHandle) {
        let kept = self.free.borrow_mut().push(handle, &self.config);
        self.counters.on_release(kept);
    }

    fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.free.borrow().len())
    }

    fn clear(&self) {
        self.free.borrow_mut().clear();
        self.counters.reset();
    }

    fn thread_mode(&self) -> ThreadMode {
        ThreadMode::Serialized
    }
}

// =============================================================================
// SharedPatchPool
// =============================================================================

/// Result of [`SharedPatchPool::flush`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct FlushReport {
    /// Records kept after merging
    pub pooled: usize,
    /// Records dropped to bring the merged lists back within capacity
    pub trimmed: usize,
}

/// Pool with one sub-pool per thread.
///
/// Each sub-pool is bounded by the configured capacity on its own, so the
/// total pooled count can reach `capacity x threads` until the next flush.
///
/// Sub-pools outlive their threads. A host that spawns short-lived render
/// threads must call [`flush`](Self::flush) periodically, or have each
/// thread call [`release_thread`](Self::release_thread) before it exits.
#[derive(Debug, Default)]
pub struct SharedPatchPool {
    config: PoolConfig,
    shards: RwLock<FxHashMap<ThreadId, Mutex<FreeLists>>>,
    counters: Counters,
}

impl SharedPatchPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            shards: RwLock::default(),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of threads that have touched the pool
    pub fn shard_count(&self) -> usize {
        self.shards.read().len()
    }

    /// Run `f` on the calling thread's sub-pool, creating it on first use.
    fn with_shard<R>(&self, f: impl FnOnce(&mut FreeLists) -> R) -> R {
        let id = thread::current().id();
        {
            let shards = self.shards.read();
            if let Some(shard) = shards.get(&id) {
                return f(&mut shard.lock());
            }
        }
        let mut shards = self.shards.write();
        f(shards.entry(id).or_default().get_mut())
    }

    /// Records currently held across every sub-pool
    fn pooled(&self) -> usize {
        self.shards.read().values().map(|shard| shard.lock().len()).sum()
    }

    /// Drop the calling thread's sub-pool, returning how many records it held.
    ///
    /// The dropped records count as evicted. A later acquire or release on
    /// this thread starts a fresh sub-pool.
    pub fn release_thread(&self) -> usize {
        let removed = self.shards.write().remove(&thread::current().id());
        let dropped = removed.map_or(0, |shard| shard.into_inner().len());
        self.counters.evicted.fetch_add(dropped, Ordering::Relaxed);
        dropped
    }

    /// Merge every sub-pool into the calling thread's, trimming each kind
    /// back to its capacity.
    ///
    /// This is also the only point where sub-pools of exited threads are
    /// reclaimed, so long-running hosts should call it periodically.
    pub fn flush(&self) -> FlushReport {
        let mut shards = self.shards.write();
        let mut merged = FreeLists::default();
        let mut trimmed = 0;
        for shard in shards.values_mut() {
            for list in shard.get_mut().lists.iter_mut() {
                for handle in list.drain(..) {
                    if !merged.push(handle, &self.config) {
                        trimmed += 1;
                    }
                }
            }
        }
        let pooled = merged.len();
        shards.clear();
        shards.insert(thread::current().id(), Mutex::new(merged));
        drop(shards);

        self.counters.evicted.fetch_add(trimmed, Ordering::Relaxed);
        log::debug!("patch pool flush: pooled={pooled} trimmed={trimmed}");
        FlushReport { pooled, trimmed }
    }
}

impl PatchAllocator for SharedPatchPool {
    fn acquire(&self, kind: PatchKind) -> PatchHandle {
        let recycled = self.with_shard(|free| free.pop(kind));
        self.counters.on_acquire(recycled.is_some());
        recycled.unwrap_or_else(|| PatchHandle::fresh(kind))
    }

    fn release(&self, handle: PatchHandle) {
        let kept = self.with_shard(|free| free.push(handle, &self.config));
        self.counters.on_release(kept);
    }

    fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.pooled())
    }

    fn clear(&self) {
        self.shards.write().clear();
        self.counters.reset();
    }

    fn thread_mode(&self) -> ThreadMode {
        ThreadMode::Parallel
    }
}
