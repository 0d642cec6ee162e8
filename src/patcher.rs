//! Tree patcher.
//!
//! Applies a [`PatchBatch`] to a [`Tree`] under its write lock:
//!
//! 1. Reject the batch if it was computed against another version
//! 2. Resolve the structural patches of each sibling group as one layout
//!    (removals, then pinned moves and inserts, then the untouched survivors
//!    filling the free slots in their old order)
//! 3. Apply `UpdateProps` and `Replace`
//! 4. Check key uniqueness in every group steps 2 and 3 touched
//! 5. Commit the new root and bump the version once
//!
//! All work happens on a copy-on-write clone of the root (`Arc::make_mut`
//! along the touched paths only). An error drops the clone, so a batch is
//! either applied entirely or not at all.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::effect::{Effect, EffectLog};
use crate::error::PatchApplicationError;
use crate::node::{
    duplicate_key, is_fully_keyed, resolve_in_group, step_in_group, Children, Key, KindRegistry, Node, Path,
    PathStep,
};
use crate::patch::{Anchor, Patch, PatchBatch};
use crate::tree::{Tree, TreeState};

type ApplyResult<T> = Result<T, PatchApplicationError>;

/// Structural patches of one sibling group, in batch order.
#[derive(Default)]
struct GroupPlan<'p> {
    removes: SmallVec<[&'p PathStep; 4]>,
    moves: SmallVec<[(&'p Key, usize); 4]>,
    inserts: SmallVec<[(usize, &'p Arc<Node>); 4]>,
}

/// Applies patch batches and records lifecycle effects.
#[derive(Debug, Clone, Copy)]
pub struct TreePatcher<'a> {
    registry: &'a KindRegistry,
}

impl<'a> TreePatcher<'a> {
    pub fn new(registry: &'a KindRegistry) -> Self {
        Self { registry }
    }

    /// Apply `batch` to `tree`, returning the new version and the effects to
    /// deliver once the caller is outside the lock.
    pub fn apply(&self, tree: &Tree, batch: &PatchBatch) -> ApplyResult<(u64, Vec<Effect>)> {
        tree.with_write(|state| self.apply_locked(state, batch))
    }

    pub(crate) fn apply_locked(&self, state: &mut TreeState, batch: &PatchBatch) -> ApplyResult<(u64, Vec<Effect>)> {
        if batch.base_version() != state.version {
            return Err(PatchApplicationError::Stale {
                expected: batch.base_version(),
                found: state.version,
            });
        }

        let mut log = EffectLog::new(self.registry);
        let mut root = state.root.clone();
        let mut touched = self.apply_structural(&mut root, batch.patches(), &mut log)?;
        apply_content(&mut root, batch.patches(), &mut log)?;
        touched.extend(batch.patches().iter().filter_map(|patch| match patch {
            Patch::Replace { target, .. } if !target.is_root() => Some(&target.steps()[..target.depth() - 1]),
            _ => None,
        }));
        check_keys(root.as_deref(), &touched)?;

        state.root = root;
        state.version += 1;
        let effects = log.finish();
        log::debug!(
            "apply: version {} ({} patches, {} effects)",
            state.version,
            batch.len(),
            effects.len()
        );
        Ok((state.version, effects))
    }

    /// Returns the parent of every group it laid out.
    fn apply_structural<'p>(
        &self,
        root: &mut Option<Arc<Node>>,
        patches: &'p [Patch],
        log: &mut EffectLog<'_>,
    ) -> ApplyResult<Vec<&'p [PathStep]>> {
        let mut order: Vec<&[PathStep]> = Vec::new();
        let mut groups: FxHashMap<&[PathStep], GroupPlan<'_>> = FxHashMap::default();

        for patch in patches {
            let parent: &[PathStep] = match patch {
                Patch::Insert { at: Anchor::Root, node } => {
                    if root.is_some() {
                        return Err(PatchApplicationError::conflict(Path::root(), "root already present"));
                    }
                    log.mounted(node, &mut Path::root());
                    *root = Some(Arc::clone(node));
                    continue;
                }
                Patch::Remove { target } if target.is_root() => {
                    let old = root.take().ok_or_else(|| PatchApplicationError::missing(Path::root()))?;
                    log.unmounted(&old, &mut Path::root());
                    continue;
                }
                Patch::Insert { at: Anchor::Child { parent, .. }, .. } | Patch::Move { parent, .. } => parent.steps(),
                Patch::Remove { target } => &target.steps()[..target.depth() - 1],
                Patch::UpdateProps { .. } | Patch::Replace { .. } => continue,
            };
            let plan = groups.entry(parent).or_insert_with(|| {
                order.push(parent);
                GroupPlan::default()
            });
            match patch {
                Patch::Insert { at: Anchor::Child { index, .. }, node } => plan.inserts.push((*index, node)),
                Patch::Move { key, to_index, .. } => plan.moves.push((key, *to_index)),
                Patch::Remove { target } => plan.removes.extend(target.last()),
                _ => {}
            }
        }

        for &parent in &order {
            if let Some(plan) = groups.remove(parent) {
                self.apply_group(root, parent, plan, log)?;
            }
        }
        Ok(order)
    }

    fn apply_group(
        &self,
        root: &mut Option<Arc<Node>>,
        parent_steps: &[PathStep],
        plan: GroupPlan<'_>,
        log: &mut EffectLog<'_>,
    ) -> ApplyResult<()> {
        let parent_path = Path::from(parent_steps.to_vec());
        let parent = descend_mut(root, &parent_path)?;
        let old: Children = std::mem::take(parent.children_mut());

        let mut removed = vec![false; old.len()];
        for &step in &plan.removes {
            let target = parent_path.child(step.clone());
            let idx = resolve_in_group(&old, step).ok_or_else(|| PatchApplicationError::missing(target.clone()))?;
            if removed[idx] {
                return Err(PatchApplicationError::conflict(parent_path, format!("{step} removed twice")));
            }
            removed[idx] = true;
            log.unmounted(&old[idx], &mut target.clone());
        }

        let final_len = old.len() - removed.iter().filter(|&&r| r).count() + plan.inserts.len();
        let mut slots: Vec<Option<Arc<Node>>> = vec![None; final_len];
        let mut pinned = vec![false; old.len()];

        for &(key, to_index) in &plan.moves {
            let step = PathStep::Key(key.clone());
            let idx = resolve_in_group(&old, &step)
                .ok_or_else(|| PatchApplicationError::missing(parent_path.child(step)))?;
            if removed[idx] || pinned[idx] {
                return Err(PatchApplicationError::conflict(
                    parent_path,
                    format!("{key} moved after removal or twice"),
                ));
            }
            place(&mut slots, to_index, Arc::clone(&old[idx]), &parent_path)?;
            pinned[idx] = true;
        }
        for &(index, node) in &plan.inserts {
            place(&mut slots, index, Arc::clone(node), &parent_path)?;
        }

        let mut survivors = old
            .iter()
            .enumerate()
            .filter(|&(idx, _)| !removed[idx] && !pinned[idx])
            .map(|(_, child)| child);
        for slot in slots.iter_mut().filter(|slot| slot.is_none()) {
            *slot = survivors.next().cloned();
        }
        let children: Children = slots
            .into_iter()
            .collect::<Option<Children>>()
            .ok_or_else(|| PatchApplicationError::conflict(parent_path.clone(), "layout left a gap"))?;
        *parent.children_mut() = children;

        let group = parent.children();
        let keyed = is_fully_keyed(group);
        for &(index, _) in &plan.inserts {
            log.mounted(&group[index], &mut parent_path.child(step_in_group(group, index, keyed)));
        }
        log::trace!(
            "apply: group {parent_path} resolved ({} removed, {} moved, {} inserted)",
            plan.removes.len(),
            plan.moves.len(),
            plan.inserts.len()
        );
        Ok(())
    }
}

fn place(slots: &mut [Option<Arc<Node>>], index: usize, node: Arc<Node>, parent: &Path) -> ApplyResult<()> {
    match slots.get_mut(index) {
        Some(slot @ None) => {
            *slot = Some(node);
            Ok(())
        }
        Some(Some(_)) => Err(PatchApplicationError::conflict(parent.clone(), format!("slot {index} claimed twice"))),
        None => Err(PatchApplicationError::conflict(
            parent.clone(),
            format!("index {index} beyond final length {}", slots.len()),
        )),
    }
}

/// Reject groups that ended up with two children under one key.
///
/// Runs after the content phase: in a positional group a key may leave a
/// replaced slot for an inserted one, and both copies coexist until the
/// replace lands.
fn check_keys(root: Option<&Node>, parents: &[&[PathStep]]) -> ApplyResult<()> {
    let Some(root) = root else {
        return Ok(());
    };
    for &steps in parents {
        let path = Path::from(steps.to_vec());
        // A group under a replaced ancestor arrived whole with its new subtree
        let Some(parent) = root.find(&path) else {
            continue;
        };
        if let Some(key) = duplicate_key(parent.children()) {
            return Err(PatchApplicationError::conflict(path, format!("duplicate key {key}")));
        }
    }
    Ok(())
}

fn apply_content(root: &mut Option<Arc<Node>>, patches: &[Patch], log: &mut EffectLog<'_>) -> ApplyResult<()> {
    for patch in patches {
        match patch {
            Patch::UpdateProps { target, changes } => {
                let node = descend_mut(root, target)?;
                let props = node.props_mut();
                for change in changes {
                    match &change.value {
                        Some(value) => {
                            props.insert(change.name.clone(), value.clone());
                        }
                        None => {
                            props.remove(&change.name);
                        }
                    }
                }
                log.updated(node, target, changes.iter().map(|c| c.name.clone()).collect());
            }
            Patch::Replace { target, node } => replace(root, target, node, log)?,
            _ => {}
        }
    }
    Ok(())
}

fn replace(root: &mut Option<Arc<Node>>, target: &Path, node: &Arc<Node>, log: &mut EffectLog<'_>) -> ApplyResult<()> {
    let old = match target.steps().split_last() {
        None => root
            .replace(Arc::clone(node))
            .ok_or_else(|| PatchApplicationError::missing(Path::root()))?,
        Some((step, parent_steps)) => {
            let parent = descend_mut(root, &Path::from(parent_steps.to_vec()))?;
            let idx = parent
                .resolve_step(step)
                .ok_or_else(|| PatchApplicationError::missing(target.clone()))?;
            std::mem::replace(&mut parent.children_mut()[idx], Arc::clone(node))
        }
    };
    log.unmounted(&old, &mut target.clone());
    log.mounted(node, &mut target.clone());
    Ok(())
}

/// Unshare every node on `path` and return the last one.
fn descend_mut<'n>(root: &'n mut Option<Arc<Node>>, path: &Path) -> ApplyResult<&'n mut Node> {
    let mut node = Arc::make_mut(root.as_mut().ok_or_else(|| PatchApplicationError::missing(Path::root()))?);
    for (depth, step) in path.steps().iter().enumerate() {
        let idx = node
            .resolve_step(step)
            .ok_or_else(|| PatchApplicationError::missing(Path::from(path.steps()[..=depth].to_vec())))?;
        node = Arc::make_mut(&mut node.children_mut()[idx]);
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::{DiffConfig, DiffEngine, Strategy};
    use crate::node::{Kind, PropName};
    use crate::patch::{PatchKind, PropChange};
    use crate::pool::{LocalPatchPool, PatchAllocator, PatchHandle};
    use crate::tree::create_tree;

    fn row(key: &str, text: &str) -> Node {
        Node::new(Kind::Text).with_key(key).prop("text", text)
    }

    fn list(keys: &[&str]) -> Node {
        Node::new(Kind::Root).child(Node::new(Kind::List).with_key("rows").with_children(keys.iter().map(|k| row(k, k))))
    }

    /// Diff the tree's current root against `new` with `config`.
    fn batch_for(tree: &Tree, new: &Node, config: DiffConfig) -> PatchBatch {
        let registry = KindRegistry::default();
        let pool = LocalPatchPool::default();
        let snapshot = tree.snapshot();
        DiffEngine::new(config, &registry, &pool)
            .run(snapshot.root(), Some(&Arc::new(new.clone())))
            .unwrap()
            .into_batch(snapshot.version())
    }

    fn converge_with(old: &Node, new: &Node, config: DiffConfig) -> Vec<Effect> {
        let registry = KindRegistry::default();
        let tree = create_tree(old.clone()).unwrap();
        let batch = batch_for(&tree, new, config);
        let (version, effects) = TreePatcher::new(&registry).apply(&tree, &batch).unwrap();
        assert_eq!(version, 1);
        assert_eq!(tree.root().as_deref(), Some(new), "batch: {:?}", batch.patches());
        effects
    }

    fn converge(old: &Node, new: &Node) -> Vec<Effect> {
        converge_with(old, new, DiffConfig::default())
    }

    fn paths(effects: &[Effect], pred: fn(&Effect) -> bool) -> Vec<String> {
        effects.iter().filter(|e| pred(e)).map(|e| e.target().path.to_string()).collect()
    }

    #[test]
    fn test_keyed_edits_converge() {
        converge(&list(&["a", "b", "c", "d"]), &list(&["d", "a", "c", "b"]));
        converge(&list(&["a", "b", "c"]), &list(&["x", "c", "y", "a"]));
        converge(&list(&["a", "b", "c"]), &list(&[]));
        converge(&list(&[]), &list(&["a", "b"]));
        converge(&list(&["a", "b", "c", "d", "e"]), &list(&["e", "d", "c", "b", "a"]));
    }

    #[test]
    fn test_positional_edits_converge() {
        let old = Node::new(Kind::Container).with_children((0..5).map(|i| Node::new(Kind::Text).prop("n", i)));
        let shorter = Node::new(Kind::Container).with_children((0..2).map(|i| Node::new(Kind::Text).prop("n", i * 10)));
        let longer = Node::new(Kind::Container).with_children((0..7).map(|i| Node::new(Kind::Text).prop("n", i)));
        converge(&old, &shorter);
        converge(&old, &longer);
        converge(&old, &longer.clone().child(Node::new(Kind::Button)));
    }

    #[test]
    fn test_key_relocated_past_replaced_slots() {
        // Partially keyed, so the group is diffed by position: both slots are
        // replaced and `a` comes back as an insert at the end
        let old = Node::new(Kind::Root)
            .child(Node::new(Kind::Text).with_key("a"))
            .child(Node::new(Kind::Text));
        let new = Node::new(Kind::Root)
            .child(Node::new(Kind::Button))
            .child(Node::new(Kind::Input))
            .child(Node::new(Kind::Text).with_key("a"));

        for config in [DiffConfig::default(), DiffConfig::new(Strategy::Positional)] {
            let effects = converge_with(&old, &new, config);
            let mut mounted = paths(&effects, Effect::is_mounted);
            mounted.sort();
            assert_eq!(mounted, vec!["/#0", "/#1", "/#2"]);
            assert_eq!(paths(&effects, Effect::is_unmounted).len(), 2);
        }
    }

    #[test]
    fn test_nested_changes_inside_moved_child() {
        let old = list(&["a", "b", "c"]);
        let new = Node::new(Kind::Root).child(
            Node::new(Kind::List)
                .with_key("rows")
                .child(row("c", "c"))
                .child(row("a", "A!").child(Node::new(Kind::Button).with_key("del")))
                .child(row("b", "b")),
        );
        converge(&old, &new);
    }

    #[test]
    fn test_root_transitions() {
        let registry = KindRegistry::default();
        let patcher = TreePatcher::new(&registry);
        let tree = Tree::empty();
        let new = list(&["a"]);

        let (version, effects) = patcher.apply(&tree, &batch_for(&tree, &new, DiffConfig::default())).unwrap();
        assert_eq!(version, 1);
        assert_eq!(paths(&effects, Effect::is_mounted), vec!["/", "/rows", "/rows/a"]);

        let replacement = Node::new(Kind::Container).child(Node::new(Kind::Text));
        let (_, effects) = patcher.apply(&tree, &batch_for(&tree, &replacement, DiffConfig::default())).unwrap();
        assert_eq!(paths(&effects, Effect::is_unmounted), vec!["/", "/rows", "/rows/a"]);
        assert_eq!(paths(&effects, Effect::is_mounted), vec!["/", "/#0"]);
        assert_eq!(tree.root().as_deref(), Some(&replacement));

        let remove = PatchBatch::new(2, vec![LocalPatchPool::default().acquire(PatchKind::Remove).remove(&Path::root())]);
        let (version, effects) = patcher.apply(&tree, &remove).unwrap();
        assert_eq!(version, 3);
        assert!(tree.root().is_none());
        assert_eq!(effects.len(), 2);
    }

    #[test]
    fn test_strategies_converge() {
        let old = list(&["a", "b", "c", "d"]);
        let new = list(&["c", "a", "e"]);
        converge_with(&old, &new, DiffConfig::new(Strategy::Positional));
        converge_with(&old, &new, DiffConfig::new(Strategy::Keyed));
        converge_with(&old, &new, DiffConfig::default().without_hash_shortcut());
        converge_with(&old, &new, DiffConfig::default().with_max_patches(1));
        converge_with(&old, &new, DiffConfig::default().with_max_depth(1));
    }

    #[test]
    fn test_effects_per_patch() {
        let effects = converge(&list(&["a", "b", "c"]), &list(&["c", "a", "x"]));

        // b removed, x inserted; the move of c is silent
        assert_eq!(paths(&effects, Effect::is_unmounted), vec!["/rows/b"]);
        assert_eq!(paths(&effects, Effect::is_mounted), vec!["/rows/x"]);
        assert!(effects.iter().all(|e| !e.is_updated()));

        let old = list(&["a"]);
        let new = Node::new(Kind::Root).child(Node::new(Kind::List).with_key("rows").child(row("a", "changed")));
        let effects = converge(&old, &new);
        assert_eq!(effects.len(), 1);
        match &effects[0] {
            Effect::Updated { target, changed } => {
                assert_eq!(target.path.to_string(), "/rows/a");
                assert_eq!(changed, &vec![PropName::from("text")]);
            }
            other => panic!("unexpected effect {other}"),
        }
    }

    #[test]
    fn test_unmount_is_top_down() {
        let old = Node::new(Kind::Root).child(
            Node::new(Kind::Container)
                .with_key("panel")
                .child(Node::new(Kind::Text).with_key("t"))
                .child(Node::new(Kind::Button).with_key("b")),
        );
        let new = Node::new(Kind::Root);
        let effects = converge(&old, &new);
        assert_eq!(paths(&effects, Effect::is_unmounted), vec!["/panel", "/panel/t", "/panel/b"]);
    }

    #[test]
    fn test_stale_batch_is_rejected() {
        let registry = KindRegistry::default();
        let tree = create_tree(list(&["a", "b"])).unwrap();
        let before = tree.root().unwrap();
        let batch = batch_for(&tree, &list(&["b"]), DiffConfig::default());
        let stale = PatchBatch::new(batch.base_version() + 1, batch.into_patches());

        let err = TreePatcher::new(&registry).apply(&tree, &stale).unwrap_err();
        assert_eq!(err, PatchApplicationError::Stale { expected: 1, found: 0 });
        assert_eq!(tree.version(), 0);
        assert!(Arc::ptr_eq(&before, &tree.root().unwrap()));
    }

    #[test]
    fn test_failed_batch_leaves_tree_untouched() {
        let registry = KindRegistry::default();
        let tree = create_tree(list(&["a", "b"])).unwrap();
        let before = tree.root().unwrap();
        let pool = LocalPatchPool::default();
        let rows = Path::root().child(PathStep::Key(Key::from("rows")));
        let batch = PatchBatch::new(
            0,
            vec![
                pool.acquire(PatchKind::UpdateProps)
                    .update_props(&rows, [PropChange::set("title", "x")]),
                pool.acquire(PatchKind::Remove).remove(&rows.child(PathStep::Key(Key::from("zz")))),
            ],
        );

        let err = TreePatcher::new(&registry).apply(&tree, &batch).unwrap_err();
        assert!(matches!(err, PatchApplicationError::MissingTarget { ref path } if path.to_string() == "/rows/zz"));
        assert_eq!(tree.version(), 0);
        assert!(Arc::ptr_eq(&before, &tree.root().unwrap()));
        assert!(before.children()[0].get_prop("title").is_none());
    }

    #[test]
    fn test_layout_conflicts() {
        let registry = KindRegistry::default();
        let patcher = TreePatcher::new(&registry);
        let pool = LocalPatchPool::default();
        let rows = Path::root().child(PathStep::Key(Key::from("rows")));
        let fresh = || Arc::new(row("n", "n"));

        let cases: Vec<Vec<Patch>> = vec![
            // removed twice
            vec![
                pool.acquire(PatchKind::Remove).remove(&rows.child(PathStep::Key(Key::from("a")))),
                pool.acquire(PatchKind::Remove).remove(&rows.child(PathStep::Index(0))),
            ],
            // two patches claim one slot
            vec![
                pool.acquire(PatchKind::Insert).insert(&rows, 0, fresh()),
                pool.acquire(PatchKind::Move).moved(&rows, Key::from("b"), 0),
            ],
            // slot past the end
            vec![pool.acquire(PatchKind::Move).moved(&rows, Key::from("a"), 5)],
            // moved after removal
            vec![
                pool.acquire(PatchKind::Remove).remove(&rows.child(PathStep::Key(Key::from("a")))),
                pool.acquire(PatchKind::Move).moved(&rows, Key::from("a"), 0),
            ],
            // inserted key collides with a survivor
            vec![pool.acquire(PatchKind::Insert).insert(&rows, 1, Arc::new(row("a", "dup")))],
            // replacement takes a sibling's key
            vec![pool.acquire(PatchKind::Replace).replace(&rows.child(PathStep::Index(1)), Arc::new(row("a", "dup")))],
        ];

        for patches in cases {
            let tree = create_tree(list(&["a", "b"])).unwrap();
            let err = patcher.apply(&tree, &PatchBatch::new(0, patches)).unwrap_err();
            assert!(matches!(err, PatchApplicationError::LayoutConflict { .. }), "{err}");
            assert_eq!(tree.version(), 0);
        }

        let tree = Tree::empty();
        let err = patcher
            .apply(&tree, &PatchBatch::new(0, vec![pool.acquire(PatchKind::Move).moved(&rows, Key::from("a"), 0)]))
            .unwrap_err();
        assert_eq!(err, PatchApplicationError::MissingTarget { path: Path::root() });
    }

    #[test]
    fn test_empty_batch_bumps_version() {
        let registry = KindRegistry::default();
        let tree = create_tree(list(&["a"])).unwrap();
        let (version, effects) = TreePatcher::new(&registry).apply(&tree, &PatchBatch::new(0, Vec::new())).unwrap();
        assert_eq!(version, 1);
        assert!(effects.is_empty());
        assert_eq!(tree.version(), 1);
    }

    #[test]
    fn test_copy_on_write_preserves_snapshots() {
        let registry = KindRegistry::default();
        let tree = create_tree(
            Node::new(Kind::Root)
                .child(list(&["a", "b"]).with_key("left"))
                .child(list(&["c"]).with_key("right")),
        )
        .unwrap();
        let snapshot = tree.snapshot();
        let old_root = snapshot.root().unwrap().clone();

        let new = Node::new(Kind::Root)
            .child(list(&["b", "a"]).with_key("left"))
            .child(list(&["c"]).with_key("right"));
        let batch = batch_for(&tree, &new, DiffConfig::default());
        TreePatcher::new(&registry).apply(&tree, &batch).unwrap();

        let current = tree.root().unwrap();
        assert_eq!(&*current, &new);
        assert_eq!(&*old_root, snapshot.root().unwrap().as_ref());
        let old_rows = old_root.find(&Path::from(vec![PathStep::Key(Key::from("left")), PathStep::Key(Key::from("rows"))]));
        let keys: Vec<_> = old_rows.unwrap().children().iter().filter_map(|c| c.key()).map(Key::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
        // the untouched sibling is still shared
        assert!(Arc::ptr_eq(&old_root.children()[1], &current.children()[1]));
        assert!(!Arc::ptr_eq(&old_root.children()[0], &current.children()[0]));
    }

    #[test]
    fn test_patches_recycle_after_apply() {
        let registry = KindRegistry::default();
        let pool = LocalPatchPool::default();
        let tree = create_tree(list(&["a", "b"])).unwrap();
        let snapshot = tree.snapshot();
        let result = DiffEngine::new(DiffConfig::default(), &registry, &pool)
            .run(snapshot.root(), Some(&Arc::new(list(&["b"]))))
            .unwrap();
        let batch = result.into_batch(snapshot.version());
        TreePatcher::new(&registry).apply(&tree, &batch).unwrap();

        for patch in batch.into_patches() {
            pool.release(PatchHandle::reclaim(patch));
        }
        assert_eq!(pool.stats().pooled, 1);
    }

    // -------------------------------------------------------------------------
    // Generated trees
    // -------------------------------------------------------------------------

    struct XorShift(u64);

    impl XorShift {
        fn below(&mut self, n: usize) -> usize {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            (self.0 % n as u64) as usize
        }
    }

    fn generate(rng: &mut XorShift, depth: usize) -> Node {
        const KINDS: [Kind; 4] = [Kind::Container, Kind::Text, Kind::Button, Kind::List];
        let mut node = Node::new(KINDS[rng.below(KINDS.len())].clone()).prop("v", rng.below(3) as i64);
        if rng.below(4) == 0 {
            node.set_prop("flag", true);
        }
        if depth == 0 {
            return node;
        }

        let count = rng.below(6);
        let keyed = rng.below(3) != 0;
        let mut pool: Vec<usize> = (0..7).collect();
        for i in 0..count {
            let mut child = generate(rng, depth - 1);
            if keyed {
                let key = pool.swap_remove(rng.below(pool.len()));
                child.set_key(Some(Key::new(format!("k{key}"))));
            } else if rng.below(5) == 0 {
                child.set_key(Some(Key::new(format!("u{i}"))));
            }
            node.push_child(child);
        }
        node
    }

    #[test]
    fn test_generated_pairs_converge() {
        let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);
        let configs = [
            DiffConfig::default(),
            DiffConfig::default().without_hash_shortcut(),
            DiffConfig::new(Strategy::Positional),
        ];
        for _ in 0..200 {
            let old = Node::new(Kind::Root).child(generate(&mut rng, 3));
            let new = Node::new(Kind::Root).child(generate(&mut rng, 3));
            for config in configs {
                converge_with(&old, &new, config);
                converge_with(&new, &old, config);
            }
        }
    }
}
