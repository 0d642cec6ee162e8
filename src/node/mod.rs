//! Node model.
//!
//! A [`Node`] is one rendered element: optional sibling-unique key, kind,
//! props and ordered children. Children are reference counted so that tree
//! versions share every untouched subtree, and every node memoizes its
//! subtree hash (see [`crate::cache`]).
//!
//! Fields are private: every mutation goes through a method that clears the
//! memoized hash, and reaching a descendant mutably requires going through
//! [`Node::children_mut`] on each ancestor, which clears theirs too.

mod kind;
mod path;
mod props;

pub use kind::{Kind, KindBehavior, KindFlags, KindRegistry};
pub use path::{Key, Path, PathStep};
pub use props::{normalize_props, CanonicalProps, CanonicalValue, PropName, PropValue, Props};

use std::sync::Arc;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::cache::HashCell;
use crate::error::{VdomError, VdomResult};

/// Type alias for children collection.
pub type Children = SmallVec<[Arc<Node>; 4]>;

// =============================================================================
// Node
// =============================================================================

/// One rendered element of a tree.
#[derive(Debug, Clone)]
pub struct Node {
    key: Option<Key>,
    kind: Kind,
    props: Props,
    children: Children,
    pub(crate) hash: HashCell,
}

impl Node {
    /// Create an unkeyed node with no props and no children
    pub fn new(kind: Kind) -> Self {
        Self {
            key: None,
            kind,
            props: Props::default(),
            children: Children::new(),
            hash: HashCell::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder
    // ─────────────────────────────────────────────────────────────────────────

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.set_key(Some(key.into()));
        self
    }

    pub fn prop(mut self, name: impl Into<PropName>, value: impl Into<PropValue>) -> Self {
        self.set_prop(name, value);
        self
    }

    pub fn child(mut self, child: Node) -> Self {
        self.push_child(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children_mut().extend(children.into_iter().map(Arc::new));
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read access
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    #[inline]
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    #[inline]
    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn get_prop(&self, name: &str) -> Option<&PropValue> {
        self.props.get(name)
    }

    #[inline]
    pub fn children(&self) -> &[Arc<Node>] {
        &self.children
    }

    /// Whether the memoized hash must be recomputed
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.hash.get().is_none()
    }

    /// Number of nodes in this subtree, including `self`
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(|c| c.subtree_len()).sum::<usize>()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation (each clears the memoized hash)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn set_key(&mut self, key: Option<Key>) {
        self.hash.invalidate();
        self.key = key;
    }

    pub fn set_kind(&mut self, kind: Kind) {
        self.hash.invalidate();
        self.kind = kind;
    }

    pub fn set_prop(&mut self, name: impl Into<PropName>, value: impl Into<PropValue>) {
        self.hash.invalidate();
        self.props.insert(name.into(), value.into());
    }

    pub fn remove_prop(&mut self, name: &str) -> Option<PropValue> {
        self.hash.invalidate();
        self.props.remove(name)
    }

    pub fn props_mut(&mut self) -> &mut Props {
        self.hash.invalidate();
        &mut self.props
    }

    pub fn push_child(&mut self, child: Node) {
        self.children_mut().push(Arc::new(child));
    }

    /// Mutable children. Use `Arc::make_mut` to descend further.
    pub fn children_mut(&mut self) -> &mut Children {
        self.hash.invalidate();
        &mut self.children
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Addressing
    // ─────────────────────────────────────────────────────────────────────────

    /// Position of the child a step points at
    pub fn resolve_step(&self, step: &PathStep) -> Option<usize> {
        resolve_in_group(&self.children, step)
    }

    /// Step addressing the child at `idx`: its key in a fully keyed group,
    /// its position otherwise.
    pub fn step_for_child(&self, idx: usize) -> PathStep {
        step_in_group(&self.children, idx, is_fully_keyed(&self.children))
    }

    /// Find a descendant by path (the empty path is `self`).
    pub fn find(&self, path: &Path) -> Option<&Node> {
        let mut current = self;
        for step in path.steps() {
            let idx = current.resolve_step(step)?;
            current = &current.children[idx];
        }
        Some(current)
    }

    /// Check that keys are pairwise distinct in every sibling group.
    pub fn validate(&self) -> VdomResult<()> {
        match first_duplicate(self, &mut Path::root()) {
            Some((path, key)) => Err(VdomError::invalid_structure(
                path,
                format!("duplicate sibling key `{key}`"),
            )),
            None => Ok(()),
        }
    }
}

/// Observable equality: keys, kinds, props and children, recursively.
/// Memoized hashes do not take part.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.kind == other.kind
            && self.props == other.props
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(other.children.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b) || a == b)
    }
}

impl Eq for Node {}

// =============================================================================
// Sibling group helpers
// =============================================================================

/// Whether every child of the group carries a key
pub fn is_fully_keyed(group: &[Arc<Node>]) -> bool {
    group.iter().all(|c| c.key.is_some())
}

/// Position of the child a step points at within a sibling group
pub(crate) fn resolve_in_group(group: &[Arc<Node>], step: &PathStep) -> Option<usize> {
    match step {
        PathStep::Index(idx) => (*idx < group.len()).then_some(*idx),
        PathStep::Key(key) => group.iter().position(|c| c.key() == Some(key)),
    }
}

/// `keyed` must be `is_fully_keyed(group)`, hoisted out of loops.
pub(crate) fn step_in_group(group: &[Arc<Node>], idx: usize, keyed: bool) -> PathStep {
    match group[idx].key() {
        Some(key) if keyed => PathStep::Key(key.clone()),
        _ => PathStep::Index(idx),
    }
}

/// First key repeated within the group, if any
pub(crate) fn duplicate_key(group: &[Arc<Node>]) -> Option<&Key> {
    if group.len() < 2 {
        return None;
    }
    let mut seen = FxHashSet::default();
    group
        .iter()
        .filter_map(|c| c.key())
        .find(|key| !seen.insert(*key))
}

/// First duplicate key anywhere in the subtree, with the path of its parent.
pub(crate) fn first_duplicate(node: &Node, path: &mut Path) -> Option<(Path, Key)> {
    if let Some(key) = duplicate_key(&node.children) {
        return Some((path.clone(), key.clone()));
    }
    let keyed = is_fully_keyed(&node.children);
    for idx in 0..node.children.len() {
        path.push(step_in_group(&node.children, idx, keyed));
        let found = first_duplicate(&node.children[idx], path);
        path.pop();
        if found.is_some() {
            return found;
        }
    }
    None
}
