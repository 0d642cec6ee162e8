//! Patch records produced by the diff engine.
//!
//! A patch addresses its target by [`Path`]: key steps inside fully keyed
//! sibling groups, index steps inside positional ones. Structural patches
//! (`Insert`, `Remove`, `Move`) of one sibling group are resolved together by
//! the patcher against the group's pre-patch layout, so their order within a
//! batch never shifts another patch's indices.

use std::fmt;
use std::sync::Arc;

use crate::macros::impl_enum_accessors;
use crate::node::{Key, Node, Path, PropName, PropValue};

// =============================================================================
// Anchor / PropChange
// =============================================================================

/// Where an inserted node lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// The tree had no root
    Root,
    /// Position `index` in the final child list of `parent`
    Child { parent: Path, index: usize },
}

/// One prop difference. `value: None` removes the prop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropChange {
    pub name: PropName,
    pub value: Option<PropValue>,
}

impl PropChange {
    pub fn set(name: impl Into<PropName>, value: impl Into<PropValue>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn remove(name: impl Into<PropName>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    #[inline]
    pub fn is_removal(&self) -> bool {
        self.value.is_none()
    }
}

// =============================================================================
// Patch
// =============================================================================

/// Discriminant of [`Patch`], used to index per-kind pool free lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PatchKind {
    Insert,
    Remove,
    Move,
    UpdateProps,
    Replace,
}

impl PatchKind {
    pub const COUNT: usize = 5;

    pub const ALL: [PatchKind; Self::COUNT] = [
        Self::Insert,
        Self::Remove,
        Self::Move,
        Self::UpdateProps,
        Self::Replace,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Remove => "remove",
            Self::Move => "move",
            Self::UpdateProps => "update_props",
            Self::Replace => "replace",
        }
    }
}

impl fmt::Display for PatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One atomic structural or content change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    /// Insert a subtree
    Insert { at: Anchor, node: Arc<Node> },
    /// Detach a subtree (the empty path removes the root)
    Remove { target: Path },
    /// Move a keyed child to `to_index` of its group's final layout
    Move { parent: Path, key: Key, to_index: usize },
    /// Set or remove props on a node that otherwise stays in place
    UpdateProps { target: Path, changes: Vec<PropChange> },
    /// Swap a subtree for a new one
    Replace { target: Path, node: Arc<Node> },
}

impl Patch {
    impl_enum_accessors!(Insert, Remove, Move, UpdateProps, Replace);

    pub fn kind(&self) -> PatchKind {
        match self {
            Self::Insert { .. } => PatchKind::Insert,
            Self::Remove { .. } => PatchKind::Remove,
            Self::Move { .. } => PatchKind::Move,
            Self::UpdateProps { .. } => PatchKind::UpdateProps,
            Self::Replace { .. } => PatchKind::Replace,
        }
    }

    /// Whether the patch changes the layout of a sibling group (or the root slot)
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Insert { .. } | Self::Remove { .. } | Self::Move { .. })
    }

    /// Deepest existing node the patch addresses.
    ///
    /// The parent group for `Insert` and `Move`, the target otherwise; the
    /// root path for `Insert` at the root.
    pub fn address(&self) -> &Path {
        static ROOT: Path = Path::root();
        match self {
            Self::Insert { at: Anchor::Root, .. } => &ROOT,
            Self::Insert { at: Anchor::Child { parent, .. }, .. } | Self::Move { parent, .. } => parent,
            Self::Remove { target } | Self::UpdateProps { target, .. } | Self::Replace { target, .. } => target,
        }
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert { at: Anchor::Root, node } => write!(f, "insert {} at root", node.kind()),
            Self::Insert { at: Anchor::Child { parent, index }, node } => {
                write!(f, "insert {} at {parent}[{index}]", node.kind())
            }
            Self::Remove { target } => write!(f, "remove {target}"),
            Self::Move { parent, key, to_index } => write!(f, "move {key} to {parent}[{to_index}]"),
            Self::UpdateProps { target, changes } => write!(f, "update {} props at {target}", changes.len()),
            Self::Replace { target, node } => write!(f, "replace {target} with {}", node.kind()),
        }
    }
}

// =============================================================================
// PatchBatch
// =============================================================================

/// Ordered patches computed against one tree version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct PatchBatch {
    base_version: u64,
    patches: Vec<Patch>,
}

impl PatchBatch {
    pub fn new(base_version: u64, patches: Vec<Patch>) -> Self {
        Self {
            base_version,
            patches,
        }
    }

    /// Tree version the batch was computed against
    #[inline]
    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    #[inline]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn into_patches(self) -> Vec<Patch> {
        self.patches
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Number of patches per kind, indexed by [`PatchKind::index`]
    pub fn counts(&self) -> [usize; PatchKind::COUNT] {
        let mut counts = [0; PatchKind::COUNT];
        for patch in &self.patches {
            counts[patch.kind().index()] += 1;
        }
        counts
    }
}
