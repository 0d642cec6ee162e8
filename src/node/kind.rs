//! Component kinds and per-kind behavior.
//!
//! `Kind` is a closed set of built-in component kinds plus `Custom` for
//! anything registered by an application. Per-kind diff/lifecycle behavior is
//! looked up in a [`KindRegistry`] instead of being inferred at runtime.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::props::PropName;

// =============================================================================
// Kind
// =============================================================================

/// Which component type produced a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    Root,
    Container,
    Text,
    Button,
    Input,
    List,
    Image,
    Canvas,
    /// Application-defined kind
    Custom(Arc<str>),
}

impl Kind {
    /// All built-in kinds
    pub fn builtin() -> [Kind; 8] {
        [
            Self::Root,
            Self::Container,
            Self::Text,
            Self::Button,
            Self::Input,
            Self::List,
            Self::Image,
            Self::Canvas,
        ]
    }

    /// Create a custom kind
    pub fn custom(name: &str) -> Self {
        Self::Custom(Arc::from(name))
    }

    /// Resolve a kind name, falling back to `Custom` for unknown names.
    pub fn from_name(name: &str) -> Self {
        match name {
            "root" => Self::Root,
            "container" => Self::Container,
            "text" => Self::Text,
            "button" => Self::Button,
            "input" => Self::Input,
            "list" => Self::List,
            "image" => Self::Image,
            "canvas" => Self::Canvas,
            other => Self::custom(other),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Root => "root",
            Self::Container => "container",
            Self::Text => "text",
            Self::Button => "button",
            Self::Input => "input",
            Self::List => "list",
            Self::Image => "image",
            Self::Canvas => "canvas",
            Self::Custom(name) => name,
        }
    }

    #[inline]
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// KindBehavior
// =============================================================================

bitflags! {
    /// Capability flags of a kind.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KindFlags: u8 {
        /// Content changes replace the whole node, children are not diffed
        const ATOMIC = 1 << 0;
        /// No lifecycle effects are emitted for nodes of this kind
        const SILENT = 1 << 1;
    }
}

/// Diff and lifecycle behavior attached to a kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindBehavior {
    pub flags: KindFlags,
    /// Props whose change forces a `Replace` instead of `UpdateProps`
    pub replace_on: SmallVec<[PropName; 2]>,
}

impl KindBehavior {
    pub fn atomic() -> Self {
        Self {
            flags: KindFlags::ATOMIC,
            replace_on: SmallVec::new(),
        }
    }

    pub fn silent() -> Self {
        Self {
            flags: KindFlags::SILENT,
            replace_on: SmallVec::new(),
        }
    }

    /// Replace the node when any of these props changes
    pub fn replace_on<I, S>(props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PropName>,
    {
        Self {
            flags: KindFlags::empty(),
            replace_on: props.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_flags(mut self, flags: KindFlags) -> Self {
        self.flags |= flags;
        self
    }
}

// =============================================================================
// KindRegistry
// =============================================================================

/// Table of per-kind behavior, owned by the reconciler.
///
/// Kinds without an entry use plain props/children diffing and emit all
/// lifecycle effects.
#[derive(Debug, Clone)]
pub struct KindRegistry {
    behaviors: FxHashMap<Kind, KindBehavior>,
}

impl Default for KindRegistry {
    /// Built-in defaults: `Canvas` is atomic (its children are draw commands),
    /// `Image` is replaced when its `src` changes.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Kind::Canvas, KindBehavior::atomic());
        registry.register(Kind::Image, KindBehavior::replace_on(["src"]));
        registry
    }
}

impl KindRegistry {
    /// Registry with no special behavior at all
    pub fn empty() -> Self {
        Self {
            behaviors: FxHashMap::default(),
        }
    }

    /// Register (or overwrite) the behavior of a kind.
    pub fn register(&mut self, kind: Kind, behavior: KindBehavior) -> &mut Self {
        self.behaviors.insert(kind, behavior);
        self
    }

    pub fn behavior(&self, kind: &Kind) -> Option<&KindBehavior> {
        self.behaviors.get(kind)
    }

    pub fn is_atomic(&self, kind: &Kind) -> bool {
        self.flags(kind).contains(KindFlags::ATOMIC)
    }

    pub fn is_silent(&self, kind: &Kind) -> bool {
        self.flags(kind).contains(KindFlags::SILENT)
    }

    /// Whether a change to any of `changed` forces replacement.
    pub fn forces_replace<'a>(&self, kind: &Kind, mut changed: impl Iterator<Item = &'a PropName>) -> bool {
        match self.behaviors.get(kind) {
            Some(b) if !b.replace_on.is_empty() => changed.any(|name| b.replace_on.contains(name)),
            _ => false,
        }
    }

    fn flags(&self, kind: &Kind) -> KindFlags {
        self.behaviors.get(kind).map(|b| b.flags).unwrap_or_default()
    }
}
