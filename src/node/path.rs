//! Keys and structural paths.
//!
//! A [`Path`] addresses a node from the tree root. Each step is either a
//! sibling key (inside a fully keyed group) or a child index (inside a
//! positional group). Key steps survive reordering; index steps are only
//! emitted for positions that no patch in the same batch shifts.

use std::fmt;

use compact_str::CompactString;

// =============================================================================
// Key
// =============================================================================

/// Sibling-unique identifier chosen by the component layer.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(CompactString);

impl Key {
    pub fn new(key: impl Into<CompactString>) -> Self {
        Self(key.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self(CompactString::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self(CompactString::from(value))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:?})", self.0.as_str())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// PathStep / Path
// =============================================================================

/// One step from a parent to one of its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// Child carrying this key
    Key(Key),
    /// Child at this position
    Index(usize),
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "{key}"),
            Self::Index(idx) => write!(f, "#{idx}"),
        }
    }
}

/// Structural address of a node, root first. The empty path is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<PathStep>);

impl Path {
    /// Path of the root node
    #[inline]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Reuse an existing buffer (cleared) as path storage.
    pub(crate) fn from_buffer(mut buf: Vec<PathStep>, steps: &[PathStep]) -> Self {
        buf.clear();
        buf.extend_from_slice(steps);
        Self(buf)
    }

    /// Give the storage back, emptied, for reuse.
    pub(crate) fn into_buffer(mut self) -> Vec<PathStep> {
        self.0.clear();
        self.0
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    /// Last step, or `None` for the root
    #[inline]
    pub fn last(&self) -> Option<&PathStep> {
        self.0.last()
    }

    /// Path of the parent, or `None` for the root
    pub fn parent(&self) -> Option<Path> {
        let (_, parent) = self.0.split_last()?;
        Some(Self(parent.to_vec()))
    }

    /// Extend by one step, returning a new path
    pub fn child(&self, step: PathStep) -> Path {
        let mut steps = Vec::with_capacity(self.0.len() + 1);
        steps.extend_from_slice(&self.0);
        steps.push(step);
        Self(steps)
    }

    #[inline]
    pub fn push(&mut self, step: PathStep) {
        self.0.push(step);
    }

    #[inline]
    pub fn pop(&mut self) -> Option<PathStep> {
        self.0.pop()
    }
}

impl From<Vec<PathStep>> for Path {
    fn from(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for step in &self.0 {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}
