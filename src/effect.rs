//! Lifecycle effect descriptors.
//!
//! The patcher records effects while it applies a batch and hands them back
//! instead of running anything inline. They are delivered to collaborators
//! by the [`EffectScheduler`](crate::EffectScheduler) after the tree's write
//! lock is released.

use std::fmt;
use std::sync::Arc;

use crate::macros::impl_enum_accessors;
use crate::node::{is_fully_keyed, step_in_group, Key, Kind, KindRegistry, Node, Path, PropName};

/// Node an effect is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectTarget {
    pub key: Option<Key>,
    pub kind: Kind,
    /// Position in the tree the effect was recorded against
    pub path: Path,
}

impl EffectTarget {
    fn of(node: &Node, path: &Path) -> Self {
        Self {
            key: node.key().cloned(),
            kind: node.kind().clone(),
            path: path.clone(),
        }
    }
}

/// Delivery lane. `High` drains before `Normal` within a pass.
///
/// There is no idle lane: every lifecycle effect is either a release of host
/// resources or a mount/update the host is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    High,
    Normal,
}

/// Mount/update/unmount notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Mounted(EffectTarget),
    Updated {
        target: EffectTarget,
        changed: Vec<PropName>,
    },
    Unmounted(EffectTarget),
}

impl Effect {
    impl_enum_accessors!(Mounted, Updated, Unmounted);

    pub fn target(&self) -> &EffectTarget {
        match self {
            Self::Mounted(target) | Self::Unmounted(target) => target,
            Self::Updated { target, .. } => target,
        }
    }

    #[inline]
    pub fn key(&self) -> Option<&Key> {
        self.target().key.as_ref()
    }

    /// Unmounts release host resources first.
    pub fn priority(&self) -> Priority {
        match self {
            Self::Unmounted(_) => Priority::High,
            Self::Mounted(_) | Self::Updated { .. } => Priority::Normal,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (verb, target) = match self {
            Self::Mounted(target) => ("mounted", target),
            Self::Updated { target, .. } => ("updated", target),
            Self::Unmounted(target) => ("unmounted", target),
        };
        match &target.key {
            Some(key) => write!(f, "{verb} {}#{key} at {}", target.kind, target.path),
            None => write!(f, "{verb} {} at {}", target.kind, target.path),
        }
    }
}

// =============================================================================
// Recording
// =============================================================================

/// Collects effects for one `apply`, skipping silent kinds.
pub(crate) struct EffectLog<'a> {
    registry: &'a KindRegistry,
    effects: Vec<Effect>,
}

impl<'a> EffectLog<'a> {
    pub(crate) fn new(registry: &'a KindRegistry) -> Self {
        Self {
            registry,
            effects: Vec::new(),
        }
    }

    /// `Mounted` for a subtree, parent first.
    pub(crate) fn mounted(&mut self, node: &Node, path: &mut Path) {
        self.walk(node, path, Effect::Mounted);
    }

    /// `Unmounted` for a subtree, top-down.
    pub(crate) fn unmounted(&mut self, node: &Node, path: &mut Path) {
        self.walk(node, path, Effect::Unmounted);
    }

    pub(crate) fn updated(&mut self, node: &Node, path: &Path, changed: Vec<PropName>) {
        if !self.registry.is_silent(node.kind()) {
            self.effects.push(Effect::Updated {
                target: EffectTarget::of(node, path),
                changed,
            });
        }
    }

    fn walk(&mut self, node: &Node, path: &mut Path, make: fn(EffectTarget) -> Effect) {
        if !self.registry.is_silent(node.kind()) {
            self.effects.push(make(EffectTarget::of(node, path)));
        }
        let children: &[Arc<Node>] = node.children();
        let keyed = is_fully_keyed(children);
        for (idx, child) in children.iter().enumerate() {
            path.push(step_in_group(children, idx, keyed));
            self.walk(child, path, make);
            path.pop();
        }
    }

    pub(crate) fn finish(self) -> Vec<Effect> {
        self.effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{KindBehavior, PathStep};

    fn card() -> Node {
        Node::new(Kind::Container)
            .with_key("card")
            .child(Node::new(Kind::Text).with_key("title"))
            .child(Node::new(Kind::Button).with_key("ok").child(Node::new(Kind::Text)))
    }

    #[test]
    fn test_mount_order_is_parent_first() {
        let registry = KindRegistry::default();
        let mut log = EffectLog::new(&registry);
        log.mounted(&card(), &mut Path::root().child(PathStep::Key(Key::from("card"))));
        let effects = log.finish();

        let paths: Vec<String> = effects.iter().map(|e| e.target().path.to_string()).collect();
        assert_eq!(paths, vec!["/card", "/card/title", "/card/ok", "/card/ok/#0"]);
        assert!(effects.iter().all(Effect::is_mounted));
    }

    #[test]
    fn test_silent_kinds_are_skipped() {
        let mut registry = KindRegistry::default();
        registry.register(Kind::Text, KindBehavior::silent());
        let mut log = EffectLog::new(&registry);
        log.unmounted(&card(), &mut Path::root());
        log.updated(&Node::new(Kind::Text), &Path::root(), vec![PropName::from("text")]);
        let effects = log.finish();

        assert_eq!(effects.len(), 2);
        assert!(effects.iter().all(|e| e.target().kind != Kind::Text));
    }

    #[test]
    fn test_priority_and_display() {
        let target = EffectTarget {
            key: Some(Key::from("row")),
            kind: Kind::List,
            path: Path::root(),
        };
        let unmount = Effect::Unmounted(target.clone());
        let mount = Effect::Mounted(target);
        assert!(unmount.priority() < mount.priority());
        assert_eq!(mount.to_string(), "mounted list#row at /");
        assert_eq!(unmount.key().map(Key::as_str), Some("row"));
    }
}
