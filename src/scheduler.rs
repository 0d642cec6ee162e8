//! Effect scheduler.
//!
//! Effects from each applied batch are queued as one pass and delivered only
//! after `apply` has returned. A handler that wants another render files a
//! request through its [`EffectContext`]; the request runs on the next
//! [`EffectScheduler::tick`], never inside the current drain.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::effect::Effect;
use crate::error::VdomResult;
use crate::node::Node;
use crate::pool::PatchAllocator;
use crate::reconciler::Reconciler;
use crate::tree::Tree;

type Request = (Arc<Tree>, Option<Node>);

/// What one [`EffectScheduler::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Deferred requests reconciled at the start of the tick
    pub reconciled: usize,
    /// Effects handed to the handler
    pub effects_run: usize,
    /// Requests filed by handlers, waiting for the next tick
    pub deferred: usize,
}

/// Handle given to effect handlers.
pub struct EffectContext<'s> {
    requests: &'s mut VecDeque<Request>,
}

impl EffectContext<'_> {
    /// Ask for `tree` to be reconciled against `root` on the next tick.
    pub fn request(&mut self, tree: Arc<Tree>, root: Option<Node>) {
        self.requests.push_back((tree, root));
    }
}

/// FIFO queue of effect passes plus deferred render requests.
#[derive(Debug, Default)]
pub struct EffectScheduler {
    passes: VecDeque<Vec<Effect>>,
    deferred: VecDeque<Request>,
}

impl EffectScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the effects of one applied batch as a pass.
    ///
    /// Unmounts move to the front of the pass; the sort is stable, so order
    /// within each priority lane is kept.
    pub fn enqueue(&mut self, mut effects: Vec<Effect>) {
        if effects.is_empty() {
            return;
        }
        effects.sort_by_key(Effect::priority);
        self.passes.push_back(effects);
    }

    /// Take every queued effect, oldest pass first.
    pub fn drain(&mut self) -> Vec<Effect> {
        self.passes.drain(..).flatten().collect()
    }

    /// Run one scheduler step.
    ///
    /// 1. Reconcile the requests deferred by the previous tick, queueing
    ///    their effects
    /// 2. Drain every queued effect into `handler`
    ///
    /// Requests filed by `handler` wait for the next tick. If a deferred
    /// request fails, that request is dropped, the rest stay queued and the
    /// error is returned.
    pub fn tick<A, H>(&mut self, reconciler: &Reconciler<A>, mut handler: H) -> VdomResult<TickReport>
    where
        A: PatchAllocator,
        H: FnMut(&Effect, &mut EffectContext<'_>),
    {
        let mut report = TickReport::default();

        for _ in 0..self.deferred.len() {
            let Some((tree, root)) = self.deferred.pop_front() else {
                break;
            };
            let applied = reconciler.reconcile_and_apply(&tree, root)?;
            self.enqueue(applied.effects);
            report.reconciled += 1;
        }

        let effects = self.drain();
        let mut ctx = EffectContext {
            requests: &mut self.deferred,
        };
        for effect in &effects {
            handler(effect, &mut ctx);
        }
        report.effects_run = effects.len();
        report.deferred = self.deferred.len();

        log::trace!(
            "tick: {} reconciled, {} effects, {} deferred",
            report.reconciled,
            report.effects_run,
            report.deferred
        );
        Ok(report)
    }

    /// No queued effects and no deferred requests.
    pub fn is_idle(&self) -> bool {
        self.passes.is_empty() && self.deferred.is_empty()
    }

    pub fn pending_effects(&self) -> usize {
        self.passes.iter().map(Vec::len).sum()
    }

    pub fn pending_requests(&self) -> usize {
        self.deferred.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::EffectTarget;
    use crate::node::{Key, Kind, Path};
    use crate::reconciler::ReconcilerConfig;
    use crate::tree::create_tree;

    fn target(key: &str) -> EffectTarget {
        EffectTarget {
            key: Some(Key::from(key)),
            kind: Kind::Text,
            path: Path::root(),
        }
    }

    fn keys(effects: &[Effect]) -> Vec<String> {
        effects.iter().filter_map(|e| e.key()).map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_drain_order() {
        let mut scheduler = EffectScheduler::new();
        scheduler.enqueue(vec![
            Effect::Mounted(target("m1")),
            Effect::Unmounted(target("u1")),
            Effect::Updated {
                target: target("p1"),
                changed: Vec::new(),
            },
            Effect::Unmounted(target("u2")),
        ]);
        scheduler.enqueue(Vec::new());
        scheduler.enqueue(vec![Effect::Mounted(target("m2")), Effect::Unmounted(target("u3"))]);
        assert_eq!(scheduler.pending_effects(), 6);

        let effects = scheduler.drain();
        assert_eq!(keys(&effects), vec!["u1", "u2", "m1", "p1", "u3", "m2"]);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_tick_delivers_effects_after_apply() {
        let reconciler = Reconciler::serialized(ReconcilerConfig::default());
        let tree = create_tree(Node::new(Kind::Root)).unwrap();
        let mut scheduler = EffectScheduler::new();

        let applied = reconciler
            .reconcile_and_apply(&tree, Some(Node::new(Kind::Root).child(Node::new(Kind::Text).with_key("t"))))
            .unwrap();
        scheduler.enqueue(applied.effects);

        let mut seen = Vec::new();
        let report = scheduler
            .tick(&reconciler, |effect, _| {
                // the tree is unlocked and already patched here
                assert_eq!(tree.version(), 1);
                seen.push(effect.to_string());
            })
            .unwrap();
        assert_eq!(seen, vec!["mounted text#t at /t"]);
        assert_eq!(report, TickReport { reconciled: 0, effects_run: 1, deferred: 0 });
    }

    #[test]
    fn test_requests_from_handlers_are_deferred() {
        let reconciler = Reconciler::serialized(ReconcilerConfig::default());
        let tree = Arc::new(create_tree(Node::new(Kind::Root)).unwrap());
        let mut scheduler = EffectScheduler::new();

        // Every mount asks for one more child: without deferral this would never end
        let grow = |tree: &Tree| {
            let count = tree.root().map_or(0, |r| r.children().len());
            Node::new(Kind::Root).with_children((0..=count).map(|i| Node::new(Kind::Text).with_key(format!("c{i}"))))
        };
        let applied = reconciler.reconcile_and_apply(&tree, Some(grow(&tree))).unwrap();
        scheduler.enqueue(applied.effects);

        for round in 1..=3 {
            let report = scheduler
                .tick(&reconciler, |effect, ctx| {
                    if effect.is_mounted() && effect.key().is_some() {
                        ctx.request(Arc::clone(&tree), Some(grow(&tree)));
                    }
                })
                .unwrap();
            assert_eq!(report.effects_run, 1);
            assert_eq!(report.deferred, 1);
            assert_eq!(report.reconciled, usize::from(round > 1));
            assert_eq!(tree.root().map(|r| r.children().len()), Some(round));
        }
        assert_eq!(scheduler.pending_requests(), 1);
        assert!(!scheduler.is_idle());
    }

    #[test]
    fn test_failed_request_is_reported() {
        let reconciler = Reconciler::default();
        let tree = Arc::new(create_tree(Node::new(Kind::Root)).unwrap());
        let mut scheduler = EffectScheduler::new();
        scheduler.enqueue(vec![Effect::Mounted(target("x"))]);

        scheduler
            .tick(&reconciler, |_, ctx| {
                let dup = Node::new(Kind::Root)
                    .child(Node::new(Kind::Text).with_key("k"))
                    .child(Node::new(Kind::Text).with_key("k"));
                ctx.request(Arc::clone(&tree), Some(dup));
                ctx.request(Arc::clone(&tree), None);
            })
            .unwrap();
        assert_eq!(scheduler.pending_requests(), 2);

        assert!(scheduler.tick(&reconciler, |_, _| {}).is_err());
        assert_eq!(scheduler.pending_requests(), 1);
        let report = scheduler.tick(&reconciler, |_, _| {}).unwrap();
        assert_eq!(report.reconciled, 1);
        assert!(tree.root().is_none());
    }
}
