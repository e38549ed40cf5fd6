// ============================================================================
// pulse-signals - Link Management
// Attaching, detaching and rebuilding dependency edges
// ============================================================================
//
// Every operation here is pure graph surgery: no user code ever runs while
// the runtime is borrowed. The one non-obvious part is `link` during a
// tracked re-run (RECURSED_CHECK set): instead of clearing the deps list and
// rebuilding it, the existing list is reused in place by advancing
// `deps_tail` whenever the next recorded dep matches the read. Deps not
// re-touched by the run are unlinked in `end_tracking`.
// ============================================================================

use std::rc::Rc;

use tracing::trace;

use crate::core::flags::{DIRTY, MUTABLE, NONE, PENDING, RECURSED, RECURSED_CHECK};
use crate::core::graph::{Link, LinkKey, NodeKey, NodeKind};
use crate::core::runtime::Runtime;

impl Runtime {
    // =========================================================================
    // LINK
    // =========================================================================

    /// Record that `sub` read `dep`, appending an edge to both adjacency
    /// lists. Idempotent within one tracked execution: a node read twice in
    /// one computation produces a single edge.
    pub(crate) fn link(&mut self, dep: NodeKey, sub: NodeKey) {
        let prev_dep = self.nodes[sub].deps_tail;
        if let Some(pd) = prev_dep {
            if self.links[pd].dep == dep {
                return;
            }
        }

        // During a tracked re-run, try to reuse the old list in place.
        let recursed_check = self.nodes[sub].flags & RECURSED_CHECK != 0;
        let mut next_dep = None;
        if recursed_check {
            next_dep = match prev_dep {
                Some(pd) => self.links[pd].next_dep,
                None => self.nodes[sub].deps,
            };
            if let Some(nd) = next_dep {
                if self.links[nd].dep == dep {
                    self.nodes[sub].deps_tail = Some(nd);
                    return;
                }
            }
        }

        let prev_sub = self.nodes[dep].subs_tail;
        if let Some(ps) = prev_sub {
            if self.links[ps].sub == sub && (!recursed_check || self.is_valid_link(ps, sub)) {
                return;
            }
        }

        let new_link = self.links.insert(Link {
            dep,
            sub,
            prev_dep,
            next_dep,
            prev_sub,
            next_sub: None,
        });
        self.nodes[sub].deps_tail = Some(new_link);
        self.nodes[dep].subs_tail = Some(new_link);

        if let Some(nd) = next_dep {
            self.links[nd].prev_dep = Some(new_link);
        }
        match prev_dep {
            Some(pd) => self.links[pd].next_dep = Some(new_link),
            None => self.nodes[sub].deps = Some(new_link),
        }
        match prev_sub {
            Some(ps) => self.links[ps].next_sub = Some(new_link),
            None => self.nodes[dep].subs = Some(new_link),
        }
    }

    // =========================================================================
    // UNLINK
    // =========================================================================

    /// Detach an edge from both lists in O(1), returning the next edge in
    /// the consumer's deps list so callers can iterate while removing.
    ///
    /// When this was the dep's last subscriber the `unwatched` hook fires.
    pub(crate) fn unlink(&mut self, link: LinkKey, sub: NodeKey) -> Option<LinkKey> {
        let Some(removed) = self.links.remove(link) else {
            return None;
        };
        let Link {
            dep,
            prev_dep,
            next_dep,
            prev_sub,
            next_sub,
            ..
        } = removed;

        match next_dep {
            Some(nd) => self.links[nd].prev_dep = prev_dep,
            None => self.nodes[sub].deps_tail = prev_dep,
        }
        match prev_dep {
            Some(pd) => self.links[pd].next_dep = next_dep,
            None => self.nodes[sub].deps = next_dep,
        }
        match next_sub {
            Some(ns) => self.links[ns].prev_sub = prev_sub,
            None => self.nodes[dep].subs_tail = prev_sub,
        }
        match prev_sub {
            Some(ps) => self.links[ps].next_sub = next_sub,
            None => {
                self.nodes[dep].subs = next_sub;
                if next_sub.is_none() {
                    self.unwatched(dep);
                }
            }
        }

        next_dep
    }

    /// Unlink an edge by itself, resolving the consumer from the link.
    pub(crate) fn unlink_from_sub(&mut self, link: LinkKey) -> Option<LinkKey> {
        let sub = self.links.get(link)?.sub;
        self.unlink(link, sub)
    }

    // =========================================================================
    // TRACKING WINDOW
    // =========================================================================

    /// Open a tracked execution for `sub`: rewind the deps cursor and raise
    /// RECURSED_CHECK so `link` reuses the existing list where possible.
    pub(crate) fn start_tracking(&mut self, sub: NodeKey) {
        let Some(node) = self.nodes.get_mut(sub) else {
            return;
        };
        node.deps_tail = None;
        node.flags = (node.flags & !(RECURSED | DIRTY | PENDING)) | RECURSED_CHECK;
    }

    /// Close a tracked execution: unlink every dep after the cursor (reads
    /// that did not recur this run) and drop RECURSED_CHECK.
    pub(crate) fn end_tracking(&mut self, sub: NodeKey) {
        let Some(node) = self.nodes.get(sub) else {
            return;
        };
        let mut to_remove = match node.deps_tail {
            Some(tail) => self.links[tail].next_dep,
            None => node.deps,
        };
        while let Some(link) = to_remove {
            to_remove = self.unlink(link, sub);
        }
        if let Some(node) = self.nodes.get_mut(sub) {
            node.flags &= !RECURSED_CHECK;
        }
    }

    /// Whether `check` sits in the portion of `sub`'s deps list already
    /// confirmed by the current tracking pass (head through `deps_tail`).
    pub(crate) fn is_valid_link(&self, check: LinkKey, sub: NodeKey) -> bool {
        let Some(tail) = self.nodes[sub].deps_tail else {
            return false;
        };
        let mut link = self.nodes[sub].deps;
        while let Some(l) = link {
            if l == check {
                return true;
            }
            if l == tail {
                break;
            }
            link = self.links[l].next_dep;
        }
        false
    }

    // =========================================================================
    // UNWATCHED / DISPOSAL
    // =========================================================================

    /// A node just lost its last subscriber.
    ///
    /// Computeds reset to dirty and release their own dependency edges so an
    /// orphaned computed holds nothing alive; effects and scopes linked only
    /// through a disposed parent are disposed transitively; signals keep
    /// their value. Arena entries are reclaimed once no external handle
    /// remains either.
    pub(crate) fn unwatched(&mut self, key: NodeKey) {
        enum Action {
            ResetComputed { orphaned: bool },
            ReclaimSignal(bool),
            DisposeChild,
        }

        let action = match self.nodes.get(key) {
            Some(node) => match &node.kind {
                NodeKind::Computed { slot } => Action::ResetComputed {
                    orphaned: Rc::strong_count(slot) == 1,
                },
                NodeKind::Signal { slot } => Action::ReclaimSignal(Rc::strong_count(slot) == 1),
                NodeKind::Effect { .. } | NodeKind::Scope => Action::DisposeChild,
            },
            None => return,
        };

        match action {
            Action::ResetComputed { orphaned } => {
                self.nodes[key].flags = MUTABLE | DIRTY;
                let mut dep = self.nodes[key].deps;
                while let Some(link) = dep {
                    dep = self.unlink(link, key);
                }
                if orphaned {
                    trace!(?key, "reclaiming orphaned computed");
                    self.discard(key);
                }
            }
            Action::ReclaimSignal(orphaned) => {
                if orphaned {
                    trace!(?key, "reclaiming orphaned signal");
                    self.discard(key);
                }
            }
            Action::DisposeChild => self.dispose(key),
        }
    }

    /// Dispose an effect or scope: unlink every dependency edge it holds
    /// (cascading `unwatched` into children for scopes), detach it from its
    /// own subscriber if any, clear flags and reclaim the arena entry.
    pub(crate) fn dispose(&mut self, key: NodeKey) {
        let Some(node) = self.nodes.get(key) else {
            return; // already disposed
        };
        trace!(?key, "disposing node");

        let mut dep = node.deps;
        while let Some(link) = dep {
            dep = self.unlink(link, key);
        }
        if let Some(sub_link) = self.nodes.get(key).and_then(|n| n.subs) {
            self.unlink_from_sub(sub_link);
        }
        if let Some(node) = self.nodes.get_mut(key) {
            node.flags = NONE;
        }
        self.discard(key);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::core::flags::*;
    use crate::core::graph::{DerivedSlot, Node, NodeKey, SourceSlot};
    use crate::core::runtime::with_runtime;
    use std::rc::Rc;

    struct NullSlot;
    impl SourceSlot for NullSlot {
        fn settle(&self) -> bool {
            false
        }
    }
    impl DerivedSlot for NullSlot {
        fn recompute(&self) -> bool {
            false
        }
    }

    // Keeps an external handle alive so `unwatched` never reclaims the node.
    fn scratch_signal() -> (NodeKey, Rc<NullSlot>) {
        let slot = Rc::new(NullSlot);
        let key = with_runtime(|rt| rt.nodes.insert(Node::signal(slot.clone())));
        (key, slot)
    }

    fn scratch_effect() -> NodeKey {
        with_runtime(|rt| rt.nodes.insert(Node::effect(Rc::new(|| {}))))
    }

    fn cleanup(keys: &[NodeKey]) {
        with_runtime(|rt| {
            for &k in keys {
                rt.discard(k);
            }
        });
    }

    fn dep_list(sub: NodeKey) -> Vec<NodeKey> {
        with_runtime(|rt| {
            let mut out = Vec::new();
            let mut link = rt.nodes[sub].deps;
            while let Some(l) = link {
                out.push(rt.links[l].dep);
                link = rt.links[l].next_dep;
            }
            out
        })
    }

    fn sub_list(dep: NodeKey) -> Vec<NodeKey> {
        with_runtime(|rt| {
            let mut out = Vec::new();
            let mut link = rt.nodes[dep].subs;
            while let Some(l) = link {
                out.push(rt.links[l].sub);
                link = rt.links[l].next_sub;
            }
            out
        })
    }

    #[test]
    fn link_appends_to_both_lists() {
        let (a, _sa) = scratch_signal();
        let (b, _sb) = scratch_signal();
        let sub = scratch_effect();

        with_runtime(|rt| {
            rt.link(a, sub);
            rt.link(b, sub);
        });

        assert_eq!(dep_list(sub), vec![a, b]);
        assert_eq!(sub_list(a), vec![sub]);
        assert_eq!(sub_list(b), vec![sub]);
        cleanup(&[a, b, sub]);
    }

    #[test]
    fn link_is_idempotent_at_tail() {
        let (a, _sa) = scratch_signal();
        let sub = scratch_effect();

        with_runtime(|rt| {
            rt.link(a, sub);
            rt.link(a, sub);
            rt.link(a, sub);
        });

        assert_eq!(dep_list(sub), vec![a]);
        assert_eq!(sub_list(a), vec![sub]);
        cleanup(&[a, sub]);
    }

    #[test]
    fn unlink_removes_from_both_sides() {
        let (a, _sa) = scratch_signal();
        let (b, _sb) = scratch_signal();
        let sub = scratch_effect();

        with_runtime(|rt| {
            rt.link(a, sub);
            rt.link(b, sub);
            let first = rt.nodes[sub].deps.unwrap();
            let next = rt.unlink(first, sub);
            // Returns the next dep edge for iterate-while-removing
            assert_eq!(next, rt.nodes[sub].deps);
        });

        assert_eq!(dep_list(sub), vec![b]);
        assert!(sub_list(a).is_empty());
        assert_eq!(sub_list(b), vec![sub]);
        cleanup(&[a, b, sub]);
    }

    #[test]
    fn tracking_reuses_unchanged_deps_in_place() {
        let (a, _sa) = scratch_signal();
        let (b, _sb) = scratch_signal();
        let sub = scratch_effect();

        with_runtime(|rt| {
            rt.link(a, sub);
            rt.link(b, sub);
        });
        let before = with_runtime(|rt| rt.nodes[sub].deps.unwrap());

        // Re-run reading the same deps in the same order: edges survive
        with_runtime(|rt| {
            rt.start_tracking(sub);
            rt.link(a, sub);
            rt.link(b, sub);
            rt.end_tracking(sub);
        });

        assert_eq!(dep_list(sub), vec![a, b]);
        let after = with_runtime(|rt| rt.nodes[sub].deps.unwrap());
        assert_eq!(
            before, after,
            "unchanged edges must be reused, not reallocated"
        );
        cleanup(&[a, b, sub]);
    }

    #[test]
    fn tracking_unlinks_deps_not_retouched() {
        let (a, _sa) = scratch_signal();
        let (b, _sb) = scratch_signal();
        let sub = scratch_effect();

        with_runtime(|rt| {
            rt.link(a, sub);
            rt.link(b, sub);
        });

        // Second run only reads `a`: the edge to `b` must go away
        with_runtime(|rt| {
            rt.start_tracking(sub);
            rt.link(a, sub);
            rt.end_tracking(sub);
        });

        assert_eq!(dep_list(sub), vec![a]);
        assert!(sub_list(b).is_empty());
        cleanup(&[a, b, sub]);
    }

    #[test]
    fn unwatched_resets_computed_and_drops_its_deps() {
        let (sig, _s) = scratch_signal();
        let slot = Rc::new(NullSlot);
        let computed =
            with_runtime(|rt| rt.nodes.insert(Node::computed(slot.clone() as Rc<dyn DerivedSlot>)));
        let sub = scratch_effect();

        with_runtime(|rt| {
            rt.nodes[computed].flags = MUTABLE; // pretend it computed once
            rt.link(sig, computed);
            rt.link(computed, sub);
        });

        // Removing the computed's only subscriber fires `unwatched`
        with_runtime(|rt| {
            let link = rt.nodes[sub].deps.unwrap();
            rt.unlink(link, sub);
        });

        with_runtime(|rt| {
            let node = &rt.nodes[computed];
            assert_eq!(node.flags, MUTABLE | DIRTY);
            assert!(node.deps.is_none(), "orphaned computed must release its deps");
        });
        assert!(sub_list(sig).is_empty());
        cleanup(&[sig, computed, sub]);
    }

    #[test]
    fn dispose_clears_everything() {
        let (a, _sa) = scratch_signal();
        let sub = scratch_effect();

        with_runtime(|rt| {
            rt.link(a, sub);
            rt.dispose(sub);
        });

        assert!(sub_list(a).is_empty());
        with_runtime(|rt| {
            assert!(rt.nodes.get(sub).is_none());
            // Double dispose is a no-op
            rt.dispose(sub);
        });
        cleanup(&[a]);
    }
}
