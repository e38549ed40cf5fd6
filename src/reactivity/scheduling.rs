// ============================================================================
// pulse-signals - Scheduling
// Pull-phase validation, recomputation and the flush cycle
// ============================================================================
//
// This layer is where user code (computed getters, effect callbacks) meets
// the graph. The runtime RefCell must never be held across a user call, so
// every function here alternates between short borrows for graph surgery
// and unborrowed stretches for the callbacks. Save/restore of the active
// consumer is done with RAII guards: a panic in a getter or effect unwinds
// with the tracking slots restored and the tracking window closed.
// ============================================================================

use std::rc::Rc;

use tracing::trace;

use crate::core::flags::{DIRTY, MUTABLE, PENDING, QUEUED};
use crate::core::graph::{DerivedSlot, NodeKey, NodeKind, SourceSlot};
use crate::core::runtime::{try_with_runtime, with_runtime};

// =============================================================================
// TRACKED EXECUTION GUARD
// =============================================================================

/// Swaps the active consumer to `key` and opens its tracking window for the
/// duration of a getter/callback run. Drop restores the previous consumer
/// and closes the window, unlinking deps the run did not re-touch - also on
/// unwind, so a throwing callback can't corrupt the tracking state.
pub(crate) struct TrackedRun {
    key: NodeKey,
    prev: Option<NodeKey>,
}

impl TrackedRun {
    pub(crate) fn enter(key: NodeKey) -> Self {
        let prev = with_runtime(|rt| {
            let prev = rt.active_sub.replace(key);
            rt.start_tracking(key);
            prev
        });
        Self { key, prev }
    }
}

impl Drop for TrackedRun {
    fn drop(&mut self) {
        let panicking = std::thread::panicking();
        try_with_runtime(|rt| {
            rt.active_sub = self.prev;
            rt.end_tracking(self.key);
            if panicking {
                // Leave a failed computed retryable instead of trusting a
                // cache the getter never filled. Effects stay clean so the
                // next write notifies them normally.
                if let Some(node) = rt.nodes.get_mut(self.key) {
                    if matches!(node.kind, NodeKind::Computed { .. }) {
                        node.flags |= DIRTY;
                    }
                }
            }
        });
    }
}

// =============================================================================
// UPDATE - recompute a mutable node in place
// =============================================================================

/// Re-validate a dirty mutable node, returning whether its value actually
/// changed. Signals publish `value` into `previous_value`; computeds re-run
/// their getter inside a fresh tracking window.
pub(crate) fn update_node(key: NodeKey) -> bool {
    enum Job {
        Signal(Rc<dyn SourceSlot>),
        Computed(Rc<dyn DerivedSlot>),
    }

    let job = with_runtime(|rt| match rt.nodes.get(key).map(|n| &n.kind) {
        Some(NodeKind::Signal { slot }) => Some(Job::Signal(slot.clone())),
        Some(NodeKind::Computed { slot }) => Some(Job::Computed(slot.clone())),
        _ => None,
    });

    match job {
        Some(Job::Signal(slot)) => {
            with_runtime(|rt| {
                if let Some(node) = rt.nodes.get_mut(key) {
                    node.flags = MUTABLE;
                }
            });
            slot.settle()
        }
        Some(Job::Computed(slot)) => update_computed(key, &slot),
        None => false,
    }
}

/// Run a computed's getter under tracking and report whether the cached
/// value changed.
pub(crate) fn update_computed(key: NodeKey, slot: &Rc<dyn DerivedSlot>) -> bool {
    let _tracked = TrackedRun::enter(key);
    slot.recompute()
}

// =============================================================================
// CHECK DIRTY - the pull phase
// =============================================================================

/// Walk `sub`'s dependencies and prove or disprove its staleness.
///
/// A dep flagged dirty is settled/recomputed on the spot; a dep flagged
/// pending is recursed into first and only counts as changed if its own
/// recompute produced a different value. When a shared dep did change,
/// `shallow_propagate` re-dirties its other subscribers so the rest of a
/// diamond is not misjudged as clean. Returns true iff some dependency
/// actually changed value; callers clear PENDING themselves on false.
pub(crate) fn check_dirty(sub: NodeKey) -> bool {
    let mut current = with_runtime(|rt| rt.nodes.get(sub).and_then(|n| n.deps));

    while let Some(link) = current {
        // A sibling's recompute may have shallow-propagated us to DIRTY
        // mid-walk; that settles the question.
        let already_dirty =
            with_runtime(|rt| rt.nodes.get(sub).is_some_and(|n| n.flags & DIRTY != 0));
        if already_dirty {
            return true;
        }

        let Some((dep, dep_flags)) = with_runtime(|rt| {
            let l = rt.links.get(link)?;
            Some((l.dep, rt.nodes.get(l.dep)?.flags))
        }) else {
            return false;
        };

        if dep_flags & (MUTABLE | DIRTY) == MUTABLE | DIRTY {
            if update_node(dep) {
                redirty_other_subs(dep);
                return true;
            }
        } else if dep_flags & (MUTABLE | PENDING) == MUTABLE | PENDING {
            if check_dirty(dep) {
                if update_node(dep) {
                    redirty_other_subs(dep);
                    return true;
                }
            } else {
                // Inputs proved unchanged: downgrade without recomputing
                with_runtime(|rt| {
                    if let Some(node) = rt.nodes.get_mut(dep) {
                        node.flags &= !PENDING;
                    }
                });
            }
        }

        // Re-read after user code may have run: the edge could be gone
        current = with_runtime(|rt| rt.links.get(link).and_then(|l| l.next_dep));
    }

    false
}

/// After `dep` recomputed to a genuinely new value, upgrade its *other*
/// pending subscribers to dirty (the caller already knows about itself).
fn redirty_other_subs(dep: NodeKey) {
    with_runtime(|rt| {
        if let Some(head) = rt.nodes.get(dep).and_then(|n| n.subs) {
            if rt.links[head].next_sub.is_some() {
                rt.shallow_propagate(head);
            }
        }
    });
}

// =============================================================================
// RUN - execute one queued effect/scope
// =============================================================================

/// Execute a node popped off the flush queue. `flags` are the node's flags
/// with QUEUED already cleared.
///
/// Stale effects re-run inside a tracking window. Clean-but-pending nodes
/// just drop the flag. Either way a scope (or an effect that did not need to
/// re-run) still walks its deps and runs any child that was independently
/// queued, giving one topological pass instead of re-queuing.
pub(crate) fn run_node(key: NodeKey, flags: u32) {
    let stale = flags & DIRTY != 0
        || (flags & PENDING != 0
            && with_runtime(|rt| rt.nodes.get(key).is_some_and(|n| n.deps.is_some()))
            && check_dirty(key));

    if stale {
        let callback = with_runtime(|rt| match rt.nodes.get(key).map(|n| &n.kind) {
            Some(NodeKind::Effect { callback }) => Some(callback.clone()),
            _ => None,
        });
        if let Some(callback) = callback {
            trace!(?key, "re-running effect");
            let _tracked = TrackedRun::enter(key);
            callback();
            return;
        }
        // A stale scope has nothing to execute; resolve it eagerly and fall
        // through to its children.
        with_runtime(|rt| {
            if let Some(node) = rt.nodes.get_mut(key) {
                node.flags &= !(DIRTY | PENDING);
            }
        });
    } else if flags & PENDING != 0 {
        with_runtime(|rt| {
            if let Some(node) = rt.nodes.get_mut(key) {
                node.flags = flags & !PENDING;
            }
        });
    }

    // Children queued independently run now, in dependency order
    let mut current = with_runtime(|rt| rt.nodes.get(key).and_then(|n| n.deps));
    while let Some(link) = current {
        let queued_child = with_runtime(|rt| {
            let l = rt.links.get(link)?;
            let dep = l.dep;
            let dep_flags = rt.nodes.get(dep)?.flags;
            if dep_flags & QUEUED != 0 {
                rt.nodes[dep].flags = dep_flags & !QUEUED;
                Some((dep, dep_flags & !QUEUED))
            } else {
                None
            }
        });
        if let Some((dep, dep_flags)) = queued_child {
            run_node(dep, dep_flags);
        }
        current = with_runtime(|rt| rt.links.get(link).and_then(|l| l.next_dep));
    }
}

// =============================================================================
// FLUSH
// =============================================================================

/// Drain the effect queue in FIFO order. The drain index advances
/// monotonically so entries appended by effects running mid-flush are picked
/// up in the same pass; both reset once the queue empties.
pub(crate) fn flush() {
    loop {
        let next = with_runtime(|rt| {
            if rt.notify_index < rt.queue.len() {
                let key = rt.queue[rt.notify_index];
                rt.notify_index += 1;
                match rt.nodes.get_mut(key) {
                    Some(node) => {
                        let flags = node.flags & !QUEUED;
                        node.flags = flags;
                        Some(Some((key, flags)))
                    }
                    // Disposed while queued: deterministically skipped
                    None => Some(None),
                }
            } else {
                rt.queue.clear();
                rt.notify_index = 0;
                None
            }
        });

        match next {
            Some(Some((key, flags))) => run_node(key, flags),
            Some(None) => continue,
            None => break,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
//
// The propagation/validation algorithms are exercised end-to-end through
// the primitives (see those modules and tests/); covered here is the queue
// bookkeeping that is awkward to reach from the public API.
// =============================================================================
