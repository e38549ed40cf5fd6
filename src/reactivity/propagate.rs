// ============================================================================
// pulse-signals - Push Propagation
// Walking subscriber edges after a write, marking and queueing dependents
// ============================================================================
//
// `propagate` is the push half of the two-phase dirty algorithm: it tags
// downstream nodes PENDING ("an upstream changed, staleness unproven") and
// queues watching nodes, but never recomputes anything. The pull half
// (`check_dirty`, in scheduling) proves or disproves staleness lazily.
//
// The RECURSED / RECURSED_CHECK bits stop the walk from revisiting a node
// already tagged in this pass, which is what keeps diamonds linear and
// cycles bounded instead of exponential.
// ============================================================================

use crate::core::flags::{
    DIRTY, MUTABLE, PENDING, QUEUED, RECURSED, RECURSED_CHECK, WATCHING,
};
use crate::core::graph::{LinkKey, NodeKey};
use crate::core::runtime::Runtime;

impl Runtime {
    // =========================================================================
    // PROPAGATE
    // =========================================================================

    /// Push notification along a subs list after a source turned dirty.
    ///
    /// Breadth over the direct subscribers, depth into each subscriber's own
    /// subscribers. Recursion depth is bounded by the height of the graph.
    pub(crate) fn propagate(&mut self, head: LinkKey) {
        let mut current = Some(head);
        while let Some(link) = current {
            let sub = self.links[link].sub;
            let next_sub = self.links[link].next_sub;

            let mut flags = self.nodes[sub].flags;
            if flags & (MUTABLE | WATCHING) != 0 {
                if flags & (RECURSED_CHECK | RECURSED | DIRTY | PENDING) == 0 {
                    // First visit this pass
                    self.nodes[sub].flags = flags | PENDING;
                } else if flags & (RECURSED_CHECK | RECURSED) == 0 {
                    // Already tagged by this pass; nothing more to do
                    flags = 0;
                } else if flags & RECURSED_CHECK == 0 {
                    // Tagged by an earlier pass; re-tag for this one
                    self.nodes[sub].flags = (flags & !RECURSED) | PENDING;
                } else if flags & (DIRTY | PENDING) == 0 && self.is_valid_link(link, sub) {
                    // Read mid-re-run through an already-confirmed edge:
                    // mark, but only descend, never notify
                    self.nodes[sub].flags = flags | RECURSED | PENDING;
                    flags &= MUTABLE;
                } else {
                    flags = 0;
                }

                if flags & WATCHING != 0 {
                    self.enqueue(sub);
                }
                if flags & MUTABLE != 0 {
                    if let Some(sub_subs) = self.nodes[sub].subs {
                        self.propagate(sub_subs);
                    }
                }
            }

            current = next_sub;
        }
    }

    // =========================================================================
    // SHALLOW PROPAGATE
    // =========================================================================

    /// One-level re-dirty of direct subscribers after a recompute proved a
    /// value actually changed: anything merely PENDING is upgraded to DIRTY
    /// so sibling consumers in a diamond don't skip it as unchanged.
    pub(crate) fn shallow_propagate(&mut self, head: LinkKey) {
        let mut current = Some(head);
        while let Some(link) = current {
            let sub = self.links[link].sub;
            let next_sub = self.links[link].next_sub;

            let flags = self.nodes[sub].flags;
            if flags & (PENDING | DIRTY) == PENDING {
                self.nodes[sub].flags = flags | DIRTY;
                if flags & WATCHING != 0 {
                    self.enqueue(sub);
                }
            }

            current = next_sub;
        }
    }

    // =========================================================================
    // ENQUEUE (notify)
    // =========================================================================

    /// Queue a watching node for the next flush. A node that itself has a
    /// subscriber (an effect nested inside an effect or scope) forwards the
    /// queue entry to its outermost ancestor so the flush pass runs
    /// top-down, each node once.
    pub(crate) fn enqueue(&mut self, node: NodeKey) {
        let flags = self.nodes[node].flags;
        if flags & QUEUED == 0 {
            self.nodes[node].flags = flags | QUEUED;
            match self.nodes[node].subs {
                Some(subs_head) => {
                    let parent = self.links[subs_head].sub;
                    self.enqueue(parent);
                }
                None => self.queue.push(node),
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
