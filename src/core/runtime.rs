// ============================================================================
// pulse-signals - Runtime
// Thread-local owner of the graph arenas and the active-context slots
// ============================================================================
//
// The whole engine is single-threaded and synchronous. One Runtime per
// thread owns every node and edge; public handles carry only keys. The
// "active consumer" and "active scope" are single save/restore slots, not a
// stack structure - nested tracked calls save the previous value and put it
// back on the way out (panic included, via guards in the scheduling layer).
// ============================================================================

use std::cell::RefCell;

use slotmap::SlotMap;

use super::graph::{Link, LinkKey, Node, NodeKey};

/// All engine state for one thread.
pub struct Runtime {
    /// Arena of graph nodes.
    pub(crate) nodes: SlotMap<NodeKey, Node>,

    /// Arena of dependency edges.
    pub(crate) links: SlotMap<LinkKey, Link>,

    /// The node currently being tracked (computed recompute / effect run).
    pub(crate) active_sub: Option<NodeKey>,

    /// The innermost effect scope currently being set up.
    pub(crate) active_scope: Option<NodeKey>,

    /// Reentrant batch depth; flush is deferred while nonzero.
    pub(crate) batch_depth: u32,

    /// FIFO queue of effects/scopes awaiting flush.
    pub(crate) queue: Vec<NodeKey>,

    /// Drain position in `queue`; advances monotonically during a flush and
    /// resets to zero when the queue empties.
    pub(crate) notify_index: usize,

    /// Nodes removed from the arena while the runtime is borrowed. Their
    /// callbacks may own signal handles whose Drop re-enters the runtime, so
    /// the actual drop is deferred until the borrow is released.
    pub(crate) graveyard: Vec<Node>,
}

impl Runtime {
    fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            links: SlotMap::with_key(),
            active_sub: None,
            active_scope: None,
            batch_depth: 0,
            queue: Vec::new(),
            notify_index: 0,
            graveyard: Vec::new(),
        }
    }

    /// Remove a node from the arena without dropping it in place.
    pub(crate) fn discard(&mut self, key: NodeKey) {
        if let Some(node) = self.nodes.remove(key) {
            self.graveyard.push(node);
        }
    }
}

thread_local! {
    static RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::new());
}

/// Borrow the thread-local runtime.
///
/// The closure must not run user code (getters, effect callbacks): those
/// re-enter the runtime and would hit the RefCell. The scheduling layer is
/// structured so every user call happens between borrows.
pub(crate) fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
    let (result, garbage) = RUNTIME.with(|rt| {
        let mut rt = rt.borrow_mut();
        let result = f(&mut rt);
        let garbage = std::mem::take(&mut rt.graveyard);
        (result, garbage)
    });
    // Dropped here, after the borrow ends: node teardown may recursively
    // drop handles that call back into the runtime.
    drop(garbage);
    result
}

/// Like [`with_runtime`] but silently does nothing during thread teardown.
/// Used from Drop impls, which may run after the TLS slot is gone.
pub(crate) fn try_with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> Option<R> {
    let out = RUNTIME
        .try_with(|rt| {
            let mut rt = rt.try_borrow_mut().ok()?;
            let result = f(&mut rt);
            let garbage = std::mem::take(&mut rt.graveyard);
            Some((result, garbage))
        })
        .ok()
        .flatten();
    out.map(|(result, garbage)| {
        drop(garbage);
        result
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::NodeKind;

    #[test]
    fn runtime_starts_idle() {
        with_runtime(|rt| {
            assert!(rt.active_sub.is_none());
            assert!(rt.active_scope.is_none());
            assert_eq!(rt.batch_depth, 0);
            assert_eq!(rt.notify_index, 0);
        });
    }

    #[test]
    fn discard_defers_drop_to_graveyard() {
        let key = with_runtime(|rt| rt.nodes.insert(Node::scope()));
        with_runtime(|rt| {
            rt.discard(key);
            assert!(rt.nodes.get(key).is_none());
            // Still parked until the borrow releases
            assert_eq!(rt.graveyard.len(), 1);
        });
        with_runtime(|rt| assert!(rt.graveyard.is_empty()));
    }

    #[test]
    fn stale_keys_resolve_to_none() {
        let key = with_runtime(|rt| rt.nodes.insert(Node::scope()));
        with_runtime(|rt| rt.discard(key));
        with_runtime(|rt| {
            assert!(rt.nodes.get(key).is_none());
            // A fresh insert reuses the slot under a new generation
            let fresh = rt.nodes.insert(Node::scope());
            assert_ne!(fresh, key);
            assert!(matches!(rt.nodes[fresh].kind, NodeKind::Scope));
            rt.discard(fresh);
        });
    }

    #[test]
    fn try_with_runtime_returns_value() {
        assert_eq!(try_with_runtime(|rt| rt.batch_depth), Some(0));
    }
}
