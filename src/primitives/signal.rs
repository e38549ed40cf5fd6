// ============================================================================
// pulse-signals - Signal
// The writable source cell
// ============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::core::flags::{DIRTY, MUTABLE};
use crate::core::graph::{Node, NodeKey, SourceSlot};
use crate::core::runtime::{try_with_runtime, with_runtime};
use crate::primitives::watch::Track;
use crate::reactivity::batching::isolate;
use crate::reactivity::scheduling::{flush, update_node};

// =============================================================================
// TYPED STATE
// =============================================================================

/// The typed half of a signal node, shared between the graph arena and every
/// handle clone.
///
/// `value` is what writes store and reads return. `previous` is the last
/// value the graph has acknowledged: the pull phase publishes `value` into it
/// and the comparison outcome is what decides whether dependents recompute.
pub struct SignalState<T> {
    value: RefCell<T>,
    previous: RefCell<T>,
}

impl<T: Clone + PartialEq> SourceSlot for SignalState<T> {
    fn settle(&self) -> bool {
        let current = self.value.borrow().clone();
        let mut previous = self.previous.borrow_mut();
        if *previous != current {
            *previous = current;
            true
        } else {
            false
        }
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// A writable reactive cell.
///
/// Cloning a `Signal` clones the handle, not the value: all clones address
/// the same graph node. The node stays alive as long as any handle or any
/// subscriber remains; when both are gone its arena entry is reclaimed.
pub struct Signal<T> {
    state: Rc<SignalState<T>>,
    pub(crate) key: NodeKey,
}

/// Create a writable reactive cell.
///
/// # Example
///
/// ```
/// use pulse_signals::signal;
///
/// let count = signal(1);
/// assert_eq!(count.get(), 1);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub fn signal<T: Clone + PartialEq + 'static>(initial: T) -> Signal<T> {
    let state = Rc::new(SignalState {
        value: RefCell::new(initial.clone()),
        previous: RefCell::new(initial),
    });
    let key = with_runtime(|rt| rt.nodes.insert(Node::signal(state.clone())));
    Signal { state, key }
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
    /// Read the current value, subscribing the active consumer.
    pub fn get(&self) -> T {
        self.track();
        self.state.value.borrow().clone()
    }

    /// Read the current value without subscribing.
    pub fn peek(&self) -> T {
        isolate(|| self.get())
    }

    /// Read by reference, subscribing the active consumer. Avoids the clone
    /// for large values.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.state.value.borrow())
    }

    /// Write a new value. Equal values (by `PartialEq`) are a no-op: no
    /// propagation, no effect runs. Otherwise dependents are notified and,
    /// outside a batch, effects flush before this returns.
    pub fn set(&self, value: T) {
        if *self.state.value.borrow() == value {
            return;
        }
        *self.state.value.borrow_mut() = value;
        trace!(key = ?self.key, "signal write");

        let flush_now = with_runtime(|rt| {
            let head = rt.nodes.get_mut(self.key).and_then(|node| {
                node.flags = MUTABLE | DIRTY;
                node.subs
            });
            if let Some(head) = head {
                rt.propagate(head);
            }
            rt.batch_depth == 0
        });
        if flush_now {
            flush();
        }
    }

    /// Derive the next value from the current one. Routes through [`set`],
    /// so returning an equal value is still a no-op.
    ///
    /// [`set`]: Signal::set
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.state.value.borrow());
        self.set(next);
    }
}

impl<T: Clone + PartialEq + 'static> Track for Signal<T> {
    fn track(&self) {
        let dirty =
            with_runtime(|rt| rt.nodes.get(self.key).is_some_and(|n| n.flags & DIRTY != 0));
        if dirty && update_node(self.key) {
            with_runtime(|rt| {
                if let Some(head) = rt.nodes.get(self.key).and_then(|n| n.subs) {
                    rt.shallow_propagate(head);
                }
            });
        }
        with_runtime(|rt| {
            if let Some(sub) = rt.active_sub {
                rt.link(self.key, sub);
            }
        });
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            key: self.key,
        }
    }
}

impl<T> Drop for Signal<T> {
    fn drop(&mut self) {
        // Last handle: the node's own Rc is the only other owner. Reclaim
        // the arena entry unless subscribers still read through the graph.
        if Rc::strong_count(&self.state) == 2 {
            let key = self.key;
            try_with_runtime(|rt| {
                if rt.nodes.get(key).is_some_and(|n| n.subs.is_none()) {
                    rt.discard(key);
                }
            });
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
