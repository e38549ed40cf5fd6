// ============================================================================
// pulse-signals - Computed
// Lazily memoized derived values
// ============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::flags::{DIRTY, PENDING};
use crate::core::graph::{DerivedSlot, Node, NodeKey};
use crate::core::runtime::{try_with_runtime, with_runtime};
use crate::primitives::watch::Track;
use crate::reactivity::batching::isolate;
use crate::reactivity::scheduling::{check_dirty, update_computed};

// =============================================================================
// TYPED STATE
// =============================================================================

/// The typed half of a computed node: the memoized cache and the getter.
///
/// The cache starts `None` and is filled by the first recompute. The getter
/// receives the previous value so incremental derivations don't need their
/// own shadow state.
pub struct ComputedState<T> {
    value: RefCell<Option<T>>,
    getter: Box<dyn Fn(Option<&T>) -> T>,
}

impl<T: Clone + PartialEq> DerivedSlot for ComputedState<T> {
    fn recompute(&self) -> bool {
        let previous = self.value.borrow().clone();
        let next = (self.getter)(previous.as_ref());
        if previous.as_ref() != Some(&next) {
            *self.value.borrow_mut() = Some(next);
            true
        } else {
            false
        }
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// A derived reactive value, recomputed lazily and memoized.
///
/// Reads inside the getter are tracked automatically; the dependency set is
/// rebuilt on every recompute, so conditional reads subscribe to exactly the
/// branch that executed. Equal recompute results (by `PartialEq`) stop
/// propagation at this node.
pub struct Computed<T> {
    state: Rc<ComputedState<T>>,
    pub(crate) key: NodeKey,
}

/// Create a derived value. The getter is not run until the first read.
///
/// # Example
///
/// ```
/// use pulse_signals::{signal, computed};
///
/// let count = signal(2);
/// let c = count.clone();
/// let doubled = computed(move |_| c.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + PartialEq + 'static,
    F: Fn(Option<&T>) -> T + 'static,
{
    let state = Rc::new(ComputedState {
        value: RefCell::new(None),
        getter: Box::new(getter),
    });
    let key = with_runtime(|rt| rt.nodes.insert(Node::computed(state.clone())));
    Computed { state, key }
}

impl<T: Clone + PartialEq + 'static> Computed<T> {
    /// Read the value, recomputing first if any dependency changed, and
    /// subscribe the active consumer (or the active scope when read during
    /// scope setup).
    pub fn get(&self) -> T {
        self.track();
        match &*self.state.value.borrow() {
            Some(value) => value.clone(),
            // Only reachable when the getter reads its own computed
            None => panic!("computed read its own value during its first computation"),
        }
    }

    /// Read without subscribing anything, neither the active consumer nor
    /// the active scope.
    pub fn peek(&self) -> T {
        isolate(|| self.get())
    }

    /// Read by reference, subscribing the active consumer.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        match &*self.state.value.borrow() {
            Some(value) => f(value),
            None => panic!("computed read its own value during its first computation"),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Track for Computed<T> {
    fn track(&self) {
        let (flags, has_deps) = with_runtime(|rt| match rt.nodes.get(self.key) {
            Some(node) => (node.flags, node.deps.is_some()),
            None => (0, false),
        });

        let mut stale = flags & DIRTY != 0;
        if !stale && flags & PENDING != 0 {
            if has_deps && check_dirty(self.key) {
                stale = true;
            } else {
                // Inputs proved unchanged upstream
                with_runtime(|rt| {
                    if let Some(node) = rt.nodes.get_mut(self.key) {
                        node.flags &= !PENDING;
                    }
                });
            }
        }

        if stale {
            let slot: Rc<dyn DerivedSlot> = self.state.clone();
            if update_computed(self.key, &slot) {
                with_runtime(|rt| {
                    if let Some(head) = rt.nodes.get(self.key).and_then(|n| n.subs) {
                        rt.shallow_propagate(head);
                    }
                });
            }
        }

        with_runtime(|rt| {
            if let Some(sub) = rt.active_sub.or(rt.active_scope) {
                rt.link(self.key, sub);
            }
        });
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            key: self.key,
        }
    }
}

impl<T> Drop for Computed<T> {
    fn drop(&mut self) {
        // Last handle and no subscribers left: release the dependency edges
        // and the arena entry.
        if Rc::strong_count(&self.state) == 2 {
            let key = self.key;
            try_with_runtime(|rt| {
                if rt.nodes.get(key).is_some_and(|n| n.subs.is_none()) {
                    let mut dep = rt.nodes[key].deps;
                    while let Some(link) = dep {
                        dep = rt.unlink(link, key);
                    }
                    rt.discard(key);
                }
            });
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
