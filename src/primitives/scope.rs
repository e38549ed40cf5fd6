// ============================================================================
// pulse-signals - Effect Scope
// Lifetime containers that collect and dispose effects together
// ============================================================================

use tracing::trace;

use crate::core::graph::{Node, NodeKey};
use crate::core::runtime::{try_with_runtime, with_runtime};

use super::effect::DisposeFn;

/// Restores the active consumer and active scope on the way out of a scope
/// body, panic included.
struct ScopeGuard {
    prev_sub: Option<NodeKey>,
    prev_scope: Option<NodeKey>,
}

impl ScopeGuard {
    fn enter(key: NodeKey) -> Self {
        with_runtime(|rt| Self {
            // Effects created in the body belong to the scope, not to
            // whatever tracked computation happens to surround it
            prev_sub: rt.active_sub.take(),
            prev_scope: rt.active_scope.replace(key),
        })
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let (prev_sub, prev_scope) = (self.prev_sub, self.prev_scope);
        try_with_runtime(|rt| {
            rt.active_sub = prev_sub;
            rt.active_scope = prev_scope;
        });
    }
}

/// Run `setup` with this scope active: every effect, watch and nested scope
/// created inside is owned by it and torn down when the returned disposer is
/// called. Scopes nest; disposing a parent cascades through children.
///
/// # Example
///
/// ```
/// use pulse_signals::{signal, effect, effect_scope};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = signal(0);
/// let runs = Rc::new(Cell::new(0));
///
/// let (src, counter) = (count.clone(), runs.clone());
/// let dispose = effect_scope(move || {
///     effect(move || {
///         let _ = src.get();
///         counter.set(counter.get() + 1);
///     });
/// });
/// assert_eq!(runs.get(), 1);
///
/// count.set(1);
/// assert_eq!(runs.get(), 2);
///
/// dispose();
/// count.set(2);
/// assert_eq!(runs.get(), 2); // everything inside stopped
/// ```
pub fn effect_scope(setup: impl FnOnce()) -> DisposeFn {
    let key = with_runtime(|rt| {
        let key = rt.nodes.insert(Node::scope());
        if let Some(parent) = rt.active_scope {
            rt.link(key, parent);
        }
        key
    });
    trace!(?key, "scope created");

    {
        let _guard = ScopeGuard::enter(key);
        setup();
    }

    Box::new(move || with_runtime(|rt| rt.dispose(key)))
}

// =============================================================================
// TESTS
// =============================================================================
