// ============================================================================
// pulse-signals - Effect
// Side-effecting subscribers
// ============================================================================

use std::rc::Rc;

use tracing::trace;

use crate::core::graph::Node;
use crate::core::runtime::with_runtime;
use crate::reactivity::scheduling::TrackedRun;

/// Tears down the effect or scope it was returned for. Calling it twice is
/// harmless.
pub type DisposeFn = Box<dyn FnOnce()>;

/// Run `callback` once immediately, tracking every signal and computed it
/// reads, then re-run it whenever any of them changes.
///
/// Created inside another effect or a scope, the effect is owned by that
/// parent and torn down with it; the returned disposer also works on its
/// own.
///
/// # Example
///
/// ```
/// use pulse_signals::{signal, effect};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = signal(0);
/// let seen = Rc::new(Cell::new(-1));
///
/// let (src, sink) = (count.clone(), seen.clone());
/// let dispose = effect(move || sink.set(src.get()));
/// assert_eq!(seen.get(), 0); // ran eagerly
///
/// count.set(7);
/// assert_eq!(seen.get(), 7);
///
/// dispose();
/// count.set(99);
/// assert_eq!(seen.get(), 7); // no longer listening
/// ```
pub fn effect(callback: impl Fn() + 'static) -> DisposeFn {
    let callback: Rc<dyn Fn()> = Rc::new(callback);
    let key = with_runtime(|rt| {
        let key = rt.nodes.insert(Node::effect(callback.clone()));
        if let Some(parent) = rt.active_sub.or(rt.active_scope) {
            rt.link(key, parent);
        }
        key
    });
    trace!(?key, "effect created");

    {
        let _tracked = TrackedRun::enter(key);
        callback();
    }

    Box::new(move || with_runtime(|rt| rt.dispose(key)))
}

// =============================================================================
// TESTS
// =============================================================================
