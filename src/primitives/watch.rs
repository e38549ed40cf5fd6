// ============================================================================
// pulse-signals - Watch
// Change-only observation of a single source
// ============================================================================

use std::cell::Cell;

use super::effect::{effect, DisposeFn};

/// Register the receiver as a dependency of the active consumer without
/// materializing its value. Implemented by [`Signal`] and [`Computed`];
/// this is the subscription half of `get()` on its own.
///
/// [`Signal`]: crate::Signal
/// [`Computed`]: crate::Computed
pub trait Track {
    fn track(&self);
}

/// Observe `source` and run `callback` on every change, skipping the
/// initial run that a plain [`effect`] would make.
///
/// # Example
///
/// ```
/// use pulse_signals::{signal, watch};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = signal(0);
/// let fired = Rc::new(Cell::new(0));
///
/// let counter = fired.clone();
/// let _dispose = watch(&count, move || counter.set(counter.get() + 1));
/// assert_eq!(fired.get(), 0); // not called on setup
///
/// count.set(1);
/// assert_eq!(fired.get(), 1);
/// count.set(1);
/// assert_eq!(fired.get(), 1); // equal write, no change
/// ```
pub fn watch<S, F>(source: &S, callback: F) -> DisposeFn
where
    S: Track + Clone + 'static,
    F: Fn() + 'static,
{
    let source = source.clone();
    let first = Cell::new(true);
    effect(move || {
        source.track();
        if first.replace(false) {
            return;
        }
        callback();
    })
}

// =============================================================================
// TESTS
// =============================================================================
