// ============================================================================
// pulse-signals - Batching & Untracked Reads
// Deferring effect flushes and suspending dependency collection
// ============================================================================

use crate::core::graph::NodeKey;
use crate::core::runtime::with_runtime;
use crate::reactivity::scheduling::flush;

// =============================================================================
// BATCHING
// =============================================================================

/// Open a batch window. Writes still propagate and queue effects, but the
/// flush is deferred until the matching [`end_batch`]. Nests: only the
/// outermost `end_batch` flushes.
///
/// Prefer [`batch`], which pairs the calls for you and survives panics.
pub fn start_batch() {
    with_runtime(|rt| rt.batch_depth += 1);
}

/// Close a batch window. When this closes the outermost window, every
/// effect queued since [`start_batch`] runs once, seeing final values.
pub fn end_batch() {
    let drained = with_runtime(|rt| {
        rt.batch_depth = rt.batch_depth.saturating_sub(1);
        rt.batch_depth == 0
    });
    if drained {
        flush();
    }
}

/// Whether a batch window is currently open on this thread.
pub fn is_batching() -> bool {
    with_runtime(|rt| rt.batch_depth > 0)
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        end_batch();
    }
}

/// Run `f` inside a batch window: any number of writes, one flush at the
/// end. Effects observe only the final state of each signal.
///
/// # Example
///
/// ```
/// use pulse_signals::{signal, effect, batch};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let first = signal("Ada".to_string());
/// let last = signal("Lovelace".to_string());
///
/// let runs = Rc::new(Cell::new(0));
/// let counter = runs.clone();
/// let f = first.clone();
/// let l = last.clone();
/// let _dispose = effect(move || {
///     let _full = format!("{} {}", f.get(), l.get());
///     counter.set(counter.get() + 1);
/// });
/// assert_eq!(runs.get(), 1);
///
/// batch(|| {
///     first.set("Grace".to_string());
///     last.set("Hopper".to_string());
/// });
/// assert_eq!(runs.get(), 2); // one re-run for two writes
/// ```
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    start_batch();
    let _guard = BatchGuard;
    f()
}

// =============================================================================
// UNTRACKED READS
// =============================================================================

struct UntrackGuard {
    prev: Option<NodeKey>,
}

impl Drop for UntrackGuard {
    fn drop(&mut self) {
        let prev = self.prev;
        with_runtime(|rt| rt.active_sub = prev);
    }
}

/// Run `f` with dependency collection suspended: reads inside do not
/// subscribe the surrounding effect or computed.
///
/// # Example
///
/// ```
/// use pulse_signals::{signal, effect, untrack};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let tracked = signal(0);
/// let ignored = signal(0);
///
/// let runs = Rc::new(Cell::new(0));
/// let counter = runs.clone();
/// let t = tracked.clone();
/// let i = ignored.clone();
/// let _dispose = effect(move || {
///     let _ = t.get();
///     let _ = untrack(|| i.get());
///     counter.set(counter.get() + 1);
/// });
///
/// ignored.set(99);
/// assert_eq!(runs.get(), 1); // untracked read, no re-run
///
/// tracked.set(1);
/// assert_eq!(runs.get(), 2);
/// ```
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let prev = with_runtime(|rt| rt.active_sub.take());
    let _guard = UntrackGuard { prev };
    f()
}

struct IsolateGuard {
    prev_sub: Option<NodeKey>,
    prev_scope: Option<NodeKey>,
}

impl Drop for IsolateGuard {
    fn drop(&mut self) {
        let (prev_sub, prev_scope) = (self.prev_sub, self.prev_scope);
        with_runtime(|rt| {
            rt.active_sub = prev_sub;
            rt.active_scope = prev_scope;
        });
    }
}

/// Run `f` with both the active consumer and the active scope suspended.
/// Backs `peek`: unlike [`untrack`], reads inside create no edge at all,
/// not even the scope edge a computed would otherwise take during scope
/// setup.
pub(crate) fn isolate<R>(f: impl FnOnce() -> R) -> R {
    let (prev_sub, prev_scope) =
        with_runtime(|rt| (rt.active_sub.take(), rt.active_scope.take()));
    let _guard = IsolateGuard {
        prev_sub,
        prev_scope,
    };
    f()
}

// =============================================================================
// TESTS
// =============================================================================
