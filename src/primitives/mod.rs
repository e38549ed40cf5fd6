// ============================================================================
// pulse-signals - Primitives Module
// The public node kinds: signal, computed, effect, scope, watch
// ============================================================================

pub mod computed;
pub mod effect;
pub mod scope;
pub mod signal;
pub mod watch;

pub use computed::{computed, Computed};
pub use effect::{effect, DisposeFn};
pub use scope::effect_scope;
pub use signal::{signal, Signal};
pub use watch::{watch, Track};

use std::any::Any;

/// Whether `value` is a [`Signal<T>`] handle.
pub fn is_signal<T: 'static>(value: &dyn Any) -> bool {
    value.is::<Signal<T>>()
}

/// Whether `value` is a [`Computed<T>`] handle.
pub fn is_computed<T: 'static>(value: &dyn Any) -> bool {
    value.is::<Computed<T>>()
}
