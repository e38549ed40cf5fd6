// ============================================================================
// pulse-signals - A Fine-Grained Reactive Dependency Engine for Rust
// ============================================================================
//
// Signals, computeds, effects and effect scopes with push-pull change
// propagation: writes push a cheap staleness wave through the graph, reads
// pull and recompute only what actually changed, and every dependent runs at
// most once per update even through diamond-shaped graphs.
// ============================================================================

pub mod core;
pub mod primitives;
pub mod reactivity;

// Re-export the public surface at the crate root
pub use primitives::computed::{computed, Computed};
pub use primitives::effect::{effect, DisposeFn};
pub use primitives::scope::effect_scope;
pub use primitives::signal::{signal, Signal};
pub use primitives::watch::{watch, Track};
pub use primitives::{is_computed, is_signal};
pub use reactivity::batching::{batch, end_batch, is_batching, start_batch, untrack};

// =============================================================================
// TESTS
// =============================================================================
