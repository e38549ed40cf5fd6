// ============================================================================
// pulse-signals - Reactivity Module
// Edge maintenance, push propagation, pull validation, batching
// ============================================================================

pub mod batching;
pub(crate) mod linking;
pub(crate) mod propagate;
pub(crate) mod scheduling;

pub use batching::{batch, end_batch, is_batching, start_batch, untrack};
