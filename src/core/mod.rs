// ============================================================================
// pulse-signals - Core Module
// Graph data layout, flag semantics and the thread-local runtime
// ============================================================================

pub mod flags;
pub mod graph;
pub mod runtime;

pub use graph::{DerivedSlot, Link, LinkKey, Node, NodeKey, NodeKind, SourceSlot};
