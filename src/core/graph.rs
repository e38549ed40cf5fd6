// ============================================================================
// pulse-signals - Graph Primitives
// Node and edge layout for the reactive dependency graph
// ============================================================================
//
// The graph is a cyclic mutable structure, so nodes and edges live in
// generational arenas (slotmap) and refer to each other by key, never by
// reference. An edge ("link") is one object stored simultaneously in the
// source's subs list and the consumer's deps list, which is what makes
// two-sided removal O(1).
//
// Value storage stays typed: each signal/computed node carries an Rc to its
// `SignalState<T>` / `ComputedState<T>`, erased behind a small trait so that
// the graph algorithms never need to know `T`. Handles share the same Rc,
// which doubles as the external reference count for self-collection.
// ============================================================================

use std::rc::Rc;

use slotmap::new_key_type;

use super::flags::{DIRTY, MUTABLE, NONE, WATCHING};

new_key_type! {
    /// Key of a node in the graph arena.
    pub struct NodeKey;

    /// Key of a dependency/subscriber edge in the link arena.
    pub struct LinkKey;
}

// =============================================================================
// LINK
// =============================================================================

/// A dependency edge between a source node (`dep`) and a consumer (`sub`).
///
/// The same link participates in two doubly-linked lists: the consumer's
/// deps list (`prev_dep`/`next_dep`) and the source's subs list
/// (`prev_sub`/`next_sub`).
#[derive(Clone, Copy)]
pub struct Link {
    pub dep: NodeKey,
    pub sub: NodeKey,
    pub prev_dep: Option<LinkKey>,
    pub next_dep: Option<LinkKey>,
    pub prev_sub: Option<LinkKey>,
    pub next_sub: Option<LinkKey>,
}

// =============================================================================
// NODE
// =============================================================================

/// One vertex of the reactive graph.
///
/// `deps` is the list of edges to sources this node reads from (always empty
/// for signals), `subs` the list of edges to consumers reading this node.
/// Tail pointers give O(1) append during tracking.
pub struct Node {
    pub flags: u32,
    pub deps: Option<LinkKey>,
    pub deps_tail: Option<LinkKey>,
    pub subs: Option<LinkKey>,
    pub subs_tail: Option<LinkKey>,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(flags: u32, kind: NodeKind) -> Self {
        Self {
            flags,
            deps: None,
            deps_tail: None,
            subs: None,
            subs_tail: None,
            kind,
        }
    }

    pub fn signal(slot: Rc<dyn SourceSlot>) -> Self {
        Self::new(MUTABLE, NodeKind::Signal { slot })
    }

    /// Computeds start dirty: never computed.
    pub fn computed(slot: Rc<dyn DerivedSlot>) -> Self {
        Self::new(MUTABLE | DIRTY, NodeKind::Computed { slot })
    }

    pub fn effect(callback: Rc<dyn Fn()>) -> Self {
        Self::new(WATCHING, NodeKind::Effect { callback })
    }

    pub fn scope() -> Self {
        Self::new(NONE, NodeKind::Scope)
    }
}

/// What a node *is*. The propagation and flush algorithms dispatch on this
/// tag exhaustively; the flag bits and list-membership rules differ per kind.
pub enum NodeKind {
    Signal { slot: Rc<dyn SourceSlot> },
    Computed { slot: Rc<dyn DerivedSlot> },
    Effect { callback: Rc<dyn Fn()> },
    Scope,
}

// =============================================================================
// TYPE-ERASED VALUE SLOTS
// =============================================================================

/// Erased view of a signal's typed state.
///
/// The graph only ever needs one operation from a signal during the pull
/// phase: publish `value` into `previous_value` and report whether the
/// published value actually changed.
pub trait SourceSlot {
    /// `previous_value = value`; returns true if they differed.
    fn settle(&self) -> bool;
}

/// Erased view of a computed's typed state.
pub trait DerivedSlot {
    /// Run the getter against the previous value, store the result and
    /// report whether it differed. The caller is responsible for the
    /// tracking context; this only does the typed work.
    fn recompute(&self) -> bool;
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeSlot {
        changed: bool,
    }

    impl SourceSlot for FakeSlot {
        fn settle(&self) -> bool {
            self.changed
        }
    }

    impl DerivedSlot for FakeSlot {
        fn recompute(&self) -> bool {
            self.changed
        }
    }

    #[test]
    fn node_constructors_set_kind_flags() {
        let slot = Rc::new(FakeSlot { changed: false });

        let signal = Node::signal(slot.clone());
        assert_eq!(signal.flags, MUTABLE);
        assert!(signal.deps.is_none() && signal.subs.is_none());

        let computed = Node::computed(slot);
        assert_eq!(computed.flags, MUTABLE | DIRTY);

        let effect = Node::effect(Rc::new(|| {}));
        assert_eq!(effect.flags, WATCHING);

        let scope = Node::scope();
        assert_eq!(scope.flags, NONE);
    }

    #[test]
    fn heterogeneous_slot_storage() {
        // Different value types behind the same erased trait
        struct Typed<T>(RefCell<T>, RefCell<T>);
        impl<T: Clone + PartialEq> SourceSlot for Typed<T> {
            fn settle(&self) -> bool {
                let value = self.0.borrow().clone();
                let changed = *self.1.borrow() != value;
                *self.1.borrow_mut() = value;
                changed
            }
        }

        let slots: Vec<Rc<dyn SourceSlot>> = vec![
            Rc::new(Typed(RefCell::new(1i32), RefCell::new(0i32))),
            Rc::new(Typed(
                RefCell::new(String::from("a")),
                RefCell::new(String::from("a")),
            )),
            Rc::new(Typed(RefCell::new(true), RefCell::new(true))),
        ];

        assert!(slots[0].settle());
        assert!(!slots[1].settle());
        assert!(!slots[2].settle());
        // Settling twice publishes the value, so the second call is a no-op
        assert!(!slots[0].settle());
    }
}
