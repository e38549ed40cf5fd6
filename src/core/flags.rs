// ============================================================================
// pulse-signals - Reactive Flags
// Flag bit constants shared by every node kind in the graph
// ============================================================================

// =============================================================================
// KIND FLAGS
// =============================================================================

/// Node produces a value that others may depend on (signals, computeds).
pub const MUTABLE: u32 = 1 << 0;

/// Node re-runs eagerly when its dependencies change (effects).
pub const WATCHING: u32 = 1 << 1;

// =============================================================================
// PROPAGATION GUARD FLAGS
// =============================================================================

/// Node is currently re-running inside a tracking pass. While set, `link`
/// reuses the existing deps list in place instead of appending duplicates.
pub const RECURSED_CHECK: u32 = 1 << 2;

/// Node was already visited by the current propagation pass. Together with
/// RECURSED_CHECK this bounds each node to O(out-degree) visits even in
/// diamonds and cycles.
pub const RECURSED: u32 = 1 << 3;

// =============================================================================
// STALENESS FLAGS
// =============================================================================

/// Known-changed: the cached value must not be trusted until recomputed.
pub const DIRTY: u32 = 1 << 4;

/// An upstream source changed but this node's own staleness is unproven;
/// `check_dirty` must pull before any recompute happens.
pub const PENDING: u32 = 1 << 5;

// =============================================================================
// SCHEDULING FLAGS
// =============================================================================

/// Node is sitting in the flush queue (or forwarded to a queued ancestor).
pub const QUEUED: u32 = 1 << 6;

/// No flags set. Freshly created scopes and disposed nodes.
pub const NONE: u32 = 0;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_distinct() {
        let all_flags = [
            MUTABLE,
            WATCHING,
            RECURSED_CHECK,
            RECURSED,
            DIRTY,
            PENDING,
            QUEUED,
        ];

        for (i, &a) in all_flags.iter().enumerate() {
            for (j, &b) in all_flags.iter().enumerate() {
                if i != j {
                    assert_eq!(a & b, 0, "flags at index {} and {} overlap", i, j);
                }
            }
        }
    }

    #[test]
    fn can_combine_and_clear_flags() {
        let mut flags = MUTABLE | DIRTY;
        assert_ne!(flags & MUTABLE, 0);
        assert_ne!(flags & DIRTY, 0);
        assert_eq!(flags & PENDING, 0);

        // Settle: keep kind, drop staleness
        flags &= !(DIRTY | PENDING);
        assert_eq!(flags, MUTABLE);
    }

    #[test]
    fn tracking_mask_behaviour() {
        // start_tracking clears Recursed/Dirty/Pending and raises RecursedCheck
        let flags = WATCHING | RECURSED | DIRTY;
        let tracked = (flags & !(RECURSED | DIRTY | PENDING)) | RECURSED_CHECK;
        assert_eq!(tracked, WATCHING | RECURSED_CHECK);
    }
}
