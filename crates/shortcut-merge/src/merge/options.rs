//! Options controlling how staged inserts are spliced.

/// Where staged actions go relative to the original action at their position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertAnchor {
    /// Staged actions precede the original action at their position, so
    /// `[A, B, C]` with `[X, Y]` at 1 becomes `[A, X, Y, B, C]`. Position `N`
    /// appends to the end.
    #[default]
    Before,
    /// Staged actions follow the original action at their position (if it
    /// survives exclusion). Position `N` or beyond is never reached.
    After,
}

/// What happens when two inserts target the same position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamePositionPolicy {
    /// The later insert's actions replace the earlier one's.
    #[default]
    Replace,
    /// Actions accumulate in request order.
    Concatenate,
}

/// Options for merging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    pub anchor: InsertAnchor,
    pub same_position: SamePositionPolicy,
}

impl MergeOptions {
    /// Creates default merge options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Staged actions follow their anchor and later inserts at a position replace
    /// earlier ones.
    pub fn legacy() -> Self {
        Self {
            anchor: InsertAnchor::After,
            same_position: SamePositionPolicy::Replace,
        }
    }

    pub fn with_anchor(mut self, anchor: InsertAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_same_position(mut self, policy: SamePositionPolicy) -> Self {
        self.same_position = policy;
        self
    }
}
