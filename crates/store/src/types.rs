//! Small shared types returned by store operations.

/// Outcome of one expiry sweep.
///
/// Sweeps are best-effort: records that cannot be decoded and tokens whose
/// deletion fails are counted in `skipped` and left for the next sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Token records examined.
    pub scanned: usize,
    /// Expired tokens deleted.
    pub removed: usize,
    /// Records that could not be decoded or deleted.
    pub skipped: usize,
}

impl SweepStats {
    /// Returns `true` if nothing was skipped.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped == 0
    }
}
