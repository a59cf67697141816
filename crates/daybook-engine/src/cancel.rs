//! Cooperative run cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable cancellation handle for an in-flight run.
///
/// Tripping the flag stops the scheduler from dispatching further units;
/// attempts already in flight run to their terminal outcome (workers also
/// check the flag between retry sleeps and abort instead of re-fetching).
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a new, untripped flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trips the flag. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once the flag has been tripped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_shared_across_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();

        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());

        // Idempotent.
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
