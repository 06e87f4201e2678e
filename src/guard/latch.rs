use std::sync::atomic::{AtomicBool, Ordering};

/// Next sync status given the current one and a fresh observation.
///
/// Once synced, stays synced. Otherwise the node counts as synced exactly
/// when the segment starts right after the local tip.
pub fn next_status(current: bool, tip: u64, first_candidate_height: u64) -> bool {
    if current {
        return true;
    }
    first_candidate_height.checked_sub(1) == Some(tip)
}

/// Records whether the node has caught up with the network tip.
///
/// Shared by every evaluation; updates go through a single atomic
/// read-modify-write so concurrent callers cannot lose a transition.
#[derive(Debug, Default)]
pub struct SyncLatch {
    synced: AtomicBool,
}

impl SyncLatch {
    pub const fn new() -> Self {
        Self {
            synced: AtomicBool::new(false),
        }
    }

    pub const fn with_status(synced: bool) -> Self {
        Self {
            synced: AtomicBool::new(synced),
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Apply [`next_status`] atomically and return the resulting status.
    pub fn update(&self, tip: u64, first_candidate_height: u64) -> bool {
        let previous = self
            .synced
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(next_status(current, tip, first_candidate_height))
            })
            .unwrap_or_else(|current| current);
        next_status(previous, tip, first_candidate_height)
    }
}
