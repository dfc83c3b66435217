//! Handle allocation for client-visible nodes.

use rustc_hash::FxHashSet;

/// Issues small integer handles that are unique while live.
///
/// Handles are never derived from addresses. Issue order is monotonic so a
/// reclaimed handle is not handed out again while a client may still hold
/// it; 0 is reserved by the protocol for "no children".
#[derive(Debug)]
pub struct IdProvider {
    next: u32,
    live: FxHashSet<u32>,
}

impl Default for IdProvider {
    fn default() -> Self {
        Self {
            next: 1,
            live: FxHashSet::default(),
        }
    }
}

impl IdProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> u32 {
        loop {
            let candidate = self.next;
            self.next = self.next.checked_add(1).unwrap_or(1);
            if candidate != 0 && self.live.insert(candidate) {
                return candidate;
            }
        }
    }

    /// Returns `false` if the handle was not live.
    pub fn release(&mut self, id: u32) -> bool {
        self.live.remove(&id)
    }

    #[must_use]
    pub fn is_live(&self, id: u32) -> bool {
        self.live.contains(&id)
    }

    /// Reclaim every handle. Issue order continues where it left off.
    pub fn clear(&mut self) {
        self.live.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::IdProvider;

    #[test]
    fn released_handles_are_not_reissued() {
        let mut ids = IdProvider::new();
        let first = ids.allocate();
        let second = ids.allocate();
        assert_eq!((first, second), (1, 2));
        assert!(ids.release(first));
        assert!(!ids.release(first));
        assert_eq!(ids.allocate(), 3);
        assert!(!ids.is_live(first));
        assert!(ids.is_live(second));
    }

    #[test]
    fn wraparound_skips_zero_and_live_handles() {
        let mut ids = IdProvider::new();
        let kept = ids.allocate();
        ids.next = u32::MAX;
        assert_eq!(ids.allocate(), u32::MAX);
        assert_eq!(ids.allocate(), kept + 1);
        assert_eq!(ids.len(), 3);
        ids.clear();
        assert!(ids.is_empty());
    }
}
