//! Admission control: a counting semaphore sized to `max_inflight` that
//! fails fast rather than queueing, grounded on the teacher's
//! `PermitManager` (`src/protocol/permit_manager.rs`).

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct Admission {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl Admission {
    pub fn new(max_inflight: usize) -> Self {
        Admission {
            semaphore: Arc::new(Semaphore::new(max_inflight)),
            capacity: max_inflight,
        }
    }

    /// Returns a permit immediately, or `None` if every slot is in use.
    /// Never waits: a saturated admission controller is a drop, not a
    /// queue (spec.md's admission controller has no queueing).
    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.semaphore.clone().try_acquire_owned().ok()
    }

    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.semaphore.available_permits())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturates_and_releases() {
        let admission = Admission::new(2);
        let p1 = admission.try_acquire().unwrap();
        let p2 = admission.try_acquire().unwrap();
        assert!(admission.try_acquire().is_none());
        assert_eq!(admission.in_use(), 2);
        drop(p1);
        assert!(admission.try_acquire().is_some());
        drop(p2);
    }
}
