//! Process wakers.
//!
//! Every process is polled with a waker bound to that process. Engine primitives
//! (`Timeout`, `Request::granted`, `ProcessHandle`, `AllOf`) do not rely on it: they
//! schedule their own resumptions. The waker exists so that futures written against
//! the standard `Waker` contract still work inside a process.
//!
//! Waking never touches the environment directly. The wake is parked in a
//! thread-local list and the environment turns it into a [`EventKind::Wake`]
//! resumption at the current time as soon as the running process yields.
//!
//! [`EventKind::Wake`]: crate::EventKind::Wake

use std::cell::RefCell;
use std::sync::Arc;
use std::task::{Wake, Waker};

use crate::types::ProcessId;

thread_local! {
    static DEFERRED_WAKES: RefCell<Vec<(u64, ProcessId)>> = const { RefCell::new(Vec::new()) };
}

struct ProcessWaker {
    env_id: u64,
    process: ProcessId,
}

impl Wake for ProcessWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        DEFERRED_WAKES.with(|wakes| wakes.borrow_mut().push((self.env_id, self.process)));
    }
}

/// Create a waker that requests a resumption of `process` in environment `env_id`.
pub(crate) fn process_waker(env_id: u64, process: ProcessId) -> Waker {
    Waker::from(Arc::new(ProcessWaker { env_id, process }))
}

/// Remove and return the wakes recorded for environment `env_id`, oldest first.
pub(crate) fn take_deferred_wakes(env_id: u64) -> Vec<ProcessId> {
    DEFERRED_WAKES.with(|wakes| {
        let mut wakes = wakes.borrow_mut();
        if wakes.is_empty() {
            return Vec::new();
        }
        let mut taken = Vec::new();
        wakes.retain(|(id, process)| {
            if *id == env_id {
                taken.push(*process);
                false
            } else {
                true
            }
        });
        taken
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wakes_are_deferred_per_environment() {
        let a = process_waker(1_000_001, ProcessId(3));
        let b = process_waker(1_000_002, ProcessId(4));

        a.wake_by_ref();
        b.clone().wake();
        a.wake();

        assert_eq!(take_deferred_wakes(1_000_001), vec![ProcessId(3), ProcessId(3)]);
        assert!(take_deferred_wakes(1_000_001).is_empty());
        assert_eq!(take_deferred_wakes(1_000_002), vec![ProcessId(4)]);
    }

    #[test]
    fn test_waker_will_wake() {
        let waker1 = process_waker(1_000_003, ProcessId(1));
        let waker2 = waker1.clone();
        assert!(waker1.will_wake(&waker2));
    }
}
