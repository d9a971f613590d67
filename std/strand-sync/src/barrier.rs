//!
//! Reusable Barrier
//!
//! `N` participants call `wait`; nobody returns until all `N` have arrived,
//! and the same barrier can be reused for any number of phases.
//!
//! ## Phase Reset
//!
//! `count` cannot be reset the moment it reaches `N`: slower participants
//! may still be polling it to decide whether to stop spinning. Instead
//! every participant decrements `waiting` on its way out, and the one whose
//! decrement takes `waiting` to zero resets `count` while holding `fence`.
//!
//! Two ordering rules keep successive phases from overlapping:
//!
//! - An arrival first waits until `count < N`, i.e. until the previous
//!   phase has been reset. A fast participant that laps the others can
//!   never add itself to a phase that has already completed.
//! - `waiting` is incremented before `count`. Once `count` reaches `N`
//!   every participant of the phase is already accounted for in `waiting`,
//!   so `waiting` cannot drain to zero while someone is still arriving.
//!

use std::fmt;

use crate::atomic::AtomicCell;
use crate::backoff::Backoff;
use crate::ticket::TicketMutex;

pub struct Barrier {
    count: AtomicCell,
    waiting: AtomicCell,
    thread_count: usize,
    fence: TicketMutex,
    backoff: Backoff,
}

/// Returned by [`Barrier::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    leader: bool,
}

impl BarrierWaitResult {
    /// True for exactly one participant per phase: the last one to leave,
    /// which reset the barrier for the next phase.
    pub fn is_leader(&self) -> bool {
        self.leader
    }
}

impl Barrier {
    /// # Panics
    ///
    /// Panics if `thread_count` is zero.
    pub fn new(thread_count: usize) -> Self {
        Self::with_backoff(thread_count, Backoff::default())
    }

    pub fn with_backoff(thread_count: usize, backoff: Backoff) -> Self {
        assert!(thread_count >= 1, "barrier needs at least one participant");
        Self {
            count: AtomicCell::new(0),
            waiting: AtomicCell::new(0),
            thread_count,
            fence: TicketMutex::with_backoff(backoff),
            backoff,
        }
    }

    pub fn wait(&self) -> BarrierWaitResult {
        let n = self.thread_count;
        let mut spinner = self.backoff.spinner();

        while self.count.load() >= n {
            spinner.spin();
        }

        self.waiting.fetch_add(1);
        self.count.fetch_add(1);

        spinner.reset();
        while self.count.load() < n {
            spinner.spin();
        }

        let leader = self.waiting.fetch_sub(1) == 1;

        self.fence.begin();
        if leader {
            self.count.store(0);
        }
        self.fence.end();

        BarrierWaitResult { leader }
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }
}

impl fmt::Debug for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Barrier")
            .field("count", &self.count.load())
            .field("waiting", &self.waiting.load())
            .field("thread_count", &self.thread_count)
            .finish()
    }
}
