//!
//! Ticket Mutex
//!
//! A fair spin lock built from two counters. `begin` takes the next ticket
//! with a single fetch-add and waits until `serving` reaches it; `end`
//! advances `serving` by one. Callers are therefore granted the lock in
//! exactly the order their fetch-adds landed.
//!
//! Waiting is unbounded. Correctness depends on every holder calling
//! `end` (or dropping its guard) eventually.
//!
//! ```
//! use strand_sync::TicketLock;
//!
//! let counter = TicketLock::new(0);
//! *counter.lock() += 1;
//! assert_eq!(counter.into_inner(), 1);
//! ```
//!

use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use crate::atomic::AtomicCell;
use crate::backoff::Backoff;

pub struct TicketMutex {
    ticket: AtomicCell,
    serving: AtomicCell,
    backoff: Backoff,
}

impl TicketMutex {
    pub const fn new() -> Self {
        Self::with_backoff(Backoff::Exponential)
    }

    pub const fn with_backoff(backoff: Backoff) -> Self {
        Self {
            ticket: AtomicCell::new(0),
            serving: AtomicCell::new(0),
            backoff,
        }
    }

    /// Blocks until the caller holds the lock.
    pub fn begin(&self) {
        let my_ticket = self.ticket.fetch_add(1);
        let mut spinner = self.backoff.spinner();
        while self.serving.load() != my_ticket {
            spinner.spin();
        }
    }

    /// Releases the lock to the holder of the next ticket.
    pub fn end(&self) {
        debug_assert!(
            self.serving.load() != self.ticket.load(),
            "ticket mutex released while unlocked"
        );
        self.serving.fetch_add(1);
    }

    /// Takes the lock only if nobody holds it or waits for it.
    pub fn try_begin(&self) -> bool {
        let serving = self.serving.load();
        self.ticket
            .compare_exchange(serving, serving.wrapping_add(1))
            .is_ok()
    }

    pub fn lock(&self) -> TicketGuard<'_> {
        self.begin();
        TicketGuard { mutex: self }
    }

    pub fn try_lock(&self) -> Option<TicketGuard<'_>> {
        self.try_begin().then(|| TicketGuard { mutex: self })
    }

    pub fn is_locked(&self) -> bool {
        self.ticket.load() != self.serving.load()
    }

    /// The ticket the next caller of `begin` will receive.
    pub fn next_ticket(&self) -> usize {
        self.ticket.load()
    }

    /// The ticket currently allowed to hold the lock.
    pub fn now_serving(&self) -> usize {
        self.serving.load()
    }

    /// Number of callers holding or queued for the lock.
    pub fn queue_len(&self) -> usize {
        self.ticket.load().wrapping_sub(self.serving.load())
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }
}

impl Default for TicketMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TicketMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketMutex")
            .field("ticket", &self.ticket.load())
            .field("serving", &self.serving.load())
            .field("backoff", &self.backoff)
            .finish()
    }
}

#[must_use = "if unused the TicketMutex will immediately unlock"]
pub struct TicketGuard<'a> {
    mutex: &'a TicketMutex,
}

impl Drop for TicketGuard<'_> {
    fn drop(&mut self) {
        self.mutex.end();
    }
}

/// A ticket mutex that owns the value it protects.
pub struct TicketLock<T: ?Sized> {
    mutex: TicketMutex,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for TicketLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for TicketLock<T> {}

impl<T> TicketLock<T> {
    pub const fn new(value: T) -> Self {
        Self::with_backoff(value, Backoff::Exponential)
    }

    pub const fn with_backoff(value: T, backoff: Backoff) -> Self {
        Self {
            mutex: TicketMutex::with_backoff(backoff),
            data: UnsafeCell::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> TicketLock<T> {
    pub fn lock(&self) -> TicketLockGuard<'_, T> {
        self.mutex.begin();
        TicketLockGuard {
            lock: self,
            _marker: PhantomData,
        }
    }

    pub fn try_lock(&self) -> Option<TicketLockGuard<'_, T>> {
        self.mutex.try_begin().then(|| TicketLockGuard {
            lock: self,
            _marker: PhantomData,
        })
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn is_locked(&self) -> bool {
        self.mutex.is_locked()
    }

    pub fn raw(&self) -> &TicketMutex {
        &self.mutex
    }
}

impl<T: Default> Default for TicketLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for TicketLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => f.debug_struct("TicketLock").field("data", &&*guard).finish(),
            None => f.debug_struct("TicketLock").field("data", &"<locked>").finish(),
        }
    }
}

#[must_use = "if unused the TicketLock will immediately unlock"]
pub struct TicketLockGuard<'a, T: ?Sized> {
    lock: &'a TicketLock<T>,
    // &mut T makes the guard Sync only when T is
    _marker: PhantomData<&'a mut T>,
}

impl<T: ?Sized> Deref for TicketLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard exists only while its ticket is being served.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for TicketLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above, and `&mut self` rules out aliasing through this guard.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for TicketLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.mutex.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_new_is_unlocked() {
        let m = TicketMutex::new();
        assert!(!m.is_locked());
        assert_eq!(m.next_ticket(), 0);
        assert_eq!(m.now_serving(), 0);
    }

    #[test]
    fn test_begin_end_advances_counters() {
        let m = TicketMutex::new();
        m.begin();
        assert!(m.is_locked());
        assert_eq!(m.queue_len(), 1);
        m.end();
        assert!(!m.is_locked());
        assert_eq!(m.next_ticket(), 1);
        assert_eq!(m.now_serving(), 1);
    }

    #[test]
    fn test_try_begin() {
        let m = TicketMutex::new();
        assert!(m.try_begin());
        assert!(!m.try_begin());
        m.end();
        assert!(m.try_begin());
        m.end();
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let m = TicketMutex::new();
        {
            let _g = m.lock();
            assert!(m.is_locked());
            assert!(m.try_lock().is_none());
        }
        assert!(!m.is_locked());
        assert!(m.try_lock().is_some());
    }

    #[test]
    fn test_mutual_exclusion_counter() {
        const THREADS: usize = 8;
        const ITERS: usize = 2000;

        // A Cell inside the lock detects lost updates the way a racy
        // read-modify-write would.
        struct Shared {
            mutex: TicketMutex,
            value: Cell<usize>,
        }
        unsafe impl Sync for Shared {}

        let shared = Arc::new(Shared {
            mutex: TicketMutex::new(),
            value: Cell::new(0),
        });

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for _ in 0..ITERS {
                        shared.mutex.begin();
                        let v = shared.value.get();
                        shared.value.set(v + 1);
                        assert_eq!(shared.value.get(), v + 1);
                        shared.mutex.end();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(shared.value.get(), THREADS * ITERS);
    }

    #[test]
    fn test_every_backoff_excludes() {
        for backoff in Backoff::ALL {
            let lock = Arc::new(TicketLock::with_backoff(0usize, backoff));
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let lock = Arc::clone(&lock);
                    thread::spawn(move || {
                        for _ in 0..500 {
                            *lock.lock() += 1;
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
            assert_eq!(*lock.lock(), 2000, "backoff {backoff}");
        }
    }

    #[test]
    fn test_fifo_grant_order() {
        const WAITERS: usize = 6;

        let lock = Arc::new(TicketLock::new(Vec::new()));
        let held = lock.lock();

        let mut handles = Vec::new();
        for i in 0..WAITERS {
            let lock_clone = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                lock_clone.lock().push(i);
            }));
            // waiter i has taken ticket i + 1 before the next one starts
            while lock.raw().next_ticket() < i + 2 {
                thread::sleep(Duration::from_millis(1));
            }
        }

        drop(held);
        for h in handles {
            h.join().unwrap();
        }

        let order = Arc::try_unwrap(lock).unwrap().into_inner();
        assert_eq!(order, (0..WAITERS).collect::<Vec<_>>());
    }

    #[test]
    fn test_ticket_lock_get_mut_and_debug() {
        let mut lock = TicketLock::new(String::from("a"));
        lock.get_mut().push('b');
        assert_eq!(format!("{:?}", lock), "TicketLock { data: \"ab\" }");
        let _g = lock.lock();
        assert!(lock.is_locked());
    }
}
