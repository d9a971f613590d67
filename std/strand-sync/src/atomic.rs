//!
//! Atomic Cells
//!
//! Word-sized counters accessed only through atomic read-modify-write,
//! load and store. All operations use SeqCst ordering, so every cell
//! participates in one global order shared with every other cell.
//!
//! Arithmetic wraps on overflow, as the hardware instruction does.
//!

use std::sync::atomic::{AtomicUsize, Ordering};

/// An unsigned word that is never read or written non-atomically.
#[derive(Debug, Default)]
#[repr(transparent)]
pub struct AtomicCell {
    inner: AtomicUsize,
}

impl AtomicCell {
    pub const fn new(value: usize) -> Self {
        Self {
            inner: AtomicUsize::new(value),
        }
    }

    /// Adds `value` and returns the previous value.
    #[inline]
    pub fn fetch_add(&self, value: usize) -> usize {
        atomic_fetch_add(&self.inner, value)
    }

    /// Subtracts `value` and returns the previous value.
    #[inline]
    pub fn fetch_sub(&self, value: usize) -> usize {
        atomic_fetch_sub(&self.inner, value)
    }

    #[inline]
    pub fn load(&self) -> usize {
        atomic_load(&self.inner)
    }

    #[inline]
    pub fn store(&self, value: usize) {
        atomic_store(&self.inner, value)
    }

    /// Stores `new` if the cell currently holds `current`.
    ///
    /// Returns `Ok(current)` on success. On failure the cell is left
    /// untouched and `Err` carries the value that was observed instead,
    /// which callers use as their refreshed expectation for a retry.
    #[inline]
    pub fn compare_exchange(&self, current: usize, new: usize) -> Result<usize, usize> {
        atomic_compare_exchange(&self.inner, current, new)
    }

    pub fn into_inner(self) -> usize {
        self.inner.into_inner()
    }

    /// The underlying atomic, for callers that need the free functions.
    pub fn as_atomic(&self) -> &AtomicUsize {
        &self.inner
    }
}

impl From<usize> for AtomicCell {
    fn from(value: usize) -> Self {
        Self::new(value)
    }
}

#[inline]
pub fn atomic_fetch_add(target: &AtomicUsize, value: usize) -> usize {
    target.fetch_add(value, Ordering::SeqCst)
}

#[inline]
pub fn atomic_fetch_sub(target: &AtomicUsize, value: usize) -> usize {
    target.fetch_sub(value, Ordering::SeqCst)
}

#[inline]
pub fn atomic_load(target: &AtomicUsize) -> usize {
    target.load(Ordering::SeqCst)
}

#[inline]
pub fn atomic_store(target: &AtomicUsize, value: usize) {
    target.store(value, Ordering::SeqCst)
}

/// Standard compare-and-swap: `current` is the expected value, `new` the
/// replacement.
#[inline]
pub fn atomic_compare_exchange(
    target: &AtomicUsize,
    current: usize,
    new: usize,
) -> Result<usize, usize> {
    target.compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fetch_ops_return_previous() {
        let cell = AtomicCell::new(5);
        assert_eq!(cell.fetch_add(3), 5);
        assert_eq!(cell.load(), 8);
        assert_eq!(cell.fetch_sub(8), 8);
        assert_eq!(cell.load(), 0);
    }

    #[test]
    fn test_fetch_sub_wraps() {
        let cell = AtomicCell::new(0);
        assert_eq!(cell.fetch_sub(1), 0);
        assert_eq!(cell.load(), usize::MAX);
        cell.fetch_add(1);
        assert_eq!(cell.load(), 0);
    }

    #[test]
    fn test_compare_exchange_success() {
        let cell = AtomicCell::new(10);
        assert_eq!(cell.compare_exchange(10, 11), Ok(10));
        assert_eq!(cell.load(), 11);
    }

    #[test]
    fn test_compare_exchange_failure_reports_current() {
        let cell = AtomicCell::new(10);
        assert_eq!(cell.compare_exchange(9, 42), Err(10));
        assert_eq!(cell.load(), 10);

        // retry with the refreshed expectation
        let observed = cell.compare_exchange(9, 42).unwrap_err();
        assert_eq!(cell.compare_exchange(observed, 42), Ok(10));
        assert_eq!(cell.into_inner(), 42);
    }

    #[test]
    fn test_store_then_load() {
        let raw = AtomicUsize::new(0);
        atomic_store(&raw, 77);
        assert_eq!(atomic_load(&raw), 77);
        assert_eq!(atomic_fetch_add(&raw, 1), 77);
        assert_eq!(atomic_fetch_sub(&raw, 2), 78);
        assert_eq!(atomic_compare_exchange(&raw, 76, 0), Ok(76));
    }

    #[test]
    fn test_concurrent_increments() {
        let cell = Arc::new(AtomicCell::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        cell.fetch_add(1);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(cell.load(), 8000);
    }

    #[test]
    fn test_cas_increment_loop() {
        let cell = Arc::new(AtomicCell::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let mut current = cell.load();
                        while let Err(observed) = cell.compare_exchange(current, current + 1) {
                            current = observed;
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(cell.load(), 2000);
    }
}
