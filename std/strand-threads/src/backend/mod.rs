//!
//! Platform Thread Backends
//!
//! The registry never talks to the OS directly. It hands a boxed task to a
//! `ThreadBackend`, keeps the handle it gets back in the slot, and later
//! gives that handle back to `join` (or `detach` when the registry is
//! dropped with threads still running).
//!
//! - `PosixBackend` - pthreads through libc (Unix)
//! - `StdBackend` - `std::thread`, which is `CreateThread` /
//!   `WaitForSingleObject` / `CloseHandle` on Windows
//!
//! `NativeBackend` names whichever of the two the host platform uses.
//!

mod portable;
#[cfg(unix)]
mod posix;

pub use portable::StdBackend;
#[cfg(unix)]
pub use posix::{PosixBackend, PosixHandle};

use crate::error::{JoinFailure, SpawnFailure};

/// Work run on a freshly spawned thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[cfg(unix)]
pub type NativeBackend = PosixBackend;

#[cfg(not(unix))]
pub type NativeBackend = StdBackend;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnOptions {
    /// Backends that cannot name OS threads ignore this.
    pub name: Option<String>,
    pub stack_size: Option<usize>,
}

/// A backend join that did not complete normally.
#[derive(Debug)]
pub struct JoinError<H> {
    pub reason: JoinFailure,
    /// Handed back when the thread was not joined; its OS resources are
    /// still owned by the caller.
    pub handle: Option<H>,
}

impl<H> JoinError<H> {
    /// The thread has finished and its resources are released.
    pub fn finished(reason: JoinFailure) -> Self {
        Self { reason, handle: None }
    }

    /// The thread was not joined. The caller keeps `handle`.
    pub fn unjoined(handle: H, reason: JoinFailure) -> Self {
        Self {
            reason,
            handle: Some(handle),
        }
    }
}

pub trait ThreadBackend: Send + Sync + 'static {
    type Handle: Send + 'static;

    /// Starts an OS thread running `task`. On failure the task is dropped
    /// without having run.
    fn spawn(&self, task: Task, options: &SpawnOptions) -> Result<Self::Handle, SpawnFailure>;

    /// Blocks until the thread behind `handle` has finished and releases
    /// its OS resources. When the join itself is refused the handle comes
    /// back in the error.
    fn join(&self, handle: Self::Handle) -> Result<(), JoinError<Self::Handle>>;

    /// Lets the thread run to completion unobserved.
    fn detach(&self, handle: Self::Handle);

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn run_and_join<B: ThreadBackend>(backend: B) {
        let hits = Arc::new(AtomicUsize::new(0));
        let options = SpawnOptions {
            name: Some("backend-test".to_string()),
            stack_size: Some(64 * 1024),
        };

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let hits = Arc::clone(&hits);
                backend
                    .spawn(
                        Box::new(move || {
                            hits.fetch_add(1, Ordering::SeqCst);
                        }),
                        &options,
                    )
                    .unwrap()
            })
            .collect();

        for h in handles {
            assert!(backend.join(h).is_ok(), "{}", backend.name());
        }
        assert_eq!(hits.load(Ordering::SeqCst), 4, "{}", backend.name());
    }

    #[test]
    fn test_std_backend_runs_tasks() {
        run_and_join(StdBackend);
    }

    #[cfg(unix)]
    #[test]
    fn test_posix_backend_runs_tasks() {
        run_and_join(PosixBackend);
    }

    #[test]
    fn test_native_backend_detach() {
        let backend = NativeBackend::default();
        let done = Arc::new(AtomicUsize::new(0));
        let done_clone = Arc::clone(&done);
        let handle = backend
            .spawn(
                Box::new(move || {
                    done_clone.fetch_add(1, Ordering::SeqCst);
                }),
                &SpawnOptions::default(),
            )
            .unwrap();
        backend.detach(handle);

        while done.load(Ordering::SeqCst) == 0 {
            std::thread::yield_now();
        }
    }
}
