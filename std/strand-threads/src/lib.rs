//!
//! strand-threads - Thread Lifecycle Management
//!
//! A fixed-capacity table of OS threads addressed by small integer ids.
//!
//! ## Registry
//!
//! - `ThreadRegistry::create(entry, argument) -> ThreadId` - start a thread
//! - `ThreadRegistry::join(id)` - wait for it and free its slot
//! - `exit()` - end the calling thread early; its slot stays joinable
//! - at most `MAX_THREADS` (64) threads are live per registry
//!
//! ## Process-wide Registry
//!
//! `lifecycle::init` / `init_with` install one shared registry; the free
//! functions in `lifecycle` forward to it.
//!
//! ## Backends
//!
//! Threads are started through a `ThreadBackend`: pthreads on unix,
//! `std::thread` elsewhere.
//!
//! ## C Interface
//!
//! `ffi` exports `strand_thread_*`, `strand_atomic_*`,
//! `strand_ticket_mutex_*` and `strand_barrier_*` symbols.
//!
//! The synchronization primitives from `strand-sync` are re-exported.
//!

pub mod backend;
pub mod config;
pub mod error;
pub mod ffi;
pub mod lifecycle;
pub mod registry;

pub use backend::{JoinError, NativeBackend, SpawnOptions, StdBackend, ThreadBackend};
#[cfg(unix)]
pub use backend::PosixBackend;
pub use config::{MAX_THREADS, MIN_STACK_SIZE, RegistryConfig};
pub use error::{ConfigError, JoinFailure, SpawnFailure, ThreadError};
pub use registry::{ThreadId, ThreadRegistry, current_id, exit};

pub use strand_sync::{AtomicCell, Backoff, Barrier, TicketLock, TicketMutex};
