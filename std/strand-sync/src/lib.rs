//!
//! strand-sync - Spin-based Synchronization Primitives
//!
//! Everything in this crate blocks by busy-waiting on sequentially
//! consistent atomics. There is no OS mutex or condition variable underneath.
//!
//! ## Atomic Cells
//!
//! - `AtomicCell` - word-sized counter with fetch-add/sub, load, store, CAS
//! - `atomic_*` free functions over a bare `AtomicUsize`
//!
//! ## Ticket Mutex
//!
//! Fair FIFO lock built from two counters:
//! - `TicketMutex::begin()` / `TicketMutex::end()` - raw acquire/release
//! - `TicketMutex::lock()` - RAII guard
//! - `TicketLock<T>` - lock that owns the data it protects
//!
//! ## Barrier
//!
//! Reusable rendezvous for a fixed number of participants:
//! - `Barrier::new(n)` / `Barrier::wait()`
//!
//! ## Backoff
//!
//! Spin loops take a `Backoff` policy (pause hint, yield, or exponential).
//!

pub mod atomic;
pub mod backoff;
pub mod barrier;
pub mod ticket;

pub use atomic::*;
pub use backoff::*;
pub use barrier::*;
pub use ticket::*;
