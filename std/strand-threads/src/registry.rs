//!
//! Thread Registry
//!
//! A fixed table of `N` slots mapping small integer ids to OS threads. The
//! index of a slot is the public `ThreadId`.
//!
//! ## Slot Lifecycle
//!
//! ```text
//! Inactive --create--> Reserved --spawned--> Active --join--> Joining --joined--> Inactive
//!                         |                    ^                 |
//!                         |                    +--join refused---+
//!                         +--spawn failed--> Inactive
//! ```
//!
//! A refused join (the backend hands the handle back) returns the slot to
//! `Active`, so the thread stays owned and can be joined again later.
//!
//! `Reserved` only exists while the creator holds `creation_lock`, so two
//! creators can never claim the same slot. `join` does not take the lock:
//! moving a slot from `Active` to `Joining` with a compare-exchange gives
//! the joiner exclusive ownership of that slot alone, and a create running
//! at the same time only ever looks at `Inactive` slots.
//!
//! ## Entry Points
//!
//! Every spawned thread runs its entry point through a trampoline that
//! records how it finished (returned, called `exit`, or panicked) so that
//! `join` can report it.
//!

use std::any::Any;
use std::cell::{Cell, UnsafeCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use strand_sync::TicketMutex;
use tracing::{debug, trace, warn};

use crate::backend::{JoinError, NativeBackend, SpawnOptions, Task, ThreadBackend};
use crate::config::{MAX_THREADS, RegistryConfig};
use crate::error::{ConfigError, JoinFailure, ThreadError};

const INACTIVE: u8 = 0;
const RESERVED: u8 = 1;
const ACTIVE: u8 = 2;
const JOINING: u8 = 3;

const RUNNING: u8 = 0;
const RETURNED: u8 = 1;
const EXITED: u8 = 2;
const PANICKED: u8 = 3;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Registry serial and slot of the current thread, if a registry spawned it.
    static CURRENT: Cell<Option<(u64, ThreadId)>> = const { Cell::new(None) };
}

/// Index of a slot in a `ThreadRegistry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(usize);

impl ThreadId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ThreadId> for usize {
    fn from(id: ThreadId) -> usize {
        id.0
    }
}

/// Id of the calling thread in the registry that spawned it.
pub fn current_id() -> Option<ThreadId> {
    CURRENT.with(|c| c.get().map(|(_, id)| id))
}

/// Unwind payload used by `exit`.
struct ExitSignal;

/// Terminates the calling thread from inside its entry point.
///
/// The stack unwinds, so destructors on the exiting thread run. The slot
/// stays `Active` until the creator joins it.
///
/// # Panics
///
/// Panics when called on a thread no registry spawned.
pub fn exit() -> ! {
    match CURRENT.with(|c| c.get()) {
        Some((_, id)) => {
            trace!(id = id.index(), "thread exiting");
            panic::resume_unwind(Box::new(ExitSignal))
        }
        None => panic!("exit called on a thread that no ThreadRegistry spawned"),
    }
}

struct Running<H> {
    handle: H,
    outcome: Arc<AtomicU8>,
}

struct Slot<H> {
    state: AtomicU8,
    running: UnsafeCell<Option<Running<H>>>,
}

// `running` is only touched by the creator of a Reserved slot or the
// joiner of a Joining slot; the state transitions hand it over.
unsafe impl<H: Send> Sync for Slot<H> {}

impl<H> Slot<H> {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(INACTIVE),
            running: UnsafeCell::new(None),
        }
    }
}

pub struct ThreadRegistry<B: ThreadBackend = NativeBackend, const N: usize = MAX_THREADS> {
    serial: u64,
    backend: B,
    config: RegistryConfig,
    slots: [Slot<B::Handle>; N],
    creation_lock: TicketMutex,
}

impl ThreadRegistry {
    /// A registry on the host platform's thread facility with default
    /// configuration and `MAX_THREADS` slots.
    pub fn new() -> Self {
        Self::build(NativeBackend::default(), RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Result<Self, ConfigError> {
        Self::with_backend(NativeBackend::default(), config)
    }

    /// `config` must already have passed `validate`.
    pub(crate) fn build_validated(config: RegistryConfig) -> Self {
        Self::build(NativeBackend::default(), config)
    }
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ThreadBackend, const N: usize> ThreadRegistry<B, N> {
    pub fn with_backend(backend: B, config: RegistryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(backend, config))
    }

    fn build(backend: B, config: RegistryConfig) -> Self {
        Self {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            creation_lock: TicketMutex::with_backoff(config.backoff),
            slots: std::array::from_fn(|_| Slot::new()),
            backend,
            config,
        }
    }

    /// Starts a thread running `entry(argument)` and returns its id.
    ///
    /// Ownership of `argument` moves to the new thread; it is dropped when
    /// the entry point returns or the thread calls `exit`.
    pub fn create<A, F>(&self, entry: F, argument: A) -> Result<ThreadId, ThreadError>
    where
        F: FnOnce(A) + Send + 'static,
        A: Send + 'static,
    {
        let _guard = self.creation_lock.lock();

        let Some(index) = self
            .slots
            .iter()
            .position(|slot| slot.state.load(Ordering::SeqCst) == INACTIVE)
        else {
            warn!(capacity = N, "thread table is full");
            return Err(ThreadError::ResourceExhausted { capacity: N });
        };

        let slot = &self.slots[index];
        slot.state.store(RESERVED, Ordering::SeqCst);

        let id = ThreadId(index);
        let outcome = Arc::new(AtomicU8::new(RUNNING));
        let task = trampoline(self.serial, id, Arc::clone(&outcome), move || entry(argument));
        let options = SpawnOptions {
            name: self.config.thread_name(index),
            stack_size: self.config.stack_size,
        };

        match self.backend.spawn(task, &options) {
            Ok(handle) => {
                // SAFETY: a Reserved slot belongs to the holder of creation_lock.
                unsafe { *slot.running.get() = Some(Running { handle, outcome }) };
                slot.state.store(ACTIVE, Ordering::SeqCst);
                debug!(id = index, backend = self.backend.name(), "thread created");
                Ok(id)
            }
            Err(reason) => {
                slot.state.store(INACTIVE, Ordering::SeqCst);
                warn!(id = index, %reason, "failed to spawn thread");
                Err(ThreadError::SpawnFailed(reason))
            }
        }
    }

    /// `create` for a closure that needs no separate argument.
    pub fn spawn<F>(&self, f: F) -> Result<ThreadId, ThreadError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.create(|f: F| f(), f)
    }

    /// Blocks until thread `id` has finished, then frees its slot.
    pub fn join(&self, id: ThreadId) -> Result<(), ThreadError> {
        let index = id.index();
        if index >= N {
            return Err(ThreadError::InvalidId(i64::try_from(index).unwrap_or(i64::MAX)));
        }

        if CURRENT.with(|c| c.get()) == Some((self.serial, id)) {
            return Err(self.join_failed(id, JoinFailure::Deadlock));
        }

        let slot = &self.slots[index];
        if let Err(state) =
            slot.state
                .compare_exchange(ACTIVE, JOINING, Ordering::SeqCst, Ordering::SeqCst)
        {
            let reason = if state == JOINING {
                JoinFailure::NotJoinable
            } else {
                JoinFailure::NotFound
            };
            return Err(self.join_failed(id, reason));
        }

        // SAFETY: Joining gives this caller exclusive access to the slot.
        let running = unsafe { (*slot.running.get()).take() };
        let Some(Running { handle, outcome }) = running else {
            slot.state.store(INACTIVE, Ordering::SeqCst);
            return Err(self.join_failed(id, JoinFailure::NotFound));
        };

        match self.backend.join(handle) {
            Ok(()) => {
                slot.state.store(INACTIVE, Ordering::SeqCst);
                if outcome.load(Ordering::SeqCst) == PANICKED {
                    return Err(self.join_failed(id, JoinFailure::Panicked));
                }
                debug!(id = index, "thread joined");
                Ok(())
            }
            Err(JoinError {
                reason,
                handle: Some(handle),
            }) => {
                // not joined: the slot keeps the thread and stays joinable
                // SAFETY: still Joining, so this caller owns `running`.
                unsafe { *slot.running.get() = Some(Running { handle, outcome }) };
                slot.state.store(ACTIVE, Ordering::SeqCst);
                Err(self.join_failed(id, reason))
            }
            Err(JoinError {
                reason,
                handle: None,
            }) => {
                slot.state.store(INACTIVE, Ordering::SeqCst);
                Err(self.join_failed(id, reason))
            }
        }
    }

    /// `join` for ids that arrive as plain integers; anything outside
    /// `[0, N)` is `InvalidId`.
    pub fn join_raw(&self, id: i64) -> Result<(), ThreadError> {
        match usize::try_from(id) {
            Ok(index) if index < N => self.join(ThreadId(index)),
            _ => Err(ThreadError::InvalidId(id)),
        }
    }

    fn join_failed(&self, id: ThreadId, reason: JoinFailure) -> ThreadError {
        warn!(id = id.index(), %reason, "join failed");
        ThreadError::JoinFailed { id, reason }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Slots that are not free for reuse.
    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state.load(Ordering::SeqCst) != INACTIVE)
            .count()
    }

    pub fn is_active(&self, id: ThreadId) -> bool {
        self.slots
            .get(id.index())
            .is_some_and(|slot| slot.state.load(Ordering::SeqCst) != INACTIVE)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: ThreadBackend, const N: usize> Drop for ThreadRegistry<B, N> {
    fn drop(&mut self) {
        for slot in &mut self.slots {
            if let Some(running) = slot.running.get_mut().take() {
                self.backend.detach(running.handle);
            }
        }
    }
}

impl<B: ThreadBackend, const N: usize> fmt::Debug for ThreadRegistry<B, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadRegistry")
            .field("backend", &self.backend.name())
            .field("capacity", &N)
            .field("active", &self.active_count())
            .field("config", &self.config)
            .finish()
    }
}

fn trampoline<F>(serial: u64, id: ThreadId, outcome: Arc<AtomicU8>, body: F) -> Task
where
    F: FnOnce() + Send + 'static,
{
    Box::new(move || {
        CURRENT.with(|c| c.set(Some((serial, id))));
        let span = tracing::debug_span!("strand.thread", id = id.index());
        let _enter = span.enter();

        let finished = match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(()) => RETURNED,
            Err(payload) if is_exit(&*payload) => EXITED,
            Err(_) => PANICKED,
        };
        outcome.store(finished, Ordering::SeqCst);

        CURRENT.with(|c| c.set(None));
    })
}

fn is_exit(payload: &(dyn Any + Send)) -> bool {
    payload.is::<ExitSignal>()
}
