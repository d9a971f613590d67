//!
//! Process-wide Thread Lifecycle
//!
//! One `ThreadRegistry` shared by the whole process, created on first use
//! (or explicitly with `init` / `init_with`) and never torn down.
//!
//! ```no_run
//! use strand_threads::lifecycle;
//!
//! lifecycle::init();
//! let id = lifecycle::create(|n: u32| println!("hello from {n}"), 7).unwrap();
//! lifecycle::join(id).unwrap();
//! ```
//!

use std::sync::OnceLock;

use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::ThreadError;
use crate::registry::{ThreadId, ThreadRegistry};

static REGISTRY: OnceLock<ThreadRegistry> = OnceLock::new();

/// Initializes the process-wide registry with default configuration.
/// Calling it again is a no-op.
pub fn init() -> &'static ThreadRegistry {
    REGISTRY.get_or_init(|| {
        debug!("initializing thread registry");
        ThreadRegistry::new()
    })
}

/// Initializes the process-wide registry with `config`.
///
/// Fails with `AlreadyInitialized` if the registry already exists, in
/// which case `config` is not applied.
pub fn init_with(config: RegistryConfig) -> Result<&'static ThreadRegistry, ThreadError> {
    config.validate()?;

    let mut installed = false;
    let registry = REGISTRY.get_or_init(|| {
        installed = true;
        debug!(?config, "initializing thread registry");
        ThreadRegistry::build_validated(config)
    });

    if installed {
        Ok(registry)
    } else {
        Err(ThreadError::AlreadyInitialized)
    }
}

pub fn registry() -> &'static ThreadRegistry {
    init()
}

pub fn create<A, F>(entry: F, argument: A) -> Result<ThreadId, ThreadError>
where
    F: FnOnce(A) + Send + 'static,
    A: Send + 'static,
{
    registry().create(entry, argument)
}

pub fn spawn<F>(f: F) -> Result<ThreadId, ThreadError>
where
    F: FnOnce() + Send + 'static,
{
    registry().spawn(f)
}

pub fn join(id: ThreadId) -> Result<(), ThreadError> {
    registry().join(id)
}

pub fn join_raw(id: i64) -> Result<(), ThreadError> {
    registry().join_raw(id)
}

/// Terminates the calling thread. See [`crate::registry::exit`].
pub fn exit() -> ! {
    crate::registry::exit()
}
