use std::thread;

use super::{JoinError, SpawnOptions, Task, ThreadBackend};
use crate::error::{JoinFailure, SpawnFailure};

/// Threads from the standard library.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdBackend;

impl ThreadBackend for StdBackend {
    type Handle = thread::JoinHandle<()>;

    fn spawn(&self, task: Task, options: &SpawnOptions) -> Result<Self::Handle, SpawnFailure> {
        let mut builder = thread::Builder::new();
        if let Some(name) = &options.name {
            builder = builder.name(name.clone());
        }
        if let Some(size) = options.stack_size {
            builder = builder.stack_size(size);
        }
        builder.spawn(task).map_err(|e| SpawnFailure::from_io(&e))
    }

    fn join(&self, handle: Self::Handle) -> Result<(), JoinError<Self::Handle>> {
        // std's join only fails after the thread has finished
        handle
            .join()
            .map_err(|_| JoinError::finished(JoinFailure::Panicked))
    }

    fn detach(&self, handle: Self::Handle) {
        drop(handle);
    }

    fn name(&self) -> &'static str {
        "std"
    }
}
