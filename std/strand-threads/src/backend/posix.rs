//!
//! pthread Backend
//!
//! `pthread_create` receives a thin pointer to a heap-allocated `StartArgs`;
//! the start routine takes ownership of it back exactly once. If creation
//! fails the pointer never reached another thread and is reclaimed here.
//!

use std::ffi::{CString, c_void};
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use tracing::warn;

use super::{JoinError, SpawnOptions, Task, ThreadBackend};
use crate::error::{JoinFailure, SpawnFailure};

#[derive(Debug, Clone, Copy, Default)]
pub struct PosixBackend;

/// Owned `pthread_t`; consumed by join or detach.
#[derive(Debug)]
pub struct PosixHandle(libc::pthread_t);

// pthread_t is an opaque pointer on some platforms; the id itself may be
// joined from any thread.
unsafe impl Send for PosixHandle {}

impl PosixHandle {
    pub fn as_raw(&self) -> libc::pthread_t {
        self.0
    }
}

struct StartArgs {
    task: Task,
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    name: Option<CString>,
}

extern "C" fn thread_start(arg: *mut c_void) -> *mut c_void {
    // SAFETY: `arg` is the `Box<StartArgs>` leaked by `spawn`, handed to
    // exactly one thread.
    let args = unsafe { Box::from_raw(arg as *mut StartArgs) };

    #[cfg(target_os = "linux")]
    if let Some(name) = &args.name {
        // Names longer than 15 bytes are rejected with ERANGE; that is fine.
        unsafe { libc::pthread_setname_np(libc::pthread_self(), name.as_ptr()) };
    }

    // Unwinding out of an extern "C" function aborts the process.
    let _ = panic::catch_unwind(AssertUnwindSafe(args.task));
    ptr::null_mut()
}

fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as usize } else { 4096 }
}

fn detach_status(rc: i32) -> Result<(), JoinFailure> {
    if rc == 0 {
        Ok(())
    } else {
        Err(JoinFailure::from_errno(rc))
    }
}

impl ThreadBackend for PosixBackend {
    type Handle = PosixHandle;

    fn spawn(&self, task: Task, options: &SpawnOptions) -> Result<Self::Handle, SpawnFailure> {
        let mut attr: libc::pthread_attr_t = unsafe { mem::zeroed() };
        let rc = unsafe { libc::pthread_attr_init(&mut attr) };
        if rc != 0 {
            return Err(SpawnFailure::from_errno(rc));
        }

        if let Some(size) = options.stack_size {
            let page = page_size();
            let size = size.div_ceil(page) * page;
            let rc = unsafe { libc::pthread_attr_setstacksize(&mut attr, size) };
            if rc != 0 {
                unsafe { libc::pthread_attr_destroy(&mut attr) };
                return Err(SpawnFailure::from_errno(rc));
            }
        }

        let name = options
            .name
            .as_deref()
            .and_then(|n| CString::new(n).ok());
        let arg = Box::into_raw(Box::new(StartArgs { task, name }));

        let mut thread: libc::pthread_t = unsafe { mem::zeroed() };
        let rc = unsafe { libc::pthread_create(&mut thread, &attr, thread_start, arg as *mut c_void) };
        unsafe { libc::pthread_attr_destroy(&mut attr) };

        if rc != 0 {
            // SAFETY: no thread was created, so `arg` is still ours.
            drop(unsafe { Box::from_raw(arg) });
            return Err(SpawnFailure::from_errno(rc));
        }

        Ok(PosixHandle(thread))
    }

    fn join(&self, handle: Self::Handle) -> Result<(), JoinError<Self::Handle>> {
        let rc = unsafe { libc::pthread_join(handle.0, ptr::null_mut()) };
        if rc == 0 {
            Ok(())
        } else {
            // a failed pthread_join leaves the thread joinable
            Err(JoinError::unjoined(handle, JoinFailure::from_errno(rc)))
        }
    }

    fn detach(&self, handle: Self::Handle) {
        let rc = unsafe { libc::pthread_detach(handle.0) };
        if let Err(reason) = detach_status(rc) {
            warn!(rc, %reason, "pthread_detach failed");
        }
    }

    fn name(&self) -> &'static str {
        "pthread"
    }
}
