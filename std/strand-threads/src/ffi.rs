//!
//! C Interface
//!
//! Exposes the process-wide registry and the primitives to C callers with
//! the shape of the classic `thread.h` API:
//!
//! ```c
//! void  strand_thread_init(void);
//! int   strand_thread_create(void* (*entry)(void*), void* data);  // id, or < 0
//! int   strand_thread_join(int id);                               // 0, or < 0
//! void  strand_thread_exit(void);
//! ```
//!
//! Negative results are `ThreadError::code` values; pass them to
//! `strand_thread_error_string` for a description.
//!
//! `strand_atomic_compare_exchange` follows the C11 convention: `expected`
//! points at the value the caller believes is stored and is overwritten with
//! the actual value when the exchange fails.
//!
//! Entry points and `strand_thread_exit` use the `C-unwind` ABI because
//! `exit` unwinds back to the registry's trampoline. C entry points must be
//! compiled with unwind tables (`-fexceptions`) to call it.
//!

use std::ffi::{c_char, c_void};
use std::sync::atomic::AtomicUsize;

use strand_sync::{
    Barrier, TicketMutex, atomic_compare_exchange, atomic_fetch_add, atomic_fetch_sub,
    atomic_load, atomic_store,
};

use crate::error::ThreadError;
use crate::lifecycle;

pub type ThreadEntry = extern "C-unwind" fn(*mut c_void) -> *mut c_void;

/// Opaque argument pointer carried to the new thread. The C caller owns
/// whatever it points at.
struct RawArg(*mut c_void);

unsafe impl Send for RawArg {}

fn status(result: Result<(), ThreadError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => err.code(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn strand_thread_init() {
    lifecycle::init();
}

#[unsafe(no_mangle)]
pub extern "C" fn strand_thread_create(entry: ThreadEntry, data: *mut c_void) -> i32 {
    match lifecycle::create(move |arg: RawArg| { entry(arg.0); }, RawArg(data)) {
        Ok(id) => id.index() as i32,
        Err(err) => err.code(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn strand_thread_join(id: i32) -> i32 {
    status(lifecycle::join_raw(id as i64))
}

#[unsafe(no_mangle)]
pub extern "C-unwind" fn strand_thread_exit() -> ! {
    lifecycle::exit()
}

#[unsafe(no_mangle)]
pub extern "C" fn strand_thread_error_string(code: i32) -> *const c_char {
    let message = match code {
        0 => c"ok",
        -1 => c"thread table is full",
        -2 => c"failed to create thread",
        -3 => c"invalid thread id",
        -4 => c"failed to join thread",
        -5 => c"thread registry is already initialized",
        -6 => c"invalid registry configuration",
        _ => c"unknown error",
    };
    message.as_ptr()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_atomic_fetch_add(target: *mut usize, value: usize) -> usize {
    unsafe { atomic_fetch_add(AtomicUsize::from_ptr(target), value) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_atomic_fetch_sub(target: *mut usize, value: usize) -> usize {
    unsafe { atomic_fetch_sub(AtomicUsize::from_ptr(target), value) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_atomic_load(target: *mut usize) -> usize {
    unsafe { atomic_load(AtomicUsize::from_ptr(target)) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_atomic_store(target: *mut usize, value: usize) {
    unsafe { atomic_store(AtomicUsize::from_ptr(target), value) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_atomic_compare_exchange(
    target: *mut usize,
    expected: *mut usize,
    desired: usize,
) -> bool {
    unsafe {
        match atomic_compare_exchange(AtomicUsize::from_ptr(target), *expected, desired) {
            Ok(_) => true,
            Err(actual) => {
                *expected = actual;
                false
            }
        }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn strand_ticket_mutex_new() -> *mut TicketMutex {
    Box::into_raw(Box::new(TicketMutex::new()))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_ticket_mutex_begin(mutex: *const TicketMutex) {
    if !mutex.is_null() {
        unsafe { (*mutex).begin() }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_ticket_mutex_end(mutex: *const TicketMutex) {
    if !mutex.is_null() {
        unsafe { (*mutex).end() }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_ticket_mutex_free(mutex: *mut TicketMutex) {
    if !mutex.is_null() {
        drop(unsafe { Box::from_raw(mutex) });
    }
}

/// Returns null when `thread_count` is zero.
#[unsafe(no_mangle)]
pub extern "C" fn strand_barrier_new(thread_count: usize) -> *mut Barrier {
    if thread_count == 0 {
        return std::ptr::null_mut();
    }
    Box::into_raw(Box::new(Barrier::new(thread_count)))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_barrier_wait(barrier: *const Barrier) {
    if !barrier.is_null() {
        unsafe { (*barrier).wait() };
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_barrier_free(barrier: *mut Barrier) {
    if !barrier.is_null() {
        drop(unsafe { Box::from_raw(barrier) });
    }
}
