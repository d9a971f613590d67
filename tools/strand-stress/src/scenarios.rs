use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use strand_sync::{Backoff, Barrier, TicketLock};
use strand_threads::{ConfigError, ThreadError, ThreadId, current_id, lifecycle};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StressError {
    #[error(transparent)]
    Thread(#[from] ThreadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("--threads must be between 1 and {max}, got {got}")]
    ThreadCount { got: usize, max: usize },

    #[error("property violated: {0}")]
    Violation(String),
}

fn check_thread_count(threads: usize) -> Result<(), StressError> {
    let max = lifecycle::registry().capacity();
    if threads == 0 || threads > max {
        return Err(StressError::ThreadCount { got: threads, max });
    }
    Ok(())
}

/// Starts `threads` workers with `spawn`. If one fails to start, `release`
/// runs to unblock the workers already started, they are joined, and the
/// spawn error is returned.
fn spawn_workers<S, R>(
    threads: usize,
    mut spawn: S,
    release: R,
) -> Result<Vec<ThreadId>, StressError>
where
    S: FnMut(usize) -> Result<ThreadId, ThreadError>,
    R: FnOnce(),
{
    let mut ids = Vec::with_capacity(threads);
    for n in 0..threads {
        match spawn(n) {
            Ok(id) => ids.push(id),
            Err(err) => {
                warn!(started = ids.len(), %err, "worker failed to start");
                release();
                for id in ids {
                    if let Err(join_err) = lifecycle::join(id) {
                        warn!(%id, %join_err, "failed to join worker");
                    }
                }
                return Err(err.into());
            }
        }
    }
    Ok(ids)
}

fn join_all(ids: Vec<ThreadId>) -> Result<(), StressError> {
    for id in ids {
        lifecycle::join(id)?;
    }
    Ok(())
}

/// Every increment made under the lock must be visible at the end.
pub fn mutex(threads: usize, iterations: usize, backoff: Backoff) -> Result<(), StressError> {
    check_thread_count(threads)?;

    let counter = Arc::new(TicketLock::with_backoff(0usize, backoff));
    let ids = spawn_workers(
        threads,
        |_| {
            let counter = Arc::clone(&counter);
            lifecycle::spawn(move || {
                for _ in 0..iterations {
                    *counter.lock() += 1;
                }
            })
        },
        || {},
    )?;
    join_all(ids)?;

    let total = *counter.lock();
    let expected = threads * iterations;
    if total != expected {
        return Err(StressError::Violation(format!(
            "counter is {} after {} increments",
            total, expected
        )));
    }

    println!("mutex: {} threads x {} iterations = {}", threads, iterations, total);
    Ok(())
}

const PENDING: u8 = 0;
const GO: u8 = 1;
const ABORT: u8 = 2;

fn wait_for_start(start: &AtomicU8) -> u8 {
    loop {
        match start.load(Ordering::SeqCst) {
            PENDING => std::thread::yield_now(),
            state => return state,
        }
    }
}

/// After round `r`, every participant has arrived `r + 1` times and none
/// has arrived `r + 2` times yet from the point of view of any thread.
pub fn barrier(threads: usize, rounds: usize, backoff: Backoff) -> Result<(), StressError> {
    check_thread_count(threads)?;

    struct Shared {
        barrier: Barrier,
        start: AtomicU8,
        arrivals: AtomicUsize,
        leaders: AtomicUsize,
        violations: AtomicUsize,
    }

    let shared = Arc::new(Shared {
        barrier: Barrier::with_backoff(threads, backoff),
        start: AtomicU8::new(PENDING),
        arrivals: AtomicUsize::new(0),
        leaders: AtomicUsize::new(0),
        violations: AtomicUsize::new(0),
    });

    // nobody touches the barrier until every participant is running
    let ids = spawn_workers(
        threads,
        |_| {
            let shared = Arc::clone(&shared);
            lifecycle::spawn(move || {
                if wait_for_start(&shared.start) == ABORT {
                    return;
                }
                for round in 0..rounds {
                    shared.arrivals.fetch_add(1, Ordering::SeqCst);
                    if shared.barrier.wait().is_leader() {
                        shared.leaders.fetch_add(1, Ordering::SeqCst);
                    }

                    let seen = shared.arrivals.load(Ordering::SeqCst);
                    if seen < threads * (round + 1) || seen >= threads * (round + 2) {
                        debug!(round, seen, "thread ran outside its phase");
                        shared.violations.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        },
        || shared.start.store(ABORT, Ordering::SeqCst),
    )?;
    shared.start.store(GO, Ordering::SeqCst);
    join_all(ids)?;

    let violations = shared.violations.load(Ordering::SeqCst);
    if violations > 0 {
        return Err(StressError::Violation(format!(
            "{} observations outside their barrier phase",
            violations
        )));
    }
    let leaders = shared.leaders.load(Ordering::SeqCst);
    if leaders != rounds {
        return Err(StressError::Violation(format!(
            "{} leaders over {} rounds",
            leaders, rounds
        )));
    }

    println!("barrier: {} threads x {} rounds", threads, rounds);
    Ok(())
}

pub fn hello(threads: usize) -> Result<(), StressError> {
    check_thread_count(threads)?;

    let greeted = Arc::new(AtomicUsize::new(0));
    let ids = spawn_workers(
        threads,
        |n| {
            lifecycle::create(
                |(greeted, n): (Arc<AtomicUsize>, usize)| {
                    let id = current_id().map(|id| id.index());
                    info!(worker = n, ?id, "hello");
                    greeted.fetch_add(1, Ordering::SeqCst);
                    lifecycle::exit();
                },
                (Arc::clone(&greeted), n),
            )
        },
        || {},
    )?;
    join_all(ids)?;

    let greeted = greeted.load(Ordering::SeqCst);
    if greeted != threads {
        return Err(StressError::Violation(format!(
            "{} of {} threads greeted",
            greeted, threads
        )));
    }

    println!("hello: {} threads joined", threads);
    Ok(())
}

/// The main thread holds the lock while workers queue up one at a time;
/// once released, they must acquire it in the order they queued.
pub fn fifo(threads: usize, backoff: Backoff) -> Result<(), StressError> {
    check_thread_count(threads)?;

    let order = Arc::new(TicketLock::with_backoff(Vec::with_capacity(threads), backoff));
    let mut held = Some(order.lock());

    let ids = spawn_workers(
        threads,
        |n| {
            let queued = Arc::clone(&order);
            let id = lifecycle::spawn(move || queued.lock().push(n))?;

            // main holds ticket 0, worker n takes ticket n + 1
            while order.raw().next_ticket() < n + 2 {
                std::thread::yield_now();
            }
            Ok(id)
        },
        || drop(held.take()),
    )?;
    drop(held);
    join_all(ids)?;

    let order = order.lock();
    if let Some(position) = order.iter().enumerate().position(|(i, n)| i != *n) {
        return Err(StressError::Violation(format!(
            "worker {} acquired the lock in position {}",
            order[position], position
        )));
    }

    println!("fifo: {} threads acquired in ticket order", threads);
    Ok(())
}
