//!
//! Spin-wait Backoff Policy
//!
//! Every busy-wait loop in strand polls its condition and then calls
//! `Spinner::spin()`. The policy decides what one iteration costs:
//!
//! - `spin` - issue a CPU pause hint and poll again immediately
//! - `yield` - give the rest of the time slice back to the OS scheduler
//! - `exponential` - pause 1, 2, 4 .. 64 times, then fall back to yielding
//!
//! `exponential` is the default: it stays cheap when the wait is short and
//! stops burning a core when the thread it waits on has been preempted.
//!

use std::fmt;
use std::str::FromStr;
use std::thread;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pause rounds after which `Backoff::Exponential` starts yielding.
const SPIN_LIMIT: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    Spin,
    Yield,
    #[default]
    Exponential,
}

impl Backoff {
    pub const ALL: [Backoff; 3] = [Backoff::Spin, Backoff::Yield, Backoff::Exponential];

    pub fn spinner(self) -> Spinner {
        Spinner {
            policy: self,
            step: 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Backoff::Spin => "spin",
            Backoff::Yield => "yield",
            Backoff::Exponential => "exponential",
        }
    }
}

impl fmt::Display for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown backoff '{0}' (expected spin, yield or exponential)")]
pub struct ParseBackoffError(String);

impl FromStr for Backoff {
    type Err = ParseBackoffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Backoff::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseBackoffError(s.to_string()))
    }
}

/// State for one wait. Create a fresh spinner for every wait loop.
#[derive(Debug, Clone)]
pub struct Spinner {
    policy: Backoff,
    step: u32,
}

impl Spinner {
    #[inline]
    pub fn spin(&mut self) {
        match self.policy {
            Backoff::Spin => std::hint::spin_loop(),
            Backoff::Yield => thread::yield_now(),
            Backoff::Exponential => {
                if self.step <= SPIN_LIMIT {
                    for _ in 0..(1u32 << self.step) {
                        std::hint::spin_loop();
                    }
                    self.step += 1;
                } else {
                    thread::yield_now();
                }
            }
        }
    }

    /// True once an exponential spinner has moved on to yielding.
    pub fn is_yielding(&self) -> bool {
        match self.policy {
            Backoff::Spin => false,
            Backoff::Yield => true,
            Backoff::Exponential => self.step > SPIN_LIMIT,
        }
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }

    pub fn policy(&self) -> Backoff {
        self.policy
    }
}
