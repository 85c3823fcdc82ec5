//! Session watchdog
//!
//! A session that outlives its budget is killed outright, the way an
//! unhandled `SIGALRM` would end it. Dropping the [`Watchdog`] disarms it.

use std::process;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::warn;

/// Exit status of a process terminated by `SIGALRM` (128 + 14).
pub const TIMEOUT_EXIT_CODE: i32 = 142;

pub struct Watchdog {
    disarm: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Terminate the process once `timeout` elapses.
    pub fn arm(timeout: Duration) -> Self {
        Self::arm_with(timeout, move || {
            warn!(?timeout, "session timed out");
            process::exit(TIMEOUT_EXIT_CODE);
        })
    }

    /// Run `on_expiry` once `timeout` elapses, unless disarmed first.
    pub fn arm_with<F>(timeout: Duration, on_expiry: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = rx.recv_timeout(timeout) {
                on_expiry();
            }
        });
        Watchdog {
            disarm: Some(tx),
            handle: Some(handle),
        }
    }

    /// Stop the timer and wait for its thread.
    pub fn disarm(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // closing the channel wakes the timer thread
        self.disarm.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("watchdog expiry action panicked");
            }
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.shutdown();
    }
}
