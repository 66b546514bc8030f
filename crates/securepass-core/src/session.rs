//! Inactivity watchdog for session locking
//!
//! Counts down from a fixed idle duration and fires a callback exactly once
//! if no activity is observed. Activity signals reset the countdown;
//! dropping the guard cancels it so a stale callback can never fire.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Inactivity countdown around a lock/logout callback.
///
/// At most one countdown is pending at any moment: resetting aborts the
/// previous timer task before arming a new one. After the callback fires the
/// guard stays idle until explicitly restarted.
///
/// Must be constructed inside a Tokio runtime.
pub struct SessionGuard {
    idle: Duration,
    on_timeout: Arc<dyn Fn() + Send + Sync>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl SessionGuard {
    /// Create the guard and start the countdown immediately
    pub fn new(idle: Duration, on_timeout: impl Fn() + Send + Sync + 'static) -> Self {
        let guard = Self {
            idle,
            on_timeout: Arc::new(on_timeout),
            timer: Mutex::new(None),
        };
        guard.arm();
        guard
    }

    /// Observe user activity: reset the countdown to the full duration
    pub fn activity(&self) {
        self.arm();
    }

    /// Arm the countdown again after it has fired
    pub fn restart(&self) {
        self.arm();
    }

    /// Cancel any pending countdown
    pub fn cancel(&self) {
        let mut timer = self.lock_timer();
        if let Some(handle) = timer.take() {
            handle.abort();
        }
    }

    fn arm(&self) {
        let mut timer = self.lock_timer();
        if let Some(handle) = timer.take() {
            handle.abort();
        }

        let idle = self.idle;
        let on_timeout = Arc::clone(&self.on_timeout);
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            on_timeout();
        }));
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}
