use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::sleep;

/// One-second countdown driving a session. Fires `on_tick` with the new
/// remaining value after every decrement, down to and including zero, then
/// fires `on_expire` exactly once. A zero duration expires immediately with
/// no ticks.
///
/// `cancel` and expiry serialize on an internal lock: whichever claims the
/// clock first wins and the other becomes a no-op. Callbacks run under that
/// lock and must not call back into the clock.
pub struct SessionClock {
    callbacks: Arc<Mutex<ClockCallbacks>>,
    task: tokio::task::JoinHandle<()>,
}

struct ClockCallbacks {
    cancelled: bool,
    expired: bool,
    on_tick: Box<dyn Fn(u32) + Send>,
    on_expire: Option<Box<dyn FnOnce() + Send>>,
}

impl SessionClock {
    pub fn start<T, E>(duration_seconds: u32, on_tick: T, on_expire: E) -> SessionClock
    where
        T: Fn(u32) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        let callbacks = Arc::new(Mutex::new(ClockCallbacks {
            cancelled: false,
            expired: false,
            on_tick: Box::new(on_tick),
            on_expire: Some(Box::new(on_expire)),
        }));

        let task_callbacks = Arc::clone(&callbacks);
        let task = tokio::spawn(async move {
            let mut remaining = duration_seconds;
            loop {
                if remaining == 0 {
                    let mut guard = lock(&task_callbacks);
                    if guard.cancelled || guard.expired {
                        return;
                    }
                    guard.expired = true;
                    if let Some(on_expire) = guard.on_expire.take() {
                        on_expire();
                    }
                    return;
                }

                sleep(Duration::from_secs(1)).await;
                remaining = remaining.saturating_sub(1);

                let guard = lock(&task_callbacks);
                if guard.cancelled || guard.expired {
                    return;
                }
                (guard.on_tick)(remaining);
            }
        });

        SessionClock { callbacks, task }
    }

    /// Stops the countdown. Idempotent; after expiry it is a no-op.
    pub fn cancel(&self) {
        {
            let mut guard = lock(&self.callbacks);
            if guard.cancelled || guard.expired {
                return;
            }
            guard.cancelled = true;
            guard.on_expire = None;
        }
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        let guard = lock(&self.callbacks);
        guard.cancelled || guard.expired
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock(callbacks: &Mutex<ClockCallbacks>) -> MutexGuard<'_, ClockCallbacks> {
    callbacks.lock().unwrap_or_else(PoisonError::into_inner)
}
