use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::metrics::ANTICHEAT_VIOLATIONS_TOTAL;
use crate::models::BlockedAction;

/// Shown to the candidate after the first visibility loss.
pub const VISIBILITY_WARNING_MESSAGE: &str =
    "Warning: do not switch tabs or windows. Doing so again will automatically submit your quiz.";

const FORCE_SUBMIT_THRESHOLD: u32 = 2; // second visibility loss forces submission

/// Per-session monitor for the browser-side anti-cheating signals. The first
/// visibility loss raises a warning, the second forces submission exactly
/// once; after that the monitor is inert. Blocked clipboard and context-menu
/// actions are informational and never escalate.
///
/// Callbacks run under the monitor's internal lock and must not call back
/// into the monitor.
pub struct AnticheatMonitor {
    state: Mutex<MonitorState>,
}

struct MonitorState {
    armed: bool,
    visibility_losses: u32,
    force_fired: bool,
    on_warning: Box<dyn Fn(u32) + Send>,
    on_force_submit: Option<Box<dyn FnOnce(u32) + Send>>,
    on_blocked_action: Box<dyn Fn(BlockedAction) + Send>,
}

impl AnticheatMonitor {
    pub fn arm<W, F, B>(on_warning: W, on_force_submit: F, on_blocked_action: B) -> Self
    where
        W: Fn(u32) + Send + 'static,
        F: FnOnce(u32) + Send + 'static,
        B: Fn(BlockedAction) + Send + 'static,
    {
        AnticheatMonitor {
            state: Mutex::new(MonitorState {
                armed: true,
                visibility_losses: 0,
                force_fired: false,
                on_warning: Box::new(on_warning),
                on_force_submit: Some(Box::new(on_force_submit)),
                on_blocked_action: Box::new(on_blocked_action),
            }),
        }
    }

    /// Records one visibility loss and returns the running count.
    pub fn record_visibility_loss(&self) -> u32 {
        if Self::anticheat_disabled() {
            tracing::debug!("Anticheat disabled (ANTICHEAT_DISABLED=1); ignoring visibility loss");
            return self.visibility_losses();
        }

        let mut state = self.lock();
        if !state.armed || state.force_fired {
            return state.visibility_losses;
        }

        state.visibility_losses += 1;
        let count = state.visibility_losses;
        ANTICHEAT_VIOLATIONS_TOTAL
            .with_label_values(&["visibility-loss"])
            .inc();

        if count < FORCE_SUBMIT_THRESHOLD {
            tracing::warn!("Visibility loss detected: count={}, issuing warning", count);
            (state.on_warning)(count);
        } else {
            state.force_fired = true;
            tracing::warn!(
                "Visibility loss threshold reached: count={}, forcing submission",
                count
            );
            if let Some(on_force_submit) = state.on_force_submit.take() {
                on_force_submit(count);
            }
        }

        count
    }

    /// Reports a suppressed candidate action (copy, paste, context menu).
    pub fn record_blocked_action(&self, action: BlockedAction) {
        if Self::anticheat_disabled() {
            return;
        }

        let state = self.lock();
        if !state.armed {
            return;
        }

        ANTICHEAT_VIOLATIONS_TOTAL
            .with_label_values(&[action.as_str()])
            .inc();
        tracing::debug!("Blocked candidate action: action={}", action.as_str());
        (state.on_blocked_action)(action);
    }

    /// Stops all monitoring. Idempotent.
    pub fn disarm(&self) {
        let mut state = self.lock();
        if !state.armed {
            return;
        }
        state.armed = false;
        state.on_force_submit = None;
    }

    pub fn is_armed(&self) -> bool {
        self.lock().armed
    }

    pub fn visibility_losses(&self) -> u32 {
        self.lock().visibility_losses
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Helper to check whether anticheat is disabled via env var
    fn anticheat_disabled() -> bool {
        std::env::var("ANTICHEAT_DISABLED").unwrap_or_else(|_| "0".to_string()) == "1"
    }
}
