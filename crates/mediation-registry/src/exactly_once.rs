use crate::adapter::{CloseReason, PaidEvent, ShowCallbacks};
use crate::error::AdapterError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Wraps a host-supplied [`ShowCallbacks`] so its terminal callback
/// (`on_closed` or `on_error`) fires at most once per show attempt, even if
/// the underlying adapter calls back twice or calls both. Non-terminal
/// callbacks pass straight through.
pub struct ExactlyOnceCallbacks {
    inner: Arc<dyn ShowCallbacks>,
    terminal_fired: AtomicBool,
}

impl ExactlyOnceCallbacks {
    pub fn wrap(inner: Arc<dyn ShowCallbacks>) -> Arc<Self> {
        Arc::new(Self { inner, terminal_fired: AtomicBool::new(false) })
    }
}

impl ShowCallbacks for ExactlyOnceCallbacks {
    fn on_impression(&self, meta: &BTreeMap<String, String>) {
        self.inner.on_impression(meta);
    }

    fn on_paid_event(&self, event: &PaidEvent) {
        self.inner.on_paid_event(event);
    }

    fn on_click(&self, meta: &BTreeMap<String, String>) {
        self.inner.on_click(meta);
    }

    fn on_reward_verified(&self, reward_type: &str, amount: f64) {
        self.inner.on_reward_verified(reward_type, amount);
    }

    fn on_closed(&self, reason: CloseReason) {
        if self.terminal_fired.swap(true, Ordering::SeqCst) {
            tracing::warn!("adapter delivered a terminal show callback more than once, suppressing on_closed");
            return;
        }
        self.inner.on_closed(reason);
    }

    fn on_error(&self, error: &AdapterError) {
        if self.terminal_fired.swap(true, Ordering::SeqCst) {
            tracing::warn!("adapter delivered a terminal show callback more than once, suppressing on_error");
            return;
        }
        self.inner.on_error(error);
    }
}
