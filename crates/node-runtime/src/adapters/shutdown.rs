//! # Shutdown Signal
//!
//! Raised once (normally by Ctrl+C). Blocking work such as a bulk import
//! polls [`ShutdownSignal::flag`] between blocks; async tasks await
//! [`ShutdownSignal::wait`].

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct ShutdownSignal {
    raised: AtomicBool,
    notify: Notify,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.raised.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Interrupt flag for synchronous loops.
    pub fn flag(&self) -> &AtomicBool {
        &self.raised
    }

    /// Resolves once the signal has been raised, immediately if it already was.
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a trigger in between is not lost.
        notified.as_mut().enable();
        if self.is_triggered() {
            return;
        }
        notified.await;
    }
}
