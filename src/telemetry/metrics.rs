//! Client counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter for relaxed increments.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters owned by a client service.
#[derive(Debug, Default)]
pub struct ClientStats {
    /// SOLICIT messages handed to the transport.
    pub solicits_sent: Counter,
    /// RENEW messages handed to the transport.
    pub renews_sent: Counter,
    /// REPLY messages that produced or refreshed a binding.
    pub replies_accepted: Counter,
    /// REPLY messages rejected by validation.
    pub replies_rejected: Counter,
    /// Sends the transport refused to queue.
    pub send_failures: Counter,
    /// Vendor/DNS/domain options forwarded to a notification callback.
    pub option_notifications: Counter,
}

impl ClientStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exports all counters as key-value pairs.
    pub fn export(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("solicits_sent", self.solicits_sent.get()),
            ("renews_sent", self.renews_sent.get()),
            ("replies_accepted", self.replies_accepted.get()),
            ("replies_rejected", self.replies_rejected.get()),
            ("send_failures", self.send_failures.get()),
            ("option_notifications", self.option_notifications.get()),
        ]
    }
}
