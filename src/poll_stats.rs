use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative counters for the lifetime of the process.
#[derive(Debug)]
pub struct PollStats {
    cycles: AtomicU64,
    events: AtomicU64,
    wallet_failures: AtomicU64,
    notifications_sent: AtomicU64,
    notifications_failed: AtomicU64,
}

impl Default for PollStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PollStats {
    pub const fn new() -> Self {
        Self {
            cycles: AtomicU64::new(0),
            events: AtomicU64::new(0),
            wallet_failures: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            notifications_failed: AtomicU64::new(0),
        }
    }

    pub fn inc_cycles(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_events(&self, n: u64) {
        self.events.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_wallet_failures(&self, n: u64) {
        self.wallet_failures.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_notification(&self, delivered: bool) {
        let counter = if delivered {
            &self.notifications_sent
        } else {
            &self.notifications_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PollSnapshot {
        PollSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            wallet_failures: self.wallet_failures.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PollSnapshot {
    pub cycles: u64,
    pub events: u64,
    pub wallet_failures: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
}

pub static POLL_STATS: PollStats = PollStats::new();
