//! Lightweight atomic counters exposing the server's activity, queryable
//! without locking the event loop.

use std::sync::atomic::{AtomicU64, Ordering};

/// A point-in-time snapshot of [`Stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub messages_processed: u64,
    pub bytes_received: u64,
    pub processing_errors: u64,
    pub tls_handshake_failures: u64,
}

/// Counters incremented by the event loop and TLS handler threads.
#[derive(Debug, Default)]
pub struct Stats {
    messages_processed: AtomicU64,
    bytes_received: AtomicU64,
    processing_errors: AtomicU64,
    tls_handshake_failures: AtomicU64,
}

impl Stats {
    pub fn record_message(&self, bytes: u64) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.processing_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tls_handshake_failure(&self) {
        self.tls_handshake_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            processing_errors: self.processing_errors.load(Ordering::Relaxed),
            tls_handshake_failures: self.tls_handshake_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = Stats::default();
        stats.record_message(10);
        stats.record_message(5);
        stats.record_error();

        let snap = stats.snapshot();
        assert_eq!(snap.messages_processed, 2);
        assert_eq!(snap.bytes_received, 15);
        assert_eq!(snap.processing_errors, 1);
    }
}
