use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub malformed_received: u64,
    pub send_failures: u64,
}

/// Counters shared between the receive thread and the simulation thread.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    malformed_received: AtomicU64,
    send_failures: AtomicU64,
}

impl StatsCounters {
    pub fn record_sent(&self, bytes: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: usize) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> NetworkStats {
        NetworkStats {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            malformed_received: self.malformed_received.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let counters = StatsCounters::default();
        counters.record_sent(10);
        counters.record_sent(5);
        counters.record_received(7);
        counters.record_malformed();

        let stats = counters.snapshot();
        assert_eq!(stats.packets_sent, 2);
        assert_eq!(stats.bytes_sent, 15);
        assert_eq!(stats.packets_received, 1);
        assert_eq!(stats.bytes_received, 7);
        assert_eq!(stats.malformed_received, 1);
        assert_eq!(stats.send_failures, 0);
    }
}
