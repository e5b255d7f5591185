//! Process-wide operational counters, shared read-free across every worker
//! thread via relaxed atomics — ported from the reference implementation's
//! `metrics.c`.
//!
//! Relaxed ordering is correct here because these counters are observed
//! independently of one another (no worker ever needs to see an update to
//! `bytes_out` synchronized with an update to `requests_total`); the
//! `/metrics` renderer just wants approximately-current values.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct Metrics {
    requests_total: AtomicU64,
    connections_current: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    start_ms: u64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            connections_current: AtomicU64::new(0),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            start_ms: now_ms(),
        }
    }

    pub(crate) fn inc_requests_total(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_connections_current(&self) {
        self.connections_current.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dec_connections_current(&self) {
        self.connections_current.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn add_bytes_in(&self, n: u64) {
        self.bytes_in.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_bytes_out(&self, n: u64) {
        self.bytes_out.fetch_add(n, Ordering::Relaxed);
    }

    /// `requests_total / elapsed_seconds_since_start`, `0.0` while no time
    /// has elapsed yet (matches `metrics_requests_per_sec`'s `now_ms <=
    /// start_ms` guard in the reference implementation).
    fn requests_per_sec(&self) -> f64 {
        let now = now_ms();
        if now <= self.start_ms {
            return 0.0;
        }
        let elapsed_secs = (now - self.start_ms) as f64 / 1000.0;
        self.requests_total.load(Ordering::Relaxed) as f64 / elapsed_secs
    }

    /// Render the five-line plain-text body served at `/metrics`.
    pub(crate) fn render_plain(&self) -> String {
        format!(
            "requests_total {}\nrequests_per_sec {:.2}\nconnections_current {}\nbytes_in {}\nbytes_out {}\n",
            self.requests_total.load(Ordering::Relaxed),
            self.requests_per_sec(),
            self.connections_current.load(Ordering::Relaxed),
            self.bytes_in.load(Ordering::Relaxed),
            self.bytes_out.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_plain_has_five_lines_in_order() {
        let metrics = Metrics::new();
        metrics.inc_requests_total();
        metrics.inc_connections_current();
        metrics.add_bytes_in(100);
        metrics.add_bytes_out(200);

        let rendered = metrics.render_plain();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("requests_total 1"));
        assert!(lines[1].starts_with("requests_per_sec "));
        assert!(lines[2].starts_with("connections_current 1"));
        assert!(lines[3].starts_with("bytes_in 100"));
        assert!(lines[4].starts_with("bytes_out 200"));
    }

    #[test]
    fn connections_current_tracks_inc_and_dec() {
        let metrics = Metrics::new();
        metrics.inc_connections_current();
        metrics.inc_connections_current();
        metrics.dec_connections_current();
        assert_eq!(metrics.connections_current.load(Ordering::Relaxed), 1);
    }
}
