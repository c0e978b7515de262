use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Counters for one streaming session.
///
/// All counters are atomics so every background task can record into the same
/// shared instance.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// Poll ticks that reached the remote listing
    pub polls_total: AtomicU64,
    /// Poll ticks skipped because the listing failed
    pub listing_failures: AtomicU64,
    /// Segments appended to the known item sequence
    pub segments_discovered: AtomicU64,

    /// Segments transferred successfully
    pub downloads_total: AtomicU64,
    /// Bytes transferred
    pub download_bytes_total: AtomicU64,
    /// Sum of transfer latencies in milliseconds
    pub download_latency_sum_ms: AtomicU64,
    /// Segments given up on after exhausting retries
    pub download_errors: AtomicU64,

    /// Playlist rewrites
    pub playlist_flushes: AtomicU64,
}

/// Point-in-time copy of [`SessionMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub polls_total: u64,
    pub listing_failures: u64,
    pub segments_discovered: u64,
    pub downloads_total: u64,
    pub download_bytes_total: u64,
    pub download_latency_sum_ms: u64,
    pub download_errors: u64,
    pub playlist_flushes: u64,
}

impl MetricsSnapshot {
    pub fn avg_download_latency_ms(&self) -> f64 {
        if self.downloads_total == 0 {
            0.0
        } else {
            self.download_latency_sum_ms as f64 / self.downloads_total as f64
        }
    }
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_poll(&self) {
        self.polls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_listing_failure(&self) {
        self.listing_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discovered(&self, count: u64) {
        self.segments_discovered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_download(&self, bytes: u64, latency_ms: u64) {
        self.downloads_total.fetch_add(1, Ordering::Relaxed);
        self.download_bytes_total
            .fetch_add(bytes, Ordering::Relaxed);
        self.download_latency_sum_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn record_download_error(&self) {
        self.download_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.playlist_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            polls_total: self.polls_total.load(Ordering::Relaxed),
            listing_failures: self.listing_failures.load(Ordering::Relaxed),
            segments_discovered: self.segments_discovered.load(Ordering::Relaxed),
            downloads_total: self.downloads_total.load(Ordering::Relaxed),
            download_bytes_total: self.download_bytes_total.load(Ordering::Relaxed),
            download_latency_sum_ms: self.download_latency_sum_ms.load(Ordering::Relaxed),
            download_errors: self.download_errors.load(Ordering::Relaxed),
            playlist_flushes: self.playlist_flushes.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self, session_id: &str) {
        let s = self.snapshot();
        info!(
            session = session_id,
            polls = s.polls_total,
            listing_failures = s.listing_failures,
            discovered = s.segments_discovered,
            downloads = s.downloads_total,
            download_bytes = s.download_bytes_total,
            download_errors = s.download_errors,
            avg_download_ms = format!("{:.1}", s.avg_download_latency_ms()),
            playlist_flushes = s.playlist_flushes,
            "Session metrics"
        );
    }
}
