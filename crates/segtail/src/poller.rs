// Poll loop: lists the remote directory on a fixed interval and enqueues every
// segment beyond the known prefix.
//
// The known-item sequence only grows. Positions are compared, names are not:
// a listing whose length does not exceed the known length changes nothing, and
// a longer one contributes only the items past the known prefix.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{Result, SegtailError};
use crate::lister::{MediaItem, SegmentLister};
use crate::metrics::SessionMetrics;

/// Segments discovered so far, in discovery order.
pub type KnownItems = Arc<Mutex<Vec<MediaItem>>>;

pub struct PollLoop {
    lister: SegmentLister,
    known: KnownItems,
    queue: mpsc::Sender<MediaItem>,
    interval: Duration,
    token: CancellationToken,
    metrics: Arc<SessionMetrics>,
}

impl PollLoop {
    pub fn new(
        lister: SegmentLister,
        known: KnownItems,
        queue: mpsc::Sender<MediaItem>,
        interval: Duration,
        token: CancellationToken,
        metrics: Arc<SessionMetrics>,
    ) -> Self {
        Self {
            lister,
            known,
            queue,
            interval,
            token,
            metrics,
        }
    }

    /// Polls until cancelled. Listing failures skip the tick.
    pub async fn run(self) -> Result<()> {
        loop {
            match self.tick().await {
                Ok(0) => {}
                Ok(added) => debug!(added, "Discovered new segments"),
                Err(SegtailError::Cancelled) => break,
                Err(SegtailError::RemoteListingFailed { path, reason }) => {
                    self.metrics.record_listing_failure();
                    warn!(%path, %reason, "Remote listing failed, retrying next tick");
                }
                Err(e) => return Err(e),
            }

            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        debug!("Poll loop stopped");
        Ok(())
    }

    /// Performs one listing and enqueues the new suffix. Returns the number of
    /// items added to the known sequence.
    ///
    /// Blocks while the queue is full; cancellation interrupts the wait.
    pub async fn tick(&self) -> Result<usize> {
        if self.token.is_cancelled() {
            return Err(SegtailError::Cancelled);
        }

        let listed = tokio::select! {
            biased;
            _ = self.token.cancelled() => return Err(SegtailError::Cancelled),
            listed = self.lister.list() => listed?,
        };
        self.metrics.record_poll();

        let mut known = self.known.lock().await;
        let n = known.len();
        let max = listed.len();
        trace!(known = n, listed = max, "Poll tick");
        if max <= n {
            return Ok(0);
        }

        let mut added = 0;
        for item in listed.into_iter().skip(n) {
            known.push(item.clone());
            self.metrics.record_discovered(1);
            added += 1;

            tokio::select! {
                biased;
                _ = self.token.cancelled() => return Err(SegtailError::Cancelled),
                sent = self.queue.send(item) => {
                    if sent.is_err() {
                        return Err(SegtailError::Internal {
                            reason: "work queue closed".to_string(),
                        });
                    }
                }
            }
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ListMode;
    use crate::testing::{MOCK_ROOT, MockDirectory};

    fn poller(
        directory: Arc<MockDirectory>,
        capacity: usize,
    ) -> (PollLoop, mpsc::Receiver<MediaItem>, KnownItems, CancellationToken) {
        let (tx, rx) = mpsc::channel(capacity);
        let known: KnownItems = Arc::default();
        let token = CancellationToken::new();
        let lister = SegmentLister::new(
            directory,
            ListMode::Direct {
                path: MOCK_ROOT.to_string(),
            },
        );
        let poll = PollLoop::new(
            lister,
            Arc::clone(&known),
            tx,
            Duration::from_millis(10),
            token.clone(),
            Arc::new(SessionMetrics::new()),
        );
        (poll, rx, known, token)
    }

    fn drain(rx: &mut mpsc::Receiver<MediaItem>) -> Vec<String> {
        let mut names = Vec::new();
        while let Ok(item) = rx.try_recv() {
            names.push(item.name);
        }
        names
    }

    #[tokio::test]
    async fn enqueues_only_the_new_suffix() {
        let directory = MockDirectory::with_files(&["seg1.ts", "seg2.ts"]);
        let (poll, mut rx, known, _token) = poller(directory.clone(), 16);

        assert_eq!(poll.tick().await.unwrap(), 2);
        assert_eq!(drain(&mut rx), vec!["seg1.ts", "seg2.ts"]);

        directory.set_files(&["seg1.ts", "seg2.ts", "seg3.ts", "seg4.ts"]);
        assert_eq!(poll.tick().await.unwrap(), 2);
        assert_eq!(drain(&mut rx), vec!["seg3.ts", "seg4.ts"]);
        assert_eq!(known.lock().await.len(), 4);
    }

    #[tokio::test]
    async fn unchanged_listing_is_idempotent() {
        let directory = MockDirectory::with_files(&["seg1.ts", "seg2.ts"]);
        let (poll, mut rx, known, _token) = poller(directory, 16);

        poll.tick().await.unwrap();
        drain(&mut rx);
        assert_eq!(poll.tick().await.unwrap(), 0);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(known.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn shrinking_listing_changes_nothing() {
        let directory = MockDirectory::with_files(&["seg1.ts", "seg2.ts", "seg3.ts"]);
        let (poll, mut rx, known, _token) = poller(directory.clone(), 16);

        poll.tick().await.unwrap();
        drain(&mut rx);
        directory.set_files(&["seg1.ts"]);
        assert_eq!(poll.tick().await.unwrap(), 0);
        assert_eq!(known.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn compares_positions_not_names() {
        let directory = MockDirectory::with_files(&["seg1.ts", "seg2.ts"]);
        let (poll, mut rx, _known, _token) = poller(directory.clone(), 16);

        poll.tick().await.unwrap();
        drain(&mut rx);
        // An earlier-sorting newcomer shifts the tail: position 2 is now seg2.ts.
        directory.set_files(&["seg0.ts", "seg1.ts", "seg2.ts"]);
        poll.tick().await.unwrap();
        assert_eq!(drain(&mut rx), vec!["seg2.ts"]);
    }

    #[tokio::test]
    async fn listing_failure_leaves_state_untouched() {
        let directory = MockDirectory::with_files(&["seg1.ts"]);
        directory.fail_listings(1);
        let (poll, mut rx, known, _token) = poller(directory, 16);

        assert!(matches!(
            poll.tick().await,
            Err(SegtailError::RemoteListingFailed { .. })
        ));
        assert!(known.lock().await.is_empty());
        assert_eq!(poll.tick().await.unwrap(), 1);
        assert_eq!(drain(&mut rx), vec!["seg1.ts"]);
    }

    #[tokio::test]
    async fn full_queue_blocks_until_cancelled() {
        let directory = MockDirectory::with_files(&["seg1.ts", "seg2.ts", "seg3.ts"]);
        let (poll, mut rx, known, token) = poller(directory, 2);

        let blocked = tokio::time::timeout(Duration::from_millis(50), poll.tick()).await;
        assert!(blocked.is_err(), "tick should block on a full queue");
        assert_eq!(drain(&mut rx), vec!["seg1.ts", "seg2.ts"]);

        token.cancel();
        assert!(matches!(poll.tick().await, Err(SegtailError::Cancelled)));
        assert_eq!(known.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn run_survives_listing_failures_and_stops_on_cancel() {
        let directory = MockDirectory::with_files(&["seg1.ts"]);
        directory.fail_listings(2);
        let (poll, mut rx, _known, token) = poller(directory.clone(), 16);
        let metrics = Arc::clone(&poll.metrics);

        let handle = tokio::spawn(poll.run());
        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.name, "seg1.ts");

        token.cancel();
        handle.await.unwrap().unwrap();
        assert_eq!(metrics.snapshot().listing_failures, 2);
        assert!(directory.list_calls() >= 3);
    }

    #[tokio::test]
    async fn transport_error_skips_the_tick() {
        let directory = MockDirectory::with_files(&["seg1.ts"]);
        directory.fail_listings_with_io(1);
        let (poll, mut rx, _known, token) = poller(directory.clone(), 16);
        let metrics = Arc::clone(&poll.metrics);

        let handle = tokio::spawn(poll.run());
        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.name, "seg1.ts");
        assert!(!handle.is_finished());

        token.cancel();
        handle.await.unwrap().unwrap();
        assert_eq!(metrics.snapshot().listing_failures, 1);
        assert!(directory.list_calls() >= 2);
    }
}
