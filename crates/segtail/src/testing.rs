// In-memory storage doubles for unit tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Result, SegtailError};
use crate::status::{Operation, StatusCallback};
use crate::storage::{ListEntry, RemoteDirectory, ShareToken, StorageClient, join_remote};

pub(crate) const MOCK_ROOT: &str = "/live";

#[derive(Default)]
struct MockState {
    entries: Vec<ListEntry>,
    listing_failures: u32,
    io_listing_failures: u32,
    list_calls: u32,
    token_listings: Vec<(String, String)>,
    fetch_failures: HashMap<String, u32>,
    permanent_failures: HashSet<String>,
    fatal_failures: HashSet<String>,
    fetched: Vec<String>,
}

pub(crate) struct MockDirectory {
    id: String,
    state: Mutex<MockState>,
}

impl MockDirectory {
    pub(crate) fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            state: Mutex::new(MockState::default()),
        })
    }

    pub(crate) fn with_files(names: &[&str]) -> Arc<Self> {
        let directory = Self::new("alloc-1");
        directory.set_files(names);
        directory
    }

    pub(crate) fn set_files(&self, names: &[&str]) {
        self.state.lock().entries = names
            .iter()
            .map(|n| ListEntry::file(*n, join_remote(MOCK_ROOT, n)))
            .collect();
    }

    pub(crate) fn push_file(&self, name: &str) {
        self.push_entry(ListEntry::file(name, join_remote(MOCK_ROOT, name)));
    }

    pub(crate) fn push_entry(&self, entry: ListEntry) {
        self.state.lock().entries.push(entry);
    }

    /// The next `count` listings fail.
    pub(crate) fn fail_listings(&self, count: u32) {
        self.state.lock().listing_failures = count;
    }

    /// The next `count` listings fail with a transport error.
    pub(crate) fn fail_listings_with_io(&self, count: u32) {
        self.state.lock().io_listing_failures = count;
    }

    /// The next `times` transfers of `name` fail with a retryable error.
    pub(crate) fn fail_fetch(&self, name: &str, times: u32) {
        self.state
            .lock()
            .fetch_failures
            .insert(join_remote(MOCK_ROOT, name), times);
    }

    pub(crate) fn fail_fetch_permanently(&self, name: &str) {
        self.state
            .lock()
            .permanent_failures
            .insert(join_remote(MOCK_ROOT, name));
    }

    /// Transfers of `name` fail with an internal error.
    pub(crate) fn fail_fetch_fatally(&self, name: &str) {
        self.state
            .lock()
            .fatal_failures
            .insert(join_remote(MOCK_ROOT, name));
    }

    /// Remote paths of every transfer attempt, in call order.
    pub(crate) fn fetched(&self) -> Vec<String> {
        self.state.lock().fetched.clone()
    }

    pub(crate) fn list_calls(&self) -> u32 {
        self.state.lock().list_calls
    }

    pub(crate) fn token_listings(&self) -> Vec<(String, String)> {
        self.state.lock().token_listings.clone()
    }

    fn listing(&self, path: &str) -> Result<Vec<ListEntry>> {
        let mut state = self.state.lock();
        state.list_calls += 1;
        if state.listing_failures > 0 {
            state.listing_failures -= 1;
            return Err(SegtailError::listing_failed(path, "service unavailable"));
        }
        if state.io_listing_failures > 0 {
            state.io_listing_failures -= 1;
            let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
            return Err(reset.into());
        }
        Ok(state.entries.clone())
    }
}

#[async_trait]
impl RemoteDirectory for MockDirectory {
    fn id(&self) -> &str {
        &self.id
    }

    async fn list_children(&self, path: &str) -> Result<Vec<ListEntry>> {
        self.listing(path)
    }

    async fn list_children_via_token(
        &self,
        token: &str,
        lookup_key: &str,
    ) -> Result<Vec<ListEntry>> {
        self.state
            .lock()
            .token_listings
            .push((token.to_string(), lookup_key.to_string()));
        self.listing(lookup_key)
    }

    async fn fetch_segment(
        &self,
        remote_path: &str,
        local_path: &Path,
        status: Option<&dyn StatusCallback>,
    ) -> Result<u64> {
        {
            let mut state = self.state.lock();
            state.fetched.push(remote_path.to_string());
            if state.permanent_failures.contains(remote_path) {
                return Err(SegtailError::transfer_failed(remote_path, "not found", false));
            }
            if state.fatal_failures.contains(remote_path) {
                return Err(SegtailError::Internal {
                    reason: format!("no route for {remote_path}"),
                });
            }
            if let Some(left) = state.fetch_failures.get_mut(remote_path)
                && *left > 0
            {
                *left -= 1;
                return Err(SegtailError::transfer_failed(remote_path, "connection reset", true));
            }
        }

        tokio::fs::write(local_path, remote_path.as_bytes()).await?;
        let size = remote_path.len() as u64;
        if let Some(status) = status {
            status.in_progress(&self.id, remote_path, Operation::Download, size);
        }
        Ok(size)
    }
}

pub(crate) struct MockStorage {
    directory: Arc<MockDirectory>,
    has_allocation: bool,
    remote_calls: AtomicUsize,
}

impl MockStorage {
    pub(crate) fn new() -> Self {
        Self::with_directory(MockDirectory::new("alloc-1"))
    }

    pub(crate) fn with_directory(directory: Arc<MockDirectory>) -> Self {
        Self {
            directory,
            has_allocation: true,
            remote_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn without_allocation(mut self) -> Self {
        self.has_allocation = false;
        self
    }

    pub(crate) fn remote_calls(&self) -> usize {
        self.remote_calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, allocation_id: &str) -> Result<Arc<dyn RemoteDirectory>> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        if !self.has_allocation {
            return Err(SegtailError::resolution_failed(format!(
                "allocation `{allocation_id}` not found"
            )));
        }
        let directory: Arc<dyn RemoteDirectory> = self.directory.clone();
        Ok(directory)
    }
}

#[async_trait]
impl StorageClient for MockStorage {
    async fn allocation(&self, allocation_id: &str) -> Result<Arc<dyn RemoteDirectory>> {
        self.lookup(allocation_id)
    }

    async fn allocation_from_token(&self, token: &ShareToken) -> Result<Arc<dyn RemoteDirectory>> {
        self.lookup(&token.allocation_id)
    }
}

/// Records every status event as a line of text.
#[derive(Default)]
pub(crate) struct RecordingStatus {
    events: Mutex<Vec<String>>,
}

impl RecordingStatus {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl StatusCallback for RecordingStatus {
    fn started(&self, _session_id: &str, path: &str, op: Operation, _total_bytes: u64) {
        self.events.lock().push(format!("started {op} {path}"));
    }

    fn completed(&self, _session_id: &str, path: &str, name: &str, _size: u64, op: Operation) {
        self.events
            .lock()
            .push(format!("completed {op} {path} {name}"));
    }

    fn error(&self, _session_id: &str, path: &str, op: Operation, _err: &SegtailError) {
        self.events.lock().push(format!("error {op} {path}"));
    }
}
