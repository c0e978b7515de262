#![allow(dead_code)]

use std::path::{Path, PathBuf};

use segtail_engine::LocalStorage;

/// Initialize tracing for tests with appropriate settings
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// A storage root holding one allocation `alloc-1` with a `/live` directory.
pub struct Remote {
    pub root: tempfile::TempDir,
    pub storage: LocalStorage,
}

impl Remote {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("alloc-1").join("live")).unwrap();
        let storage = LocalStorage::new(root.path());
        Self { root, storage }
    }

    pub fn live_dir(&self) -> PathBuf {
        self.root.path().join("alloc-1").join("live")
    }

    /// Publishes a segment atomically so a concurrent listing never sees it half written.
    pub fn add_segment(&self, name: &str) {
        let staged = self.root.path().join(format!(".{name}.part"));
        std::fs::write(&staged, segment_bytes(name)).unwrap();
        std::fs::rename(staged, self.live_dir().join(name)).unwrap();
    }

    pub fn add_segments(&self, names: &[&str]) {
        for name in names {
            self.add_segment(name);
        }
    }
}

pub fn segment_bytes(name: &str) -> Vec<u8> {
    format!("payload of {name}").into_bytes()
}

/// URIs of the playlist at `path`, in file order.
pub fn playlist_uris(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}
