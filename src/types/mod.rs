use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

pub mod error;
pub mod token;

/// One file under a synchronized root, either on the local disk or in a
/// bucket.
///
/// `name` is the path relative to the root, always with forward-slash
/// separators; it is the identity key used for diffing. `path` is the full
/// local path or object key and is only used when the entry is executed.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub size: i64,
    pub last_modified: SystemTime,
    pub single_file: bool,
    pub exists_in_source: bool,
}

impl FileEntry {
    pub fn new(
        name: String,
        path: String,
        size: i64,
        last_modified: SystemTime,
        single_file: bool,
    ) -> Self {
        Self {
            name,
            path,
            size,
            last_modified,
            single_file,
            exists_in_source: false,
        }
    }
}

/// The decided operation for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    Update,
    Delete,
}

/// One unit of work produced by the diff filter and consumed by the worker
/// pool.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncAction {
    pub entry: FileEntry,
    pub op: SyncOp,
}

impl SyncAction {
    pub fn update(entry: FileEntry) -> Self {
        Self {
            entry,
            op: SyncOp::Update,
        }
    }

    pub fn delete(entry: FileEntry) -> Self {
        Self {
            entry,
            op: SyncOp::Delete,
        }
    }
}

/// A bucket and key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Path {
    pub bucket: String,
    pub prefix: String,
}

impl S3Path {
    pub fn url(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoragePath {
    S3(S3Path),
    Local(PathBuf),
}

/// Counters for one synchronization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatistics {
    pub bytes_transferred: u64,
    pub files_transferred: u64,
    pub files_deleted: u64,
}

/// Thread-safe statistics owned by the manager and shared with every
/// execution unit. All mutation goes through the increment methods; readers
/// get a snapshot copy.
#[derive(Debug, Clone, Default)]
pub struct StatsTracker {
    inner: Arc<Mutex<SyncStatistics>>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transferred_file(&self, bytes: u64) {
        let mut stats = self.inner.lock().unwrap();
        stats.files_transferred += 1;
        stats.bytes_transferred += bytes;
    }

    pub fn add_deleted_file(&self) {
        let mut stats = self.inner.lock().unwrap();
        stats.files_deleted += 1;
    }

    pub fn snapshot(&self) -> SyncStatistics {
        *self.inner.lock().unwrap()
    }
}
