use aws_sdk_s3::types::ObjectCannedAcl;

pub mod storage_path;

pub const DEFAULT_WORKER_SIZE: usize = 16;

/// Options for one synchronization run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Number of concurrent execution units draining the action queue.
    pub worker_size: usize,
    /// Delete destination files that no longer exist in the source.
    pub sync_with_delete: bool,
    /// Log intended actions without touching the destination.
    pub dry_run: bool,
    /// Canned ACL applied to uploaded and copied objects.
    pub canned_acl: Option<ObjectCannedAcl>,
    /// Explicit Content-Type for uploads. Takes precedence over guessing.
    pub content_type: Option<String>,
    /// Disable MIME type guessing from the source file name.
    pub no_guess_mime_type: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            worker_size: DEFAULT_WORKER_SIZE,
            sync_with_delete: false,
            dry_run: false,
            canned_acl: None,
            content_type: None,
            no_guess_mime_type: false,
        }
    }
}
