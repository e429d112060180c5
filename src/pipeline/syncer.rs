use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::SyncConfig;
use crate::storage::{ObjectStoreRef, fs_util};
use crate::types::{FileEntry, S3Path, StatsTracker};

/// Executes decided actions against the collaborators and updates the run
/// statistics.
///
/// Every operation logs its intent first and returns before touching any
/// collaborator when dry-run is set; statistics are only updated on actual
/// success.
pub struct ObjectSyncer {
    store: ObjectStoreRef,
    config: SyncConfig,
    stats: StatsTracker,
}

impl ObjectSyncer {
    pub fn new(store: ObjectStoreRef, config: SyncConfig, stats: StatsTracker) -> Self {
        Self {
            store,
            config,
            stats,
        }
    }

    pub async fn copy_remote_to_remote(
        &self,
        entry: &FileEntry,
        source: &S3Path,
        target: &S3Path,
    ) -> Result<()> {
        let copy_source = join_key(&[&source.bucket, &source.prefix, &entry.name]);
        let target_key = join_key(&[&target.prefix, &entry.name]);

        let bucket = target.bucket.as_str();
        info!(
            copy_source = copy_source,
            bucket = bucket,
            key = target_key,
            "copy object."
        );
        if self.config.dry_run {
            return Ok(());
        }

        self.store
            .copy_object(
                &target.bucket,
                &copy_source,
                &target_key,
                self.config.canned_acl.clone(),
            )
            .await?;

        self.stats.add_transferred_file(entry.size as u64);
        Ok(())
    }

    pub async fn download(
        &self,
        entry: &FileEntry,
        source: &S3Path,
        target_path: &Path,
    ) -> Result<()> {
        let target_file = local_target_path(entry, target_path);

        let name = entry.name.as_str();
        let target = target_file.to_string_lossy().to_string();
        info!(name = name, target = target, "download object.");
        if self.config.dry_run {
            return Ok(());
        }

        fs_util::create_parent_directories(&target_file).await?;

        let source_key = if entry.single_file {
            entry.path.clone()
        } else {
            join_key(&[&source.prefix, &entry.name])
        };

        let mut body = self.store.get_object(&source.bucket, &source_key).await?;

        let mut file = tokio::fs::File::create(&target_file)
            .await
            .context("tokio::fs::File::create() failed.")?;
        let mut written = 0u64;
        while let Some(bytes) = body
            .try_next()
            .await
            .context("ByteStream::try_next() failed.")?
        {
            file.write_all(&bytes)
                .await
                .context("tokio::io::AsyncWriteExt::write_all() failed.")?;
            written += bytes.len() as u64;
        }
        file.flush()
            .await
            .context("tokio::io::AsyncWriteExt::flush() failed.")?;
        drop(file);

        self.stats.add_transferred_file(written);

        fs_util::set_last_modified(&target_file, entry.last_modified)
            .context("filetime::set_file_mtime() failed.")?;

        Ok(())
    }

    pub async fn upload(
        &self,
        entry: &FileEntry,
        source_path: &Path,
        target: &S3Path,
    ) -> Result<()> {
        let source_file = if entry.single_file {
            source_path.to_path_buf()
        } else {
            source_path.join(&entry.name)
        };
        let target_key = remote_target_key(entry, target);

        let name = entry.name.as_str();
        let bucket = target.bucket.as_str();
        info!(name = name, bucket = bucket, key = target_key, "upload object.");
        if self.config.dry_run {
            return Ok(());
        }

        let content_type = if self.config.content_type.is_some() {
            self.config.content_type.clone()
        } else if !self.config.no_guess_mime_type {
            Some(
                mime_guess::from_path(&source_file)
                    .first_or_octet_stream()
                    .to_string(),
            )
        } else {
            None
        };

        let body = ByteStream::from_path(&source_file)
            .await
            .context("ByteStream::from_path() failed.")?;

        self.store
            .put_object(
                &target.bucket,
                &target_key,
                body,
                content_type,
                self.config.canned_acl.clone(),
            )
            .await?;

        self.stats.add_transferred_file(entry.size as u64);
        Ok(())
    }

    pub async fn delete_local(&self, entry: &FileEntry, target_path: &Path) -> Result<()> {
        let target_file = local_target_path(entry, target_path);

        let target = target_file.to_string_lossy().to_string();
        info!(target = target, "delete local file.");
        if self.config.dry_run {
            return Ok(());
        }

        tokio::fs::remove_file(&target_file)
            .await
            .context("tokio::fs::remove_file() failed.")?;

        self.stats.add_deleted_file();
        Ok(())
    }

    pub async fn delete_remote(&self, entry: &FileEntry, target: &S3Path) -> Result<()> {
        let target_key = remote_target_key(entry, target);

        let bucket = target.bucket.as_str();
        info!(bucket = bucket, key = target_key, "delete object.");
        if self.config.dry_run {
            return Ok(());
        }

        self.store.delete_object(&target.bucket, &target_key).await?;

        self.stats.add_deleted_file();
        Ok(())
    }
}

/// Joins key parts with forward slashes, dropping empty and `.` components.
fn join_key(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| part.split('/'))
        .filter(|component| !component.is_empty() && *component != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// The destination file for a downloaded or locally deleted entry. A
/// destination that does not end in a separator combined with a single-file
/// source means the destination names the file itself.
fn local_target_path(entry: &FileEntry, target_path: &Path) -> PathBuf {
    let target = target_path.to_string_lossy();
    let names_a_file = entry.single_file
        && !target.ends_with('/')
        && !target.ends_with(std::path::MAIN_SEPARATOR);

    if names_a_file {
        target_path.to_path_buf()
    } else {
        target_path.join(&entry.name)
    }
}

/// The destination key for an uploaded or remotely deleted entry. A prefix
/// that already denotes a specific key is used verbatim for a single-file
/// source.
fn remote_target_key(entry: &FileEntry, target: &S3Path) -> String {
    if target.prefix.ends_with('/') || target.prefix.is_empty() || !entry.single_file {
        join_key(&[&target.prefix, &entry.name])
    } else {
        target.prefix.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, SystemTime};

    use anyhow::Result;
    use async_trait::async_trait;
    use aws_sdk_s3::types::ObjectCannedAcl;

    use crate::storage::{ObjectPage, ObjectStore};

    use super::*;

    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn list_objects(
            &self,
            _bucket: &str,
            _prefix: &str,
            _continuation_token: Option<String>,
        ) -> Result<ObjectPage> {
            self.calls.lock().unwrap().push("list".to_string());
            Ok(ObjectPage::default())
        }

        async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteStream> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("get {bucket} {key}"));
            Ok(ByteStream::from(b"data1".to_vec()))
        }

        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            _body: ByteStream,
            content_type: Option<String>,
            _canned_acl: Option<ObjectCannedAcl>,
        ) -> Result<()> {
            self.calls.lock().unwrap().push(format!(
                "put {bucket} {key} {}",
                content_type.unwrap_or_else(|| "-".to_string())
            ));
            Ok(())
        }

        async fn copy_object(
            &self,
            bucket: &str,
            copy_source: &str,
            key: &str,
            _canned_acl: Option<ObjectCannedAcl>,
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("copy {copy_source} {bucket} {key}"));
            Ok(())
        }

        async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("delete {bucket} {key}"));
            Ok(())
        }
    }

    fn entry(name: &str, size: i64, single_file: bool) -> FileEntry {
        FileEntry::new(
            name.to_string(),
            format!("source/{name}"),
            size,
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000),
            single_file,
        )
    }

    fn s3_path(bucket: &str, prefix: &str) -> S3Path {
        S3Path {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        }
    }

    #[tokio::test]
    async fn upload_joins_prefix_and_name() {
        init_dummy_tracing_subscriber();

        let temp_dir = tempfile::tempdir().unwrap();
        tokio::fs::write(temp_dir.path().join("data1.txt"), b"data1")
            .await
            .unwrap();

        let store = RecordingStore::new();
        let stats = StatsTracker::new();
        let syncer = ObjectSyncer::new(store.clone(), SyncConfig::default(), stats.clone());

        syncer
            .upload(
                &entry("data1.txt", 5, false),
                temp_dir.path(),
                &s3_path("test-bucket", "dir1/"),
            )
            .await
            .unwrap();

        assert_eq!(
            store.calls(),
            vec!["put test-bucket dir1/data1.txt text/plain".to_string()]
        );
        assert_eq!(stats.snapshot().files_transferred, 1);
        assert_eq!(stats.snapshot().bytes_transferred, 5);
    }

    #[tokio::test]
    async fn upload_single_file_to_explicit_key_uses_the_key_verbatim() {
        init_dummy_tracing_subscriber();

        let temp_dir = tempfile::tempdir().unwrap();
        let source_file = temp_dir.path().join("data1.txt");
        tokio::fs::write(&source_file, b"data1").await.unwrap();

        let store = RecordingStore::new();
        let syncer = ObjectSyncer::new(store.clone(), SyncConfig::default(), StatsTracker::new());

        syncer
            .upload(
                &entry("data1.txt", 5, true),
                &source_file,
                &s3_path("test-bucket", "dir1/renamed.txt"),
            )
            .await
            .unwrap();

        assert_eq!(
            store.calls(),
            vec!["put test-bucket dir1/renamed.txt text/plain".to_string()]
        );
    }

    #[tokio::test]
    async fn upload_content_type_override_wins_over_guessing() {
        init_dummy_tracing_subscriber();

        let temp_dir = tempfile::tempdir().unwrap();
        tokio::fs::write(temp_dir.path().join("data1.txt"), b"data1")
            .await
            .unwrap();

        let store = RecordingStore::new();
        let config = SyncConfig {
            content_type: Some("application/octet-stream".to_string()),
            ..Default::default()
        };
        let syncer = ObjectSyncer::new(store.clone(), config, StatsTracker::new());

        syncer
            .upload(
                &entry("data1.txt", 5, false),
                temp_dir.path(),
                &s3_path("test-bucket", ""),
            )
            .await
            .unwrap();

        assert_eq!(
            store.calls(),
            vec!["put test-bucket data1.txt application/octet-stream".to_string()]
        );
    }

    #[tokio::test]
    async fn upload_without_guessing_leaves_content_type_unset() {
        init_dummy_tracing_subscriber();

        let temp_dir = tempfile::tempdir().unwrap();
        tokio::fs::write(temp_dir.path().join("data1.txt"), b"data1")
            .await
            .unwrap();

        let store = RecordingStore::new();
        let config = SyncConfig {
            no_guess_mime_type: true,
            ..Default::default()
        };
        let syncer = ObjectSyncer::new(store.clone(), config, StatsTracker::new());

        syncer
            .upload(
                &entry("data1.txt", 5, false),
                temp_dir.path(),
                &s3_path("test-bucket", ""),
            )
            .await
            .unwrap();

        assert_eq!(store.calls(), vec!["put test-bucket data1.txt -".to_string()]);
    }

    #[tokio::test]
    async fn download_writes_the_file_and_restores_mtime() {
        init_dummy_tracing_subscriber();

        let temp_dir = tempfile::tempdir().unwrap();
        let target_root = temp_dir.path().join("target");

        let store = RecordingStore::new();
        let stats = StatsTracker::new();
        let syncer = ObjectSyncer::new(store.clone(), SyncConfig::default(), stats.clone());

        let file_entry = entry("dir1/data1", 5, false);
        syncer
            .download(&file_entry, &s3_path("test-bucket", "prefix/"), &target_root)
            .await
            .unwrap();

        assert_eq!(
            store.calls(),
            vec!["get test-bucket prefix/dir1/data1".to_string()]
        );

        let target_file = target_root.join("dir1/data1");
        assert_eq!(tokio::fs::read(&target_file).await.unwrap(), b"data1");
        assert_eq!(
            tokio::fs::metadata(&target_file)
                .await
                .unwrap()
                .modified()
                .unwrap(),
            file_entry.last_modified
        );
        assert_eq!(stats.snapshot().bytes_transferred, 5);
    }

    #[tokio::test]
    async fn download_single_file_uses_the_full_object_key() {
        init_dummy_tracing_subscriber();

        let temp_dir = tempfile::tempdir().unwrap();
        let target_file = temp_dir.path().join("renamed.dat");

        let store = RecordingStore::new();
        let syncer = ObjectSyncer::new(store.clone(), SyncConfig::default(), StatsTracker::new());

        let mut file_entry = entry("data1", 5, true);
        file_entry.path = "dir1/data1".to_string();

        syncer
            .download(&file_entry, &s3_path("test-bucket", "dir1/data1"), &target_file)
            .await
            .unwrap();

        // Destination names a file: used verbatim, no join with the name.
        assert_eq!(store.calls(), vec!["get test-bucket dir1/data1".to_string()]);
        assert_eq!(tokio::fs::read(&target_file).await.unwrap(), b"data1");
    }

    #[tokio::test]
    async fn copy_builds_copy_source_and_target_key() {
        init_dummy_tracing_subscriber();

        let store = RecordingStore::new();
        let stats = StatsTracker::new();
        let syncer = ObjectSyncer::new(store.clone(), SyncConfig::default(), stats.clone());

        syncer
            .copy_remote_to_remote(
                &entry("dir2/data1", 5, false),
                &s3_path("source-bucket", "dir1/"),
                &s3_path("target-bucket", "mirror/"),
            )
            .await
            .unwrap();

        assert_eq!(
            store.calls(),
            vec!["copy source-bucket/dir1/dir2/data1 target-bucket mirror/dir2/data1".to_string()]
        );
        assert_eq!(stats.snapshot().files_transferred, 1);
    }

    #[tokio::test]
    async fn delete_local_removes_the_file() {
        init_dummy_tracing_subscriber();

        let temp_dir = tempfile::tempdir().unwrap();
        tokio::fs::write(temp_dir.path().join("data1"), b"data1")
            .await
            .unwrap();

        let store = RecordingStore::new();
        let stats = StatsTracker::new();
        let syncer = ObjectSyncer::new(store.clone(), SyncConfig::default(), stats.clone());

        syncer
            .delete_local(&entry("data1", 5, false), temp_dir.path())
            .await
            .unwrap();

        assert!(!temp_dir.path().join("data1").exists());
        assert_eq!(stats.snapshot().files_deleted, 1);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn delete_remote_removes_the_object() {
        init_dummy_tracing_subscriber();

        let store = RecordingStore::new();
        let stats = StatsTracker::new();
        let syncer = ObjectSyncer::new(store.clone(), SyncConfig::default(), stats.clone());

        syncer
            .delete_remote(&entry("data1", 5, false), &s3_path("test-bucket", "dir1/"))
            .await
            .unwrap();

        assert_eq!(store.calls(), vec!["delete test-bucket dir1/data1".to_string()]);
        assert_eq!(stats.snapshot().files_deleted, 1);
    }

    #[tokio::test]
    async fn dry_run_touches_nothing_and_counts_nothing() {
        init_dummy_tracing_subscriber();

        let temp_dir = tempfile::tempdir().unwrap();
        tokio::fs::write(temp_dir.path().join("data1"), b"data1")
            .await
            .unwrap();

        let store = RecordingStore::new();
        let stats = StatsTracker::new();
        let config = SyncConfig {
            dry_run: true,
            ..Default::default()
        };
        let syncer = ObjectSyncer::new(store.clone(), config, stats.clone());

        let source = s3_path("source-bucket", "dir1/");
        let target = s3_path("target-bucket", "dir1/");
        let file_entry = entry("data1", 5, false);

        syncer
            .upload(&file_entry, temp_dir.path(), &target)
            .await
            .unwrap();
        syncer
            .download(&file_entry, &source, temp_dir.path())
            .await
            .unwrap();
        syncer
            .copy_remote_to_remote(&file_entry, &source, &target)
            .await
            .unwrap();
        syncer.delete_remote(&file_entry, &target).await.unwrap();
        syncer
            .delete_local(&file_entry, temp_dir.path())
            .await
            .unwrap();

        assert!(store.calls().is_empty());
        assert_eq!(stats.snapshot(), Default::default());
        // The would-be deleted local file is untouched.
        assert!(temp_dir.path().join("data1").exists());
    }

    #[test]
    fn join_key_test() {
        init_dummy_tracing_subscriber();

        assert_eq!(join_key(&["dir1/", "data1"]), "dir1/data1");
        assert_eq!(join_key(&["", "data1"]), "data1");
        assert_eq!(join_key(&["dir1//dir2/", "data1"]), "dir1/dir2/data1");
        assert_eq!(
            join_key(&["bucket", "dir1/", "data1"]),
            "bucket/dir1/data1"
        );
    }

    #[test]
    fn remote_target_key_test() {
        init_dummy_tracing_subscriber();

        // Directory-like prefix: always joined.
        assert_eq!(
            remote_target_key(&entry("data1", 5, false), &s3_path("b", "dir1/")),
            "dir1/data1"
        );
        assert_eq!(
            remote_target_key(&entry("data1", 5, true), &s3_path("b", "dir1/")),
            "dir1/data1"
        );
        // Empty prefix: joined.
        assert_eq!(
            remote_target_key(&entry("data1", 5, true), &s3_path("b", "")),
            "data1"
        );
        // Specific key and single-file source: verbatim.
        assert_eq!(
            remote_target_key(&entry("data1", 5, true), &s3_path("b", "dir1/renamed")),
            "dir1/renamed"
        );
        // Specific key but directory source: joined anyway.
        assert_eq!(
            remote_target_key(&entry("data1", 5, false), &s3_path("b", "dir1")),
            "dir1/data1"
        );
    }

    #[test]
    fn local_target_path_test() {
        init_dummy_tracing_subscriber();

        assert_eq!(
            local_target_path(&entry("data1", 5, false), Path::new("/target/")),
            PathBuf::from("/target/data1")
        );
        assert_eq!(
            local_target_path(&entry("data1", 5, true), Path::new("/target/")),
            PathBuf::from("/target/data1")
        );
        assert_eq!(
            local_target_path(&entry("data1", 5, true), Path::new("/target/renamed")),
            PathBuf::from("/target/renamed")
        );
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
