use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Error, Result, anyhow};
use async_channel::Receiver;
use regex::Regex;
use tracing::{debug, trace};

use crate::config::SyncConfig;
use crate::config::storage_path::parse_storage_path;
use crate::pipeline::differ::filter_entries_for_sync;
use crate::pipeline::lister::{list_local_entries, list_remote_entries};
use crate::pipeline::syncer::ObjectSyncer;
use crate::pipeline::worker::WorkerPool;
use crate::storage::ObjectStoreRef;
use crate::types::error::SyncError;
use crate::types::token::{SyncCancellationToken, create_sync_cancellation_token};
use crate::types::{S3Path, StatsTracker, StoragePath, SyncOp, SyncStatistics};

pub mod differ;
pub mod lister;
pub mod syncer;
pub mod worker;

type ErrorList = Arc<Mutex<Vec<Error>>>;

/// Drives one-way synchronization runs.
///
/// A manager owns the object store handle, the configuration, and the run
/// statistics. The direction of a run is decided from the two location
/// strings: a plain path is a local tree, an `s3://` URL is a bucket prefix.
pub struct SyncManager {
    store: ObjectStoreRef,
    config: SyncConfig,
    stats: StatsTracker,
}

impl SyncManager {
    pub fn new(store: ObjectStoreRef, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            stats: StatsTracker::new(),
        }
    }

    /// Synchronizes `target` to `source`.
    pub async fn sync(&self, source: &str, target: &str) -> Result<()> {
        self.sync_with_cancellation_token(source, target, vec![], create_sync_cancellation_token())
            .await
    }

    /// Synchronizes `target` to `source`, restricted to entries matching any
    /// of the given patterns.
    pub async fn sync_with_patterns(
        &self,
        source: &str,
        target: &str,
        patterns: Vec<Regex>,
    ) -> Result<()> {
        self.sync_with_cancellation_token(source, target, patterns, create_sync_cancellation_token())
            .await
    }

    /// Synchronizes `target` to `source`. The cancellation token stops
    /// enumeration and the submission of further actions; in-flight actions
    /// are not aborted mid-call.
    pub async fn sync_with_cancellation_token(
        &self,
        source: &str,
        target: &str,
        patterns: Vec<Regex>,
        cancellation_token: SyncCancellationToken,
    ) -> Result<()> {
        let source_path = parse_storage_path(source)?;
        let target_path = parse_storage_path(target)?;

        let pool = WorkerPool::start(self.config.worker_size);

        let result = match (source_path, target_path) {
            (StoragePath::Local(_), StoragePath::Local(_)) => {
                Err(SyncError::LocalToLocalNotSupported.into())
            }
            (StoragePath::S3(source), StoragePath::S3(target)) => {
                self.sync_remote_to_remote(&pool, source, target, patterns, cancellation_token)
                    .await
            }
            (StoragePath::S3(source), StoragePath::Local(target)) => {
                self.sync_remote_to_local(&pool, source, target, patterns, cancellation_token)
                    .await
            }
            (StoragePath::Local(source), StoragePath::S3(target)) => {
                self.sync_local_to_remote(&pool, source, target, patterns, cancellation_token)
                    .await
            }
        };

        pool.close().await;

        result
    }

    /// A snapshot of the counters accumulated across this manager's runs.
    pub fn statistics(&self) -> SyncStatistics {
        self.stats.snapshot()
    }

    fn syncer(&self) -> Arc<ObjectSyncer> {
        Arc::new(ObjectSyncer::new(
            self.store.clone(),
            self.config.clone(),
            self.stats.clone(),
        ))
    }

    async fn sync_local_to_remote(
        &self,
        pool: &WorkerPool,
        source: PathBuf,
        target: S3Path,
        patterns: Vec<Regex>,
        cancellation_token: SyncCancellationToken,
    ) -> Result<()> {
        trace!("local to remote sync has started.");

        let actions = filter_entries_for_sync(
            list_local_entries(source.clone(), patterns.clone(), cancellation_token.clone()),
            list_remote_entries(
                self.store.clone(),
                target.clone(),
                patterns,
                cancellation_token.clone(),
            ),
            self.config.sync_with_delete,
        );

        let syncer = self.syncer();
        let errors: ErrorList = Arc::default();
        let (done_sender, done_receiver) = async_channel::unbounded::<()>();
        let mut submitted = 0usize;

        while let Ok(action) = actions.recv().await {
            if cancellation_token.is_cancelled() {
                trace!("sync cancelled.");
                break;
            }

            let action = match action {
                Ok(action) => action,
                Err(e) => {
                    errors.lock().unwrap().push(e);
                    continue;
                }
            };

            let syncer = syncer.clone();
            let errors = errors.clone();
            let done_sender = done_sender.clone();
            let source = source.clone();
            let target = target.clone();

            submitted += 1;
            pool.submit(Box::pin(async move {
                let result = match action.op {
                    SyncOp::Update => syncer.upload(&action.entry, &source, &target).await,
                    SyncOp::Delete => syncer.delete_remote(&action.entry, &target).await,
                };
                if let Err(e) = result {
                    errors.lock().unwrap().push(e);
                }
                let _ = done_sender.send(()).await;
            }))
            .await?;
        }

        drop(done_sender);
        wait_for_completion(&done_receiver, submitted).await;

        aggregated_error(&errors)
    }

    async fn sync_remote_to_local(
        &self,
        pool: &WorkerPool,
        source: S3Path,
        target: PathBuf,
        patterns: Vec<Regex>,
        cancellation_token: SyncCancellationToken,
    ) -> Result<()> {
        trace!("remote to local sync has started.");

        let actions = filter_entries_for_sync(
            list_remote_entries(
                self.store.clone(),
                source.clone(),
                patterns.clone(),
                cancellation_token.clone(),
            ),
            list_local_entries(target.clone(), patterns, cancellation_token.clone()),
            self.config.sync_with_delete,
        );

        let syncer = self.syncer();
        let errors: ErrorList = Arc::default();
        let (done_sender, done_receiver) = async_channel::unbounded::<()>();
        let mut submitted = 0usize;

        while let Ok(action) = actions.recv().await {
            if cancellation_token.is_cancelled() {
                trace!("sync cancelled.");
                break;
            }

            let action = match action {
                Ok(action) => action,
                Err(e) => {
                    errors.lock().unwrap().push(e);
                    continue;
                }
            };

            let syncer = syncer.clone();
            let errors = errors.clone();
            let done_sender = done_sender.clone();
            let source = source.clone();
            let target = target.clone();

            submitted += 1;
            pool.submit(Box::pin(async move {
                let result = match action.op {
                    SyncOp::Update => syncer.download(&action.entry, &source, &target).await,
                    SyncOp::Delete => syncer.delete_local(&action.entry, &target).await,
                };
                if let Err(e) = result {
                    errors.lock().unwrap().push(e);
                }
                let _ = done_sender.send(()).await;
            }))
            .await?;
        }

        drop(done_sender);
        wait_for_completion(&done_receiver, submitted).await;

        aggregated_error(&errors)
    }

    async fn sync_remote_to_remote(
        &self,
        pool: &WorkerPool,
        source: S3Path,
        target: S3Path,
        patterns: Vec<Regex>,
        cancellation_token: SyncCancellationToken,
    ) -> Result<()> {
        trace!("remote to remote sync has started.");

        let actions = filter_entries_for_sync(
            list_remote_entries(
                self.store.clone(),
                source.clone(),
                patterns.clone(),
                cancellation_token.clone(),
            ),
            list_remote_entries(
                self.store.clone(),
                target.clone(),
                patterns,
                cancellation_token.clone(),
            ),
            self.config.sync_with_delete,
        );

        let syncer = self.syncer();
        let errors: ErrorList = Arc::default();
        let (done_sender, done_receiver) = async_channel::unbounded::<()>();
        let mut submitted = 0usize;

        while let Ok(action) = actions.recv().await {
            if cancellation_token.is_cancelled() {
                trace!("sync cancelled.");
                break;
            }

            let action = match action {
                Ok(action) => action,
                Err(e) => {
                    errors.lock().unwrap().push(e);
                    continue;
                }
            };

            if action.op == SyncOp::Delete {
                // Bucket-to-bucket sync never deletes on the target side.
                let name = action.entry.name.as_str();
                debug!(name = name, "delete skipped for bucket-to-bucket sync.");
                continue;
            }

            let syncer = syncer.clone();
            let errors = errors.clone();
            let done_sender = done_sender.clone();
            let source = source.clone();
            let target = target.clone();

            submitted += 1;
            pool.submit(Box::pin(async move {
                if let Err(e) = syncer
                    .copy_remote_to_remote(&action.entry, &source, &target)
                    .await
                {
                    errors.lock().unwrap().push(e);
                }
                let _ = done_sender.send(()).await;
            }))
            .await?;
        }

        drop(done_sender);
        wait_for_completion(&done_receiver, submitted).await;

        aggregated_error(&errors)
    }
}

async fn wait_for_completion(done_receiver: &Receiver<()>, submitted: usize) {
    for _ in 0..submitted {
        let _ = done_receiver.recv().await;
    }
}

/// Collapses the errors collected across concurrent actions into a single
/// aggregate error, or `Ok(())` when none occurred.
fn aggregated_error(errors: &ErrorList) -> Result<()> {
    let errors = std::mem::take(&mut *errors.lock().unwrap());
    if errors.is_empty() {
        return Ok(());
    }

    let count = errors.len();
    let messages = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n");

    Err(anyhow!(
        "{count} error(s) occurred during synchronization:\n{messages}"
    ))
}
