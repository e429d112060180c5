use std::collections::HashMap;

use anyhow::Result;
use async_channel::Receiver;
use tracing::{debug, trace};

use crate::types::{FileEntry, SyncAction};

const ACTION_CHANNEL_CAPACITY: usize = 1000;

/// Merges the source and target entry sequences into a sequence of required
/// actions.
///
/// The target sequence is fully materialized into a name index before
/// comparison begins; a carried target enumeration failure aborts the whole
/// filter with exactly that error. Source entries stream through: a missing,
/// size-mismatched, or strictly-older target copy produces an update action,
/// and source enumeration failures are forwarded without stopping the
/// stream. When `sync_with_delete` is set, every target entry never matched
/// by a source entry produces a delete action after the source is exhausted.
pub fn filter_entries_for_sync(
    source: Receiver<Result<FileEntry>>,
    target: Receiver<Result<FileEntry>>,
    sync_with_delete: bool,
) -> Receiver<Result<SyncAction>> {
    let (sender, receiver) = async_channel::bounded(ACTION_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        trace!("diff filter has started.");

        let mut target_entries = match collect_target_entries(target).await {
            Ok(target_entries) => target_entries,
            Err(e) => {
                let _ = sender.send(Err(e)).await;
                return;
            }
        };

        while let Ok(result) = source.recv().await {
            let source_entry = match result {
                Ok(source_entry) => source_entry,
                Err(e) => {
                    if sender.send(Err(e)).await.is_err() {
                        return;
                    }
                    continue;
                }
            };

            let update_required = match target_entries.get_mut(&source_entry.name) {
                Some(target_entry) => {
                    target_entry.exists_in_source = true;
                    source_entry.size != target_entry.size
                        || source_entry.last_modified > target_entry.last_modified
                }
                None => true,
            };

            if update_required {
                let name = source_entry.name.clone();
                debug!(name = name, "update required.");

                if sender.send(Ok(SyncAction::update(source_entry))).await.is_err() {
                    return;
                }
            }
        }

        if sync_with_delete {
            for (_, target_entry) in target_entries {
                if target_entry.exists_in_source {
                    continue;
                }

                let name = target_entry.name.clone();
                debug!(name = name, "delete required.");

                if sender.send(Ok(SyncAction::delete(target_entry))).await.is_err() {
                    return;
                }
            }
        }

        trace!("diff filter has been completed.");
    });

    receiver
}

/// Drains the target sequence into a name index. The last entry wins when a
/// name occurs twice. An `Err` element fails the whole collection.
async fn collect_target_entries(
    target: Receiver<Result<FileEntry>>,
) -> Result<HashMap<String, FileEntry>> {
    let mut target_entries = HashMap::new();

    while let Ok(result) = target.recv().await {
        let entry = result?;
        target_entries.insert(entry.name.clone(), entry);
    }

    Ok(target_entries)
}
