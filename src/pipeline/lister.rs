use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use async_channel::{Receiver, Sender};
use regex::Regex;
use tracing::{trace, warn};
use walkdir::WalkDir;

use crate::storage::{ObjectStoreRef, fs_util};
use crate::types::token::SyncCancellationToken;
use crate::types::{FileEntry, S3Path};

const ENTRY_CHANNEL_CAPACITY: usize = 1000;

/// Enumerates the files under a local root as a lazy sequence.
///
/// A missing root yields an empty sequence. A root that names a regular file
/// yields exactly one single-file entry. Enumeration failures are carried as
/// `Err` elements instead of being raised.
pub fn list_local_entries(
    base_path: PathBuf,
    patterns: Vec<Regex>,
    cancellation_token: SyncCancellationToken,
) -> Receiver<Result<FileEntry>> {
    let (sender, receiver) = async_channel::bounded(ENTRY_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        trace!("list local entries has started.");

        let metadata = match tokio::fs::metadata(&base_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // The root doesn't exist. Close the sequence without
                // yielding anything.
                return;
            }
            Err(e) => {
                let _ = send_entry(
                    &sender,
                    &cancellation_token,
                    Err(anyhow!(e).context("tokio::fs::metadata() failed.")),
                )
                .await;
                return;
            }
        };

        if metadata.is_file() {
            // The root itself is a single explicit file. Its name is its own
            // base name and the pattern filter does not apply.
            let name = base_path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            let entry = FileEntry::new(
                name,
                base_path.to_string_lossy().to_string(),
                metadata.len() as i64,
                metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
                true,
            );
            send_entry(&sender, &cancellation_token, Ok(entry)).await;

            trace!("list local entries has been completed.");
            return;
        }

        for entry in WalkDir::new(&base_path) {
            if cancellation_token.is_cancelled() {
                trace!("list local entries cancelled.");
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // A failed directory visit ends the walk; the failure is
                    // carried downstream as a sequence element.
                    let path = e
                        .path()
                        .map(|path| path.to_string_lossy().to_string())
                        .unwrap_or_default();
                    warn!(path = path, "failed to walk local directory.");

                    let _ = send_entry(
                        &sender,
                        &cancellation_token,
                        Err(anyhow!(e).context("walkdir::WalkDir failed.")),
                    )
                    .await;
                    break;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            // The filter is matched against the absolute path being visited,
            // not the relativized name. The remote lister matches the
            // relative name instead; this asymmetry is intentional.
            let visited_path = entry.path().to_string_lossy().to_string();
            if !match_name(&visited_path, &patterns) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    let _ = send_entry(
                        &sender,
                        &cancellation_token,
                        Err(anyhow!(e).context("walkdir::DirEntry::metadata() failed.")),
                    )
                    .await;
                    break;
                }
            };

            let relative_name = entry
                .path()
                .strip_prefix(&base_path)
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|_| visited_path.clone());
            let name = if cfg!(windows) {
                fs_util::convert_windows_directory_char_to_slash(&relative_name)
            } else {
                relative_name
            };

            let file_entry = FileEntry::new(
                name,
                visited_path,
                metadata.len() as i64,
                metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
                false,
            );

            if !send_entry(&sender, &cancellation_token, Ok(file_entry)).await {
                break;
            }
        }

        trace!("list local entries has been completed.");
    });

    receiver
}

/// Enumerates the objects under a bucket prefix as a lazy sequence, issuing
/// paginated listing calls.
///
/// Directory marker objects (keys ending in a separator) are skipped. A
/// listing failure is carried as a single `Err` element and halts further
/// pagination.
pub fn list_remote_entries(
    store: ObjectStoreRef,
    path: S3Path,
    patterns: Vec<Regex>,
    cancellation_token: SyncCancellationToken,
) -> Receiver<Result<FileEntry>> {
    let (sender, receiver) = async_channel::bounded(ENTRY_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        trace!("list remote entries has started.");

        let mut continuation_token = None;
        loop {
            if cancellation_token.is_cancelled() {
                trace!("list remote entries cancelled.");
                break;
            }

            let page = match store
                .list_objects(&path.bucket, &path.prefix, continuation_token.take())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    let _ = send_entry(&sender, &cancellation_token, Err(e)).await;
                    break;
                }
            };

            for object in page.objects {
                if cancellation_token.is_cancelled() {
                    trace!("list remote entries cancelled.");
                    return;
                }

                if fs_util::is_key_a_directory(&object.key) {
                    continue;
                }

                let name = relative_key(&path.prefix, &object.key);
                if !match_name(&name, &patterns) {
                    continue;
                }

                let entry = if name == "." {
                    // The prefix itself names exactly one object.
                    FileEntry::new(
                        base_name(&object.key).to_string(),
                        object.key,
                        object.size,
                        object.last_modified,
                        true,
                    )
                } else {
                    FileEntry::new(name, object.key, object.size, object.last_modified, false)
                };

                if !send_entry(&sender, &cancellation_token, Ok(entry)).await {
                    return;
                }
            }

            continuation_token = page.next_token;
            if continuation_token.is_none() {
                break;
            }
        }

        trace!("list remote entries has been completed.");
    });

    receiver
}

async fn send_entry(
    sender: &Sender<Result<FileEntry>>,
    cancellation_token: &SyncCancellationToken,
    entry: Result<FileEntry>,
) -> bool {
    tokio::select! {
        result = sender.send(entry) => {
            if let Err(e) = result.context("async_channel::Sender::send() failed.") {
                if !sender.is_closed() {
                    warn!(error = %e, "failed to send an entry.");
                }
                return false;
            }
            true
        }
        _ = cancellation_token.cancelled() => false,
    }
}

pub fn match_name(name: &str, patterns: &[Regex]) -> bool {
    if patterns.is_empty() {
        return true;
    }

    patterns.iter().any(|pattern| pattern.is_match(name))
}

/// Relativizes an object key against a listing prefix, component-wise.
///
/// Returns `"."` when the key and the prefix denote the same object. A
/// prefix that stops mid-component steps up to its parent (`dir/pre` vs
/// `dir/prefix1` gives `../prefix1`).
pub fn relative_key(prefix: &str, key: &str) -> String {
    let prefix_components: Vec<&str> = prefix
        .split('/')
        .filter(|component| !component.is_empty() && *component != ".")
        .collect();
    let key_components: Vec<&str> = key
        .split('/')
        .filter(|component| !component.is_empty() && *component != ".")
        .collect();

    let common = prefix_components
        .iter()
        .zip(key_components.iter())
        .take_while(|(prefix_component, key_component)| prefix_component == key_component)
        .count();

    let mut components: Vec<&str> = Vec::new();
    for _ in common..prefix_components.len() {
        components.push("..");
    }
    components.extend(&key_components[common..]);

    if components.is_empty() {
        ".".to_string()
    } else {
        components.join("/")
    }
}

fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}
