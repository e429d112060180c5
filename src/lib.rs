/*!
# Overview
s3mirror is a one-way synchronization engine between a local directory tree
and an S3 bucket, or between two buckets. For every file under the source
root it decides whether the destination copy is missing, has a different
size, or is older, and issues the minimal set of transfers (and, optionally,
deletes) to make the destination match the source.

## Features
- Three directions, chosen from the location strings: Local to S3, S3 to
  Local, S3 to S3.
- Modified-time and size based incremental transfer; unchanged files are
  never touched.
- Bounded parallelism: a fixed pool of workers drains the action queue; the
  pool size is the only concurrency knob.
- Optional deletion of destination files that no longer exist in the source.
- Dry-run mode that reports every intended action without touching anything.
- Regular-expression name filters.
- Partial failures never abort a run: every error is collected and returned
  as one aggregate error at the end.

## As a library
The s3mirror CLI is a thin wrapper of this library.

```Toml
[dependencies]
s3mirror = "0.4"
tokio = { version = "1", features = ["full"] }
```

```no_run
use std::sync::Arc;

use s3mirror::SyncConfig;
use s3mirror::pipeline::SyncManager;
use s3mirror::storage::s3::SdkObjectStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let store = Arc::new(SdkObjectStore::from_env().await);

    let config = SyncConfig {
        sync_with_delete: true,
        ..Default::default()
    };

    let manager = SyncManager::new(store, config);
    manager.sync("./data", "s3://my-bucket/data/").await?;

    let stats = manager.statistics();
    println!(
        "{} files, {} bytes, {} deleted",
        stats.files_transferred, stats.bytes_transferred, stats.files_deleted
    );

    Ok(())
}
```

Cancellation goes through a token created with
[`types::token::create_sync_cancellation_token`] and passed to
[`pipeline::SyncManager::sync_with_cancellation_token`]; enumeration and
action submission stop promptly once it fires.
*/

pub use config::SyncConfig;
pub use pipeline::SyncManager;

pub mod config;
pub mod pipeline;
pub mod storage;
pub mod types;
