use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use regex::Regex;
use tracing_subscriber::EnvFilter;

use s3mirror::SyncConfig;
use s3mirror::config::DEFAULT_WORKER_SIZE;
use s3mirror::pipeline::SyncManager;
use s3mirror::storage::s3::SdkObjectStore;

#[derive(Parser, Debug)]
#[command(name = "s3mirror", version, about = "One-way sync between local directories and S3 buckets.")]
struct CLIArgs {
    /// Source location: a local path or s3://bucket/prefix
    source: String,

    /// Target location: a local path or s3://bucket/prefix
    target: String,

    /// Number of concurrent workers
    #[arg(long, default_value_t = DEFAULT_WORKER_SIZE)]
    worker_size: usize,

    /// Delete target files that no longer exist in the source
    #[arg(long)]
    delete: bool,

    /// Report intended actions without touching the target
    #[arg(long)]
    dry_run: bool,

    /// Canned ACL applied to uploaded and copied objects
    #[arg(long)]
    acl: Option<String>,

    /// Explicit Content-Type for uploads; disables guessing
    #[arg(long)]
    content_type: Option<String>,

    /// Do not guess the Content-Type from the file name
    #[arg(long)]
    no_guess_mime_type: bool,

    /// Only sync entries matching any of these regular expressions
    #[arg(long = "filter", value_name = "REGEX")]
    filters: Vec<Regex>,

    /// More verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable logging
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl From<&CLIArgs> for SyncConfig {
    fn from(args: &CLIArgs) -> Self {
        Self {
            worker_size: args.worker_size,
            sync_with_delete: args.delete,
            dry_run: args.dry_run,
            canned_acl: args
                .acl
                .as_deref()
                .map(aws_sdk_s3::types::ObjectCannedAcl::from),
            content_type: args.content_type.clone(),
            no_guess_mime_type: args.no_guess_mime_type,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CLIArgs::parse();

    init_tracing(args.verbose, args.quiet);

    let store = Arc::new(SdkObjectStore::from_env().await);
    let manager = SyncManager::new(store, SyncConfig::from(&args));

    let result = manager
        .sync_with_patterns(&args.source, &args.target, args.filters.clone())
        .await;

    let stats = manager.statistics();
    println!(
        "{} files transferred ({} bytes), {} files deleted",
        stats.files_transferred, stats.bytes_transferred, stats.files_deleted
    );

    result
}

fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(format!("s3mirror={level}")))
                .unwrap(),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        CLIArgs::command().debug_assert();
    }

    #[test]
    fn args_to_config() {
        let args = CLIArgs::try_parse_from([
            "s3mirror",
            "--worker-size",
            "4",
            "--delete",
            "--dry-run",
            "--acl",
            "public-read",
            "./source",
            "s3://target-bucket/dir1/",
        ])
        .unwrap();

        let config = SyncConfig::from(&args);
        assert_eq!(config.worker_size, 4);
        assert!(config.sync_with_delete);
        assert!(config.dry_run);
        assert_eq!(
            config.canned_acl,
            Some(aws_sdk_s3::types::ObjectCannedAcl::PublicRead)
        );
        assert!(!config.no_guess_mime_type);
    }
}
