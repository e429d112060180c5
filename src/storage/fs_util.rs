use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use filetime::{FileTime, set_file_mtime};
use tracing::trace;

pub fn is_key_a_directory(key: &str) -> bool {
    if cfg!(windows) && key.ends_with('\\') {
        return true;
    }

    key.ends_with('/')
}

pub async fn create_parent_directories(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };

    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    tokio::fs::create_dir_all(parent)
        .await
        .context("tokio::fs::create_dir_all() failed.")?;

    let directory = parent.to_string_lossy().to_string();
    trace!(directory = directory, "directory created.");

    Ok(())
}

pub fn set_last_modified(path: &Path, last_modified: SystemTime) -> std::io::Result<()> {
    set_file_mtime(path, FileTime::from_system_time(last_modified))
}

pub fn convert_windows_directory_char_to_slash(path: &str) -> String {
    path.replace('\\', "/")
}
