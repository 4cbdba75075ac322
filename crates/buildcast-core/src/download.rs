//! Streaming an image body to disk with progress reporting.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::client::BuildDownload;
use crate::domain::{BuildcastError, Result};
use crate::metrics::METRICS;

/// `floor(received * 100 / total)`, capped at 100.
pub fn progress_percent(received: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (u128::from(received) * 100) / u128::from(total);
    percent.min(100) as u8
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    dest.with_file_name(name)
}

async fn discard_partial(partial: &Path) {
    if let Err(e) = tokio::fs::remove_file(partial).await {
        warn!(path = %partial.display(), error = %e, "could not remove partial download");
    }
}

/// Write `download` to `dest`, calling `on_progress` whenever the percentage
/// changes.
///
/// Bytes land in `<dest>.partial` first and are renamed into place once the
/// body is complete, so `dest` only ever holds a whole image. Progress is
/// reported only when the body length is known. Returns the bytes written.
pub async fn download_to<F>(download: BuildDownload, dest: &Path, mut on_progress: F) -> Result<u64>
where
    F: FnMut(u8),
{
    let BuildDownload {
        total_bytes,
        mut chunks,
    } = download;

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let partial = partial_path(dest);
    let mut file = tokio::fs::File::create(&partial).await?;

    let mut received: u64 = 0;
    let mut last_percent: Option<u8> = None;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        received += chunk.len() as u64;
        METRICS.add_bytes_downloaded(chunk.len() as u64);

        if let Some(total) = total_bytes {
            let percent = progress_percent(received, total);
            if last_percent != Some(percent) {
                last_percent = Some(percent);
                on_progress(percent);
            }
        }
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    if let Some(total) = total_bytes {
        if received != total {
            discard_partial(&partial).await;
            return Err(BuildcastError::ServerUnreachable(format!(
                "download ended after {received} of {total} bytes"
            )));
        }
    }

    tokio::fs::rename(&partial, dest).await?;
    debug!(path = %dest.display(), bytes = received, "download complete");
    Ok(received)
}
