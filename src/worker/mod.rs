pub mod download;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::audio::{self, TrimStats};
use crate::database::{Database, Episode};
use crate::error::AppError;

/// Everything a worker needs to fetch, trim and record one episode.
#[derive(Clone)]
pub struct WorkerContext {
    pub db: Arc<Database>,
    pub client: reqwest::Client,
    pub show_id: i64,
    pub show_dir: PathBuf,
    pub head_skip: Duration,
    pub tail_skip: Duration,
    pub download_attempts: u32,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedEpisode {
    pub title: String,
    pub path: PathBuf,
    pub stats: TrimStats,
}

/// Fetch the enclosure, write the trimmed copy and mark the episode
/// processed. Any failure leaves the row unprocessed so the next run picks it
/// up again.
#[tracing::instrument(skip_all, fields(episode = %episode.title))]
pub async fn process_episode(
    ctx: &WorkerContext,
    episode: &Episode,
) -> Result<ProcessedEpisode, AppError> {
    log::info!("Processing {}", episode.title);

    let body = download::fetch_audio(
        &ctx.client,
        &episode.enclosure_url,
        ctx.download_attempts,
        &ctx.cancel,
    )
    .await?;

    let path = ctx.show_dir.join(output_file_name(&episode.title));
    let (head, tail) = (ctx.head_skip, ctx.tail_skip);
    let out_path = path.clone();
    let stats = tokio::task::spawn_blocking(move || write_trimmed(&body, &out_path, head, tail))
        .await
        .map_err(|e| AppError::Other(format!("Trim task failed: {}", e)))??;

    let path_str = path.to_string_lossy().to_string();
    let changed = ctx.db.mark_processed(ctx.show_id, &episode.title, &path_str)?;
    if changed != 1 {
        return Err(AppError::Consistency(format!(
            "expected to mark 1 row processed for '{}', marked {}",
            episode.title, changed
        )));
    }

    log::info!(
        "Saved {} ({} frames, {} bytes)",
        path.display(),
        stats.frames_kept,
        stats.bytes_written
    );

    Ok(ProcessedEpisode {
        title: episode.title.clone(),
        path,
        stats,
    })
}

/// Trim into `<path>.part` and rename over `path` once complete, so a
/// finished name never holds a partial file.
pub fn write_trimmed(
    buffer: &[u8],
    path: &Path,
    head_skip: Duration,
    tail_skip: Duration,
) -> Result<TrimStats, AppError> {
    let part_path = part_path(path);

    let result = File::create(&part_path)
        .map_err(AppError::from)
        .and_then(|file| {
            let mut out = BufWriter::new(file);
            let stats = audio::trim(buffer, head_skip, tail_skip, &mut out)?;
            // Data must be on disk before the rename makes it visible
            let file = out.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            Ok(stats)
        });

    match result {
        Ok(stats) => {
            std::fs::rename(&part_path, path)?;
            Ok(stats)
        }
        Err(e) => {
            // Clean up partial file
            let _ = std::fs::remove_file(&part_path);
            Err(e)
        }
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// `<title>.mp3`, with characters that are not valid in file names replaced.
pub fn output_file_name(title: &str) -> String {
    format!("{}.mp3", safe_name(title))
}

/// Filesystem-safe form of a show or episode title.
///
/// Titles that need no cleaning are used as-is. Any other title gets a short
/// digest of the raw title appended, so two titles that clean to the same
/// text still get different names.
pub fn safe_name(title: &str) -> String {
    let mut cleaned: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        cleaned = cleaned.replace('.', "_") + "_";
    }

    if cleaned != title {
        cleaned.push('-');
        cleaned.push_str(&title_digest(title));
    }
    cleaned
}

fn title_digest(title: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(title.as_bytes()));
    digest[..12].to_string()
}
