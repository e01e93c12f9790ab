use futures_util::StreamExt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;

const BACKOFF_DELAYS_SECS: [u64; 3] = [2, 8, 30];

/// Most that a Content-Length header can reserve up front. Bodies larger than
/// this still download, growing the buffer as chunks arrive.
const PREALLOC_LIMIT: u64 = 64 << 20;

/// Build the shared HTTP client used for the feed and every enclosure.
pub fn build_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .user_agent(concat!("podtrim/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Fetch(format!("Failed to create HTTP client: {}", e)))
}

/// Download the full body of `url` into memory, retrying with backoff up to
/// `attempts` times. Cancellation abandons the transfer immediately.
pub async fn fetch_audio(
    client: &reqwest::Client,
    url: &str,
    attempts: u32,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, AppError> {
    let attempts = attempts.max(1) as usize;

    for attempt in 0..attempts {
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            result = try_fetch(client, url) => result,
        };

        match result {
            Ok(body) => return Ok(body),
            Err(e) if attempt + 1 < attempts => {
                let delay = BACKOFF_DELAYS_SECS[attempt.min(BACKOFF_DELAYS_SECS.len() - 1)];
                log::warn!(
                    "Download attempt {} failed, retrying in {}s: {}",
                    attempt + 1,
                    delay,
                    e
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(AppError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_secs(delay)) => {}
                }
            }
            Err(e) => {
                return Err(AppError::Fetch(format!(
                    "Download failed after {} attempt(s): {}",
                    attempts, e
                )))
            }
        }
    }

    Err(AppError::Fetch(format!("No download attempted for {}", url)))
}

/// Single download attempt with streaming and length validation
async fn try_fetch(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, String> {
    log::debug!("Downloading {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("Failed to start download: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("Download failed with status: {}", response.status()));
    }

    let content_length = response.content_length();
    let mut body = Vec::with_capacity(content_length.map_or(0, |n| n.min(PREALLOC_LIMIT)) as usize);
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| format!("Error reading download stream: {}", e))?;
        body.extend_from_slice(&chunk);
    }

    // Validate size against Content-Length
    if let Some(expected) = content_length {
        if body.len() as u64 != expected {
            return Err(format!(
                "Download incomplete: got {} bytes, expected {}",
                body.len(),
                expected
            ));
        }
    }

    log::info!("Download complete: {} bytes", body.len());
    Ok(body)
}
