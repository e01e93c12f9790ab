//! One sync cycle for one feed: fetch, reconcile, then fetch-and-trim every
//! pending episode through a bounded worker pool.

pub mod reconcile;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, DispatchMode};
use crate::database::{Database, Episode};
use crate::error::AppError;
use crate::feed;
use crate::worker::{self, download, ProcessedEpisode, WorkerContext};

pub use reconcile::{plan, reconcile, ReconcileOutcome};

#[derive(Debug, Clone, Serialize)]
pub struct FailedEpisode {
    pub title: String,
    pub error: String,
}

/// What a sync cycle did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub show_title: String,
    pub show_dir: PathBuf,
    pub feed_episodes: usize,
    pub new_episodes: usize,
    pub recovered_episodes: usize,
    pub processed: Vec<ProcessedEpisode>,
    pub failed: Vec<FailedEpisode>,
    /// Insert failures from reconciliation.
    pub store_errors: Vec<FailedEpisode>,
    /// Workers left running in detached mode.
    pub detached: usize,
    /// Episodes never dispatched because the run was cancelled.
    pub skipped: usize,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.store_errors.is_empty() && self.skipped == 0
    }
}

/// Run one full cycle against `feed_url`.
///
/// Feed and store initialization errors abort the cycle. Per-episode errors
/// are logged and collected in the report without stopping sibling workers.
pub async fn run_sync(
    config: &Config,
    feed_url: &str,
    cancel: CancellationToken,
) -> Result<SyncReport, AppError> {
    config.validate()?;

    let client = download::build_client(
        Duration::from_secs(config.connect_timeout_secs),
        Duration::from_secs(config.request_timeout_secs),
    )?;

    let snapshot = feed::fetch_feed(&client, feed_url).await?;
    log::info!("{} fetched", snapshot.show.title);

    let db = Database::new(&config.database_path).map_err(|e| {
        AppError::Database(format!(
            "Failed to open database {}: {}",
            config.database_path.display(),
            e
        ))
    })?;
    let db = Arc::new(db);

    let show_id = db.upsert_show(&snapshot.show, feed_url)?;
    let show_dir = config.output_dir.join(worker::safe_name(&snapshot.show.title));
    tokio::fs::create_dir_all(&show_dir).await?;

    let outcome = reconcile(&db, show_id, &snapshot.episodes)?;

    let mut report = SyncReport {
        show_title: snapshot.show.title.clone(),
        show_dir: show_dir.clone(),
        feed_episodes: snapshot.episodes.len(),
        new_episodes: outcome.new_count,
        recovered_episodes: outcome.recovered_count,
        store_errors: outcome
            .store_errors
            .iter()
            .map(|(title, e)| FailedEpisode {
                title: title.clone(),
                error: e.to_string(),
            })
            .collect(),
        ..SyncReport::default()
    };

    if outcome.is_partial() {
        log::warn!(
            "{} new episode(s) could not be recorded; they will fail to be marked processed",
            outcome.store_errors.len()
        );
    }

    let ctx = WorkerContext {
        db: db.clone(),
        client,
        show_id,
        show_dir,
        head_skip: config.head_skip(),
        tail_skip: config.tail_skip(),
        download_attempts: config.download_attempts,
        cancel: cancel.clone(),
    };

    dispatch(ctx, outcome.pending, config, &mut report).await;

    if let Err(e) = db.touch_show_synced(show_id) {
        log::warn!("Failed to record sync time: {}", e);
    }

    log::info!(
        "Sync of '{}' finished: {} processed, {} failed, {} detached",
        report.show_title,
        report.processed.len(),
        report.failed.len(),
        report.detached
    );

    Ok(report)
}

/// Run workers with at most `config.max_workers` in flight.
async fn dispatch(
    ctx: WorkerContext,
    pending: Vec<Episode>,
    config: &Config,
    report: &mut SyncReport,
) {
    let semaphore = Arc::new(Semaphore::new(config.max_workers));
    let mut workers = JoinSet::new();
    let total = pending.len();

    for (index, episode) in pending.into_iter().enumerate() {
        let permit = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => None,
            permit = semaphore.clone().acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            report.skipped = total - index;
            log::warn!("Dispatch stopped, {} episode(s) not started", report.skipped);
            break;
        };

        let ctx = ctx.clone();
        workers.spawn(async move {
            let result = worker::process_episode(&ctx, &episode).await;
            drop(permit);
            (episode.title, result)
        });
    }

    match config.dispatch {
        DispatchMode::Wait => {
            while let Some(joined) = workers.join_next().await {
                record(joined, report);
            }
        }
        DispatchMode::Detach => {
            // Finished workers are recorded, only running ones are detached
            while let Some(joined) = workers.try_join_next() {
                record(joined, report);
            }
            report.detached = workers.len();
            workers.detach_all();
        }
    }
}

fn record(
    joined: Result<(String, Result<ProcessedEpisode, AppError>), tokio::task::JoinError>,
    report: &mut SyncReport,
) {
    match joined {
        Ok((_, Ok(processed))) => report.processed.push(processed),
        Ok((title, Err(e))) => {
            log::error!("Failed to process '{}': {}", title, e);
            report.failed.push(FailedEpisode {
                title,
                error: e.to_string(),
            });
        }
        Err(e) => {
            log::error!("Worker task panicked: {}", e);
            report.failed.push(FailedEpisode {
                title: String::new(),
                error: e.to_string(),
            });
        }
    }
}
