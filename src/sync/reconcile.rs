//! Decide which feed episodes still need work.
//!
//! The feed is walked from its oldest entry to its newest while a cursor
//! steps through the stored `(title, processed)` list in insertion order.
//! Matching relies on both sequences lining up: if a feed reorders or renames
//! episodes between runs the walk desynchronizes and the affected titles are
//! treated as new. That is the accepted limitation of keying on titles.

use std::collections::HashSet;

use serde::Serialize;

use crate::database::{Database, Episode, EpisodeState};
use crate::error::AppError;

/// Why an episode ended up in the work list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// Not at the store cursor: first sighting, persist before processing.
    New,
    /// Stored but never marked processed, e.g. an interrupted earlier run.
    Recovered,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedEpisode<'a> {
    pub episode: &'a Episode,
    pub reason: Reason,
}

/// Work list produced by [`reconcile`].
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Episodes to process, oldest first.
    pub pending: Vec<Episode>,
    pub new_count: usize,
    pub recovered_count: usize,
    /// Titles whose insert failed. They are still in `pending`, but a worker
    /// will not be able to mark them processed.
    pub store_errors: Vec<(String, AppError)>,
}

impl ReconcileOutcome {
    pub fn is_partial(&self) -> bool {
        !self.store_errors.is_empty()
    }
}

/// Pure synchronized walk. `feed` is newest first, `stored` oldest first;
/// the result is oldest first.
pub fn plan<'a>(feed: &'a [Episode], stored: &[EpisodeState]) -> Vec<PlannedEpisode<'a>> {
    let mut cursor = stored.iter().peekable();
    let mut planned = Vec::new();

    for episode in feed.iter().rev() {
        match cursor.peek() {
            Some(state) if state.title == episode.title => {
                if !state.is_processed {
                    planned.push(PlannedEpisode {
                        episode,
                        reason: Reason::Recovered,
                    });
                }
                cursor.next();
            }
            // Cursor stays put: the stored entry is compared with the next
            // feed episode.
            _ => planned.push(PlannedEpisode {
                episode,
                reason: Reason::New,
            }),
        }
    }

    planned
}

/// Walk the feed against the stored state for `show_id`, persisting every new
/// title before returning. Insert failures are collected, not fatal.
pub fn reconcile(
    db: &Database,
    show_id: i64,
    feed: &[Episode],
) -> Result<ReconcileOutcome, AppError> {
    let stored = db.get_episode_states(show_id)?;
    log::info!(
        "Reconciling {} feed episodes against {} stored",
        feed.len(),
        stored.len()
    );

    let mut outcome = ReconcileOutcome::default();
    let mut admitted = HashSet::new();
    for planned in plan(feed, &stored) {
        let title = &planned.episode.title;
        // One worker per title: a repeated title would share its output file
        if !admitted.insert(title.as_str()) {
            log::warn!("'{}' appears more than once in the feed; processing it once", title);
            continue;
        }

        match planned.reason {
            Reason::New => match db.insert_episode_if_absent(show_id, planned.episode) {
                Ok(true) => {
                    log::info!("New episode: {}", title);
                    outcome.new_count += 1;
                }
                // Stored already, but out of step with the walk
                Ok(false) => match db.get_episode(show_id, title) {
                    Ok(Some(stored)) if stored.is_processed => {
                        log::warn!("'{}' is out of step with the feed but already processed", title);
                        continue;
                    }
                    _ => {
                        log::warn!("'{}' already stored but out of step with the feed", title);
                        outcome.recovered_count += 1;
                    }
                },
                Err(e) => {
                    log::error!("Failed to record episode '{}': {}", title, e);
                    outcome.new_count += 1;
                    outcome.store_errors.push((title.clone(), e.into()));
                }
            },
            Reason::Recovered => {
                log::info!("Recovering unprocessed episode: {}", title);
                outcome.recovered_count += 1;
            }
        }
        outcome.pending.push(planned.episode.clone());
    }

    Ok(outcome)
}
