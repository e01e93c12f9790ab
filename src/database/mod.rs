pub mod models;

#[cfg(test)]
mod tests;

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub use models::*;

/// SQLite-backed record of shows and the episodes seen for each.
///
/// A single connection is shared behind a mutex. Every statement is short,
/// and workers only ever update the one episode row they own.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        // Enable WAL mode for concurrent reads
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            PRAGMA temp_store=MEMORY;
        ",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        // Initialize schema
        db.init_schema()?;

        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS shows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL UNIQUE,
                subtitle TEXT,
                description TEXT,
                link TEXT,
                language TEXT,
                author TEXT,
                feed_url TEXT,
                added_date TEXT NOT NULL DEFAULT (datetime('now')),
                last_synced_date TEXT
            );

            CREATE TABLE IF NOT EXISTS show_owners (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                show_id INTEGER NOT NULL UNIQUE,
                name TEXT,
                email TEXT,
                FOREIGN KEY (show_id) REFERENCES shows(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS show_categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                show_id INTEGER NOT NULL UNIQUE,
                category TEXT NOT NULL,
                FOREIGN KEY (show_id) REFERENCES shows(id) ON DELETE CASCADE
            );

            -- Episodes are never deleted; is_processed flips 0 -> 1 once
            CREATE TABLE IF NOT EXISTS episodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                show_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                subtitle TEXT,
                link TEXT,
                duration TEXT,
                author TEXT,
                summary TEXT,
                description TEXT,
                image_url TEXT,
                enclosure_url TEXT NOT NULL,
                published_date TEXT,
                added_date TEXT NOT NULL DEFAULT (datetime('now')),
                is_processed INTEGER NOT NULL DEFAULT 0,
                processed_date TEXT,
                output_path TEXT,
                FOREIGN KEY (show_id) REFERENCES shows(id) ON DELETE CASCADE,
                UNIQUE(show_id, title)
            );

            CREATE INDEX IF NOT EXISTS idx_episodes_show_order
                ON episodes(show_id, id);
        "#,
        )?;

        // Migration: subtitle columns for databases created before them
        let _ = conn.execute("ALTER TABLE shows ADD COLUMN subtitle TEXT", []); // Ignore error if column already exists
        let _ = conn.execute("ALTER TABLE episodes ADD COLUMN subtitle TEXT", []); // Ignore error if column already exists

        Ok(())
    }

    /// Insert the show or refresh its metadata, keyed by title. Returns the
    /// show id.
    pub fn upsert_show(&self, show: &Show, feed_url: &str) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO shows (title, subtitle, description, link, language, author, feed_url)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(title) DO UPDATE SET
                subtitle = COALESCE(excluded.subtitle, subtitle),
                description = COALESCE(excluded.description, description),
                link = COALESCE(excluded.link, link),
                language = COALESCE(excluded.language, language),
                author = COALESCE(excluded.author, author),
                feed_url = excluded.feed_url",
            params![
                show.title,
                show.subtitle,
                show.description,
                show.link,
                show.language,
                show.author,
                feed_url
            ],
        )?;

        let show_id: i64 = conn.query_row(
            "SELECT id FROM shows WHERE title = ?",
            params![show.title],
            |row| row.get(0),
        )?;

        if let Some(owner) = &show.owner {
            conn.execute(
                "INSERT INTO show_owners (show_id, name, email) VALUES (?, ?, ?)
                 ON CONFLICT(show_id) DO UPDATE SET name = excluded.name, email = excluded.email",
                params![show_id, owner.name, owner.email],
            )?;
        }

        if let Some(category) = &show.category {
            conn.execute(
                "INSERT INTO show_categories (show_id, category) VALUES (?, ?)
                 ON CONFLICT(show_id) DO UPDATE SET category = excluded.category",
                params![show_id, category],
            )?;
        }

        Ok(show_id)
    }

    pub fn get_show_by_title(&self, title: &str) -> Result<Option<ShowRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, subtitle, feed_url, added_date, last_synced_date
             FROM shows WHERE title = ?",
        )?;
        let mut rows = stmt.query_map(params![title], |row| {
            Ok(ShowRecord {
                id: row.get(0)?,
                title: row.get(1)?,
                subtitle: row.get(2)?,
                feed_url: row.get(3)?,
                added_date: row.get(4)?,
                last_synced_date: row.get(5)?,
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    pub fn get_show_owner(&self, show_id: i64) -> Result<Option<Owner>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name, email FROM show_owners WHERE show_id = ?")?;
        let mut rows = stmt.query_map(params![show_id], |row| {
            Ok(Owner {
                name: row.get(0)?,
                email: row.get(1)?,
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    pub fn touch_show_synced(&self, show_id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE shows SET last_synced_date = ? WHERE id = ?",
            params![chrono::Utc::now().to_rfc3339(), show_id],
        )?;
        Ok(())
    }

    /// Record an episode the first time it is seen. Returns `true` when a row
    /// was inserted, `false` when the title already existed for this show.
    pub fn insert_episode_if_absent(&self, show_id: i64, episode: &Episode) -> Result<bool> {
        let conn = self.conn()?;
        let now = chrono::Utc::now().to_rfc3339();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO episodes (show_id, title, subtitle, link, duration, author,
                summary, description, image_url, enclosure_url, published_date, added_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                show_id,
                episode.title,
                episode.subtitle,
                episode.link,
                episode.duration,
                episode.author,
                episode.summary,
                episode.description,
                episode.image_url,
                episode.enclosure_url,
                episode.published_date,
                now
            ],
        )?;
        Ok(inserted == 1)
    }

    /// `(title, processed)` for every stored episode of the show, oldest
    /// insertion first.
    pub fn get_episode_states(&self, show_id: i64) -> Result<Vec<EpisodeState>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT title, is_processed FROM episodes WHERE show_id = ? ORDER BY id ASC",
        )?;
        let states = stmt
            .query_map(params![show_id], |row| {
                Ok(EpisodeState {
                    title: row.get(0)?,
                    is_processed: row.get::<_, i32>(1)? == 1,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(states)
    }

    pub fn get_episode(&self, show_id: i64, title: &str) -> Result<Option<StoredEpisode>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, show_id, title, enclosure_url, duration, subtitle, added_date,
                    is_processed, processed_date, output_path
             FROM episodes WHERE show_id = ? AND title = ?",
        )?;
        let mut rows = stmt.query_map(params![show_id, title], |row| {
            Ok(StoredEpisode {
                id: row.get(0)?,
                show_id: row.get(1)?,
                title: row.get(2)?,
                enclosure_url: row.get(3)?,
                duration: row.get(4)?,
                subtitle: row.get(5)?,
                added_date: row.get(6)?,
                is_processed: row.get::<_, i32>(7)? == 1,
                processed_date: row.get(8)?,
                output_path: row.get(9)?,
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    /// Flip an unprocessed episode to processed. Returns the number of rows
    /// changed; callers must treat anything other than 1 as a fault.
    pub fn mark_processed(&self, show_id: i64, title: &str, output_path: &str) -> Result<usize> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE episodes
             SET is_processed = 1, processed_date = ?, output_path = ?
             WHERE show_id = ? AND title = ? AND is_processed = 0",
            params![chrono::Utc::now().to_rfc3339(), output_path, show_id, title],
        )?;
        Ok(changed)
    }
}
