use serde::{Deserialize, Serialize};

/// Show metadata as published in the feed. The title is the show's identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub language: Option<String>,
    pub author: Option<String>,
    pub owner: Option<Owner>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// One episode as it appears in a feed snapshot.
///
/// The title doubles as the episode's key within its show; feeds give no
/// other identifier that survives across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub title: String,
    pub enclosure_url: String,
    pub duration: Option<String>,
    pub subtitle: Option<String>,
    pub link: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub published_date: Option<String>,
}

/// Stored show row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowRecord {
    pub id: i64,
    pub title: String,
    pub subtitle: Option<String>,
    pub feed_url: Option<String>,
    pub added_date: String,
    pub last_synced_date: Option<String>,
}

/// `(title, processed)` pair read in insertion order for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeState {
    pub title: String,
    pub is_processed: bool,
}

/// Stored episode row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEpisode {
    pub id: i64,
    pub show_id: i64,
    pub title: String,
    pub enclosure_url: String,
    pub duration: Option<String>,
    pub subtitle: Option<String>,
    pub added_date: String,
    pub is_processed: bool,
    pub processed_date: Option<String>,
    pub output_path: Option<String>,
}
