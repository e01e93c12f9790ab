//! Feed collaborator: fetch a podcast feed and turn it into a snapshot of
//! show metadata plus episodes in publication order.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::database::{Episode, Owner, Show};
use crate::error::AppError;

/// Parsed feed at one point in time. Episodes keep the feed's own order,
/// which for podcasts is newest first.
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub show: Show,
    pub episodes: Vec<Episode>,
}

/// Fetch and parse the feed at `url`.
pub async fn fetch_feed(client: &reqwest::Client, url: &str) -> Result<FeedSnapshot, AppError> {
    log::info!("Fetching feed from: {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::Fetch(format!("Failed to fetch feed: {}", e)))?;

    if !response.status().is_success() {
        return Err(AppError::Fetch(format!(
            "Feed request failed with status: {}",
            response.status()
        )));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| AppError::Fetch(format!("Failed to read feed body: {}", e)))?;

    parse_feed(&body)
}

/// Parse RSS/Atom bytes. Entries without a title or an audio enclosure are
/// skipped; a feed without a title is rejected since the title names the show.
pub fn parse_feed(body: &[u8]) -> Result<FeedSnapshot, AppError> {
    let feed = feed_rs::parser::parse(body)
        .map_err(|e| AppError::Parse(format!("Failed to parse feed: {}", e)))?;

    let title = feed
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Parse("Feed has no title".to_string()))?;

    let subtitles = itunes_subtitles(body);

    let first_author = feed.authors.first();
    let show = Show {
        title,
        subtitle: subtitles.channel.clone(),
        description: feed.description.map(|d| d.content),
        link: feed.links.first().map(|l| l.href.clone()),
        language: feed.language,
        author: first_author.map(|p| p.name.clone()),
        owner: first_author.map(|p| Owner {
            name: Some(p.name.clone()),
            email: p.email.clone(),
        }),
        category: feed.categories.first().map(|c| c.term.clone()),
    };

    log::info!("Parsed {} entries from feed '{}'", feed.entries.len(), show.title);

    let mut episodes = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        let title = match entry.title.map(|t| t.content.trim().to_string()) {
            Some(t) if !t.is_empty() => t,
            _ => {
                log::warn!("Skipping feed entry without a title (id {})", entry.id);
                continue;
            }
        };

        // Get audio URL from enclosure
        let enclosure_url = entry
            .media
            .iter()
            .flat_map(|m| m.content.iter())
            .find_map(|c| c.url.as_ref())
            .map(|u| u.to_string())
            .or_else(|| {
                entry
                    .links
                    .iter()
                    .find(|l| {
                        l.rel.as_deref() == Some("enclosure")
                            || l.media_type.as_deref().is_some_and(|t| t.starts_with("audio/"))
                    })
                    .map(|l| l.href.clone())
            });

        let enclosure_url = match enclosure_url {
            Some(url) => url,
            None => {
                log::warn!("Skipping '{}': no audio enclosure", title);
                continue;
            }
        };

        let media = entry.media.first();
        let duration = media
            .and_then(|m| m.duration.or_else(|| m.content.first().and_then(|c| c.duration)))
            .map(format_duration);
        let image_url = media
            .and_then(|m| m.thumbnails.first())
            .map(|t| t.image.uri.clone());
        let description = entry
            .content
            .and_then(|c| c.body)
            .or_else(|| media.and_then(|m| m.description.as_ref()).map(|d| d.content.clone()));

        episodes.push(Episode {
            enclosure_url,
            duration,
            subtitle: subtitles.items.get(&title).cloned(),
            title,
            link: entry.links.first().map(|l| l.href.clone()),
            author: entry.authors.first().map(|p| p.name.clone()),
            summary: entry.summary.map(|s| s.content),
            description,
            image_url,
            published_date: entry.published.map(|d| d.to_rfc3339()),
        });
    }

    Ok(FeedSnapshot { show, episodes })
}

/// `itunes:subtitle` values of an RSS feed, keyed by trimmed item title.
#[derive(Debug, Default)]
struct ItunesSubtitles {
    channel: Option<String>,
    items: HashMap<String, String>,
}

// feed-rs drops itunes:subtitle, so RSS bodies get a second parse for it.
// Atom feeds and unparseable bodies have none.
fn itunes_subtitles(body: &[u8]) -> ItunesSubtitles {
    let channel = match rss::Channel::read_from(body) {
        Ok(channel) => channel,
        Err(e) => {
            log::debug!("No iTunes subtitles read: {}", e);
            return ItunesSubtitles::default();
        }
    };

    let items = channel
        .items()
        .iter()
        .filter_map(|item| {
            let title = item.title()?.trim();
            let subtitle = item.itunes_ext()?.subtitle()?.trim();
            (!title.is_empty() && !subtitle.is_empty())
                .then(|| (title.to_string(), subtitle.to_string()))
        })
        .collect();

    ItunesSubtitles {
        channel: channel
            .itunes_ext()
            .and_then(|ext| ext.subtitle())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        items,
    }
}

/// Render a duration as `H:MM:SS`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Test Show</title>
    <link>https://example.com/show</link>
    <description>A show about tests</description>
    <language>en-us</language>
    <category>Comedy</category>
    <itunes:subtitle>Tests, weekly</itunes:subtitle>
    <item>
      <title>Episode 3</title>
      <itunes:subtitle> The third test </itunes:subtitle>
      <description>Third one</description>
      <enclosure url="https://example.com/e3.mp3" length="1000" type="audio/mpeg"/>
      <pubDate>Wed, 03 Jan 2024 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Bonus without audio</title>
      <description>No enclosure here</description>
    </item>
    <item>
      <title>Episode 2</title>
      <enclosure url="https://example.com/e2.mp3" length="1000" type="audio/mpeg"/>
    </item>
    <item>
      <title>Episode 1</title>
      <enclosure url="https://example.com/e1.mp3" length="1000" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed_show_metadata() {
        let snapshot = parse_feed(SAMPLE_RSS.as_bytes()).unwrap();
        assert_eq!(snapshot.show.title, "Test Show");
        assert_eq!(snapshot.show.description.as_deref(), Some("A show about tests"));
        assert_eq!(snapshot.show.language.as_deref(), Some("en-us"));
        assert_eq!(snapshot.show.category.as_deref(), Some("Comedy"));
    }

    #[test]
    fn test_parse_feed_keeps_order_and_skips_entries_without_audio() {
        let snapshot = parse_feed(SAMPLE_RSS.as_bytes()).unwrap();
        let titles: Vec<&str> = snapshot.episodes.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Episode 3", "Episode 2", "Episode 1"]);
        assert_eq!(snapshot.episodes[0].enclosure_url, "https://example.com/e3.mp3");
        assert_eq!(snapshot.episodes[0].summary.as_deref(), Some("Third one"));
        assert!(snapshot.episodes[0].published_date.is_some());
    }

    #[test]
    fn test_parse_feed_reads_itunes_subtitles() {
        let snapshot = parse_feed(SAMPLE_RSS.as_bytes()).unwrap();
        assert_eq!(snapshot.show.subtitle.as_deref(), Some("Tests, weekly"));
        assert_eq!(snapshot.episodes[0].subtitle.as_deref(), Some("The third test"));
        assert_eq!(snapshot.episodes[1].subtitle, None);
    }

    #[test]
    fn test_atom_feed_has_no_subtitles() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Show</title>
  <id>urn:uuid:1</id>
  <updated>2024-01-01T00:00:00Z</updated>
  <entry>
    <title>Only Episode</title>
    <id>urn:uuid:2</id>
    <updated>2024-01-01T00:00:00Z</updated>
    <link rel="enclosure" type="audio/mpeg" href="https://example.com/only.mp3"/>
  </entry>
</feed>"#;
        let snapshot = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(snapshot.show.title, "Atom Show");
        assert_eq!(snapshot.show.subtitle, None);
        assert_eq!(snapshot.episodes.len(), 1);
        assert_eq!(snapshot.episodes[0].subtitle, None);
    }

    #[test]
    fn test_parse_feed_rejects_garbage() {
        let err = parse_feed(b"this is not xml").unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
    }

    #[test]
    fn test_parse_feed_requires_title() {
        let rss = r#"<rss version="2.0"><channel><description>x</description></channel></rss>"#;
        assert!(matches!(parse_feed(rss.as_bytes()), Err(AppError::Parse(_))));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00:00");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1:02:03");
        assert_eq!(format_duration(Duration::from_secs(59)), "0:00:59");
    }
}
