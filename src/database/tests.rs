// Store tests for shows and episode state
// Run with: cargo test --lib database::tests

#[cfg(test)]
mod show_tests {
    use crate::database::{Database, Owner, Show};
    use tempfile::TempDir;

    fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path).unwrap();
        (db, temp_dir)
    }

    fn show(title: &str) -> Show {
        Show {
            title: title.to_string(),
            description: Some("A show".to_string()),
            owner: Some(Owner {
                name: Some("Host".to_string()),
                email: Some("host@example.com".to_string()),
            }),
            category: Some("Comedy".to_string()),
            ..Show::default()
        }
    }

    #[test]
    fn test_upsert_show_is_idempotent() {
        let (db, _temp) = setup_test_db();
        let first = db.upsert_show(&show("Pod"), "http://example.com/feed").unwrap();
        let second = db.upsert_show(&show("Pod"), "http://example.com/feed").unwrap();
        assert_eq!(first, second);

        let record = db.get_show_by_title("Pod").unwrap().unwrap();
        assert_eq!(record.id, first);
        assert_eq!(record.feed_url.as_deref(), Some("http://example.com/feed"));
    }

    #[test]
    fn test_upsert_show_updates_owner() {
        let (db, _temp) = setup_test_db();
        let id = db.upsert_show(&show("Pod"), "u").unwrap();

        let mut changed = show("Pod");
        changed.owner = Some(Owner {
            name: Some("New Host".to_string()),
            email: None,
        });
        db.upsert_show(&changed, "u").unwrap();

        let owner = db.get_show_owner(id).unwrap().unwrap();
        assert_eq!(owner.name.as_deref(), Some("New Host"));
        assert_eq!(owner.email, None);
    }

    #[test]
    fn test_distinct_titles_get_distinct_shows() {
        let (db, _temp) = setup_test_db();
        let a = db.upsert_show(&show("A"), "u").unwrap();
        let b = db.upsert_show(&show("B"), "u").unwrap();
        assert_ne!(a, b);
        assert!(db.get_show_by_title("C").unwrap().is_none());
    }

    #[test]
    fn test_touch_show_synced() {
        let (db, _temp) = setup_test_db();
        let id = db.upsert_show(&show("Pod"), "u").unwrap();
        assert!(db.get_show_by_title("Pod").unwrap().unwrap().last_synced_date.is_none());
        db.touch_show_synced(id).unwrap();
        assert!(db.get_show_by_title("Pod").unwrap().unwrap().last_synced_date.is_some());
    }

    #[test]
    fn test_show_subtitle_survives_a_feed_without_one() {
        let (db, _temp) = setup_test_db();
        let mut with_subtitle = show("Pod");
        with_subtitle.subtitle = Some("Weekly".to_string());
        db.upsert_show(&with_subtitle, "u").unwrap();
        db.upsert_show(&show("Pod"), "u").unwrap();

        let record = db.get_show_by_title("Pod").unwrap().unwrap();
        assert_eq!(record.subtitle.as_deref(), Some("Weekly"));
    }

    #[test]
    fn test_subtitle_columns_added_to_older_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("old.db");
        {
            let conn = rusqlite::Connection::open(&db_path).unwrap();
            conn.execute_batch(
                "CREATE TABLE shows (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL UNIQUE,
                    description TEXT,
                    link TEXT,
                    language TEXT,
                    author TEXT,
                    feed_url TEXT,
                    added_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    last_synced_date TEXT
                );
                INSERT INTO shows (title) VALUES ('Old Pod');",
            )
            .unwrap();
        }

        let db = Database::new(&db_path).unwrap();
        let mut updated = show("Old Pod");
        updated.subtitle = Some("Now with subtitles".to_string());
        db.upsert_show(&updated, "u").unwrap();

        let record = db.get_show_by_title("Old Pod").unwrap().unwrap();
        assert_eq!(record.subtitle.as_deref(), Some("Now with subtitles"));
    }

    #[test]
    fn test_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        {
            let db = Database::new(&db_path).unwrap();
            db.upsert_show(&show("Pod"), "u").unwrap();
        }
        let db = Database::new(&db_path).unwrap();
        assert!(db.get_show_by_title("Pod").unwrap().is_some());
    }
}

#[cfg(test)]
mod episode_tests {
    use crate::database::{Database, Episode, EpisodeState, Show};
    use tempfile::TempDir;

    fn setup_db_with_show() -> (Database, TempDir, i64) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).unwrap();
        let show = Show {
            title: "Test Show".to_string(),
            ..Show::default()
        };
        let show_id = db.upsert_show(&show, "http://example.com/feed").unwrap();
        (db, temp_dir, show_id)
    }

    fn episode(title: &str) -> Episode {
        Episode {
            title: title.to_string(),
            enclosure_url: format!("http://example.com/{}.mp3", title),
            duration: Some("00:30:00".to_string()),
            ..Episode::default()
        }
    }

    #[test]
    fn test_insert_episode_if_absent() {
        let (db, _temp, show_id) = setup_db_with_show();
        assert!(db.insert_episode_if_absent(show_id, &episode("E1")).unwrap());
        assert!(!db.insert_episode_if_absent(show_id, &episode("E1")).unwrap());

        let stored = db.get_episode(show_id, "E1").unwrap().unwrap();
        assert!(!stored.is_processed);
        assert_eq!(stored.duration.as_deref(), Some("00:30:00"));
        assert_eq!(stored.subtitle, None);
    }

    #[test]
    fn test_episode_subtitle_is_stored() {
        let (db, _temp, show_id) = setup_db_with_show();
        let mut ep = episode("E1");
        ep.subtitle = Some("The first one".to_string());
        db.insert_episode_if_absent(show_id, &ep).unwrap();

        let stored = db.get_episode(show_id, "E1").unwrap().unwrap();
        assert_eq!(stored.subtitle.as_deref(), Some("The first one"));
    }

    #[test]
    fn test_same_title_in_two_shows() {
        let (db, _temp, show_id) = setup_db_with_show();
        let other = db
            .upsert_show(
                &Show {
                    title: "Other".to_string(),
                    ..Show::default()
                },
                "u",
            )
            .unwrap();
        assert!(db.insert_episode_if_absent(show_id, &episode("Pilot")).unwrap());
        assert!(db.insert_episode_if_absent(other, &episode("Pilot")).unwrap());
    }

    #[test]
    fn test_episode_states_in_insertion_order() {
        let (db, _temp, show_id) = setup_db_with_show();
        for title in ["C", "A", "B"] {
            db.insert_episode_if_absent(show_id, &episode(title)).unwrap();
        }
        db.mark_processed(show_id, "A", "out/A.mp3").unwrap();

        let states = db.get_episode_states(show_id).unwrap();
        assert_eq!(
            states,
            vec![
                EpisodeState { title: "C".to_string(), is_processed: false },
                EpisodeState { title: "A".to_string(), is_processed: true },
                EpisodeState { title: "B".to_string(), is_processed: false },
            ]
        );
    }

    #[test]
    fn test_mark_processed_affects_exactly_one_row() {
        let (db, _temp, show_id) = setup_db_with_show();
        db.insert_episode_if_absent(show_id, &episode("E1")).unwrap();
        db.insert_episode_if_absent(show_id, &episode("E2")).unwrap();

        assert_eq!(db.mark_processed(show_id, "E1", "Test Show/E1.mp3").unwrap(), 1);

        let stored = db.get_episode(show_id, "E1").unwrap().unwrap();
        assert!(stored.is_processed);
        assert!(stored.processed_date.is_some());
        assert_eq!(stored.output_path.as_deref(), Some("Test Show/E1.mp3"));
        assert!(!db.get_episode(show_id, "E2").unwrap().unwrap().is_processed);
    }

    #[test]
    fn test_mark_processed_only_once() {
        let (db, _temp, show_id) = setup_db_with_show();
        db.insert_episode_if_absent(show_id, &episode("E1")).unwrap();
        assert_eq!(db.mark_processed(show_id, "E1", "a").unwrap(), 1);
        assert_eq!(db.mark_processed(show_id, "E1", "b").unwrap(), 0);

        let stored = db.get_episode(show_id, "E1").unwrap().unwrap();
        assert_eq!(stored.output_path.as_deref(), Some("a"));
    }

    #[test]
    fn test_mark_processed_unknown_title() {
        let (db, _temp, show_id) = setup_db_with_show();
        assert_eq!(db.mark_processed(show_id, "missing", "x").unwrap(), 0);
    }

    #[test]
    fn test_special_characters_in_titles() {
        let (db, _temp, show_id) = setup_db_with_show();
        let titles = [
            "O'Brien's Episode",
            "Test\"Quotes\"Here",
            "Drop; DROP TABLE episodes;--",
            "Señor 日本語 🎉",
        ];
        for title in titles {
            assert!(db.insert_episode_if_absent(show_id, &episode(title)).unwrap());
            assert_eq!(db.mark_processed(show_id, title, "x").unwrap(), 1, "{}", title);
        }
        assert_eq!(db.get_episode_states(show_id).unwrap().len(), titles.len());
    }
}
