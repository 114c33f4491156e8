use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, error};

use crate::{CacheError, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS stories (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL,
    photo_url   TEXT NOT NULL,
    created_at  TEXT NOT NULL,   -- ISO-8601, sorts lexically
    lat         REAL,
    lon         REAL
);

CREATE INDEX IF NOT EXISTS idx_stories_name ON stories(name);
CREATE INDEX IF NOT EXISTS idx_stories_created_at ON stories(created_at);
";

const STORY_COLUMNS: &str = "id, name, description, photo_url, created_at, lat, lon";

/// A story the user saved for offline reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedStory {
    pub id: String,
    pub name: String,
    pub description: String,
    pub photo_url: String,
    pub created_at: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// On-device "save for later" list
///
/// Every call opens the database, runs a single transaction and lets the
/// connection drop, so nothing stays open between calls. Storage errors are
/// logged and flattened into `false` / `None` / empty results; callers never
/// see SQLite error codes.
#[derive(Debug, Clone)]
pub struct BookmarkStore {
    path: PathBuf,
    version: u32,
}

impl BookmarkStore {
    pub fn new(path: impl Into<PathBuf>, version: u32) -> Self {
        Self {
            path: path.into(),
            version,
        }
    }

    /// Insert or replace by id
    pub fn save(&self, story: &SavedStory) -> bool {
        match self.try_save(story) {
            Ok(()) => {
                debug!("Saved story {}", story.id);
                true
            }
            Err(e) => {
                error!("Error saving story {}: {}", story.id, e);
                false
            }
        }
    }

    pub fn exists(&self, id: &str) -> bool {
        self.try_exists(id).unwrap_or_else(|e| {
            error!("Error checking saved story {}: {}", id, e);
            false
        })
    }

    pub fn get(&self, id: &str) -> Option<SavedStory> {
        self.try_get(id).unwrap_or_else(|e| {
            error!("Error reading saved story {}: {}", id, e);
            None
        })
    }

    /// Every saved story, in no particular order
    pub fn list_all(&self) -> Vec<SavedStory> {
        self.try_list_all().unwrap_or_else(|e| {
            error!("Error listing saved stories: {}", e);
            Vec::new()
        })
    }

    /// Remove by id. Removing an id that isn't there still counts as success.
    pub fn delete(&self, id: &str) -> bool {
        match self.try_delete(id) {
            Ok(removed) => {
                debug!("Deleted story {} ({} rows)", id, removed);
                true
            }
            Err(e) => {
                error!("Error deleting story {}: {}", id, e);
                false
            }
        }
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        upgrade(&conn, self.version)?;
        Ok(conn)
    }

    fn try_save(&self, story: &SavedStory) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO stories ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                STORY_COLUMNS
            ),
            params![
                story.id,
                story.name,
                story.description,
                story.photo_url,
                story.created_at,
                story.lat,
                story.lon
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn try_exists(&self, id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM stories WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    fn try_get(&self, id: &str) -> Result<Option<SavedStory>> {
        let conn = self.connect()?;
        let story = conn
            .query_row(
                &format!("SELECT {} FROM stories WHERE id = ?1", STORY_COLUMNS),
                params![id],
                row_to_story,
            )
            .optional()?;
        Ok(story)
    }

    fn try_list_all(&self) -> Result<Vec<SavedStory>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM stories", STORY_COLUMNS))?;
        let stories = stmt
            .query_map([], row_to_story)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stories)
    }

    fn try_delete(&self, id: &str) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM stories WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(removed)
    }
}

/// Bring the schema up to `version`. No-op when already there.
fn upgrade(conn: &Connection, version: u32) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if current > version {
        return Err(CacheError::VersionTooNew {
            found: current,
            supported: version,
        });
    }

    if current < version {
        debug!("Upgrading saved stories schema {} -> {}", current, version);
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "user_version", version)?;
    }

    Ok(())
}

fn row_to_story(row: &Row<'_>) -> rusqlite::Result<SavedStory> {
    Ok(SavedStory {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        photo_url: row.get(3)?,
        created_at: row.get(4)?,
        lat: row.get(5)?,
        lon: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_upgrade_creates_schema_once() {
        let conn = Connection::open_in_memory().unwrap();
        upgrade(&conn, 1).unwrap();
        upgrade(&conn, 1).unwrap();

        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);

        let indexes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND tbl_name = 'stories'
                 AND name IN ('idx_stories_name', 'idx_stories_created_at')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(indexes, 2);
    }

    #[test]
    fn test_newer_database_version_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        upgrade(&conn, 2).unwrap();

        let result = upgrade(&conn, 1);
        assert!(matches!(
            result,
            Err(CacheError::VersionTooNew { found: 2, supported: 1 })
        ));
    }

    #[test]
    fn test_newer_database_reads_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stories.db");

        let newer = BookmarkStore::new(&path, 2);
        assert!(newer.save(&SavedStory {
            id: "s1".to_string(),
            name: "A".to_string(),
            description: String::new(),
            photo_url: String::new(),
            created_at: "2024-01-01".to_string(),
            lat: None,
            lon: None,
        }));

        let older = BookmarkStore::new(&path, 1);
        assert!(!older.exists("s1"));
        assert!(older.list_all().is_empty());
    }
}
