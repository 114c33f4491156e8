use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::{CacheError, Result};

/// Snapshot of an HTTP response as it sits in a cache generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Final URL the response was served from
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Named cache generations stored in SQLite
///
/// Mirrors what a browser hands a service worker: a set of named caches,
/// each mapping a request key to a stored response. Generations are only
/// ever dropped wholesale; there is no per-entry expiry.
pub struct CacheStorage {
    conn: Mutex<Connection>,
}

impl CacheStorage {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("Opening response cache at {:?}", db_path);
        let conn = Connection::open(db_path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache_generations (
                name TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cache_entries (
                generation TEXT NOT NULL,
                request_key TEXT NOT NULL,
                url TEXT NOT NULL,
                status INTEGER NOT NULL,
                headers TEXT NOT NULL,
                body BLOB NOT NULL,
                cached_at INTEGER NOT NULL,
                PRIMARY KEY (generation, request_key)
            );",
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::LockPoisoned)
    }

    /// Names of every generation currently stored
    pub fn keys(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name FROM cache_generations ORDER BY created_at, name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    pub fn has(&self, name: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM cache_generations WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Make sure a generation exists, creating it empty if needed
    pub fn create(&self, name: &str) -> Result<()> {
        let conn = self.lock()?;
        Self::ensure_generation(&conn, name)?;
        Ok(())
    }

    fn ensure_generation(conn: &Connection, name: &str) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO cache_generations (name, created_at) VALUES (?1, ?2)",
            params![name, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Drop a generation and everything in it. Returns false if it didn't exist.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let removed_entries = tx.execute(
            "DELETE FROM cache_entries WHERE generation = ?1",
            params![name],
        )?;
        let removed = tx.execute(
            "DELETE FROM cache_generations WHERE name = ?1",
            params![name],
        )?;
        tx.commit()?;

        debug!("Deleted generation {} ({} entries)", name, removed_entries);
        Ok(removed > 0)
    }

    /// Exact-key lookup in one generation
    pub fn match_request(&self, name: &str, request_key: &str) -> Result<Option<CachedResponse>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT url, status, headers, body FROM cache_entries
                 WHERE generation = ?1 AND request_key = ?2",
                params![name, request_key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((url, status, headers, body)) => Ok(Some(CachedResponse {
                url,
                status,
                headers: serde_json::from_str(&headers)?,
                body,
            })),
            None => Ok(None),
        }
    }

    /// Store one response, creating the generation on first write
    ///
    /// An existing entry under the same key is overwritten.
    pub fn put(&self, name: &str, request_key: &str, response: &CachedResponse) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::ensure_generation(&tx, name)?;
        Self::insert_entry(&tx, name, request_key, response)?;
        tx.commit()?;
        Ok(())
    }

    /// Store a batch in one transaction: either every entry lands, or nothing
    /// (not even the generation) does.
    pub fn put_all(&self, name: &str, entries: &[(String, CachedResponse)]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::ensure_generation(&tx, name)?;
        for (request_key, response) in entries {
            Self::insert_entry(&tx, name, request_key, response)?;
        }
        tx.commit()?;

        info!("Stored {} entries in generation {}", entries.len(), name);
        Ok(())
    }

    fn insert_entry(
        conn: &Connection,
        name: &str,
        request_key: &str,
        response: &CachedResponse,
    ) -> Result<()> {
        let headers = serde_json::to_string(&response.headers)?;
        conn.execute(
            "INSERT OR REPLACE INTO cache_entries
                (generation, request_key, url, status, headers, body, cached_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                name,
                request_key,
                response.url,
                response.status,
                headers,
                response.body,
                chrono::Utc::now().timestamp()
            ],
        )?;
        Ok(())
    }

    /// Number of entries in a generation (0 if it doesn't exist)
    pub fn entry_count(&self, name: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE generation = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(url: &str, body: &str) -> CachedResponse {
        CachedResponse {
            url: url.to_string(),
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_put_then_match() {
        let storage = CacheStorage::open_in_memory().unwrap();
        let stored = response("http://localhost/index.html", "<html>");

        storage.put("v1", "GET http://localhost/index.html", &stored).unwrap();

        let found = storage
            .match_request("v1", "GET http://localhost/index.html")
            .unwrap();
        assert_eq!(found, Some(stored));
        assert!(storage.has("v1").unwrap());
    }

    #[test]
    fn test_match_is_scoped_to_generation() {
        let storage = CacheStorage::open_in_memory().unwrap();
        storage
            .put("v1", "GET http://localhost/", &response("http://localhost/", "old"))
            .unwrap();

        assert!(storage.match_request("v2", "GET http://localhost/").unwrap().is_none());
        assert!(storage.match_request("v1", "GET http://localhost/x").unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites_same_key() {
        let storage = CacheStorage::open_in_memory().unwrap();
        storage.put("v1", "GET /a", &response("/a", "first")).unwrap();
        storage.put("v1", "GET /a", &response("/a", "second")).unwrap();

        let found = storage.match_request("v1", "GET /a").unwrap().unwrap();
        assert_eq!(found.body, b"second".to_vec());
        assert_eq!(storage.entry_count("v1").unwrap(), 1);
    }

    #[test]
    fn test_delete_removes_generation_and_entries() {
        let storage = CacheStorage::open_in_memory().unwrap();
        storage
            .put_all(
                "v1",
                &[
                    ("GET /a".to_string(), response("/a", "a")),
                    ("GET /b".to_string(), response("/b", "b")),
                ],
            )
            .unwrap();
        storage.create("v2").unwrap();

        assert!(storage.delete("v1").unwrap());
        assert!(!storage.delete("v1").unwrap());
        assert_eq!(storage.keys().unwrap(), vec!["v2".to_string()]);
        assert_eq!(storage.entry_count("v1").unwrap(), 0);
    }

    #[test]
    fn test_create_is_idempotent() {
        let storage = CacheStorage::open_in_memory().unwrap();
        storage.create("v1").unwrap();
        storage.create("v1").unwrap();

        assert_eq!(storage.keys().unwrap(), vec!["v1".to_string()]);
        assert_eq!(storage.entry_count("v1").unwrap(), 0);
    }
}
