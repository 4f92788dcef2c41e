//! Named response caches backed by SQLite.
//!
//! Entries are keyed by `(cache_name, request_key)`. The request key is the
//! path and query of a same-origin GET.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache open failed: {0}")]
    Open(String),

    #[error("cache write failed: {0}")]
    Write(String),

    #[error("cache read failed: {0}")]
    Read(String),

    #[error("cache lock poisoned")]
    LockPoisoned,
}

/// Stored copy of an origin response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_name TEXT NOT NULL,
    request_key TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    stored_at TEXT NOT NULL,
    PRIMARY KEY (cache_name, request_key)
);
"#;

pub struct CacheStorage {
    conn: Mutex<Connection>,
}

impl CacheStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let conn = Connection::open(path).map_err(|e| CacheError::Open(e.to_string()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory().map_err(|e| CacheError::Open(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| CacheError::Open(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::LockPoisoned)
    }

    /// Store or replace an entry.
    pub fn put(
        &self,
        cache_name: &str,
        request_key: &str,
        response: &CachedResponse,
    ) -> Result<(), CacheError> {
        let headers =
            serde_json::to_string(&response.headers).map_err(|e| CacheError::Write(e.to_string()))?;
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO cache_entries (cache_name, request_key, status, headers, body, stored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    cache_name,
                    request_key,
                    response.status,
                    headers,
                    response.body,
                    chrono::Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| CacheError::Write(e.to_string()))?;
        Ok(())
    }

    /// Exact-match lookup.
    pub fn match_request(
        &self,
        cache_name: &str,
        request_key: &str,
    ) -> Result<Option<CachedResponse>, CacheError> {
        let row = self
            .conn()?
            .query_row(
                "SELECT status, headers, body FROM cache_entries WHERE cache_name = ?1 AND request_key = ?2",
                params![cache_name, request_key],
                |row| {
                    Ok((
                        row.get::<_, u16>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| CacheError::Read(e.to_string()))?;

        row.map(|(status, headers, body)| {
            let headers = serde_json::from_str(&headers).map_err(|e| CacheError::Read(e.to_string()))?;
            Ok(CachedResponse {
                status,
                headers,
                body,
            })
        })
        .transpose()
    }

    pub fn cache_names(&self) -> Result<Vec<String>, CacheError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT cache_name FROM cache_entries ORDER BY cache_name")
            .map_err(|e| CacheError::Read(e.to_string()))?;
        let names = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| CacheError::Read(e.to_string()))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| CacheError::Read(e.to_string()))?;
        Ok(names)
    }

    /// Drop a whole cache generation. Returns true if anything was removed.
    pub fn delete_cache(&self, cache_name: &str) -> Result<bool, CacheError> {
        let removed = self
            .conn()?
            .execute(
                "DELETE FROM cache_entries WHERE cache_name = ?1",
                params![cache_name],
            )
            .map_err(|e| CacheError::Write(e.to_string()))?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(body: &str) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: vec![("content-type".into(), "text/html".into())],
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn put_then_match() {
        let storage = CacheStorage::open_in_memory().unwrap();
        storage.put("edurural-v1", "/index.html", &page("<h1>v1</h1>")).unwrap();
        storage.put("edurural-v1", "/index.html", &page("<h1>v2</h1>")).unwrap();

        assert_eq!(
            storage.match_request("edurural-v1", "/index.html").unwrap(),
            Some(page("<h1>v2</h1>"))
        );
        assert_eq!(storage.match_request("edurural-v1", "/missing").unwrap(), None);
        assert_eq!(storage.match_request("other", "/index.html").unwrap(), None);
    }

    #[test]
    fn caches_are_listed_and_deleted_by_name() {
        let storage = CacheStorage::open_in_memory().unwrap();
        storage.put("edurural-v0", "/", &page("old")).unwrap();
        storage.put("edurural-v1", "/", &page("new")).unwrap();
        assert_eq!(storage.cache_names().unwrap(), vec!["edurural-v0", "edurural-v1"]);

        assert!(storage.delete_cache("edurural-v0").unwrap());
        assert!(!storage.delete_cache("edurural-v0").unwrap());
        assert_eq!(storage.cache_names().unwrap(), vec!["edurural-v1"]);
    }
}
