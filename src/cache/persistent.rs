use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::CacheEntry;

#[derive(Debug, thiserror::Error)]
pub enum PersistentCacheError {
    #[error("cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to encode or decode cached payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// SQLite-backed response store shared by every client using the same
/// database. Rows beyond `capacity` are pruned oldest-first on write.
#[derive(Debug)]
pub struct PersistentCache {
    conn: Mutex<Connection>,
    capacity: usize,
}

impl PersistentCache {
    pub fn new(path: &Path, capacity: usize) -> Result<Self, PersistentCacheError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
CREATE TABLE IF NOT EXISTS responses (
  cache_key TEXT PRIMARY KEY,
  payload TEXT NOT NULL,
  stored_at_millis INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_responses_stored_at ON responses(stored_at_millis);
",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            capacity: capacity.max(1),
        })
    }

    pub fn get(&self, cache_key: &str) -> Result<Option<CacheEntry>, PersistentCacheError> {
        let conn = self.conn.lock().expect("persistent cache mutex poisoned");
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT payload, stored_at_millis FROM responses WHERE cache_key = ?1",
                params![cache_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((payload, stored_at_millis)) => Ok(Some(CacheEntry {
                value: serde_json::from_str(&payload)?,
                stored_at_millis,
            })),
            None => Ok(None),
        }
    }

    pub fn put(&self, cache_key: &str, entry: &CacheEntry) -> Result<(), PersistentCacheError> {
        let payload = serde_json::to_string(&entry.value)?;
        let conn = self.conn.lock().expect("persistent cache mutex poisoned");
        conn.execute(
            "
INSERT INTO responses(cache_key, payload, stored_at_millis)
VALUES (?1, ?2, ?3)
ON CONFLICT(cache_key) DO UPDATE SET
  payload = excluded.payload,
  stored_at_millis = excluded.stored_at_millis
",
            params![cache_key, payload, entry.stored_at_millis],
        )?;

        conn.execute(
            "
DELETE FROM responses WHERE cache_key IN (
  SELECT cache_key FROM responses
  ORDER BY stored_at_millis DESC, rowid DESC
  LIMIT -1 OFFSET ?1
)
",
            params![self.capacity as i64],
        )?;
        Ok(())
    }

    /// Returns whether a row was removed.
    pub fn delete(&self, cache_key: &str) -> Result<bool, PersistentCacheError> {
        let conn = self.conn.lock().expect("persistent cache mutex poisoned");
        let removed = conn.execute(
            "DELETE FROM responses WHERE cache_key = ?1",
            params![cache_key],
        )?;
        Ok(removed > 0)
    }

    pub fn len(&self) -> Result<usize, PersistentCacheError> {
        let conn = self.conn.lock().expect("persistent cache mutex poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM responses", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, PersistentCacheError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entry(value: serde_json::Value, at: i64) -> CacheEntry {
        CacheEntry {
            value,
            stored_at_millis: at,
        }
    }

    #[test]
    fn persists_and_reads_entry() {
        let db = PersistentCache::new(Path::new(":memory:"), 10).expect("db open");
        db.put("GET:me:https://x/rest/api/3/myself", &entry(json!({"name": "me"}), 42))
            .expect("put");

        let got = db
            .get("GET:me:https://x/rest/api/3/myself")
            .expect("read")
            .expect("row present");
        assert_eq!(got.value, json!({"name": "me"}));
        assert_eq!(got.stored_at_millis, 42);
        assert!(db.get("missing").expect("read").is_none());
    }

    #[test]
    fn upsert_replaces_and_delete_removes() {
        let db = PersistentCache::new(Path::new(":memory:"), 10).expect("db open");
        db.put("k", &entry(json!(1), 1)).expect("put");
        db.put("k", &entry(json!(2), 2)).expect("put");
        assert_eq!(db.len().expect("len"), 1);
        assert_eq!(db.get("k").expect("read").map(|e| e.value), Some(json!(2)));

        assert!(db.delete("k").expect("delete"));
        assert!(!db.delete("k").expect("delete again"));
        assert!(db.is_empty().expect("empty"));
    }

    #[test]
    fn prunes_oldest_rows_beyond_capacity() {
        let db = PersistentCache::new(Path::new(":memory:"), 2).expect("db open");
        db.put("old", &entry(json!("a"), 10)).expect("put");
        db.put("mid", &entry(json!("b"), 20)).expect("put");
        db.put("new", &entry(json!("c"), 30)).expect("put");

        assert_eq!(db.len().expect("len"), 2);
        assert!(db.get("old").expect("read").is_none());
        assert!(db.get("mid").expect("read").is_some());
        assert!(db.get("new").expect("read").is_some());
    }
}
