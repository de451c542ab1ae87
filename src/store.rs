//! Durable thumbnail store backed by SQLite.
//!
//! One table maps `(dir_key, item_key)` to an encoded thumbnail and its
//! dimensions. Writes are upserts: at most one row ever exists per key
//! pair. A read or write failure mid-session soft-disables the store —
//! thumbnails keep being generated in memory, they just stop persisting.

use crate::error::Result;
use crate::hash;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// One persisted thumbnail record.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRow {
    pub dir_key: u32,
    pub item_key: u32,
    pub width: u32,
    pub height: u32,
    pub payload: Vec<u8>,
}

impl CachedRow {
    /// Build a row for an item path from its rendered thumbnail.
    pub fn for_path(path: &str, width: u32, height: u32, payload: Vec<u8>) -> Self {
        Self {
            dir_key: hash::dir_key(path),
            item_key: hash::item_key(path),
            width,
            height,
            payload,
        }
    }
}

/// The thumbnail cache database.
///
/// The connection sits behind a mutex so the scan batch owner and the
/// change-refresh round can share one handle; every write path is a
/// single serialized transaction.
pub struct CacheStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    disabled: AtomicBool,
}

impl CacheStore {
    /// Open or create the store at an explicit location.
    ///
    /// Failing here is a startup error; the integrating application
    /// decides whether to abort or run uncached.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        Self::init_schema(&conn)?;

        log::info!("📁 thumbnail store opened at {}", db_path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
            disabled: AtomicBool::new(false),
        })
    }

    /// Open the store at the fixed, OS-appropriate location:
    /// - Linux: ~/.cache/thumbcache/thumbs.db
    /// - macOS: ~/Library/Caches/thumbcache/thumbs.db
    /// - Windows: %LOCALAPPDATA%\thumbcache\thumbs.db
    pub fn open_default() -> Result<Self> {
        let mut path = dirs::cache_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        path.push("thumbcache");
        path.push("thumbs.db");
        Self::open(&path)
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS thumbs (
                dir_key     INTEGER NOT NULL,
                item_key    INTEGER NOT NULL,
                width       INTEGER NOT NULL,
                height      INTEGER NOT NULL,
                payload     BLOB NOT NULL,
                PRIMARY KEY (dir_key, item_key)
            )",
            [],
        )?;
        Ok(())
    }

    /// Path of the database file.
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Whether a mid-session failure has disabled persistence.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    fn soft_disable(&self, context: &str, err: &rusqlite::Error) {
        if !self.disabled.swap(true, Ordering::Relaxed) {
            log::error!(
                "cache store failure during {} ({}); caching disabled for this session",
                context,
                err
            );
        }
    }

    /// Every record belonging to one directory, in one query.
    ///
    /// Used to hydrate the in-memory registry in a single pass instead of
    /// one lookup per item. Returns an empty list when disabled or on
    /// failure (which disables the store).
    pub fn lookup_by_directory(&self, dir_key: u32) -> Vec<CachedRow> {
        if self.is_disabled() {
            return Vec::new();
        }

        let conn = self.conn.lock();
        let result = (|| -> rusqlite::Result<Vec<CachedRow>> {
            let mut stmt = conn.prepare(
                "SELECT item_key, width, height, payload FROM thumbs WHERE dir_key = ?1",
            )?;
            let rows = stmt.query_map(params![dir_key as i64], |row| {
                Ok(CachedRow {
                    dir_key,
                    item_key: row.get::<_, i64>(0)? as u32,
                    width: row.get::<_, i64>(1)? as u32,
                    height: row.get::<_, i64>(2)? as u32,
                    payload: row.get(3)?,
                })
            })?;
            rows.collect()
        })();

        match result {
            Ok(rows) => rows,
            Err(e) => {
                self.soft_disable("directory lookup", &e);
                Vec::new()
            }
        }
    }

    /// Point lookup for one record, used by the read-only export surface.
    pub fn lookup_one(&self, dir_key: u32, item_key: u32) -> Option<CachedRow> {
        if self.is_disabled() {
            return None;
        }

        let conn = self.conn.lock();
        let result = conn
            .query_row(
                "SELECT width, height, payload FROM thumbs
                 WHERE dir_key = ?1 AND item_key = ?2",
                params![dir_key as i64, item_key as i64],
                |row| {
                    Ok(CachedRow {
                        dir_key,
                        item_key,
                        width: row.get::<_, i64>(0)? as u32,
                        height: row.get::<_, i64>(1)? as u32,
                        payload: row.get(2)?,
                    })
                },
            );

        match result {
            Ok(row) => Some(row),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => {
                self.soft_disable("point lookup", &e);
                None
            }
        }
    }

    /// Replace all given records inside one transaction.
    ///
    /// Atomic: either every row commits or none does. Returns the number
    /// of rows written (0 when disabled or on failure).
    pub fn upsert_batch(&self, rows: &[CachedRow]) -> usize {
        if self.is_disabled() || rows.is_empty() {
            return 0;
        }

        let mut conn = self.conn.lock();
        let result = (|| -> rusqlite::Result<usize> {
            let tx = conn.transaction()?;
            for row in rows {
                tx.execute(
                    "INSERT OR REPLACE INTO thumbs (dir_key, item_key, width, height, payload)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        row.dir_key as i64,
                        row.item_key as i64,
                        row.width as i64,
                        row.height as i64,
                        row.payload,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(rows.len())
        })();

        match result {
            Ok(count) => count,
            Err(e) => {
                self.soft_disable("batch upsert", &e);
                0
            }
        }
    }

    /// Single-record upsert for the change-refresh path, where batching
    /// would add latency to a one-item correction.
    pub fn upsert_one(&self, row: &CachedRow) -> bool {
        if self.is_disabled() {
            return false;
        }

        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT OR REPLACE INTO thumbs (dir_key, item_key, width, height, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.dir_key as i64,
                row.item_key as i64,
                row.width as i64,
                row.height as i64,
                row.payload,
            ],
        );

        match result {
            Ok(_) => true,
            Err(e) => {
                self.soft_disable("single upsert", &e);
                false
            }
        }
    }

    /// Total number of cached thumbnails.
    pub fn row_count(&self) -> usize {
        if self.is_disabled() {
            return 0;
        }

        let conn = self.conn.lock();
        match conn.query_row("SELECT COUNT(*) FROM thumbs", [], |row| row.get::<_, i64>(0)) {
            Ok(n) => n as usize,
            Err(e) => {
                self.soft_disable("row count", &e);
                0
            }
        }
    }

    #[cfg(test)]
    fn execute_raw(&self, sql: &str) {
        self.conn.lock().execute_batch(sql).unwrap();
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("db_path", &self.db_path)
            .field("disabled", &self.is_disabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn open_scratch(name: &str) -> (CacheStore, PathBuf) {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        let store = CacheStore::open(&dir.join("thumbs.db")).unwrap();
        (store, dir)
    }

    fn row(dir_key: u32, item_key: u32, payload: &[u8]) -> CachedRow {
        CachedRow {
            dir_key,
            item_key,
            width: 120,
            height: 75,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let (store, dir) = open_scratch("thumbcache_store_idem");

        let r = row(1, 2, b"abc");
        assert!(store.upsert_one(&r));
        assert!(store.upsert_one(&r));

        assert_eq!(store.row_count(), 1);
        assert_eq!(store.lookup_one(1, 2).unwrap().payload, b"abc");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_upsert_replaces_payload() {
        let (store, dir) = open_scratch("thumbcache_store_replace");

        store.upsert_one(&row(1, 2, b"old"));
        store.upsert_one(&row(1, 2, b"new"));

        assert_eq!(store.row_count(), 1);
        assert_eq!(store.lookup_one(1, 2).unwrap().payload, b"new");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_lookup_by_directory_is_scoped() {
        let (store, dir) = open_scratch("thumbcache_store_dirscope");

        store.upsert_batch(&[row(7, 1, b"a"), row(7, 2, b"b"), row(9, 3, b"c")]);

        let mut keys: Vec<u32> = store
            .lookup_by_directory(7)
            .into_iter()
            .map(|r| r.item_key)
            .collect();
        keys.sort();
        assert_eq!(keys, vec![1, 2]);
        assert!(store.lookup_by_directory(42).is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_batch_upsert_counts_rows() {
        let (store, dir) = open_scratch("thumbcache_store_batch");

        assert_eq!(store.upsert_batch(&[]), 0);
        assert_eq!(store.upsert_batch(&[row(1, 1, b"a"), row(1, 2, b"b")]), 2);
        assert_eq!(store.row_count(), 2);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_reopen_preserves_rows() {
        let dir = std::env::temp_dir().join("thumbcache_store_reopen");
        let _ = fs::remove_dir_all(&dir);
        let db = dir.join("thumbs.db");

        {
            let store = CacheStore::open(&db).unwrap();
            store.upsert_one(&row(5, 6, b"persisted"));
        }

        let store = CacheStore::open(&db).unwrap();
        assert_eq!(store.lookup_one(5, 6).unwrap().payload, b"persisted");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_failure_soft_disables_store() {
        let (store, dir) = open_scratch("thumbcache_store_disable");

        store.upsert_one(&row(1, 1, b"a"));
        // Break the schema out from under the store; the next operation
        // must flip the disabled flag instead of erroring out
        store.execute_raw("DROP TABLE thumbs");

        assert!(store.lookup_by_directory(1).is_empty());
        assert!(store.is_disabled());

        // Disabled stores refuse everything quietly
        assert!(!store.upsert_one(&row(1, 2, b"b")));
        assert_eq!(store.upsert_batch(&[row(1, 3, b"c")]), 0);
        assert_eq!(store.row_count(), 0);
        assert!(store.lookup_one(1, 1).is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_row_for_path_uses_path_keys() {
        let r = CachedRow::for_path("/photos/x/a.jpg", 10, 20, vec![1]);
        assert_eq!(r.dir_key, crate::hash::item_key("/photos/x"));
        assert_eq!(r.item_key, crate::hash::item_key("/photos/x/a.jpg"));
    }
}
