//! SQLite-based namespaced response storage with file blob support
//!
//! Each namespace is a named partition of request → response pairs. Small
//! bodies live inline in SQLite, large ones (>10KB) as files under
//! `blobs/<namespace>/`.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};

use super::key::{normalize_url, request_key};
use crate::error::CacheError;
use crate::network::{Request, Response, ResponseSource};

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 2;

/// Bodies larger than this are stored as external blobs
const INLINE_THRESHOLD: usize = 10 * 1024; // 10KB

type Result<T> = std::result::Result<T, CacheError>;

/// SQLite-backed namespaced cache storage
pub struct CacheStorage {
    conn: Connection,
    blobs_dir: PathBuf,
}

impl CacheStorage {
    /// Open or create cache storage at the default XDG cache location
    pub fn open() -> Result<Self> {
        let cache_dir = Self::cache_dir()?;
        Self::open_at(&cache_dir)
    }

    /// Get the cache directory path (~/.cache/learnhub on Linux/macOS)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("learnhub"))
    }

    /// Open cache storage at a specific directory
    pub fn open_at(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        let db_path = cache_dir.join("worker-cache.db");
        let blobs_dir = cache_dir.join("blobs");
        std::fs::create_dir_all(&blobs_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create blobs dir: {}", e)))?;

        let conn = Connection::open(&db_path)?;

        // Check schema version - nuke if mismatched
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Cache schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            Self::nuke(&db_path, &blobs_dir)?;
            return Self::open_at(cache_dir);
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS namespaces (
                name TEXT PRIMARY KEY NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cache_entries (
                namespace TEXT NOT NULL,
                cache_key TEXT NOT NULL,
                method TEXT NOT NULL,
                url TEXT NOT NULL,
                status INTEGER NOT NULL,
                headers TEXT NOT NULL,
                body BLOB,
                blob_path TEXT,
                created_at INTEGER NOT NULL,
                size_bytes INTEGER NOT NULL,
                PRIMARY KEY (namespace, cache_key)
            );

            CREATE INDEX IF NOT EXISTS idx_entries_key ON cache_entries(cache_key);

            CREATE TABLE IF NOT EXISTS worker_state (
                prefix TEXT PRIMARY KEY NOT NULL,
                active_version TEXT NOT NULL,
                activated_at INTEGER NOT NULL
            );
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self { conn, blobs_dir })
    }

    /// Create a namespace if it does not exist yet
    pub fn open_namespace(&self, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?1, ?2)",
            params![name, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    pub fn has_namespace(&self, name: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM namespaces WHERE name = ?1",
                [name],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// All namespace names, oldest first
    pub fn namespaces(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM namespaces ORDER BY rowid")?;
        let names = stmt
            .query_map([], |r| r.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Delete a namespace with all its entries and blobs
    pub fn delete_namespace(&self, name: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM cache_entries WHERE namespace = ?1", [name])?;
        let deleted = tx.execute("DELETE FROM namespaces WHERE name = ?1", [name])?;
        tx.commit()?;

        let ns_blobs = self.blobs_dir.join(name);
        if ns_blobs.exists() {
            if let Err(e) = std::fs::remove_dir_all(&ns_blobs) {
                log::warn!("Failed to remove blobs for {}: {}", name, e);
            }
        }

        Ok(deleted > 0)
    }

    /// Store a response for a request, opening the namespace if needed.
    ///
    /// Only successful GET responses are accepted.
    pub fn put(&self, namespace: &str, request: &Request, response: &Response) -> Result<()> {
        self.put_all(namespace, &[(request.clone(), response.clone())])
    }

    /// Store several entries atomically: either all rows land or none do
    pub fn put_all(&self, namespace: &str, entries: &[(Request, Response)]) -> Result<()> {
        for (request, response) in entries {
            Self::check_cacheable(request, response)?;
        }

        let now = Utc::now().timestamp();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?1, ?2)",
            params![namespace, now],
        )?;

        for (request, response) in entries {
            let key = request_key(request.method.as_str(), &request.url);
            let headers = serde_json::to_string(&response.headers)
                .map_err(|e| CacheError::Corrupt(e.to_string()))?;

            let (body, blob_path) = if response.body.len() <= INLINE_THRESHOLD {
                (Some(response.body.as_slice()), None)
            } else {
                (None, Some(self.write_blob(namespace, &key, &response.body)?))
            };

            tx.execute(
                "INSERT OR REPLACE INTO cache_entries
                 (namespace, cache_key, method, url, status, headers, body, blob_path, created_at, size_bytes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    namespace,
                    key,
                    request.method.as_str(),
                    normalize_url(&request.url),
                    response.status,
                    headers,
                    body,
                    blob_path,
                    now,
                    response.body.len()
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Look a request up in one namespace
    pub fn match_in(&self, namespace: &str, request: &Request) -> Result<Option<Response>> {
        let key = request_key(request.method.as_str(), &request.url);

        let row: Option<EntryRow> = self
            .conn
            .query_row(
                "SELECT status, headers, body, blob_path FROM cache_entries
                 WHERE namespace = ?1 AND cache_key = ?2",
                params![namespace, key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        match row {
            Some(row) => self.load_entry(namespace, &key, row),
            None => Ok(None),
        }
    }

    /// Look a request up across all namespaces, oldest namespace first
    pub fn match_any(&self, request: &Request) -> Result<Option<Response>> {
        let key = request_key(request.method.as_str(), &request.url);

        let row: Option<(String, EntryRow)> = self
            .conn
            .query_row(
                "SELECT e.namespace, e.status, e.headers, e.body, e.blob_path
                 FROM cache_entries e JOIN namespaces n ON n.name = e.namespace
                 WHERE e.cache_key = ?1
                 ORDER BY n.rowid LIMIT 1",
                [&key],
                |row| {
                    Ok((
                        row.get(0)?,
                        (row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?),
                    ))
                },
            )
            .optional()?;

        match row {
            Some((namespace, row)) => self.load_entry(&namespace, &key, row),
            None => Ok(None),
        }
    }

    /// URLs stored in a namespace
    pub fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM cache_entries WHERE namespace = ?1 ORDER BY url")?;
        let urls = stmt
            .query_map([namespace], |r| r.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(urls)
    }

    /// Record the version that finished activating under `prefix`
    pub fn set_active_version(&self, prefix: &str, version: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO worker_state (prefix, active_version, activated_at)
             VALUES (?1, ?2, ?3)",
            params![prefix, version, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// The last version activated under `prefix`, if any
    pub fn active_version(&self, prefix: &str) -> Result<Option<String>> {
        let version = self
            .conn
            .query_row(
                "SELECT active_version FROM worker_state WHERE prefix = ?1",
                [prefix],
                |r| r.get(0),
            )
            .optional()?;
        Ok(version)
    }

    /// Drop every namespace and entry
    pub fn clear_all(&self) -> Result<ClearStats> {
        let entries: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;
        let namespaces: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM namespaces", [], |r| r.get(0))?;

        self.conn
            .execute_batch(
                "DELETE FROM cache_entries; DELETE FROM namespaces; DELETE FROM worker_state;",
            )?;

        if self.blobs_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.blobs_dir) {
                log::warn!("Failed to clear blobs directory: {}", e);
            }
            std::fs::create_dir_all(&self.blobs_dir)
                .map_err(|e| CacheError::Io(format!("Failed to recreate blobs dir: {}", e)))?;
        }

        Ok(ClearStats {
            namespaces_removed: namespaces as usize,
            entries_removed: entries as usize,
        })
    }

    /// Per-namespace statistics, oldest namespace first
    pub fn stats(&self) -> Result<Vec<NamespaceStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT n.name, COUNT(e.cache_key), COALESCE(SUM(e.size_bytes), 0),
                    MIN(e.created_at), MAX(e.created_at)
             FROM namespaces n LEFT JOIN cache_entries e ON e.namespace = n.name
             GROUP BY n.name
             ORDER BY n.rowid",
        )?;

        let stats = stmt
            .query_map([], |r| {
                Ok(NamespaceStats {
                    name: r.get(0)?,
                    entries: r.get::<_, i64>(1)? as usize,
                    size_bytes: r.get::<_, i64>(2)? as usize,
                    oldest_entry: r.get(3)?,
                    newest_entry: r.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    fn check_cacheable(request: &Request, response: &Response) -> Result<()> {
        if request.method != reqwest::Method::GET {
            return Err(CacheError::NotCacheable(request.method.to_string()));
        }
        if !response.is_success() {
            return Err(CacheError::NotCacheable(format!(
                "status {} for {}",
                response.status, request.url
            )));
        }
        Ok(())
    }

    fn load_entry(&self, namespace: &str, key: &str, row: EntryRow) -> Result<Option<Response>> {
        let (status, headers, body, blob_path) = row;

        let headers: Vec<(String, String)> = serde_json::from_str(&headers)
            .map_err(|e| CacheError::Corrupt(format!("headers for {}: {}", key, e)))?;

        let body = match (body, blob_path) {
            (Some(body), None) => body,
            (None, Some(blob_path)) => {
                let full_path = self.blobs_dir.join(&blob_path);
                match std::fs::read(&full_path) {
                    Ok(data) => data,
                    Err(e) => {
                        log::warn!("Failed to read blob {}: {}", blob_path, e);
                        // Delete stale entry
                        let _ = self.conn.execute(
                            "DELETE FROM cache_entries WHERE namespace = ?1 AND cache_key = ?2",
                            params![namespace, key],
                        );
                        return Ok(None);
                    }
                }
            }
            _ => return Err(CacheError::Corrupt(format!("entry {} has no body", key))),
        };

        Ok(Some(Response {
            status,
            headers,
            body,
            source: ResponseSource::Cache(namespace.to_string()),
        }))
    }

    /// Write a blob file under the namespace, sharded by first 2 chars of key
    fn write_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<String> {
        let shard = &key[..2.min(key.len())];
        let shard_dir = self.blobs_dir.join(namespace).join(shard);
        std::fs::create_dir_all(&shard_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create shard dir: {}", e)))?;

        let filename = format!("{}.bin", key);
        let rel_path = format!("{}/{}/{}", namespace, shard, filename);

        std::fs::write(shard_dir.join(&filename), data)
            .map_err(|e| CacheError::Io(format!("Failed to write blob: {}", e)))?;

        Ok(rel_path)
    }

    /// Nuke the cache (delete DB and all blobs)
    fn nuke(db_path: &Path, blobs_dir: &Path) -> Result<()> {
        if db_path.exists() {
            std::fs::remove_file(db_path)
                .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
        }
        if blobs_dir.exists() {
            std::fs::remove_dir_all(blobs_dir)
                .map_err(|e| CacheError::Io(format!("Failed to remove blobs dir: {}", e)))?;
        }
        Ok(())
    }
}

/// (status, headers json, inline body, blob path)
type EntryRow = (u16, String, Option<Vec<u8>>, Option<String>);

/// Statistics about cache clear operation
#[derive(Debug)]
pub struct ClearStats {
    pub namespaces_removed: usize,
    pub entries_removed: usize,
}

/// Statistics about one namespace
#[derive(Debug, Clone, serde::Serialize)]
pub struct NamespaceStats {
    pub name: String,
    pub entries: usize,
    pub size_bytes: usize,
    pub oldest_entry: Option<i64>,
    pub newest_entry: Option<i64>,
}
