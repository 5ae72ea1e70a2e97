//! Generation buckets.
//!
//! A bucket is the named container for one cache generation. Deleting a
//! bucket cascades to its entries.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Size and age of one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketStats {
    pub name: String,
    pub created_at: String,
    /// When the manifest was stored in full; `None` for buckets that only
    /// hold lazily cached entries.
    pub installed_at: Option<String>,
    pub entries: u64,
    pub bytes: u64,
}

impl CacheDb {
    /// Open (create if missing) the bucket with this name.
    ///
    /// Returns true if the bucket was created by this call.
    pub async fn open_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let created = conn.execute(
                    "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
                    params![name, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(created > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Whether a bucket with this name exists.
    pub async fn has_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM buckets WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every bucket, in creation order.
    pub async fn bucket_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM buckets ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Whether the bucket exists and its manifest was stored in full.
    pub async fn is_installed(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let installed: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM buckets WHERE name = ?1 AND installed_at IS NOT NULL)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(installed)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a bucket and all of its entries.
    ///
    /// Returns true if the bucket existed.
    pub async fn delete_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM buckets WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every bucket except `keep`, in one transaction.
    ///
    /// Returns the names of the deleted buckets.
    pub async fn delete_buckets_except(&self, keep: &str) -> Result<Vec<String>, Error> {
        let keep = keep.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let tx = conn.transaction()?;
                let deleted = {
                    let mut stmt = tx.prepare("SELECT name FROM buckets WHERE name <> ?1 ORDER BY name ASC")?;
                    stmt.query_map(params![keep], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<_>, _>>()?
                };
                tx.execute("DELETE FROM buckets WHERE name <> ?1", params![keep])?;
                tx.commit()?;
                Ok(deleted)
            })
            .await
            .map_err(Error::from)
    }

    /// Entry count and stored body bytes per bucket.
    pub async fn bucket_stats(&self) -> Result<Vec<BucketStats>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<BucketStats>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT b.name, b.created_at, b.installed_at, COUNT(e.key), COALESCE(SUM(LENGTH(e.body)), 0)
                     FROM buckets b LEFT JOIN entries e ON e.bucket = b.name
                     GROUP BY b.name, b.created_at, b.installed_at
                     ORDER BY b.created_at ASC, b.name ASC",
                )?;
                let stats = stmt
                    .query_map([], |row| {
                        Ok(BucketStats {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            installed_at: row.get(2)?,
                            entries: row.get::<_, i64>(3)?.max(0) as u64,
                            bytes: row.get::<_, i64>(4)?.max(0) as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(stats)
            })
            .await
            .map_err(Error::from)
    }
}
