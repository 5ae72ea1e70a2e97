//! Response snapshot storage.
//!
//! Entries are keyed by `(bucket, key)` where the key is
//! [`compute_entry_key`](super::hash::compute_entry_key) of the normalized
//! request URL. Writing into a bucket that does not exist yet creates it.

use std::fmt;
use std::str::FromStr;

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

/// How a response relates to the app origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response; eligible for lazy caching.
    Basic,
    /// Cross-origin response; only ever cached by install.
    Cors,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ResponseType::Basic),
            "cors" => Ok(ResponseType::Cors),
            other => Err(Error::CorruptEntry(format!("unknown response type: {other}"))),
        }
    }
}

/// A stored response snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Normalized request URL the entry was stored under.
    pub url: String,
    /// URL the response was finally served from, after redirects.
    pub final_url: String,
    pub status: u16,
    pub status_text: String,
    /// Header name/value pairs in arrival order; names repeat for
    /// multi-valued headers.
    pub headers: Vec<(String, String)>,
    #[serde(skip)]
    pub body: Vec<u8>,
    pub response_type: ResponseType,
    /// RFC 3339 time the entry was written.
    pub stored_at: String,
}

impl CachedResponse {
    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Listing row for an entry, without the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrySummary {
    pub key: String,
    pub url: String,
    pub status: u16,
    pub response_type: ResponseType,
    pub content_type: Option<String>,
    pub size: u64,
    pub stored_at: String,
}

fn ensure_bucket(conn: &rusqlite::Connection, bucket: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
        params![bucket, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn upsert(conn: &rusqlite::Connection, bucket: &str, key: &str, entry: &CachedResponse) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&entry.headers).map_err(|e| Error::CorruptEntry(e.to_string()))?;
    conn.execute(
        "INSERT INTO entries (
            bucket, key, url, final_url, status, status_text,
            headers_json, body, response_type, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(bucket, key) DO UPDATE SET
            url = excluded.url,
            final_url = excluded.final_url,
            status = excluded.status,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            response_type = excluded.response_type,
            stored_at = excluded.stored_at",
        params![
            bucket,
            key,
            &entry.url,
            &entry.final_url,
            entry.status,
            &entry.status_text,
            headers_json,
            &entry.body,
            entry.response_type.as_str(),
            &entry.stored_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Store one entry, replacing any previous entry under the same key.
    pub async fn put_entry(&self, bucket: &str, key: &str, entry: &CachedResponse) -> Result<(), Error> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_bucket(conn, &bucket)?;
                upsert(conn, &bucket, &key, &entry)
            })
            .await
            .map_err(Error::from)
    }

    /// Store a generation's manifest entries and mark the bucket installed.
    ///
    /// Either every entry is written and the bucket marked, or nothing
    /// changes. The bucket is created in the same transaction.
    pub async fn install_entries(&self, bucket: &str, entries: Vec<(String, CachedResponse)>) -> Result<usize, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                ensure_bucket(&tx, &bucket)?;
                for (key, entry) in &entries {
                    upsert(&tx, &bucket, key, entry)?;
                }
                tx.execute(
                    "UPDATE buckets SET installed_at = ?2 WHERE name = ?1",
                    params![bucket, chrono::Utc::now().to_rfc3339()],
                )?;
                tx.commit()?;
                Ok(entries.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry.
    ///
    /// Returns None if the bucket or the key doesn't exist.
    pub async fn match_entry(&self, bucket: &str, key: &str) -> Result<Option<CachedResponse>, Error> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let result = conn.query_row(
                    "SELECT url, final_url, status, status_text, headers_json, body, response_type, stored_at
                     FROM entries WHERE bucket = ?1 AND key = ?2",
                    params![bucket, key],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, u16>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, Vec<u8>>(5)?,
                            row.get::<_, String>(6)?,
                            row.get::<_, String>(7)?,
                        ))
                    },
                );

                let (url, final_url, status, status_text, headers_json, body, response_type, stored_at) = match result {
                    Ok(row) => row,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let headers: Vec<(String, String)> =
                    serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;

                Ok(Some(CachedResponse {
                    url,
                    final_url,
                    status,
                    status_text,
                    headers,
                    body,
                    response_type: response_type.parse()?,
                    stored_at,
                }))
            })
            .await
            .map_err(Error::from)
    }

    /// List the entries of a bucket, oldest first.
    pub async fn list_entries(&self, bucket: &str) -> Result<Vec<EntrySummary>, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<EntrySummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, url, status, response_type, headers_json, LENGTH(body), stored_at
                     FROM entries WHERE bucket = ?1 ORDER BY stored_at ASC, url ASC",
                )?;
                let rows = stmt
                    .query_map(params![bucket], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, u16>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, i64>(5)?,
                            row.get::<_, String>(6)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(|(key, url, status, response_type, headers_json, size, stored_at)| -> Result<EntrySummary, Error> {
                        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)
                            .map_err(|e| Error::CorruptEntry(format!("{url}: {e}")))?;
                        let content_type = headers
                            .into_iter()
                            .find(|(n, _)| n.eq_ignore_ascii_case("content-type"))
                            .map(|(_, v)| v);
                        Ok(EntrySummary {
                            key,
                            url,
                            status,
                            response_type: response_type.parse()?,
                            content_type,
                            size: size.max(0) as u64,
                            stored_at,
                        })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Delete one entry. Returns whether it existed.
    pub async fn delete_entry(&self, bucket: &str, key: &str) -> Result<bool, Error> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM entries WHERE bucket = ?1 AND key = ?2", params![bucket, key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
