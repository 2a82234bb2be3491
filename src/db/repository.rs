use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{Article, Feed, NewArticle};

use super::fingerprint::{article_fingerprint, feed_fingerprint, DedupScope};
use super::schema::SCHEMA;

// Stays well below SQLITE_MAX_VARIABLE_NUMBER on every SQLite build.
const MARK_SENT_CHUNK: usize = 500;

/// Per-batch result of [`Repository::save_new_articles`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Repository {
    conn: Connection,
    dedup_scope: DedupScope,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            dedup_scope: DedupScope::default(),
        })
    }

    pub fn with_dedup_scope(mut self, scope: DedupScope) -> Self {
        self.dedup_scope = scope;
        self
    }

    // Feed operations

    /// Registers a feed. The unique fingerprint makes a second registration
    /// of the same URL a no-op at the storage layer, reported as `DuplicateFeed`.
    pub async fn register_feed(&self, url: &str) -> Result<i64> {
        let owned_url = url.to_string();
        let fingerprint = feed_fingerprint(url);
        let id = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "INSERT INTO feeds (url, fingerprint) VALUES (?1, ?2) ON CONFLICT(fingerprint) DO NOTHING",
                    params![owned_url, fingerprint],
                )?;
                if changed == 0 {
                    return Ok(None);
                }
                Ok(Some(conn.last_insert_rowid()))
            })
            .await?;

        id.ok_or_else(|| AppError::DuplicateFeed(url.to_string()))
    }

    /// Deletes the feed with this URL and, through the foreign key, its articles.
    pub async fn remove_feed(&self, url: &str) -> Result<bool> {
        let fingerprint = feed_fingerprint(url);
        let removed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "DELETE FROM feeds WHERE fingerprint = ?1",
                    params![fingerprint],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(removed)
    }

    pub async fn list_feeds(&self) -> Result<Vec<Feed>> {
        let feeds = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, url, fingerprint, last_checked, created_at FROM feeds ORDER BY id",
                )?;
                let feeds = stmt
                    .query_map([], feed_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(feeds)
            })
            .await?;
        Ok(feeds)
    }

    pub async fn touch_feed(&self, id: i64) -> Result<()> {
        let now = format_datetime(Utc::now());
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE feeds SET last_checked = ?1 WHERE id = ?2",
                    params![now, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Article operations

    /// Inserts each candidate on its own. A fingerprint conflict is a dedup
    /// hit and counts as skipped; any other row error is logged and counted as
    /// failed without stopping the batch.
    ///
    /// `link` is unique too, so a new title reusing a stored link (including
    /// the `""` link of items that have none) fails on every poll. Those rows
    /// are logged at debug; other row errors at warn.
    pub async fn save_new_articles(&self, candidates: Vec<NewArticle>) -> Result<SaveReport> {
        if candidates.is_empty() {
            return Ok(SaveReport::default());
        }

        let scope = self.dedup_scope;
        let report = self
            .conn
            .call(move |conn| {
                let mut report = SaveReport::default();
                let mut stmt = conn.prepare(
                    r#"INSERT INTO articles (feed_id, title, link, fingerprint, content, published_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                       ON CONFLICT(fingerprint) DO NOTHING"#,
                )?;

                for article in candidates {
                    let fingerprint = article_fingerprint(scope, article.feed_id, &article.title);
                    let result = stmt.execute(params![
                        article.feed_id,
                        article.title,
                        article.link,
                        fingerprint,
                        article.content,
                        format_datetime(article.published_at),
                    ]);

                    match result {
                        Ok(0) => {
                            tracing::debug!(title = %article.title, "Skipping already stored article");
                            report.skipped += 1;
                        }
                        Ok(_) => report.inserted += 1,
                        Err(e) if is_link_conflict(&e) => {
                            tracing::debug!(
                                title = %article.title,
                                link = %article.link,
                                "Link already stored under another title"
                            );
                            report.failed += 1;
                        }
                        Err(e) => {
                            tracing::warn!(
                                title = %article.title,
                                link = %article.link,
                                "Failed to insert article: {}",
                                e
                            );
                            report.failed += 1;
                        }
                    }
                }

                Ok(report)
            })
            .await?;
        Ok(report)
    }

    /// All articles not yet delivered, newest first.
    pub async fn get_unsent_articles(&self) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, feed_id, title, link, fingerprint, content, published_at, sent, created_at
                       FROM articles
                       WHERE sent = 0
                       ORDER BY published_at DESC, id DESC"#,
                )?;
                let articles = stmt
                    .query_map([], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Flips `sent` for the given ids and returns how many rows changed.
    /// Ids that no longer exist or are already sent are ignored.
    pub async fn mark_sent(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let ids = ids.to_vec();
        let updated = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut updated = 0;
                for chunk in ids.chunks(MARK_SENT_CHUNK) {
                    let placeholders = vec!["?"; chunk.len()].join(", ");
                    let sql = format!(
                        "UPDATE articles SET sent = 1 WHERE sent = 0 AND id IN ({})",
                        placeholders
                    );
                    updated += tx.execute(&sql, params_from_iter(chunk.iter()))?;
                }
                tx.commit()?;
                Ok(updated)
            })
            .await?;
        Ok(updated)
    }

    pub async fn article_count(&self) -> Result<usize> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count as usize)
    }
}

fn is_link_conflict(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, Some(msg)) => {
            err.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains("articles.link")
        }
        _ => false,
    }
}

fn format_datetime(dt: DateTime<Utc>) -> String {
    // Fixed width so lexical order in SQLite matches chronological order.
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56.000Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn feed_from_row(row: &Row) -> rusqlite::Result<Feed> {
    Ok(Feed {
        id: row.get(0)?,
        url: row.get(1)?,
        fingerprint: row.get(2)?,
        last_checked: row
            .get::<_, Option<String>>(3)?
            .and_then(|s| parse_datetime(&s)),
        created_at: row
            .get::<_, String>(4)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    })
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        feed_id: row.get(1)?,
        title: row.get(2)?,
        link: row.get(3)?,
        fingerprint: row.get(4)?,
        content: row.get(5)?,
        published_at: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        sent: row.get::<_, i64>(7)? != 0,
        created_at: row
            .get::<_, String>(8)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    })
}
