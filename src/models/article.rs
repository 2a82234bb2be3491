use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub link: String,
    pub fingerprint: String,
    pub content: Option<String>,
    pub published_at: DateTime<Utc>,
    pub sent: bool,
    pub created_at: DateTime<Utc>,
}

/// A candidate article produced by a fetch, before it has been stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub feed_id: i64,
    pub title: String,
    pub link: String,
    pub content: Option<String>,
    pub published_at: DateTime<Utc>,
}
