use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{Feed, NewArticle};

use super::source::{FeedItem, FeedSource};

/// Turns a registered feed into candidate articles.
#[derive(Clone)]
pub struct FeedFetcher {
    source: Arc<dyn FeedSource>,
}

impl FeedFetcher {
    pub fn new(source: Arc<dyn FeedSource>) -> Self {
        Self { source }
    }

    /// Any failure comes back as `AppError::Fetch` so the caller can skip
    /// this feed and keep going with the rest.
    pub async fn fetch(&self, feed: &Feed) -> Result<Vec<NewArticle>> {
        let items = self.source.parse(&feed.url).await.map_err(|e| match e {
            AppError::Fetch(reason) => AppError::Fetch(reason),
            other => AppError::Fetch(format!("{}: {}", feed.url, other)),
        })?;

        let now = Utc::now();
        let articles = items
            .into_iter()
            .map(|item| normalize(feed.id, item, now))
            .collect();

        Ok(articles)
    }
}

fn normalize(feed_id: i64, item: FeedItem, now: DateTime<Utc>) -> NewArticle {
    NewArticle {
        feed_id,
        title: item.title.map(|t| t.trim().to_string()).unwrap_or_default(),
        link: item.link.map(|l| l.trim().to_string()).unwrap_or_default(),
        content: item.content,
        published_at: item.published.unwrap_or(now),
    }
}
