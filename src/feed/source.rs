use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;

use crate::error::{AppError, Result};

pub(crate) const USER_AGENT: &str = concat!("rss-digest/", env!("CARGO_PKG_VERSION"));

/// One entry as reported by the feed document, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub content: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

/// Retrieves and parses a feed document into its items.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn parse(&self, url: &str) -> Result<Vec<FeedItem>>;
}

pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn parse(&self, url: &str) -> Result<Vec<FeedItem>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Fetch(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AppError::Fetch(format!(
                "{}: HTTP {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Fetch(format!("{}: {}", url, e)))?;

        parse_feed_bytes(&bytes[..])
    }
}

/// Parses an RSS, Atom or JSON feed document.
pub fn parse_feed_bytes(bytes: &[u8]) -> Result<Vec<FeedItem>> {
    let feed = parser::parse(bytes).map_err(|e| AppError::Fetch(format!("parse error: {}", e)))?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            // Try content first, then fall back to summary
            let content = entry
                .content
                .and_then(|c| c.body)
                .or_else(|| entry.summary.map(|s| s.content));

            FeedItem {
                title: entry.title.map(|t| t.content),
                link: entry.links.into_iter().next().map(|l| l.href),
                content,
                published: entry.published.or(entry.updated),
            }
        })
        .collect();

    Ok(items)
}
