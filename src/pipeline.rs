use std::fmt;
use std::pin::pin;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::db::{Repository, SaveReport};
use crate::error::Result;
use crate::feed::FeedFetcher;
use crate::notify::Notifier;

/// Where a tick currently is. Only used for logging; nothing is carried
/// from one tick to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStage {
    Idle,
    ListingFeeds,
    FetchingFeed(usize),
    Persisting,
    SelectingUnsent,
    Notifying,
    MarkingSent,
}

impl fmt::Display for TickStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickStage::Idle => write!(f, "idle"),
            TickStage::ListingFeeds => write!(f, "listing-feeds"),
            TickStage::FetchingFeed(i) => write!(f, "fetching-feed[{}]", i),
            TickStage::Persisting => write!(f, "persisting"),
            TickStage::SelectingUnsent => write!(f, "selecting-unsent"),
            TickStage::Notifying => write!(f, "notifying"),
            TickStage::MarkingSent => write!(f, "marking-sent"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    Fetched(SaveReport),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedResult {
    pub feed_id: i64,
    pub url: String,
    pub outcome: FeedOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    NothingToSend,
    Delivered { articles: usize, marked: usize },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub feeds: Vec<FeedResult>,
    pub delivery: DeliveryOutcome,
}

impl TickReport {
    pub fn failed_feeds(&self) -> usize {
        self.feeds
            .iter()
            .filter(|f| matches!(f.outcome, FeedOutcome::Failed(_)))
            .count()
    }

    pub fn inserted(&self) -> usize {
        self.feeds
            .iter()
            .map(|f| match &f.outcome {
                FeedOutcome::Fetched(report) => report.inserted,
                FeedOutcome::Failed(_) => 0,
            })
            .sum()
    }
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} feeds ({} failed), {} new articles, ",
            self.feeds.len(),
            self.failed_feeds(),
            self.inserted()
        )?;
        match &self.delivery {
            DeliveryOutcome::NothingToSend => write!(f, "nothing to send"),
            DeliveryOutcome::Delivered { articles, marked } => {
                write!(f, "delivered {} articles ({} marked sent)", articles, marked)
            }
            DeliveryOutcome::Failed(reason) => write!(f, "delivery failed: {}", reason),
        }
    }
}

/// One full ingest-and-notify pass over every registered feed.
pub struct Pipeline {
    repository: Arc<Repository>,
    fetcher: FeedFetcher,
    notifier: Notifier,
    fetch_concurrency: usize,
}

impl Pipeline {
    pub fn new(repository: Arc<Repository>, fetcher: FeedFetcher, notifier: Notifier) -> Self {
        Self {
            repository,
            fetcher,
            notifier,
            fetch_concurrency: 1,
        }
    }

    /// Fetch at most `n` feeds at a time. Results are still persisted in
    /// feed order.
    pub fn with_fetch_concurrency(mut self, n: usize) -> Self {
        self.fetch_concurrency = n.max(1);
        self
    }

    /// Runs a tick. Per-feed fetch failures and a failed delivery are
    /// reported in the returned [`TickReport`]; storage errors abort the tick.
    pub async fn run_tick(&self) -> Result<TickReport> {
        enter(TickStage::ListingFeeds);
        let feeds = self.repository.list_feeds().await?;
        let mut results = Vec::with_capacity(feeds.len());

        let fetcher = &self.fetcher;
        let mut fetched = pin!(stream::iter(feeds.iter().enumerate())
            .map(|(index, feed)| async move {
                enter(TickStage::FetchingFeed(index));
                tracing::debug!(url = %feed.url, "Fetching feed");
                (feed, fetcher.fetch(feed).await)
            })
            .buffered(self.fetch_concurrency));

        while let Some((feed, fetch_result)) = fetched.next().await {
            let outcome = match fetch_result {
                Ok(articles) => {
                    enter(TickStage::Persisting);
                    let found = articles.len();
                    let report = self.repository.save_new_articles(articles).await?;
                    self.repository.touch_feed(feed.id).await?;
                    tracing::debug!(
                        url = %feed.url,
                        found,
                        inserted = report.inserted,
                        skipped = report.skipped,
                        failed = report.failed,
                        "Persisted feed"
                    );
                    FeedOutcome::Fetched(report)
                }
                Err(e) => {
                    tracing::warn!(url = %feed.url, "Skipping feed: {}", e);
                    FeedOutcome::Failed(e.to_string())
                }
            };

            results.push(FeedResult {
                feed_id: feed.id,
                url: feed.url.clone(),
                outcome,
            });
        }

        let delivery = self.deliver_unsent().await?;
        enter(TickStage::Idle);

        let report = TickReport {
            feeds: results,
            delivery,
        };
        tracing::info!("Tick finished: {}", report);
        Ok(report)
    }

    async fn deliver_unsent(&self) -> Result<DeliveryOutcome> {
        enter(TickStage::SelectingUnsent);
        let unsent = self.repository.get_unsent_articles().await?;
        if unsent.is_empty() {
            return Ok(DeliveryOutcome::NothingToSend);
        }

        enter(TickStage::Notifying);
        match self.notifier.deliver(&unsent).await {
            Ok(true) => {
                enter(TickStage::MarkingSent);
                let ids: Vec<i64> = unsent.iter().map(|a| a.id).collect();
                let marked = self.repository.mark_sent(&ids).await?;
                Ok(DeliveryOutcome::Delivered {
                    articles: unsent.len(),
                    marked,
                })
            }
            Ok(false) => Ok(DeliveryOutcome::NothingToSend),
            Err(e) => {
                // Articles stay unsent and go out with the next tick.
                tracing::error!("Digest delivery failed: {}", e);
                Ok(DeliveryOutcome::Failed(e.to_string()))
            }
        }
    }
}

fn enter(stage: TickStage) {
    tracing::trace!(%stage, "Tick stage");
}
