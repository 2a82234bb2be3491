use std::future::Future;
use std::sync::Arc;

use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::feed::{FeedFetcher, FeedValidator, HttpFeedSource};
use crate::models::Feed;
use crate::notify::{Notifier, SmtpMailer};
use crate::pipeline::{Pipeline, TickReport};
use crate::scheduler::Scheduler;

/// Wires storage, fetching and delivery together from a [`Config`]. Both the
/// one-shot commands and the scheduler go through here.
pub struct App {
    repository: Arc<Repository>,
    validator: FeedValidator,
    config: Config,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path)
            .await?
            .with_dedup_scope(config.dedup_scope);
        let validator = FeedValidator::new(config.fetch_timeout())?;

        Ok(Self {
            repository: Arc::new(repository),
            validator,
            config,
        })
    }

    /// Validates the URL serves a feed, then registers it.
    pub async fn add_feed(&self, url: &str) -> Result<i64> {
        self.validator.validate(url).await?;
        let id = self.repository.register_feed(url).await?;
        tracing::info!(id, url, "Registered feed");
        Ok(id)
    }

    pub async fn remove_feed(&self, url: &str) -> Result<bool> {
        let removed = self.repository.remove_feed(url).await?;
        if removed {
            tracing::info!(url, "Removed feed");
        }
        Ok(removed)
    }

    pub async fn list_feeds(&self) -> Result<Vec<Feed>> {
        self.repository.list_feeds().await
    }

    /// Builds the pipeline. SMTP settings are only checked here so that the
    /// feed management commands work without them.
    pub fn pipeline(&self) -> Result<Pipeline> {
        let source = HttpFeedSource::new(
            self.config.fetch_timeout(),
            self.config.connect_timeout(),
        )?;
        let fetcher = FeedFetcher::new(Arc::new(source));
        let mailer = SmtpMailer::new(&self.config.smtp)?;
        let notifier = Notifier::new(Box::new(mailer), self.config.digest_content_chars);

        Ok(Pipeline::new(Arc::clone(&self.repository), fetcher, notifier)
            .with_fetch_concurrency(self.config.fetch_concurrency))
    }

    pub async fn run_once(&self) -> Result<TickReport> {
        self.pipeline()?.run_tick().await
    }

    /// Runs ticks on the configured cadence until `shutdown` resolves. A
    /// failed tick is logged and the next one starts from scratch.
    pub async fn run_scheduled<S>(&self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let pipeline = self.pipeline()?;
        let scheduler = Scheduler::new(self.config.poll_interval());
        tracing::info!(
            "Polling feeds every {} minutes",
            self.config.poll_interval_minutes
        );

        let pipeline = &pipeline;
        scheduler
            .run(
                move || async move {
                    if let Err(e) = pipeline.run_tick().await {
                        tracing::error!("Tick aborted: {}", e);
                    }
                },
                shutdown,
            )
            .await;

        Ok(())
    }
}
