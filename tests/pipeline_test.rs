use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use rss_digest::db::Repository;
use rss_digest::feed::{FeedFetcher, FeedItem, FeedSource};
use rss_digest::notify::{Digest, Mailer, Notifier};
use rss_digest::{AppError, DeliveryOutcome, FeedOutcome, Pipeline, Result};

/// Serves canned items per URL; URLs without an entry fail like a dead host.
#[derive(Default)]
struct FakeSource {
    feeds: HashMap<String, Vec<FeedItem>>,
}

impl FakeSource {
    fn with(mut self, url: &str, items: Vec<FeedItem>) -> Self {
        self.feeds.insert(url.to_string(), items);
        self
    }
}

#[async_trait]
impl FeedSource for FakeSource {
    async fn parse(&self, url: &str) -> Result<Vec<FeedItem>> {
        self.feeds
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::Fetch(format!("{}: connection refused", url)))
    }
}

#[derive(Clone, Default)]
struct Outbox {
    sent: Arc<Mutex<Vec<Digest>>>,
    refuse: Arc<AtomicBool>,
}

#[async_trait]
impl Mailer for Outbox {
    async fn send(&self, digest: &Digest) -> Result<()> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(AppError::Delivery("421 service not available".to_string()));
        }
        self.sent.lock().unwrap().push(digest.clone());
        Ok(())
    }
}

fn item(title: &str, hour: u32) -> FeedItem {
    FeedItem {
        title: Some(title.to_string()),
        link: Some(format!("http://a.test/{}", title)),
        content: Some(format!("<p>{} body</p>", title)),
        published: Some(Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap()),
    }
}

fn pipeline(repo: &Arc<Repository>, source: FakeSource, outbox: &Outbox) -> Pipeline {
    Pipeline::new(
        Arc::clone(repo),
        FeedFetcher::new(Arc::new(source)),
        Notifier::new(Box::new(outbox.clone()), 200),
    )
}

#[tokio::test]
async fn register_ingest_deliver_and_mark_sent() {
    let repo = Arc::new(Repository::in_memory().await.expect("open"));
    let feed_id = repo
        .register_feed("http://a.test/feed.xml")
        .await
        .expect("register");
    let outbox = Outbox::default();
    let source = FakeSource::default().with("http://a.test/feed.xml", vec![item("X", 1), item("Y", 2)]);

    // Check ordering before the pipeline delivers anything.
    let fetched = FeedFetcher::new(Arc::new(source))
        .fetch(&repo.list_feeds().await.expect("list")[0])
        .await
        .expect("fetch");
    repo.save_new_articles(fetched).await.expect("save");
    let unsent = repo.get_unsent_articles().await.expect("unsent");
    let titles: Vec<&str> = unsent.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Y", "X"]);
    assert!(unsent.iter().all(|a| a.feed_id == feed_id && !a.sent));

    let source = FakeSource::default().with("http://a.test/feed.xml", vec![item("X", 1), item("Y", 2)]);
    let report = pipeline(&repo, source, &outbox).run_tick().await.expect("tick");

    assert_eq!(
        report.delivery,
        DeliveryOutcome::Delivered {
            articles: 2,
            marked: 2
        }
    );
    assert!(repo.get_unsent_articles().await.expect("unsent").is_empty());
    assert_eq!(outbox.sent.lock().unwrap().len(), 1);
    assert_eq!(repo.article_count().await.expect("count"), 2);
}

#[tokio::test]
async fn repolling_the_same_feed_stores_each_title_once() {
    let repo = Arc::new(Repository::in_memory().await.expect("open"));
    repo.register_feed("http://a.test/feed.xml")
        .await
        .expect("register");
    let outbox = Outbox::default();

    for _ in 0..2 {
        let source = FakeSource::default().with("http://a.test/feed.xml", vec![item("X", 1)]);
        pipeline(&repo, source, &outbox)
            .run_tick()
            .await
            .expect("tick");
    }

    assert_eq!(repo.article_count().await.expect("count"), 1);
    // The second tick found nothing new, so only one digest went out.
    assert_eq!(outbox.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn one_failing_feed_does_not_block_the_others() {
    let repo = Arc::new(Repository::in_memory().await.expect("open"));
    for url in [
        "http://a.test/feed.xml",
        "http://down.test/feed.xml",
        "http://c.test/feed.xml",
    ] {
        repo.register_feed(url).await.expect("register");
    }
    let outbox = Outbox::default();
    let source = FakeSource::default()
        .with("http://a.test/feed.xml", vec![item("A", 1)])
        .with("http://c.test/feed.xml", vec![item("C", 2)]);

    let report = pipeline(&repo, source, &outbox)
        .with_fetch_concurrency(3)
        .run_tick()
        .await
        .expect("tick");

    assert_eq!(report.feeds.len(), 3);
    assert_eq!(report.failed_feeds(), 1);
    assert!(matches!(report.feeds[1].outcome, FeedOutcome::Failed(ref reason) if reason.contains("connection refused")));
    assert_eq!(report.inserted(), 2);
    assert_eq!(repo.article_count().await.expect("count"), 2);

    let feeds = repo.list_feeds().await.expect("list");
    assert!(feeds[0].last_checked.is_some());
    assert!(feeds[1].last_checked.is_none());
    assert!(feeds[2].last_checked.is_some());
}

#[tokio::test]
async fn same_title_from_two_feeds_fetched_concurrently_is_stored_once() {
    let repo = Arc::new(Repository::in_memory().await.expect("open"));
    for url in ["http://a.test/feed.xml", "http://b.test/feed.xml"] {
        repo.register_feed(url).await.expect("register");
    }
    let outbox = Outbox::default();
    let mut from_b = item("Shared", 1);
    from_b.link = Some("http://b.test/Shared".to_string());
    let source = FakeSource::default()
        .with("http://a.test/feed.xml", vec![item("Shared", 1)])
        .with("http://b.test/feed.xml", vec![from_b]);

    let report = pipeline(&repo, source, &outbox)
        .with_fetch_concurrency(2)
        .run_tick()
        .await
        .expect("tick");

    assert_eq!(report.failed_feeds(), 0);
    assert_eq!(report.inserted(), 1);
    assert!(matches!(report.feeds[1].outcome, FeedOutcome::Fetched(ref saved) if saved.skipped == 1));
    assert_eq!(repo.article_count().await.expect("count"), 1);
    assert_eq!(
        report.delivery,
        DeliveryOutcome::Delivered {
            articles: 1,
            marked: 1
        }
    );
}

#[tokio::test]
async fn failed_delivery_leaves_articles_unsent_for_next_tick() {
    let repo = Arc::new(Repository::in_memory().await.expect("open"));
    repo.register_feed("http://a.test/feed.xml")
        .await
        .expect("register");
    let outbox = Outbox::default();
    outbox.refuse.store(true, Ordering::SeqCst);

    let source = FakeSource::default().with("http://a.test/feed.xml", vec![item("X", 1)]);
    let report = pipeline(&repo, source, &outbox).run_tick().await.expect("tick");

    assert!(matches!(report.delivery, DeliveryOutcome::Failed(ref reason) if reason.contains("421")));
    assert_eq!(repo.get_unsent_articles().await.expect("unsent").len(), 1);

    outbox.refuse.store(false, Ordering::SeqCst);
    let source = FakeSource::default().with("http://a.test/feed.xml", vec![item("X", 1)]);
    let report = pipeline(&repo, source, &outbox).run_tick().await.expect("tick");

    assert_eq!(
        report.delivery,
        DeliveryOutcome::Delivered {
            articles: 1,
            marked: 1
        }
    );
    assert!(repo.get_unsent_articles().await.expect("unsent").is_empty());
}

#[tokio::test]
async fn empty_unsent_set_skips_notification() {
    let repo = Arc::new(Repository::in_memory().await.expect("open"));
    let outbox = Outbox::default();

    let report = pipeline(&repo, FakeSource::default(), &outbox)
        .run_tick()
        .await
        .expect("tick");

    assert!(report.feeds.is_empty());
    assert_eq!(report.delivery, DeliveryOutcome::NothingToSend);
    assert!(outbox.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn on_disk_database_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("feeds.db");
    let path = path.to_str().expect("utf-8 path");

    {
        let repo = Repository::new(path).await.expect("open");
        repo.register_feed("http://a.test/feed.xml")
            .await
            .expect("register");
    }

    let repo = Repository::new(path).await.expect("reopen");
    let again = repo.register_feed("http://a.test/feed.xml").await;
    assert!(matches!(again, Err(AppError::DuplicateFeed(_))));
    assert_eq!(repo.list_feeds().await.expect("list").len(), 1);
}
