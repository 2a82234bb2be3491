mod fetcher;
mod source;
mod validator;

pub use fetcher::FeedFetcher;
pub use source::{parse_feed_bytes, FeedItem, FeedSource, HttpFeedSource};
pub use validator::{validate_document, FeedValidator};
