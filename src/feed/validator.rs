use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::error::{AppError, Result};

use super::source::USER_AGENT;

// RSS 2.0 / 0.9x, Atom, RSS 1.0 (RDF)
const FEED_ROOTS: [&str; 3] = ["rss", "feed", "RDF"];

/// Checks at registration time that a URL serves an RSS or Atom document.
pub struct FeedValidator {
    client: Client,
}

impl FeedValidator {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    pub async fn validate(&self, url: &str) -> Result<()> {
        let parsed = Url::parse(url)
            .map_err(|e| AppError::FeedValidation(format!("invalid URL {}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::FeedValidation(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| AppError::FeedValidation(format!("could not fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AppError::FeedValidation(format!(
                "could not fetch {}: HTTP {}",
                url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::FeedValidation(format!("could not read {}: {}", url, e)))?;

        validate_document(&body)
    }
}

/// Accepts well-formed XML whose root element is a syndication root.
pub fn validate_document(body: &str) -> Result<()> {
    // RSS 0.91 feeds commonly carry the Netscape DOCTYPE.
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = roxmltree::Document::parse_with_options(body, options)
        .map_err(|e| AppError::FeedValidation(format!("not well-formed XML: {}", e)))?;

    let root = doc.root_element().tag_name().name();
    if FEED_ROOTS.contains(&root) {
        Ok(())
    } else {
        Err(AppError::FeedValidation(format!(
            "root element <{}> is not RSS or Atom",
            root
        )))
    }
}
