mod digest;
mod smtp;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::Article;

pub use digest::{render_digest, Digest};
pub use smtp::SmtpMailer;

/// Outbound channel for a rendered digest. Returning `Ok` means the message
/// was accepted for delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, digest: &Digest) -> Result<()>;
}

pub struct Notifier {
    mailer: Box<dyn Mailer>,
    content_chars: usize,
}

impl Notifier {
    pub fn new(mailer: Box<dyn Mailer>, content_chars: usize) -> Self {
        Self {
            mailer,
            content_chars,
        }
    }

    /// Sends one digest for `articles`. Returns `Ok(false)` without sending
    /// when there is nothing to deliver, `Ok(true)` once the mailer confirmed.
    pub async fn deliver(&self, articles: &[Article]) -> Result<bool> {
        if articles.is_empty() {
            return Ok(false);
        }

        let digest = render_digest(articles, self.content_chars);
        self.mailer.send(&digest).await.map_err(|e| match e {
            AppError::Delivery(reason) => AppError::Delivery(reason),
            other => AppError::Delivery(other.to_string()),
        })?;

        tracing::info!("Delivered digest with {} articles", articles.len());
        Ok(true)
    }
}
