use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Feed already registered: {0}")]
    DuplicateFeed(String),

    #[error("Feed validation failed: {0}")]
    FeedValidation(String),

    #[error("Feed fetch failed: {0}")]
    Fetch(String),

    #[error("Digest delivery failed: {0}")]
    Delivery(String),

    #[error("Storage error: {0}")]
    Storage(#[from] tokio_rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
