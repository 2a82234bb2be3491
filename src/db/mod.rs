mod fingerprint;
mod repository;
mod schema;

pub use fingerprint::{article_fingerprint, feed_fingerprint, fingerprint, DedupScope};
pub use repository::{Repository, SaveReport};
