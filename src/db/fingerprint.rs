use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which natural key an article fingerprint is derived from.
///
/// `Global` hashes the title alone, so two feeds publishing the same title
/// collapse into a single article. `PerFeed` mixes the owning feed id into the
/// key so identical titles from different feeds are both kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupScope {
    #[default]
    Global,
    PerFeed,
}

/// Lowercase hex SHA-256 of `input`.
pub fn fingerprint(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)
}

pub fn feed_fingerprint(url: &str) -> String {
    fingerprint(url)
}

pub fn article_fingerprint(scope: DedupScope, feed_id: i64, title: &str) -> String {
    match scope {
        DedupScope::Global => fingerprint(title),
        DedupScope::PerFeed => {
            let mut hasher = Sha256::new();
            hasher.update(feed_id.to_string().as_bytes());
            hasher.update(b"::");
            hasher.update(title.as_bytes());
            hex::encode(hasher.finalize())
        }
    }
}
