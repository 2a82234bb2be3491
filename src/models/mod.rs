mod article;
mod feed;

pub use article::{Article, NewArticle};
pub use feed::Feed;
