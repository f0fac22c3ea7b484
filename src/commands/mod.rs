pub mod crawl;
pub mod query;

// Re-export command functions for convenience
pub use crawl::{article_comments, comments, news, news_with_comments, search};
pub use query::{query, stats, Query};
