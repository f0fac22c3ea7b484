//! Games news site sources
//!
//! - [`NewsAdapter`] - listing stream, HTML first page then the index API
//! - [`ArticleCommentAdapter`] - article comment threads with embedded replies

pub mod comment;
pub mod news;

pub use comment::ArticleCommentAdapter;
pub use news::{NewsAdapter, NewsApiAdapter, NewsHtmlAdapter};
