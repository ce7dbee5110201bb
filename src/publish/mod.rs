//! Publishing to WordPress.
//!
//! - [`blocks`] - serializes an article into Gutenberg block markup
//! - [`wordpress`] - uploads media and creates the draft post over REST

pub mod blocks;
pub mod wordpress;

pub use blocks::{article_content, UploadedMedia};
pub use wordpress::{PublishError, PublishRequest, PublishedPost, WordPressClient};
