//! Shared building blocks: slugs, file watching, logging and the generated outputs.

pub mod feed;
pub mod log;
pub mod sitemap;
pub mod slug;
pub mod watch;
