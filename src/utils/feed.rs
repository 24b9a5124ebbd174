//! Blog feed aggregation.
//!
//! Reads the blog's RSS document and turns each item into a short [`Article`] card.

use crate::{config::SiteConfig, log};
use regex::Regex;
use rss::Channel;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::LazyLock,
};
use thiserror::Error;

const SUMMARY_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("no feed configured, set `feed.path`")]
    NotConfigured,

    #[error("IO error when reading `{0}`")]
    Io(
        PathBuf,
        #[source] std::io::Error,
    ),

    #[error("invalid feed")]
    Rss(#[from] rss::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub pub_date: String,
    pub description: String,
    pub creator: String,
}

/// Loads the configured feed.
pub fn load_articles(config: &SiteConfig) -> Result<Vec<Article>, FeedError> {
    let path = config.feed.path.as_deref().ok_or(FeedError::NotConfigured)?;
    let articles = read_articles_from_path(path, &config.feed.default_creator)?;

    log!("feed"; "{} articles from {}", articles.len(), path.display());
    Ok(articles)
}

pub fn read_articles_from_path(path: &Path, default_creator: &str) -> Result<Vec<Article>, FeedError> {
    let file = File::open(path).map_err(|err| FeedError::Io(path.to_path_buf(), err))?;
    read_articles(BufReader::new(file), default_creator)
}

pub fn read_articles(reader: impl BufRead, default_creator: &str) -> Result<Vec<Article>, FeedError> {
    let channel = Channel::read_from(reader)?;

    let articles = channel
        .items()
        .iter()
        .map(|item| {
            let creator = item
                .author()
                .or_else(|| item.dublin_core_ext().and_then(|dc| dc.creators().first().map(String::as_str)))
                .filter(|creator| !creator.is_empty())
                .unwrap_or(default_creator);

            Article {
                title: item.title().unwrap_or_default().to_string(),
                link: item.link().unwrap_or_default().to_string(),
                pub_date: item.pub_date().unwrap_or_default().to_string(),
                description: item.description().map(summarize).unwrap_or_default(),
                creator: creator.to_string(),
            }
        })
        .collect();

    Ok(articles)
}

/// Strips markup and cuts the text to [`SUMMARY_CHARS`] characters, followed by `...`.
pub fn summarize(html: &str) -> String {
    static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

    let text = RE_TAG.replace_all(html, "");
    let summary: String = text.chars().take(SUMMARY_CHARS).collect();
    format!("{summary}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Ainsider</title>
    <link>https://ainsiderai.substack.com</link>
    <description>AI news</description>
    <item>
      <title>Agents in production</title>
      <link>https://ainsiderai.substack.com/p/agents</link>
      <pubDate>Mon, 06 Jan 2025 10:00:00 GMT</pubDate>
      <description><![CDATA[<p>Agents are <b>finally</b> useful.</p>]]></description>
      <dc:creator>Jane Doe</dc:creator>
    </item>
    <item>
      <title>No body</title>
      <link>https://ainsiderai.substack.com/p/empty</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn reads_items_into_articles() {
        let articles = read_articles(SAMPLE_FEED.as_bytes(), "Ainsider AI").unwrap();

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Agents in production");
        assert_eq!(articles[0].description, "Agents are finally useful....");
        assert_eq!(articles[0].creator, "Jane Doe");
        assert_eq!(articles[0].pub_date, "Mon, 06 Jan 2025 10:00:00 GMT");

        assert_eq!(articles[1].description, "");
        assert_eq!(articles[1].creator, "Ainsider AI");
    }

    #[test]
    fn summary_is_truncated_by_chars() {
        let long = format!("<div>{}</div>", "é".repeat(300));
        let summary = summarize(&long);

        assert_eq!(summary.chars().count(), SUMMARY_CHARS + 3);
        assert!(summary.ends_with("é..."));
    }

    #[test]
    fn invalid_feed_is_an_error() {
        assert!(matches!(read_articles("not a feed".as_bytes(), "x"), Err(FeedError::Rss(_))));
    }

    #[test]
    fn missing_feed_file() {
        let err = read_articles_from_path(Path::new("/nonexistent/feed.xml"), "x").unwrap_err();
        assert!(matches!(err, FeedError::Io(..)));
    }
}
