//! Sitemap generation.
//!
//! Generates sitemap.xml for SEO and search engine indexing. Record URLs are built with the
//! same [`SlugPolicy`] the API resolves with, otherwise the listed URLs would 404.

use crate::{
    catalog::{CatalogItem, DocArticle, Prompt, Tool},
    config::SiteConfig,
    log,
    utils::slug::SlugPolicy,
};
use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use rayon::prelude::*;
use std::{fs, io::Cursor};

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str =
    "http://www.sitemaps.org/schemas/sitemap/0.9 http://www.sitemaps.org/schemas/sitemap/0.9/sitemap.xsd";

/// Represents a URL entry in the sitemap
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapUrl {
    pub loc: String,
    pub lastmod: String,
    pub changefreq: String,
    pub priority: String,
}

/// Sitemap structure for generating sitemap.xml
pub struct Sitemap {
    urls: Vec<SitemapUrl>,
}

/// Everything a sitemap is built from.
pub struct SitemapInput<'a> {
    pub tools: &'a [Tool],
    pub prompts: &'a [Prompt],
    pub docs: &'a [DocArticle],
    pub today: NaiveDate,
}

impl Sitemap {
    pub fn new(config: &SiteConfig, input: &SitemapInput<'_>) -> Self {
        log!(true; "sitemap"; "generating sitemap started");

        let base_url = config.base.base_url.trim_end_matches('/');
        let today = input.today.format("%Y-%m-%d").to_string();
        let url = |path: &str, lastmod: Option<&str>, changefreq: &str, priority: &str| SitemapUrl {
            loc: format!("{base_url}{}", encode_path(path)),
            lastmod: lastmod.and_then(date_part).unwrap_or(today.as_str()).to_string(),
            changefreq: changefreq.to_string(),
            priority: priority.to_string(),
        };

        let mut urls: Vec<SitemapUrl> = config
            .sitemap
            .pages
            .iter()
            .map(|page| url(&page.url, None, &page.changefreq, &page.priority))
            .collect();

        urls.par_extend(record_paths("/tools", input.tools, config.slug.tools).into_par_iter().map(
            |(path, tool)| url(&path, tool.created.as_deref(), "weekly", "0.8"),
        ));
        urls.par_extend(record_paths("/prompts", input.prompts, config.slug.prompts).into_par_iter().map(
            |(path, prompt)| url(&path, prompt.date.as_deref(), "weekly", "0.7"),
        ));
        urls.extend(
            input
                .docs
                .iter()
                .map(|article| url(&format!("/docs/{}", article.id), None, "monthly", "0.6")),
        );

        log!(true; "sitemap"; "{} urls", urls.len());
        Self { urls }
    }

    pub fn urls(&self) -> &[SitemapUrl] {
        &self.urls
    }

    /// Convert sitemap to XML string
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        // XML declaration
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        // urlset element with namespace
        let mut urlset = BytesStart::new("urlset");
        urlset.push_attribute(("xmlns", SITEMAP_NS));
        urlset.push_attribute(("xmlns:xsi", XSI_NS));
        urlset.push_attribute(("xsi:schemaLocation", SCHEMA_LOCATION));
        writer.write_event(Event::Start(urlset))?;

        // Write each URL entry
        for url in &self.urls {
            writer.write_event(Event::Start(BytesStart::new("url")))?;
            for (tag, value) in [
                ("loc", &url.loc),
                ("lastmod", &url.lastmod),
                ("changefreq", &url.changefreq),
                ("priority", &url.priority),
            ] {
                writer.write_event(Event::Start(BytesStart::new(tag)))?;
                writer.write_event(Event::Text(BytesText::new(value)))?;
                writer.write_event(Event::End(BytesEnd::new(tag)))?;
            }
            writer.write_event(Event::End(BytesEnd::new("url")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("urlset")))?;

        let xml_bytes = writer.into_inner().into_inner();
        let xml_string = String::from_utf8(xml_bytes)
            .map_err(|e| anyhow!("Failed to convert sitemap to string: {}", e))?;

        Ok(xml_string)
    }

    /// Write sitemap to file
    pub fn write_to_file(&self, config: &SiteConfig) -> Result<()> {
        let xml = self.to_xml()?;
        let sitemap_path = config.sitemap.path.as_path();
        if let Some(parent) = sitemap_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(sitemap_path, xml)?;

        log!(true; "sitemap"; "sitemap written successfully to {}", sitemap_path.display());
        Ok(())
    }
}

fn record_paths<'a, T>(prefix: &str, items: &'a [T], policy: SlugPolicy) -> Vec<(String, &'a T)>
where
    T: CatalogItem + Sync,
{
    items
        .par_iter()
        .map(|item| (format!("{prefix}/{}", policy.build(item, items)), item))
        .collect()
}

// "2024-05-01T10:00:00Z" -> "2024-05-01"
fn date_part(timestamp: &str) -> Option<&str> {
    let date = timestamp.split('T').next()?.trim();
    (!date.is_empty()).then_some(date)
}

fn encode_path(path: &str) -> String {
    urlencoding::encode(path).replace("%2F", "/")
}
