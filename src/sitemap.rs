use crate::{
    config::SiteConfig,
    docs::DocsLibrary,
    log,
    lookup::{load_prompts, load_tools},
    utils::sitemap::{Sitemap, SitemapInput},
};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Fetches the collections and writes `sitemap.xml`.
///
/// Tools are required. Prompts that fail to load are left out with a warning.
pub fn generate_sitemap(config: &'static SiteConfig) -> Result<()> {
    if !config.sitemap.enable {
        log!("sitemap"; "disabled in config, skipping");
        return Ok(());
    }

    let (tools, prompts) = rayon::join(|| load_tools(config), || load_prompts(config));
    let tools = tools?;
    let prompts = prompts.unwrap_or_else(|err| {
        log!("error"; "{err:#}, prompts are left out of the sitemap");
        Arc::default()
    });

    let docs = config
        .docs
        .path
        .as_deref()
        .map(DocsLibrary::from_path)
        .transpose()
        .context("[sitemap] failed to load docs")?
        .unwrap_or_default();

    let input = SitemapInput {
        tools: &tools,
        prompts: &prompts,
        docs: &docs.articles,
        today: chrono::Utc::now().date_naive(),
    };

    Sitemap::new(config, &input).write_to_file(config)
}
