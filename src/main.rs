mod catalog;
mod cli;
mod config;
mod docs;
mod filter;
mod lookup;
mod serve;
mod sitemap;
mod store;
mod utils;

use anyhow::{Result, bail};
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use filter::ToolFilter;
use serve::serve_site;
use sitemap::generate_sitemap;

#[rustfmt::skip]
fn main() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));

    let config: &'static SiteConfig = {
        let config_file = cli.root.join(&cli.config);
        if !config_file.exists() {
            bail!("the config file `{}` didn't exist", config_file.display());
        }
        let mut config = SiteConfig::from_path(&config_file)?;
        config.update_with_cli(cli);
        config.validate()?;

        Box::leak(Box::new(config))
    };

    match &cli.command {
        Commands::Serve { .. } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve_site(config))?;
        },
        Commands::Sitemap {} => generate_sitemap(config)?,
        Commands::Slug { entity, id } => lookup::print_slug(config, *entity, *id)?,
        Commands::Resolve { entity, slug } => lookup::print_resolved(config, *entity, slug)?,
        Commands::List { entity, query, category, tag, top } => {
            let filter = ToolFilter {
                q: query.clone(),
                category: category.clone(),
                tag: tag.clone(),
                top: *top,
            };
            lookup::print_list(config, *entity, filter)?;
        },
    };

    Ok(())
}
