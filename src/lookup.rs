//! `slug`, `resolve` and `list`: one-shot queries against the current collections.

use crate::{
    catalog::{CatalogItem, Prompt, Tool, prompts_directory, tools_directory},
    cli::Entity,
    config::SiteConfig,
    filter::{PromptFilter, ToolFilter},
    store::{DataSource, Directory, JsonSource, Lookup},
    utils::slug::SlugPolicy,
};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::sync::Arc;

fn source(config: &SiteConfig) -> Arc<dyn DataSource> {
    Arc::new(JsonSource::new(&config.store.data_dir))
}

/// Fetches a collection once, without subscribing to changes.
pub fn load<T>(directory: Arc<Directory<T>>) -> Result<Arc<Vec<T>>>
where
    T: CatalogItem + Clone + Send + Sync + 'static,
{
    directory
        .refetch()
        .with_context(|| format!("failed to load `{}`", directory.table()))?;
    Ok(directory.items())
}

pub fn load_tools(config: &SiteConfig) -> Result<Arc<Vec<Tool>>> {
    load(tools_directory(source(config), &config.store))
}

pub fn load_prompts(config: &SiteConfig) -> Result<Arc<Vec<Prompt>>> {
    load(prompts_directory(source(config), &config.store))
}

fn slug_of<T: CatalogItem>(items: &[T], id: i64, policy: SlugPolicy) -> Option<String> {
    let item = items.iter().find(|item| item.id() == id)?;
    Some(policy.build(item, items))
}

pub fn print_slug(config: &SiteConfig, entity: Entity, id: i64) -> Result<()> {
    let slug = match entity {
        Entity::Tools => slug_of(&load_tools(config)?, id, config.slug.tools),
        Entity::Prompts => slug_of(&load_prompts(config)?, id, config.slug.prompts),
    };

    match slug {
        Some(slug) => println!("{slug}"),
        None => bail!("no {entity:?} record with id {id}"),
    }
    Ok(())
}

fn resolve_one<T>(directory: Arc<Directory<T>>, slug: &str, policy: SlugPolicy) -> Result<T>
where
    T: CatalogItem + Clone + Send + Sync + 'static,
{
    load(Arc::clone(&directory))?;
    match directory.resolve(slug, policy) {
        Lookup::Found(record) => Ok(record),
        Lookup::NotFound | Lookup::NotLoaded => bail!("`{slug}` does not resolve to any record"),
    }
}

fn print_record<T: Serialize>(record: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

pub fn print_resolved(config: &SiteConfig, entity: Entity, slug: &str) -> Result<()> {
    match entity {
        Entity::Tools => {
            let directory = tools_directory(source(config), &config.store);
            print_record(&resolve_one(directory, slug, config.slug.tools)?)
        }
        Entity::Prompts => {
            let directory = prompts_directory(source(config), &config.store);
            print_record(&resolve_one(directory, slug, config.slug.prompts)?)
        }
    }
}

fn print_rows<T: CatalogItem>(matched: &[&T], collection: &[T], policy: SlugPolicy) {
    for item in matched {
        println!("{:>6}  {:<40}  {}", item.id(), policy.build(*item, collection), item.name());
    }
}

pub fn print_list(config: &SiteConfig, entity: Entity, filter: ToolFilter) -> Result<()> {
    match entity {
        Entity::Tools => {
            let tools = load_tools(config)?;
            print_rows(&filter.apply(&tools), &tools, config.slug.tools);
        }
        Entity::Prompts => {
            if filter.tag.is_some() || filter.top {
                bail!("`--tag` and `--top` only apply to tools");
            }
            let prompts = load_prompts(config)?;
            let filter = PromptFilter { q: filter.q, category: filter.category };
            print_rows(&filter.apply(&prompts), &prompts, config.slug.prompts);
        }
    }
    Ok(())
}
