//! Search, filtering and pagination over in-memory collections.

use crate::catalog::{DocArticle, Prompt, Tool};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;

pub const ITEMS_PER_PAGE: usize = 50;
pub const LATEST_TOOLS: usize = 30;

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|text| text.to_lowercase().contains(needle))
}

fn normalized_query(query: Option<&str>) -> Option<String> {
    query.filter(|q| !q.is_empty()).map(str::to_lowercase)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolFilter {
    pub q: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub top: bool,
}

impl ToolFilter {
    pub fn matches(&self, tool: &Tool) -> bool {
        let query = normalized_query(self.q.as_deref());
        self.matches_with(tool, query.as_deref())
    }

    fn matches_with(&self, tool: &Tool, query: Option<&str>) -> bool {
        let matches_search = query.is_none_or(|q| {
            contains_ignore_case(Some(&tool.name), q) || contains_ignore_case(Some(&tool.description), q)
        });

        // `categories` is a single string, a selected category only needs to occur in it
        let matches_category = self.category.as_deref().is_none_or(|category| {
            tool.categories.as_deref().is_some_and(|categories| categories.contains(category))
        });

        let matches_tag = self.tag.as_deref().is_none_or(|tag| tool.tags.as_deref() == Some(tag));
        let matches_top = !self.top || tool.is_top();

        matches_search && matches_category && matches_tag && matches_top
    }

    /// Keeps the collection order.
    pub fn apply<'a>(&self, tools: &'a [Tool]) -> Vec<&'a Tool> {
        let query = normalized_query(self.q.as_deref());
        tools
            .par_iter()
            .filter(|tool| self.matches_with(tool, query.as_deref()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptFilter {
    pub q: Option<String>,
    pub category: Option<String>,
}

impl PromptFilter {
    pub fn matches(&self, prompt: &Prompt) -> bool {
        let query = normalized_query(self.q.as_deref());
        self.matches_with(prompt, query.as_deref())
    }

    fn matches_with(&self, prompt: &Prompt, query: Option<&str>) -> bool {
        let matches_search = query.is_none_or(|q| {
            contains_ignore_case(Some(&prompt.name), q)
                || contains_ignore_case(prompt.description.as_deref(), q)
                || contains_ignore_case(prompt.prompt.as_deref(), q)
        });
        let matches_category = self
            .category
            .as_deref()
            .is_none_or(|category| prompt.category.iter().any(|c| c == category));

        matches_search && matches_category
    }

    pub fn apply<'a>(&self, prompts: &'a [Prompt]) -> Vec<&'a Prompt> {
        let query = normalized_query(self.q.as_deref());
        prompts
            .par_iter()
            .filter(|prompt| self.matches_with(prompt, query.as_deref()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocFilter {
    pub q: Option<String>,
    pub category: Option<String>,

    // an article matches when it mentions any of these
    pub tools: Vec<String>,
}

impl DocFilter {
    pub fn matches(&self, article: &DocArticle) -> bool {
        let query = normalized_query(self.q.as_deref());
        let matches_search = query.as_deref().is_none_or(|q| {
            contains_ignore_case(Some(&article.title), q) || contains_ignore_case(Some(&article.description), q)
        });
        let matches_category = self.category.as_deref().is_none_or(|category| article.category == category);
        let matches_tools = self.tools.is_empty() || self.tools.iter().any(|tool| article.tools.contains(tool));

        matches_search && matches_category && matches_tools
    }

    pub fn apply<'a>(&self, articles: &'a [DocArticle]) -> Vec<&'a DocArticle> {
        articles.iter().filter(|article| self.matches(article)).collect()
    }
}

/// One "load more" window over a filtered list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub has_more: bool,
}

/// Page `n` (1-based) shows everything up to `n * ITEMS_PER_PAGE`, like repeated "load more".
/// Page `0` is treated as page `1`.
pub fn paginate<T>(items: Vec<T>, page: usize) -> Page<T> {
    let total = items.len();
    let visible = page.max(1).saturating_mul(ITEMS_PER_PAGE);
    let items: Vec<_> = items.into_iter().take(visible).collect();

    Page { has_more: visible < total, items, total }
}

/// Featured tools, newest first. Tools without a creation date sort last.
pub fn latest_tools(tools: &[Tool]) -> Vec<&Tool> {
    let mut top: Vec<_> = tools.iter().filter(|tool| tool.is_top()).collect();
    top.sort_by(|a, b| created_timestamp(b).cmp(&created_timestamp(a)));
    top.truncate(LATEST_TOOLS);
    top
}

fn created_timestamp(tool: &Tool) -> Option<i64> {
    let created = tool.created.as_deref()?;
    chrono::DateTime::parse_from_rfc3339(created)
        .map(|dt| dt.timestamp())
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(created.get(..10)?, "%Y-%m-%d")
                .ok()?
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp())
        })
}

/// Unique non-empty values in first-seen order.
pub fn unique_values<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| !value.is_empty() && seen.insert(*value))
        .map(str::to_string)
        .collect()
}

pub fn tool_categories(tools: &[Tool]) -> Vec<String> {
    unique_values(tools.iter().filter_map(|tool| tool.categories.as_deref()))
}

pub fn tool_tags(tools: &[Tool]) -> Vec<String> {
    unique_values(tools.iter().filter_map(|tool| tool.tags.as_deref()))
}

pub fn prompt_categories(prompts: &[Prompt]) -> Vec<String> {
    unique_values(prompts.iter().flat_map(|prompt| prompt.category.iter().map(String::as_str)))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocGroup<'a> {
    pub category: String,
    pub label: String,
    pub articles: Vec<&'a DocArticle>,
}

/// Groups articles by category in the given `(id, label)` order, dropping empty groups.
pub fn group_docs<'a>(articles: &[&'a DocArticle], categories: &[(String, String)]) -> Vec<DocGroup<'a>> {
    categories
        .iter()
        .map(|(id, label)| DocGroup {
            category: id.clone(),
            label: label.clone(),
            articles: articles.iter().copied().filter(|a| &a.category == id).collect(),
        })
        .filter(|group| !group.articles.is_empty())
        .collect()
}
