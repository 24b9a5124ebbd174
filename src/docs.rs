//! The documentation library: a static set of articles grouped into categories.

use crate::catalog::DocArticle;
use crate::filter::{DocFilter, DocGroup, group_docs};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocsError {
    #[error("IO error when reading `{0}`")]
    Io(
        PathBuf,
        #[source] std::io::Error,
    ),

    #[error("docs file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("duplicate article id `{0}`")]
    DuplicateId(String),

    #[error("article `{0}` is in unknown category `{1}`")]
    UnknownCategory(String, String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocCategory {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocsLibrary {
    #[serde(default)]
    pub categories: Vec<DocCategory>,

    #[serde(default)]
    pub articles: Vec<DocArticle>,
}

impl DocsLibrary {
    pub fn from_str(content: &str) -> Result<Self, DocsError> {
        let mut library: DocsLibrary = toml::from_str(content)?;
        library.validate()?;

        for article in &mut library.articles {
            if article.category_label.is_empty() {
                article.category_label = library
                    .categories
                    .iter()
                    .find(|c| c.id == article.category)
                    .map(|c| c.label.clone())
                    .unwrap_or_default();
            }
        }

        Ok(library)
    }

    pub fn from_path(path: &Path) -> Result<Self, DocsError> {
        let content = fs::read_to_string(path).map_err(|err| DocsError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    fn validate(&self) -> Result<(), DocsError> {
        let mut seen = std::collections::HashSet::new();
        for article in &self.articles {
            if !seen.insert(article.id.as_str()) {
                return Err(DocsError::DuplicateId(article.id.clone()));
            }
            if !self.categories.iter().any(|c| c.id == article.category) {
                return Err(DocsError::UnknownCategory(article.id.clone(), article.category.clone()));
            }
        }
        Ok(())
    }

    /// The article id is its slug.
    pub fn find(&self, id: &str) -> Option<&DocArticle> {
        self.articles.iter().find(|article| article.id == id)
    }

    /// Filtered articles grouped by category. With a category selected only that group is returned.
    pub fn grouped(&self, filter: &DocFilter) -> Vec<DocGroup<'_>> {
        let matched = filter.apply(&self.articles);
        let categories: Vec<_> = self
            .categories
            .iter()
            .filter(|c| filter.category.as_deref().is_none_or(|selected| c.id == selected))
            .map(|c| (c.id.clone(), c.label.clone()))
            .collect();

        group_docs(&matched, &categories)
    }

    pub fn count_in(&self, category: &str) -> usize {
        self.articles.iter().filter(|a| a.category == category).count()
    }

    /// Every tool mentioned by some article, in first-seen order.
    pub fn tools(&self) -> Vec<String> {
        crate::filter::unique_values(self.articles.iter().flat_map(|a| a.tools.iter().map(String::as_str)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_DOCS: &str = r##"
        [[categories]]
        id = "ai-agents"
        label = "AI Agents"

        [[categories]]
        id = "automation"
        label = "Automation"

        [[articles]]
        id = "what-are-ai-agents"
        title = "What are AI agents?"
        description = "Autonomous systems that plan and act"
        content = "# What are AI agents?"
        category = "ai-agents"
        tools = ["Gemini", "Claude Code"]
        difficulty = "beginner"
        read_time = "5 min"

        [[articles]]
        id = "n8n-ai-workflows"
        title = "AI workflows in n8n"
        description = "Connect models to your automations"
        category = "automation"
        category_label = "Workflows"
        tools = ["n8n", "Gemini"]
        difficulty = "intermediate"
    "##;

    #[test]
    fn parse_and_find() {
        let docs = DocsLibrary::from_str(SAMPLE_DOCS).unwrap();

        let article = docs.find("what-are-ai-agents").unwrap();
        assert_eq!(article.category_label, "AI Agents");
        assert_eq!(article.content, "# What are AI agents?");
        assert_eq!(docs.find("n8n-ai-workflows").unwrap().category_label, "Workflows");
        assert!(docs.find("missing").is_none());
        assert_eq!(docs.count_in("automation"), 1);
        assert_eq!(docs.tools(), vec!["Gemini", "Claude Code", "n8n"]);
    }

    #[test]
    fn grouped_by_category() {
        let docs = DocsLibrary::from_str(SAMPLE_DOCS).unwrap();

        let all = docs.grouped(&DocFilter::default());
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].label, "AI Agents");

        let selected = docs.grouped(&DocFilter { category: Some("automation".into()), ..Default::default() });
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].articles[0].id, "n8n-ai-workflows");
    }

    #[test]
    fn invalid_libraries() {
        let duplicate = format!("{SAMPLE_DOCS}\n{}", r#"
        [[articles]]
        id = "what-are-ai-agents"
        title = "Again"
        description = ""
        category = "ai-agents"
        difficulty = "advanced"
        "#);
        assert!(matches!(DocsLibrary::from_str(&duplicate), Err(DocsError::DuplicateId(_))));

        let unknown = r#"
        [[articles]]
        id = "orphan"
        title = "Orphan"
        description = ""
        category = "creative-ai"
        difficulty = "beginner"
        "#;
        assert!(matches!(DocsLibrary::from_str(unknown), Err(DocsError::UnknownCategory(..))));
    }
}
