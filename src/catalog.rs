//! Catalog records: tools, prompts and documentation articles.

use crate::config::{PromptFields, StoreConfig};
use crate::store::{DataSource, Directory, Query, Row, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// The shape every sluggable record shares.
pub trait CatalogItem {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
}

/// A tool in `ainsider_store_directory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,

    // single string in the store, e.g. "Writing"
    #[serde(default)]
    pub categories: Option<String>,

    // pricing tag, e.g. "Freemium"
    #[serde(default)]
    pub tags: Option<String>,

    #[serde(default)]
    pub link: Option<String>,

    // any non-empty value marks a featured tool
    #[serde(default)]
    pub top: Option<String>,

    #[serde(default)]
    pub article: Option<String>,

    // RFC 3339 timestamp
    #[serde(default)]
    pub created: Option<String>,
}

impl Tool {
    pub fn from_row(row: Row) -> Result<Self, StoreError> {
        serde_json::from_value(Value::Object(row)).map_err(StoreError::Decode)
    }

    pub fn is_top(&self) -> bool {
        self.top.as_deref().is_some_and(|top| !top.is_empty())
    }
}

impl CatalogItem for Tool {
    fn id(&self) -> i64 { self.id }
    fn name(&self) -> &str { &self.name }
}

/// A prompt in `ainsider_prompts_directory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: i64,
    pub name: String,
    pub category: Vec<String>,
    pub description: Option<String>,
    pub prompt: Option<String>,
    pub date: Option<String>,
}

impl Prompt {
    /// Normalizes a raw row through the configured column names.
    ///
    /// Ids stored as strings are parsed, a missing or unparseable id becomes `0`.
    /// `category` may be a single string or an array of strings.
    pub fn from_row(row: Row, fields: &PromptFields) -> Result<Self, StoreError> {
        let get = |key: &str| row.get(key).filter(|value| !value.is_null());
        let get_string = |key: &str| get(key).and_then(value_to_string);

        let id = match get(&fields.id) {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or_default(),
            Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
            _ => 0,
        };

        let category = match get(&fields.category) {
            Some(Value::Array(values)) => values.iter().filter_map(value_to_string).collect(),
            Some(value) => value_to_string(value).into_iter().collect(),
            None => Vec::new(),
        };

        Ok(Self {
            id,
            name: get_string(&fields.name).unwrap_or_default(),
            category,
            description: get_string(&fields.description),
            prompt: get_string(&fields.prompt),
            date: get_string(&fields.date),
        })
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl CatalogItem for Prompt {
    fn id(&self) -> i64 { self.id }
    fn name(&self) -> &str { &self.name }
}

pub fn tools_directory(source: Arc<dyn DataSource>, store: &StoreConfig) -> Arc<Directory<Tool>> {
    Directory::new(source, Query::new(&store.tools_table, &store.tools_order), Tool::from_row)
}

pub fn prompts_directory(source: Arc<dyn DataSource>, store: &StoreConfig) -> Arc<Directory<Prompt>> {
    let fields = store.prompt_fields.clone();
    Directory::new(
        source,
        Query::new(&store.prompts_table, &store.prompts_order),
        move |row| Prompt::from_row(row, &fields),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

/// A documentation article. Its `id` doubles as the URL slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocArticle {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub category_label: String,
    #[serde(default)]
    pub tools: Vec<String>,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub read_time: String,
}
