use crate::cli::{Cli, Commands};
use crate::utils::slug::SlugPolicy;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(
        PathBuf,
        #[source] std::io::Error,
    ),

    #[error("config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("config file validation error: {0}")]
    Validation(String),
}

// for default value in serde
pub mod serde_defaults {
    pub fn r#true() -> bool { true }

    pub mod base {
        pub fn title() -> String { "Ainsider".into() }
        pub fn base_url() -> String { "https://ainsider.store".into() }
    }

    pub mod build {
        use std::path::PathBuf;

        pub fn root() -> PathBuf { "./".into() }
        pub fn output() -> PathBuf { "public".into() }
    }

    pub mod store {
        use std::path::PathBuf;

        pub fn data_dir() -> PathBuf { "data".into() }
        pub fn tools_table() -> String { "ainsider_store_directory".into() }
        pub fn tools_order() -> String { "created".into() }
        pub fn prompts_table() -> String { "ainsider_prompts_directory".into() }
        pub fn prompts_order() -> String { "date".into() }
    }

    pub mod fields {
        pub fn id() -> String { "id".into() }
        pub fn name() -> String { "name".into() }
        pub fn category() -> String { "category".into() }
        pub fn description() -> String { "description".into() }
        pub fn prompt() -> String { "prompt".into() }
        pub fn date() -> String { "date".into() }
    }

    pub mod slug {
        use crate::utils::slug::SlugPolicy;

        pub fn tools() -> SlugPolicy { SlugPolicy::NameRank }
        pub fn prompts() -> SlugPolicy { SlugPolicy::IdSuffix }
    }

    pub mod sitemap {
        use crate::config::StaticPage;
        use std::path::PathBuf;

        pub fn path() -> PathBuf { "sitemap.xml".into() }
        pub fn pages() -> Vec<StaticPage> {
            vec![
                StaticPage::new("/", "1.0", "daily"),
                StaticPage::new("/tools", "0.9", "daily"),
                StaticPage::new("/prompts", "0.9", "daily"),
                StaticPage::new("/blog", "0.7", "weekly"),
                StaticPage::new("/docs", "0.7", "weekly"),
            ]
        }
    }

    pub mod feed {
        pub fn default_creator() -> String { "Ainsider AI".into() }
    }

    pub mod serve {
        pub fn interface() -> String { "127.0.0.1".into() }
        pub fn port() -> u16 { 5277 }
    }
}

// `[base]` in toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BaseConfig {
    #[serde(default = "serde_defaults::base::title")]
    #[educe(Default = serde_defaults::base::title())]
    pub title: String,

    #[serde(default)]
    pub description: String,

    // e.g., "https://ainsider.store"
    #[serde(default = "serde_defaults::base::base_url")]
    #[educe(Default = serde_defaults::base::base_url())]
    pub base_url: String,
}

// `[build]` in toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    // root directory path
    #[serde(default = "serde_defaults::build::root")]
    #[educe(Default = serde_defaults::build::root())]
    pub root: PathBuf,

    // Output directory path related to `root`, holds sitemap.xml and static files
    #[serde(default = "serde_defaults::build::output")]
    #[educe(Default = serde_defaults::build::output())]
    pub output: PathBuf,
}

// `[store.prompt_fields]` in toml: column names of the prompts table
#[derive(Debug, Clone, PartialEq, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct PromptFields {
    #[serde(default = "serde_defaults::fields::id")]
    #[educe(Default = serde_defaults::fields::id())]
    pub id: String,

    #[serde(default = "serde_defaults::fields::name")]
    #[educe(Default = serde_defaults::fields::name())]
    pub name: String,

    #[serde(default = "serde_defaults::fields::category")]
    #[educe(Default = serde_defaults::fields::category())]
    pub category: String,

    #[serde(default = "serde_defaults::fields::description")]
    #[educe(Default = serde_defaults::fields::description())]
    pub description: String,

    #[serde(default = "serde_defaults::fields::prompt")]
    #[educe(Default = serde_defaults::fields::prompt())]
    pub prompt: String,

    #[serde(default = "serde_defaults::fields::date")]
    #[educe(Default = serde_defaults::fields::date())]
    pub date: String,
}

// `[store]` in toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    // directory holding one `<table>.json` per collection, related to `root`
    #[serde(default = "serde_defaults::store::data_dir")]
    #[educe(Default = serde_defaults::store::data_dir())]
    pub data_dir: PathBuf,

    #[serde(default = "serde_defaults::store::tools_table")]
    #[educe(Default = serde_defaults::store::tools_table())]
    pub tools_table: String,

    // tools are listed newest first by this field
    #[serde(default = "serde_defaults::store::tools_order")]
    #[educe(Default = serde_defaults::store::tools_order())]
    pub tools_order: String,

    #[serde(default = "serde_defaults::store::prompts_table")]
    #[educe(Default = serde_defaults::store::prompts_table())]
    pub prompts_table: String,

    #[serde(default = "serde_defaults::store::prompts_order")]
    #[educe(Default = serde_defaults::store::prompts_order())]
    pub prompts_order: String,

    #[serde(default)]
    pub prompt_fields: PromptFields,
}

// `[slug]` in toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SlugConfig {
    #[serde(default = "serde_defaults::slug::tools")]
    #[educe(Default = serde_defaults::slug::tools())]
    pub tools: SlugPolicy,

    #[serde(default = "serde_defaults::slug::prompts")]
    #[educe(Default = serde_defaults::slug::prompts())]
    pub prompts: SlugPolicy,
}

// `[[sitemap.pages]]` in toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticPage {
    pub url: String,
    pub priority: String,
    pub changefreq: String,
}

impl StaticPage {
    pub fn new(url: &str, priority: &str, changefreq: &str) -> Self {
        Self { url: url.into(), priority: priority.into(), changefreq: changefreq.into() }
    }
}

// `[sitemap]` in toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SitemapConfig {
    #[serde(default = "serde_defaults::r#true")]
    #[educe(Default = true)]
    pub enable: bool,

    // related to `build.output`
    #[serde(default = "serde_defaults::sitemap::path")]
    #[educe(Default = serde_defaults::sitemap::path())]
    pub path: PathBuf,

    #[serde(default = "serde_defaults::sitemap::pages")]
    #[educe(Default = serde_defaults::sitemap::pages())]
    pub pages: Vec<StaticPage>,
}

// `[feed]` in toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    // RSS document of the blog, related to `root`
    #[serde(default)]
    pub path: Option<PathBuf>,

    // used when an item names no author
    #[serde(default = "serde_defaults::feed::default_creator")]
    #[educe(Default = serde_defaults::feed::default_creator())]
    pub default_creator: String,
}

// `[docs]` in toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocsConfig {
    // docs library in toml, related to `root`
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// `[serve]` in toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    // Interface to bind on
    #[serde(default = "serde_defaults::serve::interface")]
    #[educe(Default = serde_defaults::serve::interface())]
    pub interface: String,

    // The port you should provide
    #[serde(default = "serde_defaults::serve::port")]
    #[educe(Default = serde_defaults::serve::port())]
    pub port: u16,

    // refetch collections when their data files change
    #[serde(default = "serde_defaults::r#true")]
    #[educe(Default = true)]
    pub watch: bool,
}

// top-level toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    #[serde(default)]
    pub base: BaseConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub slug: SlugConfig,

    #[serde(default)]
    pub sitemap: SitemapConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub docs: DocsConfig,

    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: SiteConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| ConfigError::Io (
            path.to_path_buf(),
            err
        ))?;
        Self::from_str(&content)
    }

    #[rustfmt::skip]
    pub fn update_with_cli(&mut self, cli: &Cli) {
        self.build.root = expand_path(&cli.root);
        if let Some(output) = &cli.output { self.build.output = output.to_owned() }
        if let Some(data_dir) = &cli.data_dir { self.store.data_dir = data_dir.to_owned() }

        if let Commands::Serve { interface, port, watch } = &cli.command {
            if let Some(interface) = interface { self.serve.interface = interface.to_owned() }
            if let Some(port) = port { self.serve.port = *port }
            if let Some(watch) = watch { self.serve.watch = *watch }
        }

        let root = self.build.root.clone();
        let join = |path: &Path| root.join(expand_path(path));

        self.build.output = join(&self.build.output);
        self.store.data_dir = join(&self.store.data_dir);
        self.sitemap.path = self.build.output.join(&self.sitemap.path);
        self.feed.path = self.feed.path.as_deref().map(join);
        self.docs.path = self.docs.path.as_deref().map(join);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base.base_url.starts_with("http") {
            return Err(ConfigError::Validation(
                "`base_url` should start with `http://` or `https://`".into()
            ));
        }

        if self.store.tools_table.is_empty() || self.store.prompts_table.is_empty() {
            return Err(ConfigError::Validation(
                "`store.tools_table` and `store.prompts_table` must not be empty".into()
            ));
        }

        Ok(())
    }
}

fn expand_path(path: &Path) -> PathBuf {
    shellexpand::path::tilde(path).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const SAMPLE_CONFIG: &str = r#"
        [base]
        title = "Ainsider"
        description = "AI tools, prompts and guides"
        base_url = "https://example.com"

        [store]
        data_dir = "fixtures"
        prompts_order = "Date"

        [store.prompt_fields]
        id = "Id"
        category = "Category"

        [slug]
        tools = "id-suffix"

        [feed]
        path = "data/feed.xml"
    "#;

    #[test]
    fn parse_config() {
        let config = SiteConfig::from_str(SAMPLE_CONFIG).unwrap();

        assert_eq!(config.base.title, "Ainsider");
        assert_eq!(config.store.data_dir, PathBuf::from("fixtures"));
        assert_eq!(config.store.prompts_order, "Date");
        assert_eq!(config.store.prompt_fields.id, "Id");
        assert_eq!(config.store.prompt_fields.name, "name");
        assert_eq!(config.slug.tools, SlugPolicy::IdSuffix);
        assert_eq!(config.slug.prompts, SlugPolicy::IdSuffix);
        assert_eq!(config.feed.path, Some(PathBuf::from("data/feed.xml")));
    }

    #[test]
    fn default_values() {
        let config = SiteConfig::from_str("").unwrap();

        assert_eq!(config.base.base_url, "https://ainsider.store");
        assert_eq!(config.store.tools_table, "ainsider_store_directory");
        assert_eq!(config.store.tools_order, "created");
        assert_eq!(config.slug.tools, SlugPolicy::NameRank);
        assert_eq!(config.slug.prompts, SlugPolicy::IdSuffix);
        assert!(config.sitemap.enable);
        assert_eq!(config.sitemap.pages.len(), 5);
        assert_eq!(config.sitemap.pages[0], StaticPage::new("/", "1.0", "daily"));
        assert_eq!(config.feed.default_creator, "Ainsider AI");
        assert_eq!(config.serve.port, 5277);
        assert!(config.docs.path.is_none());
    }

    #[test]
    fn config_validation() {
        let invalid_url = r#"
            [base]
            base_url = "example.com"
        "#;
        assert!(SiteConfig::from_str(invalid_url).is_err());

        let unknown_field = r#"
            [slug]
            blog = "id-suffix"
        "#;
        assert!(SiteConfig::from_str(unknown_field).is_err());

        let unknown_policy = r#"
            [slug]
            tools = "by-title"
        "#;
        assert!(SiteConfig::from_str(unknown_policy).is_err());
    }

    #[test]
    fn cli_overrides_and_paths() {
        let cli = Cli::parse_from(["aidir", "--root", "/srv/site", "serve", "--port", "8080", "--watch=false"]);
        let mut config = SiteConfig::from_str(SAMPLE_CONFIG).unwrap();
        config.update_with_cli(&cli);

        assert_eq!(config.serve.port, 8080);
        assert!(!config.serve.watch);
        assert_eq!(config.serve.interface, "127.0.0.1");
        assert_eq!(config.store.data_dir, PathBuf::from("/srv/site/fixtures"));
        assert_eq!(config.sitemap.path, PathBuf::from("/srv/site/public/sitemap.xml"));
        assert_eq!(config.feed.path, Some(PathBuf::from("/srv/site/data/feed.xml")));
    }
}
