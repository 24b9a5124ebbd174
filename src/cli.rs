use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// root directory path
    #[arg(short, long, global = true, default_value = "./")]
    pub root: PathBuf,

    /// Config file path related to `root`
    #[arg(short = 'C', long, global = true, default_value = "aidir.toml")]
    pub config: PathBuf,

    /// Output directory path related to `root`
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Data directory path related to `root`, one `<table>.json` per collection
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the JSON API and static files. Refetch collections on change automatically
    Serve {
        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// The port you should provide
        #[arg(short, long)]
        port: Option<u16>,

        /// enable watch
        #[arg(short, long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
        watch: Option<bool>,
    },

    /// Generate sitemap.xml from the current collections
    Sitemap {},

    /// Print the slug of a record under the configured policy
    Slug {
        #[arg(value_enum)]
        entity: Entity,

        /// record id
        id: i64,
    },

    /// Resolve a slug back to its record
    Resolve {
        #[arg(value_enum)]
        entity: Entity,

        slug: String,
    },

    /// List records with their slugs
    List {
        #[arg(value_enum)]
        entity: Entity,

        /// case-insensitive search query
        #[arg(short, long)]
        query: Option<String>,

        /// category filter
        #[arg(short, long)]
        category: Option<String>,

        /// tag filter (tools only)
        #[arg(short, long)]
        tag: Option<String>,

        /// only featured tools
        #[arg(long)]
        top: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Tools,
    Prompts,
}
