use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;

use shopdb_core::config::Config;
use shopdb_core::price::{PriceConstraint, PriceParser};
use shopdb_core::records::catalog_source;
use shopdb_text::{CatalogSearch, JsonIndexStore, RetrieveOptions};

#[derive(Parser)]
#[command(name = "shopdb")]
#[command(about = "Build and query the product catalog index")]
struct Cli {
    /// Base directory for relative catalog/persist paths
    #[arg(short, long, default_value = ".")]
    workdir: PathBuf,

    /// Config environment (dev, prod, test); defaults to RUST_ENV
    #[arg(long)]
    env: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the index from the catalog and persist it
    Rebuild,

    /// Top-k retrieval
    Query {
        query: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        #[command(flatten)]
        filters: Filters,
    },

    /// Paged search
    Search {
        query: String,
        #[arg(short, long, default_value = "1")]
        page: usize,
        #[arg(long)]
        per_page: Option<usize>,
        #[command(flatten)]
        filters: Filters,
    },

    /// Products similar to a given title
    Recommend {
        title: String,
        #[arg(short = 'n', long)]
        top_n: Option<usize>,
    },

    /// Show the price bounds parsed from a query
    Price { query: String },

    /// Show the effective configuration
    Config,
}

#[derive(Args)]
struct Filters {
    /// Exact category to keep
    #[arg(short, long)]
    category: Option<String>,
    /// Explicit lower price bound; overrides the query text
    #[arg(long)]
    min_price: Option<f64>,
    /// Explicit upper price bound; overrides the query text
    #[arg(long)]
    max_price: Option<f64>,
    /// Route the query to a category by keyword
    #[arg(long)]
    infer_category: bool,
    /// Drop products without a price when a bound is active
    #[arg(long)]
    require_price: bool,
}

impl Filters {
    fn options(&self) -> RetrieveOptions {
        let explicit = self.min_price.is_some() || self.max_price.is_some();
        RetrieveOptions {
            category: self.category.clone(),
            price: explicit.then(|| PriceConstraint::new(self.min_price, self.max_price)),
            infer_category: self.infer_category.then_some(true),
            require_price: self.require_price.then_some(true),
            min_score: None,
        }
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("shopdb_core=info,shopdb_text=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load_for_env(cli.env.as_deref()).map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = config.settings()?;
    let workdir = cli.workdir.canonicalize().unwrap_or(cli.workdir.clone());

    if let Command::Config = cli.command {
        return print_json(&json!({ "env": config.env_name(), "settings": settings }));
    }
    if let Command::Price { query } = &cli.command {
        let bounds = PriceParser::new(settings.retrieval.around_tolerance).parse(query);
        let max = bounds.max_price.is_finite().then_some(bounds.max_price);
        return print_json(&json!({ "query": query, "min_price": bounds.min_price, "max_price": max }));
    }

    let catalog_dir = settings.catalog_dir(&workdir);
    let persist_dir = settings.persist_dir(&workdir);
    info!(catalog = %catalog_dir.display(), format = ?settings.data.format, env = config.env_name(), "opening catalog");
    let source = catalog_source(settings.data.format, catalog_dir, settings.data.categories.clone());
    let mut search = CatalogSearch::new(settings, source);
    if let Some(dir) = persist_dir {
        search = search.with_store(Box::new(JsonIndexStore::new(dir)));
    }

    match cli.command {
        Command::Rebuild => print_json(&search.rebuild()?),
        Command::Query { query, top_k, filters } => {
            search.open()?;
            print_json(&search.retrieve(&query, top_k, &filters.options()))
        }
        Command::Search { query, page, per_page, filters } => {
            search.open()?;
            print_json(&search.search_page(&query, page, per_page, &filters.options()))
        }
        Command::Recommend { title, top_n } => {
            search.open()?;
            print_json(&search.recommend(&title, top_n))
        }
        Command::Price { .. } | Command::Config => Ok(()),
    }
}
