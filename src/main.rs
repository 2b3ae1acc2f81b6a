use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use url::Url;

use blog_prefetch::clock::SystemClock;
use blog_prefetch::config::{load_config, PrefetchConfig};
use blog_prefetch::dom::links::PageLinks;
use blog_prefetch::dom::parser::parse_html;
use blog_prefetch::listing::{format_date, ArticleListing, SortOrder};
use blog_prefetch::net::cache::{CacheStore, FileStore};
use blog_prefetch::net::connection::{ConnectionSignal, EffectiveConnectionType};
use blog_prefetch::net::fetch::{load_page, HttpFetcher};
use blog_prefetch::prefetch::{HostCapabilities, PrefetchController, PrefetchRuntime, Startup};

#[derive(Parser)]
#[command(name = "blog-prefetch", version, about = "Prefetch and browse the articles of a static blog")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "BLOG_PREFETCH_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prefetch every article linked from a listing page into the cache
    Prefetch {
        /// Listing page URL or local file
        page: String,
        /// Base URL for relative links (defaults to the page URL)
        #[arg(long)]
        base: Option<Url>,
        /// Simulated connection type: slow-2g, 2g, 3g or 4g
        #[arg(long)]
        connection: Option<EffectiveConnectionType>,
    },
    /// Show cached pages and their age
    Status,
    /// Drop expired cache entries
    Evict,
    /// Show the article listing with optional search and sort
    List {
        /// Listing page URL or local file
        source: String,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = "newest")]
        sort: SortOrder,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Write a new post and link it from index.html
    NewPost {
        #[arg(long)]
        title: String,
        /// File with the post body (stdin when omitted)
        #[arg(long)]
        content: Option<PathBuf>,
        /// Site directory containing index.html
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Overwrite an existing post with the same slug
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Prefetch {
            page,
            base,
            connection,
        } => run_prefetch(&config, &page, base, connection),
        Command::Status => run_status(&config),
        Command::Evict => run_evict(&config),
        Command::List {
            source,
            search,
            sort,
            page,
        } => run_list(&config, &source, search.as_deref(), sort, page),
        Command::NewPost {
            title,
            content,
            dir,
            force,
        } => run_new_post(&title, content.as_deref(), &dir, force),
    }
}

fn cache_store(config: &PrefetchConfig) -> CacheStore {
    CacheStore::new(
        Arc::new(FileStore::new(&config.cache_dir, config.storage_quota_bytes)),
        config.cache_key.clone(),
        config.cache_duration_ms,
        Arc::new(SystemClock),
    )
}

fn run_prefetch(
    config: &PrefetchConfig,
    page: &str,
    base: Option<Url>,
    connection: Option<EffectiveConnectionType>,
) -> Result<()> {
    let (body, page_url) = load_page(page, config)?;
    let fetcher = HttpFetcher::new(config, base.or(page_url))?;
    match fetcher.base() {
        Some(base) => log::info!("Resolving relative links against {}", base),
        None => log::warn!("No base URL for {}; relative links will fail (use --base)", page),
    }

    let tree = parse_html(&body);
    let links = PageLinks::from_tree(&tree);
    log::info!("Found {} link(s) on {}", links.len(), page);

    let signal = match connection {
        Some(kind) => ConnectionSignal::reporting(kind),
        None => ConnectionSignal::unavailable(),
    };

    let runtime = PrefetchRuntime {
        fetcher: Arc::new(fetcher),
        store: Arc::new(FileStore::new(&config.cache_dir, config.storage_quota_bytes)),
        clock: Arc::new(SystemClock),
    };
    let host = HostCapabilities {
        connection: signal,
        viewport: false,
        startup: Startup::Immediate,
    };

    let mut controller = PrefetchController::start(config, runtime, &links, host);
    controller.wait_for_bulk();

    let stats = controller.stats();
    println!(
        "prefetched {} page(s), {} failed, {} request(s) issued",
        stats.succeeded, stats.failed, stats.issued
    );
    Ok(())
}

fn run_status(config: &PrefetchConfig) -> Result<()> {
    let store = cache_store(config);
    let cache = store.load();
    if cache.is_empty() {
        println!("cache is empty ({})", config.cache_dir.display());
        return Ok(());
    }

    for (url, timestamp) in cache.timestamps() {
        let age_secs = store.age_ms(timestamp) / 1000;
        let state = if store.is_fresh(&url, &cache) {
            "fresh"
        } else {
            "stale"
        };
        println!("{:<6} {:>6}s  {}", state, age_secs, url);
    }
    Ok(())
}

fn run_evict(config: &PrefetchConfig) -> Result<()> {
    let store = cache_store(config);
    let removed = store.evict_expired();
    println!(
        "evicted {} expired entr{}, {} remaining",
        removed,
        if removed == 1 { "y" } else { "ies" },
        store.load().len()
    );
    Ok(())
}

fn run_list(
    config: &PrefetchConfig,
    source: &str,
    search: Option<&str>,
    sort: SortOrder,
    page: usize,
) -> Result<()> {
    let (body, _) = load_page(source, config)?;
    let tree = parse_html(&body);
    let mut listing = ArticleListing::from_tree(&tree);
    listing.sort(sort);
    listing.show_page(page.clamp(1, listing.total_pages().max(1)));
    if let Some(query) = search {
        listing.search(query);
    }

    if !tree.title.is_empty() {
        println!("{} ({} article(s))", tree.title, listing.len());
    }
    for article in listing.visible() {
        let date = match (&article.date, &article.timestamp) {
            (Some(date), _) => date.clone(),
            (None, Some(ts)) => format_date(ts),
            (None, None) => String::new(),
        };
        println!("{:<20} [{}] {}", date, article.category, article.title);
        if !article.excerpt.is_empty() {
            println!("{:<20} {}", "", article.excerpt);
        }
    }

    let pagination = listing.pagination();
    if pagination.visible && !pagination.label.is_empty() {
        println!("-- {} --", pagination.label);
    }
    Ok(())
}

fn run_new_post(title: &str, content: Option<&Path>, dir: &Path, force: bool) -> Result<()> {
    let body = match content {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read post content from stdin")?;
            buf
        }
    };

    let today = chrono::Local::now().date_naive();
    let published = blog_prefetch::publish::publish(dir, title, &body, today, force)?;
    println!("Created {}", published.post.display());
    Ok(())
}
