//! Species Catalog CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use species_catalog_lib::catalog::CatalogApi;
use species_catalog_lib::infrastructure::logging::log_system_info;
use species_catalog_lib::infrastructure::init_logging_with_config;
use species_catalog_lib::{
    AppConfig, CatalogView, ConfigManager, FilterState, HttpClient, OperationStatus,
    ProfileLoader, SpeciesDetail, ViewSnapshot,
};

#[derive(Parser)]
#[command(
    name = "species-catalog",
    version,
    about = "Browse, filter and compare species from the catalog API"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Layered configuration file (JSON, TOML or YAML).
    #[arg(long = "config", value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log level (overrides the configured one).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(long = "log-json", global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List the species matching the given filters.
    Browse(BrowseArgs),

    /// Resolve two species and print their stats side by side.
    Compare {
        #[arg(value_name = "FIRST")]
        first: String,
        #[arg(value_name = "SECOND")]
        second: String,
        /// Generations to search for both species (default: whole catalog).
        #[arg(long = "generation", short = 'g', value_name = "ID")]
        generations: Vec<u32>,
    },

    /// Show the profile of one species: description and evolution chain.
    Profile {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Inspect or reset the stored configuration file.
    Config {
        /// Overwrite the stored configuration with the defaults.
        #[arg(long = "reset")]
        reset: bool,
    },
}

#[derive(Parser)]
struct BrowseArgs {
    /// Case-insensitive substring filter on species names.
    #[arg(long = "search", short = 's', default_value = "")]
    search: String,

    /// Category filter; repeat for a union of categories.
    #[arg(long = "category", short = 'c', value_name = "NAME")]
    categories: Vec<String>,

    /// Generation filter; repeat for several generations.
    #[arg(long = "generation", short = 'g', value_name = "ID")]
    generations: Vec<u32>,

    /// Additional list pages to load in paginated mode.
    #[arg(long = "pages", default_value_t = 0)]
    pages: u32,

    /// Widen the background resolution window this many times.
    #[arg(long = "more", default_value_t = 0)]
    more: u32,

    /// Print the final view snapshot as JSON.
    #[arg(long = "json")]
    json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load_layered(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json_format |= cli.log_json;
    init_logging_with_config(config.logging.clone())?;
    log_system_info();

    let shutdown = CancellationToken::new();
    let client = HttpClient::new(config.api.clone())?.with_cancellation(shutdown.clone());
    let api: Arc<dyn CatalogApi> = Arc::new(client);

    let work = async {
        match cli.command {
            Command::Browse(args) => browse(api, &config, args).await,
            Command::Compare {
                first,
                second,
                generations,
            } => compare(api, &config, &first, &second, generations).await,
            Command::Profile { name } => profile(api, &config, &name, &shutdown).await,
            Command::Config { reset } => show_config(reset).await,
        }
    };

    tokio::select! {
        result = work => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            warn!("🛑 Interrupted, cancelling in-flight requests");
            shutdown.cancel();
            bail!("interrupted")
        }
    }
}

async fn browse(api: Arc<dyn CatalogApi>, config: &AppConfig, args: BrowseArgs) -> Result<()> {
    let view = CatalogView::from_config(api, config);
    let filters = FilterState::new(&args.search, &args.categories, args.generations);

    view.mount().await.context("Initial load failed")?;
    view.set_filters(filters).await.context("Filter reload failed")?;
    for _ in 0..args.pages {
        if view.load_next_page().await? == 0 {
            break;
        }
    }
    for _ in 0..args.more {
        if view.load_more_results().await? == 0 {
            break;
        }
    }
    view.settled().await;

    let snapshot = view.snapshot().await;
    view.unmount();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(&snapshot);
    }
    Ok(())
}

async fn compare(
    api: Arc<dyn CatalogApi>,
    config: &AppConfig,
    first: &str,
    second: &str,
    generations: Vec<u32>,
) -> Result<()> {
    let view = CatalogView::from_config(api, config);
    view.mount().await.context("Initial load failed")?;
    if !generations.is_empty() {
        view.set_filters(FilterState::new("", Vec::<String>::new(), generations))
            .await
            .context("Filter reload failed")?;
    }

    // Page until both names are in the stub list or the catalog runs out.
    let wanted = [first.trim().to_lowercase(), second.trim().to_lowercase()];
    loop {
        let stubs = view.visible().await;
        if wanted.iter().all(|name| stubs.iter().any(|s| &s.identifier == name)) {
            break;
        }
        if view.load_next_page().await? == 0 {
            break;
        }
    }

    for name in &wanted {
        view.resolve_item(name)
            .await
            .with_context(|| format!("Could not resolve {name}"))?;
        view.toggle_compare(name).await?;
    }

    let selected = view.comparison().await;
    view.unmount();
    match selected.as_slice() {
        [left, right] => print_comparison(left, right),
        _ => bail!("comparison needs two distinct species"),
    }
    Ok(())
}

async fn profile(
    api: Arc<dyn CatalogApi>,
    config: &AppConfig,
    name: &str,
    shutdown: &CancellationToken,
) -> Result<()> {
    let profile = ProfileLoader::new(api, config.api.base_url.as_str())
        .load(name, shutdown)
        .await?;

    let detail = &profile.detail;
    println!("#{:04} {}", detail.numeric_id, detail.identifier);
    println!("  categories: {}", detail.categories.join(", "));
    if let Some(image) = detail.images.primary() {
        println!("  image: {image}");
    }
    if let Some(description) = &profile.description {
        println!("  {description}");
    }
    if !profile.evolutions.is_empty() {
        println!("  evolution chain:");
        for step in &profile.evolutions {
            match step.min_level {
                Some(level) => println!("    - {} (lv. {level})", step.identifier),
                None => println!("    - {}", step.identifier),
            }
        }
    }
    Ok(())
}

async fn show_config(reset: bool) -> Result<()> {
    let manager = ConfigManager::new()?;
    let stored = if reset {
        manager.reset_to_defaults().await?
    } else {
        manager.load_config().await?
    };
    info!("Configuration file: {:?}", manager.config_path());
    println!("{}", serde_json::to_string_pretty(&stored)?);
    Ok(())
}

fn print_snapshot(snapshot: &ViewSnapshot) {
    for entry in &snapshot.visible {
        println!("{:<24} {:?}", entry.stub.identifier, entry.status);
    }
    println!(
        "{} visible / {} stubs ({} mode{})",
        snapshot.visible.len(),
        snapshot.total_stubs,
        snapshot.mode,
        if snapshot.more_available { ", more pages available" } else { "" }
    );
    if snapshot.can_load_more_results {
        println!("more results can be resolved with --more");
    }
    if let Some(message) = [&snapshot.initial_load, &snapshot.filter_reload, &snapshot.detail_batch]
        .into_iter()
        .find_map(|status| match status {
            OperationStatus::Failed(message) => Some(message),
            _ => None,
        })
    {
        println!("warning: {message}");
    }
    if snapshot.is_empty_result() {
        println!("no species match the current filters");
    }
}

fn print_comparison(left: &SpeciesDetail, right: &SpeciesDetail) {
    println!("{:<18} {:>14} {:>14}", "", left.identifier, right.identifier);
    println!(
        "{:<18} {:>14} {:>14}",
        "category",
        left.primary_category().unwrap_or("-"),
        right.primary_category().unwrap_or("-")
    );
    let mut names: Vec<&String> = left.stats.keys().chain(right.stats.keys()).collect();
    names.sort();
    names.dedup();
    for name in names {
        let cell = |detail: &SpeciesDetail| {
            detail
                .stat(name)
                .map_or_else(|| "-".to_string(), |value| value.to_string())
        };
        println!("{:<18} {:>14} {:>14}", name, cell(left), cell(right));
    }
    println!("{:<18} {:>14} {:>14}", "total", left.stat_total(), right.stat_total());
}
