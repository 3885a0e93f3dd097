//! Leadscout - discover local business leads from the terminal.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use leadscout_cli::{config, logging, render};
use leadscout_core::{DiscoveryEvent, DiscoverySessionController, HttpSearchClient, Phase, SqlitePointerStore};
use leadscout_types::{HistoryFilter, SearchForm, SearchId, StatusCategory};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use config::Config;
use logging::{LogConfig, LogFormat};

/// Leadscout - lead discovery client.
#[derive(Parser, Debug)]
#[command(name = "leadscout")]
#[command(about = "Search for local businesses and unlock their contact details")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the API base URL from config
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Bearer token for the API
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,

    /// Enable verbose logging (INFO level for all targets)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable trace logging (TRACE level for everything)
    #[arg(long, global = true)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "poller=debug").
    /// Can be specified multiple times. Targets are prefixed with "leadscout::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL", global = true)]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a search and wait for the preview
    Search {
        /// Business keywords, e.g. "plumbers"
        keywords: String,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        state: Option<String>,
        /// Two-letter country code
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        county: Option<String>,
        #[arg(long)]
        postal_code: Option<String>,
        /// Unlock this many leads once the preview is ready
        #[arg(long, value_name = "BATCH")]
        unlock: Option<u64>,
    },
    /// Unlock leads of a past search
    Unlock {
        search_id: i64,
        /// Batch size; defaults to the smallest affordable batch
        batch: Option<u64>,
    },
    /// Show a past search, polling it if still running
    Open {
        search_id: i64,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Continue a background search interrupted by a previous run
    Resume,
    /// List past searches
    History {
        /// all, running, completed or has-available
        #[arg(long, default_value = "all")]
        filter: StatusCategory,
        /// Case-insensitive match on keywords or location
        #[arg(long, default_value = "")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides.clone(),
        cli.log_format,
    );
    logging::init(&log_config);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env();
    config.apply_overrides(cli.api_url.clone(), cli.token.clone());
    tracing::info!(target: "leadscout::startup", "Loaded configuration (api: {})", config.api_base_url);

    let client = Arc::new(HttpSearchClient::new(config.client_config())?);
    let pointers = Arc::new(SqlitePointerStore::open(&config.state_path)?);
    tracing::info!(target: "leadscout::startup", "Opened state at {:?}", config.state_path);

    let controller = DiscoverySessionController::new(client, pointers, config.discovery_config());
    let result = run(&controller, cli.command).await;

    // Keeps the deepening pointer if a background search is still running
    controller.teardown();
    result
}

async fn run(controller: &DiscoverySessionController, command: Command) -> Result<()> {
    match command {
        Command::Search {
            keywords,
            city,
            state,
            country,
            county,
            postal_code,
            unlock,
        } => {
            let form = SearchForm {
                keywords,
                country_code: country.unwrap_or_default(),
                city: city.unwrap_or_default(),
                state: state.unwrap_or_default(),
                county: county.unwrap_or_default(),
                postal_code: postal_code.unwrap_or_default(),
            };
            controller.open_form();
            controller.submit_search(form).await?;
            if !settle(controller).await? {
                return Ok(());
            }
            print!("{}", render::render_view(&controller.view()));

            if let Some(batch) = unlock {
                unlock_and_wait(controller, Some(batch)).await?;
            }
        }
        Command::Unlock { search_id, batch } => {
            open_from_history(controller, SearchId(search_id)).await?;
            if !settle(controller).await? {
                return Ok(());
            }
            if controller.view().phase != Phase::PreviewReady {
                print!("{}", render::render_view(&controller.view()));
                bail!("Search {} has no results to unlock", search_id);
            }
            unlock_and_wait(controller, batch).await?;
        }
        Command::Open { search_id, page } => {
            open_from_history(controller, SearchId(search_id)).await?;
            if !settle(controller).await? {
                return Ok(());
            }
            if page > 1 && controller.view().phase == Phase::PreviewReady {
                if let Err(e) = controller.load_page(page).await {
                    tracing::warn!(target: "leadscout::preview", "Failed to load page {}: {}", page, e);
                }
            }
            print!("{}", render::render_view(&controller.view()));
        }
        Command::Resume => match controller.resume().await? {
            Some(pointer) => {
                println!("Resuming search for more {} leads...", pointer.query_text);
                if settle(controller).await? {
                    print!("{}", render::render_view(&controller.view()));
                }
            }
            None => println!("No background search in progress."),
        },
        Command::History { filter, text } => {
            controller.history().refresh().await?;
            let entries = controller.history().list(&HistoryFilter::new(filter, text));
            print!("{}", render::render_history(&entries));
        }
    }
    Ok(())
}

async fn open_from_history(controller: &DiscoverySessionController, search_id: SearchId) -> Result<()> {
    controller.history().refresh().await?;
    controller.history().resume(controller, search_id).await?;
    Ok(())
}

async fn unlock_and_wait(controller: &DiscoverySessionController, batch: Option<u64>) -> Result<()> {
    let outcome = controller.request_unlock(batch).await?;
    print!("{}", render::render_outcome(&outcome));
    if outcome.deepening.is_some() && settle(controller).await? {
        print!("{}", render::render_view(&controller.view()));
    }
    Ok(())
}

/// Wait for the active poll to finish. Returns false if interrupted.
async fn settle(controller: &DiscoverySessionController) -> Result<bool> {
    let mut events = BroadcastStream::new(controller.subscribe());
    let mut check = tokio::time::interval(Duration::from_secs(1));
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(event)) => {
                    tracing::debug!(target: "leadscout::session", "Event: {:?}", event);
                    match event {
                        DiscoveryEvent::StatusUpdated { progress, unique_records, .. }
                            if controller.view().searching =>
                        {
                            eprintln!("Searching... {:.0}% ({} found so far)", progress, unique_records);
                        }
                        DiscoveryEvent::SearchCompleted { .. }
                        | DiscoveryEvent::SearchFailed { .. }
                        | DiscoveryEvent::DeepeningFinished { .. } => return Ok(true),
                        _ => {}
                    }
                }
                // Lagged; the periodic check below still sees the end
                Some(Err(_)) => {}
                None => return Ok(true),
            },
            _ = check.tick() => {
                if controller.poller().active().is_none() {
                    return Ok(true);
                }
            }
            result = &mut interrupt => {
                result?;
                eprintln!("Interrupted.");
                return Ok(false);
            }
        }
    }
}
