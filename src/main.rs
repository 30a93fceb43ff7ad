use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use flight_finder::config::ViabilityPolicy;
use flight_finder::models::validate_group;
use flight_finder::rate_limiter::spawn_window_ticker;
use flight_finder::search::{RankingPolicy, RetryPolicy};
use flight_finder::{
    DestinationRanker, FlightFinderConfig, FlightFinderError, LocationCatalog, PriceSearchEngine,
    RateLimiter, Ranking, ResultsStore, SearchDates, SkyscannerClient, Traveler, TripAggregator,
    telemetry,
};

#[derive(Parser)]
#[command(name = "flight-finder")]
#[command(version, about = "Find the cheapest destination for a group of travelers", long_about = None)]
struct Cli {
    /// Configuration file (default: <config dir>/flight-finder/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank candidate destinations by total group cost
    Search(SearchArgs),
    /// Print the saved result files
    Report,
    /// List candidate destinations
    Locations {
        /// Only list destinations in this country (repeatable)
        #[arg(long = "country", value_name = "NAME")]
        countries: Vec<String>,
    },
    /// Build a location catalog from one place query per line
    Discover {
        /// File with one query per line, e.g. city names
        #[arg(long)]
        input: PathBuf,
        /// Catalog to write (default: the configured catalog path)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// Group member as NAME=LOCATION_CODE (repeatable; default: configured travelers)
    #[arg(long = "traveler", value_name = "NAME=CODE")]
    travelers: Vec<Traveler>,

    /// Outbound date (YYYY-MM-DD)
    #[arg(long)]
    outbound: String,

    /// Inbound date (YYYY-MM-DD)
    #[arg(long)]
    inbound: String,

    /// Only consider destinations in this country (repeatable)
    #[arg(long = "country", value_name = "NAME")]
    countries: Vec<String>,

    /// Number of cheapest destinations to list
    #[arg(long)]
    top: Option<usize>,

    /// Let destinations where some travelers found no flight win
    #[arg(long)]
    allow_partial: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<FlightFinderError>() {
            Some(app_error) => eprintln!("Error: {}", app_error.user_message()),
            None => eprintln!("Error: {e}"),
        }
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = FlightFinderConfig::load_from_path(cli.config)?;
    telemetry::init_tracing(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Search(args) => search(config, args).await,
        Commands::Report => report(&config),
        Commands::Locations { countries } => locations(&config, &countries),
        Commands::Discover { input, output } => discover(&config, &input, output).await,
    }
}

/// Cancel `token` on Ctrl-C
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing with the results found so far");
            token.cancel();
        }
    });
}

async fn search(config: FlightFinderConfig, args: SearchArgs) -> Result<()> {
    let travelers = if args.travelers.is_empty() {
        config.travelers.clone()
    } else {
        args.travelers
    };
    validate_group(&travelers)?;
    let dates = SearchDates::parse(&args.outbound, &args.inbound)?;

    let countries = if args.countries.is_empty() {
        &config.locations.countries
    } else {
        &args.countries
    };
    let catalog = LocationCatalog::load(&config.locations.path)?.filter_by_country(countries);
    if catalog.is_empty() {
        warn!("No candidate destinations to evaluate");
    }

    config.require_api_key()?;
    let client = SkyscannerClient::new(&config.api)?;

    let mut search_config = config.search.clone();
    if args.allow_partial {
        search_config.viability = ViabilityPolicy::AnyPricedLeg;
    }
    if let Some(top) = args.top {
        search_config.top_k = top;
    }

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit.max_requests_per_window,
        config.rate_limit.window(),
    ));
    let ticker_stop = cancel.child_token();
    let ticker = spawn_window_ticker(limiter.clone(), ticker_stop.clone());

    let engine = PriceSearchEngine::new(client, limiter, RetryPolicy::from(&search_config))
        .with_cancellation(cancel.clone());
    let ranker = DestinationRanker::new(
        TripAggregator::new(engine),
        RankingPolicy::from(&search_config),
    );

    info!(
        "Searching {} destinations for {} travelers ({} - {})",
        catalog.len(),
        travelers.len(),
        dates.outbound,
        dates.inbound
    );
    let ranking = ranker.rank(catalog.list(), &travelers, &dates).await;

    ticker_stop.cancel();
    ticker.await.context("Rate window ticker panicked")?;

    let stats = ranker.aggregator().engine().stats();
    info!(
        sessions_created = stats.sessions_created,
        session_failures = stats.session_failures,
        polls = stats.polls,
        rate_limit_waits = stats.rate_limit_waits,
        resolved = stats.resolved,
        abandoned = stats.abandoned,
        "Search statistics"
    );

    let store = ResultsStore::from_config(&config.results);
    store.write(&ranking.itineraries, travelers.len())?;

    print_ranking(&ranking);
    Ok(())
}

fn print_ranking(ranking: &Ranking) {
    if ranking.cancelled {
        println!("Search was interrupted; results are partial.");
    }

    let (Some(best), Some(trip)) = (&ranking.cheapest, ranking.cheapest_trip()) else {
        println!("No destination had a price for the group.");
        return;
    };

    println!(
        "Cheapest destination: {} ({}) for ${:.2}",
        best.destination_name, best.destination, best.cost
    );
    for option in trip.options() {
        println!(
            "  {} -> {}  ${:.2}  {}",
            option.origin, option.destination, option.price, option.deeplink
        );
    }

    if ranking.top.len() > 1 {
        println!("\nCheapest destinations:");
        for (rank, entry) in ranking.top.iter().enumerate() {
            let partial = if entry.viable { "" } else { " (partial)" };
            println!(
                "  {:>2}. {} ({}) ${:.2}{partial}",
                rank + 1,
                entry.destination_name,
                entry.destination,
                entry.cost
            );
        }
    }
}

fn report(config: &FlightFinderConfig) -> Result<()> {
    let results = ResultsStore::from_config(&config.results).load()?;
    print!("{}", results.render_report());
    Ok(())
}

fn locations(config: &FlightFinderConfig, countries: &[String]) -> Result<()> {
    let countries = if countries.is_empty() {
        config.locations.countries.as_slice()
    } else {
        countries
    };
    let catalog = LocationCatalog::load(&config.locations.path)?.filter_by_country(countries);
    println!("{}", catalog.describe());
    println!("\n{} locations", catalog.len());
    Ok(())
}

async fn discover(
    config: &FlightFinderConfig,
    input: &Path,
    output: Option<PathBuf>,
) -> Result<()> {
    let queries = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    config.require_api_key()?;
    let client = SkyscannerClient::new(&config.api)?;

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let catalog = LocationCatalog::discover(
        &client,
        &queries,
        Duration::from_millis(config.locations.discovery_delay_ms),
        &cancel,
    )
    .await;

    let output = output.unwrap_or_else(|| PathBuf::from(&config.locations.path));
    catalog.save(&output)?;
    println!("Saved {} locations to {}", catalog.len(), output.display());
    Ok(())
}
