//! daybook CLI - Daily asset price history acquirer.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod display;
mod log;

#[derive(Parser)]
#[command(name = "daybook")]
#[command(about = "Acquire and store daily asset price history", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress progress output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Database file path. Defaults to the platform data directory.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// API key for the remote data source (overrides COINGECKO_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and store one asset for one date
    Fetch {
        /// Asset identifier (e.g. bitcoin)
        asset: String,

        /// Date to fetch (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,

        /// Replace an existing record instead of leaving it untouched
        #[arg(long)]
        overwrite: bool,

        /// Also dump the raw payload as <DIR>/<asset>/<asset>_<date>.json
        #[arg(long, value_name = "DIR")]
        dump: Option<PathBuf>,
    },

    /// Fetch and store a date range for one or more assets
    Bulk {
        /// Asset identifiers (e.g. bitcoin ethereum)
        #[arg(required = true)]
        assets: Vec<String>,

        /// Start date (YYYY-MM-DD), inclusive
        #[arg(short, long)]
        start: String,

        /// End date (YYYY-MM-DD), inclusive
        #[arg(short, long)]
        end: String,

        /// Maximum concurrent units. Defaults to available parallelism.
        #[arg(long)]
        concurrency: Option<usize>,

        /// Process units strictly one at a time
        #[arg(long, conflicts_with = "concurrency")]
        sequential: bool,

        /// Replace existing records instead of leaving them untouched
        #[arg(long)]
        overwrite: bool,

        /// Fetch attempts allowed per minute across all workers
        #[arg(long, default_value_t = commands::DEFAULT_RATE_LIMIT)]
        rate_limit: usize,
    },

    /// Fetch yesterday's record for the configured assets
    Daily {
        /// Asset identifiers (defaults to bitcoin, ethereum, cardano)
        #[arg(short, long = "asset")]
        assets: Vec<String>,

        /// Replace existing records instead of leaving them untouched
        #[arg(long)]
        overwrite: bool,

        /// Fetch attempts allowed per minute across all workers
        #[arg(long, default_value_t = commands::DEFAULT_RATE_LIMIT)]
        rate_limit: usize,
    },

    /// Import previously dumped payload files into the store
    Import {
        /// Directory laid out as <DIR>/<asset>/<asset>_<date>.json
        dir: PathBuf,

        /// Replace existing records instead of leaving them untouched
        #[arg(long)]
        overwrite: bool,
    },

    /// Show stored monthly min/max aggregates for an asset
    Aggregates {
        /// Asset identifier
        asset: String,

        /// Filter by year
        #[arg(short, long)]
        year: Option<i32>,

        /// Filter by month (1-12)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize the database schema
    Init,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    log::init_logging(cli.verbose);

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Fetch {
            asset,
            date,
            overwrite,
            dump,
        } => commands::fetch::fetch(&asset, &date, overwrite, dump, cli.db, cli.api_key).await,
        Commands::Bulk {
            assets,
            start,
            end,
            concurrency,
            sequential,
            overwrite,
            rate_limit,
        } => {
            commands::bulk::bulk(
                &assets,
                &start,
                &end,
                if sequential { Some(1) } else { concurrency },
                overwrite,
                rate_limit,
                cli.quiet,
                cli.db,
                cli.api_key,
            )
            .await
        }
        Commands::Daily {
            assets,
            overwrite,
            rate_limit,
        } => {
            commands::daily::daily(&assets, overwrite, rate_limit, cli.quiet, cli.db, cli.api_key)
                .await
        }
        Commands::Import { dir, overwrite } => {
            commands::import::import(&dir, overwrite, cli.db).await
        }
        Commands::Aggregates {
            asset,
            year,
            month,
            json,
        } => commands::aggregates::aggregates(&asset, year, month, json, cli.db).await,
        Commands::Init => commands::init::init(cli.db).await,
    }
}
