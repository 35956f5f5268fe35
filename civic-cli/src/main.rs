//! Civic CLI - duplicate detection and similarity search for complaint media.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use civic_core::EngineConfig;
use colored::Colorize;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;
use utils::Output;

const AFTER_HELP: &str = "Exit codes:
  0   Success (for check: no duplicate)
  1   General error
  64  Usage error
  65  Duplicate found
  66  Input file missing or unreadable
  74  Cannot write records file";

#[derive(Parser)]
#[command(name = "civic")]
#[command(author, version, about = "Duplicate detection for civic complaint media", long_about = None)]
#[command(after_help = AFTER_HELP)]
struct Cli {
    /// Records file (JSON snapshot of stored media and cases)
    #[arg(long, global = true, env = "CIVIC_RECORDS", default_value = "civic-records.json")]
    records: PathBuf,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Suppress human-readable output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Optional `--lat`/`--lon` pair.
#[derive(Args, Debug, Clone, Copy)]
struct LocationArgs {
    /// Latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the perceptual fingerprint of one or more images
    Fingerprint {
        /// Image files
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// Check whether an image duplicates a stored record
    Check {
        /// Image file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        location: LocationArgs,

        /// Same-location radius in meters
        #[arg(long)]
        distance: Option<f64>,

        /// Same-content Hamming threshold in bits
        #[arg(long)]
        hash_threshold: Option<u32>,
    },

    /// Rank stored records by visual similarity to an image
    Search {
        /// Image file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        location: LocationArgs,

        /// Only consider records within this many meters
        #[arg(long)]
        max_distance: Option<f64>,

        /// Hamming threshold in bits
        #[arg(long)]
        hash_threshold: Option<u32>,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,

        /// Record id to leave out of the results
        #[arg(long)]
        exclude_id: Option<i64>,
    },

    /// List stored records near a location
    Nearby {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Search radius in meters
        #[arg(long)]
        max_distance: Option<f64>,

        /// Only records filed under this issue type
        #[arg(long)]
        issue_type: Option<String>,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List cases of one issue type, optionally near a location
    Cases {
        /// Issue type, e.g. "pothole" or "garbage"
        #[arg(value_name = "ISSUE_TYPE")]
        issue_type: String,

        #[command(flatten)]
        location: LocationArgs,

        /// Search radius in meters
        #[arg(long)]
        max_distance: Option<f64>,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Plan tickets for a multi-file submission
    Batch {
        /// Media files in submission order
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// JSON manifest keyed by file name with location and detections
        #[arg(long, value_name = "JSON")]
        manifest: Option<PathBuf>,

        /// Authority routing table (JSON object of issue label to authority)
        #[arg(long, value_name = "JSON")]
        authorities: Option<PathBuf>,
    },

    /// Check an image and store it if it is not a duplicate
    Ingest {
        /// Image file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Sub-case the media is filed under
        #[arg(long)]
        sub_case: String,

        #[command(flatten)]
        location: LocationArgs,

        /// Same-location radius in meters
        #[arg(long)]
        distance: Option<f64>,

        /// Same-content Hamming threshold in bits
        #[arg(long)]
        hash_threshold: Option<u32>,
    },
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("civic_core=debug,civic=debug,warn"),
        _ => EnvFilter::new("civic_core=trace,civic=trace,info"),
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let out = Output {
        json: cli.json,
        quiet: cli.quiet,
    };
    let config = EngineConfig::from_env();
    let records = cli.records;

    match cli.command {
        Commands::Fingerprint { files } => commands::fingerprint::execute(files, out).await,
        Commands::Check {
            file,
            location,
            distance,
            hash_threshold,
        } => {
            let coordinate = utils::coordinate_from_args(location.lat, location.lon)?;
            let config = EngineConfig {
                duplicate_distance_m: distance.unwrap_or(config.duplicate_distance_m),
                duplicate_hash_threshold: hash_threshold.unwrap_or(config.duplicate_hash_threshold),
                ..config
            };
            commands::check::execute(file, coordinate, &records, &config, out).await
        }
        Commands::Search {
            file,
            location,
            max_distance,
            hash_threshold,
            limit,
            exclude_id,
        } => {
            let params = civic_core::SearchQuery {
                coordinate: utils::coordinate_from_args(location.lat, location.lon)?,
                max_distance_m: max_distance,
                hash_threshold: hash_threshold.unwrap_or(config.similarity_hash_threshold),
                limit: limit.unwrap_or(config.similarity_limit),
                exclude_id,
            };
            commands::search::execute(file, params, &records, out).await
        }
        Commands::Nearby {
            lat,
            lon,
            max_distance,
            issue_type,
            limit,
        } => {
            let center = civic_core::Coordinate::new(lat, lon)?;
            let params = civic_core::LocationQuery {
                max_distance_m: max_distance.unwrap_or(config.location_search_distance_m),
                issue_type,
                limit: limit.unwrap_or(config.location_search_limit),
            };
            commands::nearby::execute(center, params, &records, out)
        }
        Commands::Cases {
            issue_type,
            location,
            max_distance,
            limit,
        } => {
            let coordinate = utils::coordinate_from_args(location.lat, location.lon)?;
            let max_distance = max_distance.or(coordinate.map(|_| config.location_search_distance_m));
            let limit = limit.unwrap_or(config.location_search_limit);
            commands::cases::execute(&issue_type, coordinate, max_distance, limit, &records, out)
        }
        Commands::Batch {
            files,
            manifest,
            authorities,
        } => {
            commands::batch::execute(files, manifest, authorities, &records, &config, out).await
        }
        Commands::Ingest {
            file,
            sub_case,
            location,
            distance,
            hash_threshold,
        } => {
            let coordinate = utils::coordinate_from_args(location.lat, location.lon)?;
            let config = EngineConfig {
                duplicate_distance_m: distance.unwrap_or(config.duplicate_distance_m),
                duplicate_hash_threshold: hash_threshold.unwrap_or(config.duplicate_hash_threshold),
                ..config
            };
            commands::ingest::execute(file, sub_case, coordinate, &records, &config, out).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            let exit = ExitCode::from_anyhow(&err);
            if let Some(message) = exit.message {
                eprintln!("{} {}", "error:".red().bold(), message);
            }
            exit.code
        }
    };

    std::process::exit(code);
}
