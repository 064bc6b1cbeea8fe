use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Parser};
use tracing_subscriber::EnvFilter;

use garmin_ingest::batch::{BatchDriver, IngestContext, Selection};
use garmin_ingest::fields::ZeroPolicy;
use garmin_ingest::store::GarminStore;
use garmin_ingest::units::UnitSystem;
use garmin_ingest::{IngestError, Result};

#[derive(Parser)]
#[command(name = "garmin-ingest")]
#[command(author, version, about = "Import Garmin activity exports into a SQLite database", long_about = None)]
#[command(group(ArgGroup::new("input").required(true).args(["input_file", "input_dir"])))]
struct Cli {
    /// Single file to ingest
    #[arg(short = 'i', long, value_name = "FILE")]
    input_file: Option<PathBuf>,

    /// Directory of files to ingest
    #[arg(short = 'd', long, value_name = "DIR")]
    input_dir: Option<PathBuf>,

    /// Only ingest files newer than the latest stored activity
    #[arg(short = 'l', long, requires = "input_dir")]
    latest: bool,

    /// SQLite database path
    #[arg(short = 's', long, value_name = "PATH", env = "GARMIN_INGEST_DB")]
    sqlite: PathBuf,

    /// Statute units: miles, feet
    #[arg(short = 'e', long)]
    english: bool,

    /// Store zero readings instead of treating them as unreported
    #[arg(long)]
    keep_zero_values: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "garmin_ingest=info",
        1 => "garmin_ingest=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let store = GarminStore::open(&cli.sqlite)?;

    let ctx = IngestContext {
        units: if cli.english {
            UnitSystem::Statute
        } else {
            UnitSystem::Metric
        },
        zero_policy: if cli.keep_zero_values {
            ZeroPolicy::ZeroIsValue
        } else {
            ZeroPolicy::ZeroIsAbsent
        },
    };

    let selection = match (&cli.input_file, &cli.input_dir) {
        (Some(file), _) => Selection::File(file.clone()),
        (None, Some(dir)) => Selection::Directory {
            root: dir.clone(),
            latest: cli.latest,
        },
        (None, None) => return Err(IngestError::config("no input file or directory")),
    };

    let stats = BatchDriver::new(&store, ctx).run(&selection)?;
    println!("Processed {} files, skipped {}", stats.processed, stats.skipped);
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
