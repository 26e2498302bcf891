use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use innkeep::catalogue::PropertyCatalogue;
use innkeep::engine::{Engine, EngineSettings};
use innkeep::record::{Record, Table};
use innkeep::wal_store::WalStore;

#[derive(Parser)]
#[command(name = "innkeep")]
#[command(about = "Hotel inventory and occupancy reports over a booking log")]
struct Cli {
    /// Directory holding the booking log
    #[arg(long, env = "INNKEEP_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Property catalogue JSON (default: built-in catalogue)
    #[arg(long, env = "INNKEEP_PROPERTIES")]
    properties: Option<PathBuf>,

    /// Serve Prometheus metrics on this port
    #[arg(long, env = "INNKEEP_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Log appends before the background compactor rewrites the log
    #[arg(long, env = "INNKEEP_COMPACT_THRESHOLD", default_value_t = 1000)]
    compact_threshold: u64,

    /// Withholding rate applied to each day's receivable
    #[arg(long, env = "INNKEEP_TDS_RATE", default_value = "0.003")]
    tds_rate: Decimal,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a JSON array of booking rows into one table
    Import {
        /// direct or online
        #[arg(value_parser = parse_table)]
        table: Table,
        file: PathBuf,
    },

    /// Every property's slot board for one night
    Board { date: NaiveDate },

    /// Sold and unsold counts per property for every day of a month
    Matrix { year: i32, month: u32 },

    /// Daily accounting rows and totals for a month
    Accounting { year: i32, month: u32 },

    /// One property's month roll-up
    Summary { property: String, year: i32, month: u32 },

    /// Free physical slots at a property on one night
    Availability { property: String, date: NaiveDate },

    /// Bookings checking in on a date
    Arrivals { date: NaiveDate },

    /// Bookings made on a date
    Booked { date: NaiveDate },

    /// Rewrite the booking log down to the live rows
    Compact,
}

fn parse_table(raw: &str) -> Result<Table, String> {
    Table::parse(raw).ok_or_else(|| format!("unknown table: {raw} (expected direct or online)"))
}

fn print<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    innkeep::observability::init(cli.metrics_port)?;

    let catalogue = match &cli.properties {
        Some(path) => PropertyCatalogue::from_json(&std::fs::read_to_string(path)?)?,
        None => PropertyCatalogue::builtin()?,
    };

    std::fs::create_dir_all(&cli.data_dir)?;
    let store = Arc::new(WalStore::open(&cli.data_dir.join("bookings.wal"))?);
    info!("innkeep data_dir: {}", cli.data_dir.display());
    info!(
        "  properties: {}",
        cli.properties.as_ref().map_or("built-in".into(), |p| p.display().to_string())
    );
    info!("  rows: {}", store.len());

    tokio::spawn(innkeep::compactor::run_compactor(
        store.clone(),
        cli.compact_threshold,
        Duration::from_secs(30),
    ));

    let settings = EngineSettings { tds_rate: cli.tds_rate };
    let engine = Engine::new(Arc::new(catalogue), store.clone(), settings);

    match cli.command {
        Commands::Import { table, file } => {
            let raw = std::fs::read_to_string(file)?;
            let rows: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(&raw)?;
            let records: Vec<Record> = rows.iter().map(|row| Record::from_json_row(table, row)).collect();
            print(&engine.import(records).await?)?;
        }
        Commands::Board { date } => print(&engine.daily_board(date).await?)?,
        Commands::Matrix { year, month } => print(&engine.monthly_matrix(year, month).await?)?,
        Commands::Accounting { year, month } => print(&engine.month_accounting(year, month).await?)?,
        Commands::Summary { property, year, month } => {
            print(&engine.property_summary(&property, year, month).await?)?
        }
        Commands::Availability { property, date } => print(&engine.availability(&property, date).await?)?,
        Commands::Arrivals { date } => print(&engine.bookings_checking_in_on(date).await?)?,
        Commands::Booked { date } => print(&engine.bookings_booked_on(date).await?)?,
        Commands::Compact => {
            store.compact().await?;
            info!("compaction complete ({} rows)", store.len());
        }
    }

    Ok(())
}
