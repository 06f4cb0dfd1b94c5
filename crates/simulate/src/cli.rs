use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "simulate", about = "Offline room history and forecast tooling")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate synthetic readings and reservations
    Generate(GenerateArgs),
    /// Report how readings line up with reservations
    Diagnose(DiagnoseArgs),
    /// Run one forecast cycle against a dataset file
    Forecast(ForecastArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Number of days of history before the end date
    #[arg(long, default_value = "30")]
    pub days: u32,

    /// Last day (exclusive, YYYY-MM-DD); today when omitted
    #[arg(long)]
    pub until: Option<String>,

    /// Comma-separated place ids
    #[arg(long, value_delimiter = ',', default_value = "room1")]
    pub places: Vec<String>,

    /// Seats per place
    #[arg(long, default_value = "5")]
    pub capacity: u32,

    /// Booking chance per idle 10-minute slot (0.0-1.0)
    #[arg(long, default_value = "0.2")]
    pub booking_chance: f64,

    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Output file path for the dataset JSON
    #[arg(long, default_value = "dataset.json")]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct DiagnoseArgs {
    /// Dataset JSON written by `generate` (or exported from the store)
    #[arg(long, default_value = "dataset.json")]
    pub input: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ForecastArgs {
    #[arg(long, default_value = "dataset.json")]
    pub input: PathBuf,

    /// Only forecast this place; every active place otherwise
    #[arg(long)]
    pub place: Option<String>,

    /// Cycle time (RFC 3339); now when omitted
    #[arg(long)]
    pub now: Option<String>,

    /// Offset hours and weekdays are read in, e.g. +03:00
    #[arg(long, default_value = "+00:00")]
    pub offset: String,

    #[arg(long, default_value = "50")]
    pub tree_count: usize,

    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Output file path for the forecast JSON
    #[arg(long, default_value = "forecasts.json")]
    pub output: PathBuf,
}

impl GenerateArgs {
    pub fn parse_until(&self) -> anyhow::Result<Option<chrono::NaiveDate>> {
        self.until
            .as_deref()
            .map(|s| {
                chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|e| anyhow::anyhow!("Invalid until '{}': {}", s, e))
            })
            .transpose()
    }
}

impl ForecastArgs {
    pub fn parse_now(&self) -> anyhow::Result<Option<chrono::DateTime<chrono::Utc>>> {
        self.now
            .as_deref()
            .map(|s| {
                chrono::DateTime::parse_from_rfc3339(s)
                    .map(|t| t.with_timezone(&chrono::Utc))
                    .map_err(|e| anyhow::anyhow!("Invalid now '{}': {}", s, e))
            })
            .transpose()
    }
}
