#![deny(warnings)]

mod cli;
mod dataset;
mod diagnose;
mod generate;
mod offline;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use cli::{Command, DiagnoseArgs, ForecastArgs, GenerateArgs};
use common::timestamp;
use common::types::PlaceId;
use dataset::Dataset;
use forecast::ForecastSettings;
use forecast::forest::ForestParams;
use logging::*;

#[tokio::main]
async fn main() -> Result<()> {
    let log = DEFAULT.new(o!("function" => "main"));

    let cli = cli::Cli::parse();
    match &cli.command {
        Command::Generate(args) => {
            info!(log, "generating synthetic history");
            run_generate(args)
        }
        Command::Diagnose(args) => {
            info!(log, "diagnosing dataset");
            run_diagnose(args)
        }
        Command::Forecast(args) => {
            info!(log, "running offline forecast");
            run_forecast(args).await
        }
    }
}

fn run_generate(args: &GenerateArgs) -> Result<()> {
    let log = DEFAULT.new(o!("function" => "run_generate"));

    let params = generate::GenerateParams {
        days: args.days,
        until: args
            .parse_until()?
            .unwrap_or_else(|| Utc::now().date_naive()),
        places: args.places.iter().map(|p| PlaceId::new(p.as_str())).collect(),
        capacity: args.capacity,
        booking_chance: args.booking_chance,
        seed: args.seed,
    };
    let dataset = generate::generate(&params);
    dataset.write_to_file(&args.output)?;
    info!(log, "dataset written"; "path" => args.output.display().to_string());

    println!("\n=== Generated ===");
    println!("Places:       {}", dataset.places.len());
    println!("Readings:     {}", dataset.readings.len());
    println!("Reservations: {}", dataset.reservations.len());
    Ok(())
}

fn run_diagnose(args: &DiagnoseArgs) -> Result<()> {
    let dataset = Dataset::read_from_file(&args.input)?;
    diagnose::print_report(&diagnose::diagnose(&dataset));
    Ok(())
}

async fn run_forecast(args: &ForecastArgs) -> Result<()> {
    let log = DEFAULT.new(o!("function" => "run_forecast"));

    let dataset = Dataset::read_from_file(&args.input)?;
    let settings = ForecastSettings {
        place: args.place.as_deref().map(PlaceId::new),
        forest: ForestParams {
            tree_count: args.tree_count,
            seed: args.seed,
            ..ForestParams::default()
        },
        interpretation_offset: timestamp::parse_offset(&args.offset)?,
        ..ForecastSettings::default()
    };
    let now = args.parse_now()?.unwrap_or_else(Utc::now);

    let (report, records) = offline::run_forecast(&dataset, settings, now).await?;
    let json = serde_json::to_string_pretty(&records)?;
    std::fs::write(&args.output, json)?;
    info!(log, "forecasts written"; "path" => args.output.display().to_string());

    println!("\n=== Forecast ===");
    println!("Horizon start: {}", report.horizon_start);
    for place in &report.places {
        println!("{}: {:?}", place.place_id, place.outcome);
    }
    println!("Records: {}", records.len());
    Ok(())
}
