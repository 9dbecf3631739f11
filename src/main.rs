use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use route_report::config::{GeocodingMode, ReportConfig, SpecLimits};
use route_report::pipeline;

#[derive(Parser, Debug)]
#[command(name = "route_report")]
#[command(about = "PDF report generator for geolocated temperature/humidity telemetry", long_about = None)]
struct Args {
    /// Input spreadsheet (.xlsx first sheet, or .csv)
    input: PathBuf,

    /// Output PDF path
    #[arg(long, short, default_value = "relatorio.pdf")]
    output: PathBuf,

    /// Lower temperature spec limit (°C)
    #[arg(long, default_value = "15.0")]
    temp_lower: f64,

    /// Upper temperature spec limit (°C)
    #[arg(long, default_value = "30.0")]
    temp_upper: f64,

    /// Lower humidity spec limit (%UR)
    #[arg(long, default_value = "0.0")]
    humidity_lower: f64,

    /// Upper humidity spec limit (%UR)
    #[arg(long, default_value = "100.0")]
    humidity_upper: f64,

    /// Resolve addresses for every coordinate via reverse geocoding
    #[arg(long)]
    geocode: bool,

    /// Free-text observations printed on the cover page
    #[arg(long)]
    observations: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("route_report=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = ReportConfig {
        temperature: SpecLimits::new(args.temp_lower, args.temp_upper),
        humidity: SpecLimits::new(args.humidity_lower, args.humidity_upper),
        geocoding: if args.geocode {
            GeocodingMode::WithAddresses
        } else {
            GeocodingMode::WithoutAddresses
        },
        observations: args.observations,
    };

    let summary = pipeline::run(&args.input, &args.output, &config)?;

    info!(
        "Done: {} readings across {} buckets, {} pages at {}",
        summary.readings,
        summary.buckets,
        summary.pages,
        summary.output.display()
    );
    Ok(())
}
