use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use log::{error, info, warn};

use shipment_tracker_lib::{
    logger, pipeline, CsvReportWriter, HttpFetchEngine, ReportWriter, TrackerConfig,
};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to the shipment manifest (CSV or Excel)
    manifest: PathBuf,
    /// Path to a JSON settings file; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the report output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    logger::init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };
    if let Some(dir) = &args.output_dir {
        cfg.output_dir = dir.to_string_lossy().to_string();
    }
    cfg.validate()?;

    info!("Starting the {} shipment tracker...", cfg.carrier);

    let engine = HttpFetchEngine::from_config(&cfg);
    let report = pipeline::run_tracker(&cfg, &engine, &args.manifest)?;

    if report.expected == 0 {
        error!(
            "No trackable shipments in {:?}. Check the 'Carrier' and 'Status' columns.",
            args.manifest
        );
        return Ok(());
    }

    let path = CsvReportWriter.write(&report, &cfg, Local::now().naive_local())?;
    info!("Track report saved at {:?}", path);

    info!(
        "Found {} of {} expected shipments in {} attempt(s).",
        report.found, report.expected, report.attempts
    );
    if !report.is_complete() {
        warn!(
            "{} shipment number(s) missing from the report; consider re-running.",
            report.missing_references.len()
        );
    }

    let exceptions = report.exception_rows();
    if !exceptions.is_empty() {
        warn!("{} exception notification(s) detected!", exceptions.len());
        for row in exceptions {
            if let Some(number) = &row.shipment_number {
                info!("  {} -> {}", number, cfg.single_shipment_url(number));
            }
        }
    }

    Ok(())
}
