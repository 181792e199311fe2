use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use chrono::Local;
use log::{info, warn};
use thiserror::Error;

use crate::batch_planner::{self, PlanError};
use crate::config::TrackerConfig;
use crate::extractor::Extractor;
use crate::fetcher::FetchEngine;
use crate::input_loader;
use crate::report::{self, TrackReport};
use crate::verifier;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Run the whole tracker against one manifest file: load and filter the
/// manifest, scrape the carrier pages until complete or out of attempts,
/// then extract and normalize the shipment rows.
///
/// Returns the in-memory report; persisting it is the caller's step.
pub fn run_tracker(
    cfg: &TrackerConfig,
    engine: &dyn FetchEngine,
    manifest_path: &Path,
) -> Result<TrackReport, TrackerError> {
    let started = Instant::now();

    // 1. Manifest to query plan
    info!("Stage 1/3: Retrieving data from the manifest...");
    let manifest_rows = input_loader::load_rows(manifest_path);
    let references = input_loader::trackable_references(&manifest_rows, cfg);
    let targets = batch_planner::plan_targets(&references, cfg)?;

    // 2. Scrape until every shipment number was seen, or give up
    info!("Stage 2/3: Scraping and reviewing the carrier tracking pages...");
    let outcome = verifier::collect_complete(engine, &targets, &references, cfg);

    // 3. Extracted markup to normalized report rows
    info!("Stage 3/3: Creating the track report...");
    let extractor = Extractor::new(&cfg.reference_prefix);
    let mut records = Vec::new();
    for capture in &outcome.captures {
        records.extend(extractor.extract_records(&capture.html));
    }

    // One row per shipment number, first extraction wins.
    let mut seen = HashSet::new();
    records.retain(|record| match &record.shipment_number {
        Some(number) => seen.insert(number.clone()),
        None => true,
    });

    let rows = report::normalize_records(records, cfg, Local::now().naive_local());

    let extracted_numbers: HashSet<&str> = rows
        .iter()
        .filter_map(|row| row.shipment_number.as_deref())
        .collect();
    let mut missing_references: Vec<String> = references
        .iter()
        .filter(|reference| !extracted_numbers.contains(reference.as_str()))
        .cloned()
        .collect();
    missing_references.sort();

    let report = TrackReport {
        rows,
        expected: outcome.expected,
        found: outcome.found,
        attempts: outcome.attempts,
        warnings: outcome.warnings,
        missing_references,
    };

    info!(
        "Track report ready: {} row(s), {} of {} shipment numbers found after {} attempt(s), elapsed {:.2?}",
        report.rows.len(),
        report.found,
        report.expected,
        report.attempts,
        started.elapsed()
    );
    if !report.missing_references.is_empty() {
        warn!(
            "Shipment numbers to check: {}",
            report.missing_references.join(", ")
        );
    }

    Ok(report)
}
