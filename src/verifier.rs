use std::collections::HashSet;

use log::{info, warn};

use crate::batch_planner::FetchTarget;
use crate::config::TrackerConfig;
use crate::fetcher::{run_fetch_pass, FetchEngine, RawCapture};

/// Completeness check states. A run always terminates in `Satisfied` or
/// `Exhausted`; the other two are the intermediate steps of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyState {
    Checking,
    Refetching,
    Satisfied,
    Exhausted,
}

#[derive(Debug)]
pub struct CompletenessOutcome {
    pub captures: Vec<RawCapture>,
    pub state: VerifyState,
    pub found: usize,
    pub expected: usize,
    pub attempts: u32,
    pub warnings: Vec<String>,
}

/// Count how many expected shipment numbers appear somewhere in the
/// captured markup. This is substring containment against the raw pages,
/// not a structured comparison; it can overcount if a number shows up in
/// unrelated markup, but it is cheap and works before any parsing.
fn count_found(expected: &HashSet<String>, captures: &[RawCapture]) -> usize {
    expected
        .iter()
        .filter(|reference| {
            captures
                .iter()
                .any(|capture| capture.html.contains(reference.as_str()))
        })
        .count()
}

/// Targets that still have at least one shipment number nobody captured.
fn incomplete_target_indices(targets: &[FetchTarget], captures: &[RawCapture]) -> Vec<usize> {
    targets
        .iter()
        .enumerate()
        .filter(|(_, target)| {
            target.references.iter().any(|reference| {
                !captures
                    .iter()
                    .any(|capture| capture.html.contains(reference.as_str()))
            })
        })
        .map(|(index, _)| index)
        .collect()
}

/// Fetch every target and keep re-fetching until all expected shipment
/// numbers show up in the captured markup or the attempt limit runs out.
///
/// An exhausted run is not an error: the tracker proceeds with whatever was
/// captured and the shortfall is reported so a human can decide to re-run.
pub fn collect_complete(
    engine: &dyn FetchEngine,
    targets: &[FetchTarget],
    expected: &HashSet<String>,
    cfg: &TrackerConfig,
) -> CompletenessOutcome {
    if expected.is_empty() {
        info!("No shipment numbers to track; skipping the scrape entirely.");
        return CompletenessOutcome {
            captures: Vec::new(),
            state: VerifyState::Satisfied,
            found: 0,
            expected: 0,
            attempts: 0,
            warnings: Vec::new(),
        };
    }

    let all_indices: Vec<usize> = (0..targets.len()).collect();
    let mut captures: Vec<RawCapture> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let mut attempts: u32 = 1;
    let mut found = 0usize;

    info!("Expected number of shipments: {}", expected.len());

    match run_fetch_pass(engine, targets, &all_indices, cfg) {
        Ok(new_captures) => captures = new_captures,
        Err(e) => {
            warn!("Scrape pass 1 aborted: {}", e);
            warnings.push(format!("scrape pass 1 aborted: {}", e));
        }
    }

    let mut state = VerifyState::Checking;
    loop {
        match state {
            VerifyState::Checking => {
                found = count_found(expected, &captures);
                if found == expected.len() {
                    info!(
                        "Attempt {} succeeded: found {} out of {} shipments.",
                        attempts,
                        found,
                        expected.len()
                    );
                    state = VerifyState::Satisfied;
                } else {
                    info!(
                        "Attempt {} unsucceeded: found {} out of {} shipments.",
                        attempts,
                        found,
                        expected.len()
                    );
                    state = VerifyState::Refetching;
                }
            }
            VerifyState::Refetching => {
                if attempts >= cfg.max_attempts {
                    let message = format!(
                        "gave up after {} attempts with {} of {} shipments found",
                        attempts,
                        found,
                        expected.len()
                    );
                    warn!("Unsuccessful scrape: {}. Proceeding with partial data.", message);
                    warnings.push(message);
                    state = VerifyState::Exhausted;
                    continue;
                }

                let indices = if cfg.refetch_incomplete_only {
                    incomplete_target_indices(targets, &captures)
                } else {
                    all_indices.clone()
                };
                info!(
                    "Scraping the carrier page again ({} of {} URL group(s))...",
                    indices.len(),
                    targets.len()
                );

                match run_fetch_pass(engine, targets, &indices, cfg) {
                    Ok(new_captures) => {
                        if indices.len() == targets.len() {
                            // Full pass: the fresh pages replace everything.
                            captures = new_captures;
                        } else {
                            // Partial pass: replace only the re-fetched groups.
                            captures
                                .retain(|capture| !indices.contains(&capture.target_index));
                            captures.extend(new_captures);
                        }
                    }
                    Err(e) => {
                        warn!("Scrape pass {} aborted: {}", attempts + 1, e);
                        warnings.push(format!("scrape pass {} aborted: {}", attempts + 1, e));
                    }
                }

                attempts += 1;
                state = VerifyState::Checking;
            }
            VerifyState::Satisfied | VerifyState::Exhausted => break,
        }
    }

    CompletenessOutcome {
        captures,
        state,
        found,
        expected: expected.len(),
        attempts,
        warnings,
    }
}
