use std::collections::HashSet;

use log::info;
use thiserror::Error;
use url::Url;

use crate::config::TrackerConfig;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("constructed tracking URL is invalid ({url}): {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
}

/// One batched tracking query: up to `batch_size` shipment numbers and the
/// URL that asks the carrier page for all of them at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    pub references: Vec<String>,
    pub url: String,
}

/// Partition the unique shipment numbers into fixed-size groups and build
/// one tracking URL per group.
///
/// The numbers are sorted first so the same manifest always produces the
/// same URLs, which keeps retry passes comparable across runs.
pub fn plan_targets(
    references: &HashSet<String>,
    cfg: &TrackerConfig,
) -> Result<Vec<FetchTarget>, PlanError> {
    let mut sorted: Vec<String> = references.iter().cloned().collect();
    sorted.sort();

    let mut targets = Vec::new();
    for chunk in sorted.chunks(cfg.batch_size) {
        let url = format!(
            "{}?searchType=con&cons={}",
            cfg.base_tracking_url,
            chunk.join(",")
        );
        if let Err(source) = Url::parse(&url) {
            return Err(PlanError::InvalidUrl { url, source });
        }
        targets.push(FetchTarget {
            references: chunk.to_vec(),
            url,
        });
    }

    info!(
        "Planned {} tracking URL(s) for {} shipment number(s)",
        targets.len(),
        sorted.len()
    );
    Ok(targets)
}
