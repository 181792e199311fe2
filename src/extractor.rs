use std::collections::HashMap;

use log::debug;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Field names used in the selector schema below.
pub mod fields {
    pub const CLIENT_REFERENCE: &str = "client_reference";
    pub const SHIPMENT_NUMBER: &str = "shipment_number";
    pub const STATUS: &str = "status";
    pub const ORIGIN_DATE: &str = "origin_date";
    pub const DESTINATION: &str = "destination";
    pub const LAST_UPDATE: &str = "last_update";
    pub const LAST_ACTION_CELL: &str = "last_action_cell";
}

/// One result container per shipment inside a batched tracking page.
const CONTAINER_SELECTOR: &str = "pb-search-results > div.__u-mb--xl > div";

/// Warning badge the page shows when the carrier raised an exception.
const WARNING_BADGE_SELECTOR: &str = ".__c-badge.__c-badge--warning";

/// Extraction schema: field name to CSS rule, relative to one shipment
/// container. The page layout is versioned by the carrier, not by us, so
/// keeping the rules in one table makes the inevitable breakage cheap to
/// repair.
const FIELD_SELECTORS: &[(&str, &str)] = &[
    (
        fields::CLIENT_REFERENCE,
        "pb-shipment-reference div dl dd:nth-child(4)",
    ),
    (
        fields::SHIPMENT_NUMBER,
        "pb-shipment-reference div dl dd:nth-child(2)",
    ),
    (
        fields::STATUS,
        "pb-shipment div div.__c-shipment__details sham-shipment-status-tnt > div > div.__c-shipment-status-tnt__summary > sham-step-label",
    ),
    (
        fields::ORIGIN_DATE,
        "pb-shipment div div.__c-shipment__details sham-shipment-addresses > div > div.__c-shipment-address.__c-shipment-address--from > div.__c-shipment-address__text > div:nth-child(3) > sham-shipment-origin-date",
    ),
    (
        fields::DESTINATION,
        "pb-shipment div div.__c-shipment__details sham-shipment-addresses > div > div.__c-shipment-address.__c-shipment-address--to > div:nth-child(2) > div.__c-heading.__c-heading--h4.__c-heading--bold.__u-mb--none",
    ),
    (
        fields::LAST_UPDATE,
        "pb-shipment div div.__c-shipment__history.__u-print-only sham-shipment-history > table > tbody > tr:nth-child(1) > td.__c-shipment-history__date",
    ),
    (
        fields::LAST_ACTION_CELL,
        "pb-shipment div div.__c-shipment__history sham-shipment-history > table > tbody > tr:nth-child(1) > td:nth-child(3)",
    ),
];

/// One extracted shipment, fields still in the raw text form the page
/// serves them in. Date fields are normalized later by the report stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShipmentRecord {
    pub client_reference: String,
    pub shipment_number: Option<String>,
    pub status: Option<String>,
    pub origin_date: Option<String>,
    pub destination: Option<String>,
    pub last_update: Option<String>,
    pub last_location: Option<String>,
    pub last_action: Option<String>,
    pub exception: bool,
}

pub struct Extractor {
    container: Selector,
    warning_badge: Selector,
    schema: HashMap<&'static str, Selector>,
    whitespace: Regex,
    reference_prefix: String,
}

impl Extractor {
    pub fn new(reference_prefix: &str) -> Self {
        let mut schema = HashMap::new();
        for (field, rule) in FIELD_SELECTORS {
            schema.insert(*field, Selector::parse(rule).unwrap());
        }
        Extractor {
            container: Selector::parse(CONTAINER_SELECTOR).unwrap(),
            warning_badge: Selector::parse(WARNING_BADGE_SELECTOR).unwrap(),
            schema,
            whitespace: Regex::new(r"\s+").unwrap(),
            reference_prefix: reference_prefix.to_string(),
        }
    }

    /// Parse one rendered tracking page into shipment records.
    ///
    /// Containers whose client reference is absent or does not carry our
    /// prefix belong to somebody else's shipments and are skipped before a
    /// record exists. Every other field tolerates a missing element.
    pub fn extract_records(&self, html: &str) -> Vec<ShipmentRecord> {
        let document = Html::parse_document(html);
        let mut records = Vec::new();

        for container in document.select(&self.container) {
            let client_reference = match self.field_text(container, fields::CLIENT_REFERENCE) {
                Some(reference) => reference,
                None => {
                    debug!("Skipping container without a client reference");
                    continue;
                }
            };
            if !client_reference.starts_with(&self.reference_prefix) {
                debug!("Skipping foreign shipment {}", client_reference);
                continue;
            }

            let (last_location, last_action) =
                match self.field_text(container, fields::LAST_ACTION_CELL) {
                    Some(cell) => split_location_action(&cell),
                    None => (None, None),
                };

            records.push(ShipmentRecord {
                client_reference,
                shipment_number: self.field_text(container, fields::SHIPMENT_NUMBER),
                status: self.field_text(container, fields::STATUS),
                origin_date: self.field_text(container, fields::ORIGIN_DATE),
                destination: self.field_text(container, fields::DESTINATION),
                last_update: self.field_text(container, fields::LAST_UPDATE),
                last_location,
                last_action,
                exception: container.select(&self.warning_badge).next().is_some(),
            });
        }

        records
    }

    fn field_text(&self, scope: ElementRef, field: &'static str) -> Option<String> {
        let selector = &self.schema[field];
        let element = scope.select(selector).next()?;
        let joined = element.text().collect::<Vec<_>>().join(" ");
        let cleaned = self.whitespace.replace_all(&joined, " ");
        let trimmed = cleaned.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// The history table shows "LOCATION - action text" in a single cell. Split
/// on the first dash; a cell without one is all action, no location.
pub fn split_location_action(cell: &str) -> (Option<String>, Option<String>) {
    match cell.split_once('-') {
        Some((location, action)) => (Some(location.to_string()), Some(action.to_string())),
        None => (None, Some(cell.to_string())),
    }
}
