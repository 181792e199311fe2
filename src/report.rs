use chrono::{NaiveDate, NaiveDateTime};
use log::debug;

use crate::config::TrackerConfig;
use crate::extractor::ShipmentRecord;

/// The carrier serves the origin date as Spanish prose ("12 de enero de
/// 2024"). Month names are swapped lexically before parsing.
const MONTH_TRANSLATIONS: [(&str, &str); 12] = [
    ("enero", "January"),
    ("febrero", "February"),
    ("marzo", "March"),
    ("abril", "April"),
    ("mayo", "May"),
    ("junio", "June"),
    ("julio", "July"),
    ("agosto", "August"),
    ("septiembre", "September"),
    ("octubre", "October"),
    ("noviembre", "November"),
    ("diciembre", "December"),
];

const ORIGIN_DATE_INPUT_FORMAT: &str = "%d de %B de %Y";
const DATE_OUTPUT_FORMAT: &str = "%d/%m/%y";
const LAST_UPDATE_FORMAT: &str = "%d/%m/%y %H:%M";

pub const REPORT_COLUMNS: [&str; 10] = [
    "Client Reference",
    "Shipment Number",
    "TNT Status",
    "Shipment Origin Date",
    "Shipment Destination",
    "Processing Days",
    "Last Update",
    "Last Location",
    "Last Action",
    "TNT Exception Notification",
];

/// Shown in the report when the carrier flagged the shipment.
pub const EXCEPTION_MARKER: &str = "EXCEPTION ALERT";
/// A plain space, matching what downstream spreadsheet filters expect for
/// the quiet case.
pub const NO_EXCEPTION_MARKER: &str = " ";

/// One fully normalized report row.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedShipment {
    pub client_reference: String,
    pub shipment_number: Option<String>,
    pub status: Option<String>,
    pub origin_date: Option<NaiveDate>,
    pub destination: Option<String>,
    pub processing_days: Option<i64>,
    pub last_update: Option<NaiveDateTime>,
    pub last_location: Option<String>,
    pub last_action: Option<String>,
    pub exception: bool,
}

/// Parse the shipment origin date.
///
/// Accepts both the raw Spanish prose form and the already-normalized
/// `dd/mm/yy` rendering, so running the normalization twice is a no-op.
pub fn parse_origin_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_OUTPUT_FORMAT) {
        return Some(date);
    }

    let mut translated = trimmed.to_lowercase();
    for (spanish, english) in MONTH_TRANSLATIONS {
        if translated.contains(spanish) {
            translated = translated.replace(spanish, english);
            break;
        }
    }
    match NaiveDate::parse_from_str(&translated, ORIGIN_DATE_INPUT_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            debug!("Unparseable origin date {:?}: {}", raw, e);
            None
        }
    }
}

/// Parse the `dd/mm/yy HH:MM` timestamp of the latest history entry.
pub fn parse_last_update(raw: &str) -> Option<NaiveDateTime> {
    match NaiveDateTime::parse_from_str(raw.trim(), LAST_UPDATE_FORMAT) {
        Ok(ts) => Some(ts),
        Err(e) => {
            debug!("Unparseable last update {:?}: {}", raw, e);
            None
        }
    }
}

/// Days a shipment has spent with the carrier.
///
/// A shipment still moving (not delivered, no exception raised) is measured
/// against the current time; a closed one against its last history entry.
/// Any missing operand makes the answer unknowable, so it stays empty
/// instead of failing the row.
pub fn processing_days(
    status: Option<&str>,
    exception: bool,
    origin_date: Option<NaiveDate>,
    last_update: Option<NaiveDateTime>,
    now: NaiveDateTime,
    delivered_labels: &[String],
) -> Option<i64> {
    let origin = origin_date?.and_hms_opt(0, 0, 0)?;
    let delivered = status
        .map(|s| delivered_labels.iter().any(|label| label == s.trim()))
        .unwrap_or(false);

    if !delivered && !exception {
        Some((now - origin).num_days())
    } else {
        let last = last_update?;
        Some((last - origin).num_days())
    }
}

/// Run the whole normalization pipeline over the extracted records.
/// Each transform is total: a row that defeats one of them keeps null
/// derived fields rather than sinking the batch.
pub fn normalize_records(
    records: Vec<ShipmentRecord>,
    cfg: &TrackerConfig,
    now: NaiveDateTime,
) -> Vec<NormalizedShipment> {
    records
        .into_iter()
        .map(|record| {
            let origin_date = record.origin_date.as_deref().and_then(parse_origin_date);
            let last_update = record.last_update.as_deref().and_then(parse_last_update);
            let processing_days = processing_days(
                record.status.as_deref(),
                record.exception,
                origin_date,
                last_update,
                now,
                &cfg.delivered_labels,
            );
            NormalizedShipment {
                client_reference: record.client_reference,
                shipment_number: record.shipment_number,
                status: record.status,
                origin_date,
                destination: record.destination,
                processing_days,
                last_update,
                last_location: record.last_location,
                last_action: record.last_action,
                exception: record.exception,
            }
        })
        .collect()
}

impl NormalizedShipment {
    /// Render the row in the fixed report column order.
    pub fn to_row(&self) -> [String; 10] {
        [
            self.client_reference.clone(),
            self.shipment_number.clone().unwrap_or_default(),
            self.status.clone().unwrap_or_default(),
            self.origin_date
                .map(|d| d.format(DATE_OUTPUT_FORMAT).to_string())
                .unwrap_or_default(),
            self.destination.clone().unwrap_or_default(),
            self.processing_days
                .map(|days| days.to_string())
                .unwrap_or_default(),
            self.last_update
                .map(|ts| ts.format(LAST_UPDATE_FORMAT).to_string())
                .unwrap_or_default(),
            self.last_location.clone().unwrap_or_default(),
            self.last_action.clone().unwrap_or_default(),
            if self.exception {
                EXCEPTION_MARKER.to_string()
            } else {
                NO_EXCEPTION_MARKER.to_string()
            },
        ]
    }
}

/// The finished track report plus the reconciliation facts a human needs
/// to judge it. Writing it anywhere is the caller's move.
#[derive(Debug)]
pub struct TrackReport {
    pub rows: Vec<NormalizedShipment>,
    pub expected: usize,
    pub found: usize,
    pub attempts: u32,
    pub warnings: Vec<String>,
    /// Manifest references that never showed up in the extracted rows.
    pub missing_references: Vec<String>,
}

impl TrackReport {
    pub fn is_complete(&self) -> bool {
        self.found == self.expected
    }

    pub fn exception_rows(&self) -> Vec<&NormalizedShipment> {
        self.rows.iter().filter(|row| row.exception).collect()
    }
}
