use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use calamine::{open_workbook, Reader, Xlsx};
use log::{error, info};
use serde::Deserialize;

use crate::config::TrackerConfig;

/// One row of the shipment manifest. Header names vary between exports, so
/// the usual aliases are accepted.
#[derive(Debug, Deserialize, Clone)]
pub struct ManifestRow {
    #[serde(rename = "LOGIS ID", alias = "Logis ID", alias = "logis id", default)]
    pub logis_id: Option<String>,
    #[serde(rename = "Carrier", alias = "carrier")]
    pub carrier: String,
    #[serde(
        rename = "T&T reference",
        alias = "T&T Reference",
        alias = "t&t reference",
        alias = "Reference",
        alias = "reference"
    )]
    pub reference: String,
    #[serde(rename = "Status", alias = "status")]
    pub status: String,
}

pub fn load_rows<P: AsRef<Path>>(filename: P) -> Vec<ManifestRow> {
    let path_ref = filename.as_ref();

    if !path_ref.exists() {
        error!("Manifest file {:?} does not exist.", path_ref);
        return Vec::new();
    }

    let is_excel = path_ref
        .extension()
        .map_or(false, |ext| ext == "xlsx" || ext == "xls");

    if is_excel {
        return load_excel(path_ref);
    }

    // Default to CSV
    load_csv(path_ref)
}

fn load_csv(path: &Path) -> Vec<ManifestRow> {
    let mut rows = Vec::new();
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            error!("Could not open manifest CSV file: {}", e);
            return rows;
        }
    };

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    for result in rdr.deserialize() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                // A bad row should not sink the rest of the manifest.
                error!("Error parsing manifest CSV record: {}", e);
            }
        }
    }
    info!("Loaded {} manifest rows from CSV {:?}", rows.len(), path);
    rows
}

fn load_excel(path: &Path) -> Vec<ManifestRow> {
    let mut rows = Vec::new();
    let mut excel: Xlsx<_> = match open_workbook(path) {
        Ok(wb) => wb,
        Err(e) => {
            error!("Could not open manifest Excel file: {}", e);
            return rows;
        }
    };

    let worksheets = excel.worksheets();
    if let Some((_name, range)) = worksheets.first() {
        // First row is the header. Locate the columns we care about.
        let mut logis_idx = None;
        let mut carrier_idx = None;
        let mut reference_idx = None;
        let mut status_idx = None;

        for (row_idx, row) in range.rows().enumerate() {
            if row_idx == 0 {
                for (col_idx, cell) in row.iter().enumerate() {
                    let header = cell.to_string().to_lowercase();
                    if header.contains("logis") {
                        logis_idx = Some(col_idx);
                    } else if header.contains("carrier") {
                        carrier_idx = Some(col_idx);
                    } else if header.contains("reference") {
                        reference_idx = Some(col_idx);
                    } else if header.contains("status") {
                        status_idx = Some(col_idx);
                    }
                }

                if carrier_idx.is_none() || reference_idx.is_none() || status_idx.is_none() {
                    error!("Excel header is missing one of 'Carrier', 'T&T reference', 'Status'");
                    return rows;
                }
                continue;
            }

            let logis_id = logis_idx
                .and_then(|i| row.get(i))
                .map(|c| c.to_string())
                .filter(|s| !s.is_empty());
            let carrier = carrier_idx
                .and_then(|i| row.get(i))
                .map(|c| c.to_string())
                .unwrap_or_default();
            let reference = reference_idx
                .and_then(|i| row.get(i))
                .map(|c| c.to_string())
                .unwrap_or_default();
            let status = status_idx
                .and_then(|i| row.get(i))
                .map(|c| c.to_string())
                .unwrap_or_default();

            if !reference.is_empty() {
                rows.push(ManifestRow {
                    logis_id,
                    carrier,
                    reference,
                    status,
                });
            }
        }
    }

    info!("Loaded {} manifest rows from Excel {:?}", rows.len(), path);
    rows
}

/// Filter the manifest down to the shipments worth querying: rows for the
/// configured carrier whose status is not the delivered sentinel. Returns
/// the deduplicated tracking references.
pub fn trackable_references(rows: &[ManifestRow], cfg: &TrackerConfig) -> HashSet<String> {
    let mut references = HashSet::new();
    let mut in_transit = 0usize;
    let mut exception = 0usize;

    for row in rows {
        if !row.carrier.trim().eq_ignore_ascii_case(&cfg.carrier) {
            continue;
        }
        let status = row.status.trim().to_uppercase();
        if status == cfg.delivered_sentinel.to_uppercase() {
            continue;
        }
        let reference = row.reference.trim();
        if reference.is_empty() {
            continue;
        }
        if references.insert(reference.to_string()) {
            match status.as_str() {
                "IN TRANSIT" => in_transit += 1,
                "EXCEPTION" => exception += 1,
                _ => {}
            }
        }
    }

    info!(
        "Manifest has {} unique shipment numbers to query ({} 'In Transit', {} 'Exception')",
        references.len(),
        in_transit,
        exception
    );

    references
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_manifest(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let td = tempdir().unwrap();
        let path = td.path().join("manifest.csv");
        let mut file = File::create(&path).unwrap();
        write!(file, "{}", contents).unwrap();
        (td, path)
    }

    #[test]
    fn loads_csv_with_expected_headers() {
        let (_td, path) = write_manifest(
            "LOGIS ID,Carrier,T&T reference,Status\n\
             L1,TNT,111222333,In Transit\n\
             L2,TNT,444555666,DELIVERED\n",
        );
        let rows = load_rows(&path);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].reference, "111222333");
        assert_eq!(rows[0].logis_id.as_deref(), Some("L1"));
    }

    #[test]
    fn missing_file_yields_empty() {
        assert!(load_rows("definitely/not/here.csv").is_empty());
    }

    #[test]
    fn filter_keeps_carrier_and_non_delivered_only() {
        let cfg = TrackerConfig::default();
        let rows = vec![
            ManifestRow {
                logis_id: None,
                carrier: "TNT".into(),
                reference: "A1".into(),
                status: "In Transit".into(),
            },
            ManifestRow {
                logis_id: None,
                carrier: "TNT".into(),
                reference: "A2".into(),
                status: "DELIVERED".into(),
            },
            ManifestRow {
                logis_id: None,
                carrier: "DHL".into(),
                reference: "A3".into(),
                status: "In Transit".into(),
            },
            // Duplicate reference, queried once.
            ManifestRow {
                logis_id: None,
                carrier: "TNT".into(),
                reference: "A1".into(),
                status: "Exception".into(),
            },
        ];
        let refs = trackable_references(&rows, &cfg);
        assert_eq!(refs.len(), 1);
        assert!(refs.contains("A1"));
    }

    #[test]
    fn filter_treats_delivered_sentinel_case_insensitively() {
        let cfg = TrackerConfig::default();
        let rows = vec![ManifestRow {
            logis_id: None,
            carrier: "TNT".into(),
            reference: "B1".into(),
            status: "Delivered".into(),
        }];
        assert!(trackable_references(&rows, &cfg).is_empty());
    }

    #[test]
    fn filter_skips_blank_references() {
        let cfg = TrackerConfig::default();
        let rows = vec![ManifestRow {
            logis_id: None,
            carrier: "TNT".into(),
            reference: "   ".into(),
            status: "In Transit".into(),
        }];
        assert!(trackable_references(&rows, &cfg).is_empty());
    }
}
