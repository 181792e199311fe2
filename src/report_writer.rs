use std::fs;
use std::fs::File;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use log::info;
use thiserror::Error;

use crate::config::TrackerConfig;
use crate::report::{TrackReport, REPORT_COLUMNS};

#[derive(Debug, Error)]
pub enum ReportWriteError {
    #[error("I/O error writing report: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error writing report: {0}")]
    Csv(#[from] csv::Error),
}

/// Spreadsheet-writing collaborator. The pipeline only builds the report in
/// memory; whoever drives it decides where and in which format it lands.
pub trait ReportWriter {
    fn write(
        &self,
        report: &TrackReport,
        cfg: &TrackerConfig,
        generated_at: NaiveDateTime,
    ) -> Result<PathBuf, ReportWriteError>;
}

/// Writes the report as a CSV spreadsheet named after the generation time,
/// e.g. "TNT Track Report 05-08-2026 14_03_21.csv".
pub struct CsvReportWriter;

impl ReportWriter for CsvReportWriter {
    fn write(
        &self,
        report: &TrackReport,
        cfg: &TrackerConfig,
        generated_at: NaiveDateTime,
    ) -> Result<PathBuf, ReportWriteError> {
        fs::create_dir_all(&cfg.output_dir)?;

        let filename = format!(
            "{} {}.{}",
            cfg.report_name,
            generated_at.format("%d-%m-%Y %H_%M_%S"),
            cfg.report_extension
        );
        let path = PathBuf::from(&cfg.output_dir).join(filename);

        let file = File::create(&path)?;
        let mut writer = csv::WriterBuilder::new().from_writer(file);

        writer.write_record(REPORT_COLUMNS)?;
        for row in &report.rows {
            writer.write_record(row.to_row())?;
        }
        writer.flush()?;

        info!("Report written with {} row(s) to {:?}", report.rows.len(), path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NormalizedShipment;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn sample_report() -> TrackReport {
        TrackReport {
            rows: vec![NormalizedShipment {
                client_reference: "DSD/1001".into(),
                shipment_number: Some("123456789".into()),
                status: Some("Tránsito".into()),
                origin_date: NaiveDate::from_ymd_opt(2024, 1, 3),
                destination: Some("MADRID, SPAIN".into()),
                processing_days: Some(7),
                last_update: NaiveDate::from_ymd_opt(2024, 1, 5)
                    .and_then(|d| d.and_hms_opt(18, 10, 0)),
                last_location: Some("MADRID ".into()),
                last_action: Some(" Enviado".into()),
                exception: false,
            }],
            expected: 1,
            found: 1,
            attempts: 1,
            warnings: Vec::new(),
            missing_references: Vec::new(),
        }
    }

    #[test]
    fn writes_header_rows_and_timestamped_filename() {
        let td = tempdir().unwrap();
        let cfg = TrackerConfig {
            output_dir: td.path().join("reports").to_string_lossy().to_string(),
            ..TrackerConfig::default()
        };
        let generated_at = NaiveDate::from_ymd_opt(2026, 8, 5)
            .unwrap()
            .and_hms_opt(14, 3, 21)
            .unwrap();

        let path = CsvReportWriter
            .write(&sample_report(), &cfg, generated_at)
            .unwrap();

        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "TNT Track Report 05-08-2026 14_03_21.csv"
        );

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), REPORT_COLUMNS.len());
        assert_eq!(&headers[0], "Client Reference");
        assert_eq!(&headers[9], "TNT Exception Notification");

        let records: Vec<csv::StringRecord> =
            reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][1], "123456789");
        assert_eq!(&records[0][3], "03/01/24");
    }

    #[test]
    fn creates_the_output_directory_when_missing() {
        let td = tempdir().unwrap();
        let nested = td.path().join("a").join("b");
        let cfg = TrackerConfig {
            output_dir: nested.to_string_lossy().to_string(),
            ..TrackerConfig::default()
        };
        let generated_at = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        let path = CsvReportWriter
            .write(&sample_report(), &cfg, generated_at)
            .unwrap();
        assert!(path.exists());
    }
}
