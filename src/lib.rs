pub mod batch_planner;
pub mod config;
pub mod delay_manager;
pub mod extractor;
pub mod fetcher;
pub mod input_loader;
pub mod logger;
pub mod pipeline;
pub mod report;
pub mod report_writer;
pub mod verifier;

// Exporting types for convenience
pub use batch_planner::FetchTarget;
pub use config::TrackerConfig;
pub use extractor::{Extractor, ShipmentRecord};
pub use fetcher::{FetchEngine, HttpFetchEngine, RawCapture};
pub use input_loader::ManifestRow;
pub use pipeline::{run_tracker, TrackerError};
pub use report::{NormalizedShipment, TrackReport};
pub use report_writer::{CsvReportWriter, ReportWriter};
pub use verifier::VerifyState;
