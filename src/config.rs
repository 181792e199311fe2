use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Runtime settings for one tracker run. Everything has a working default
/// so the binary runs without a config file; a JSON file can override any
/// subset of fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Carrier code the manifest is filtered on.
    pub carrier: String,
    /// Manifest status value that excludes a row from tracking.
    pub delivered_sentinel: String,
    /// Status labels the carrier page shows for a delivered shipment.
    /// The page is served per-locale, so both translations appear here.
    pub delivered_labels: Vec<String>,
    /// Client reference prefix; containers without it are not ours.
    pub reference_prefix: String,
    /// Tracking page endpoint the query groups are appended to.
    pub base_tracking_url: String,
    /// Max shipment numbers per tracking URL. The carrier page caps at 30.
    pub batch_size: usize,
    /// Max scrape passes before giving up on missing shipment numbers.
    pub max_attempts: u32,
    /// Re-fetch only the query groups with missing shipment numbers instead
    /// of the whole list.
    pub refetch_incomplete_only: bool,
    pub request_timeout_secs: u64,
    /// Random wait between page fetches, in seconds. Set both to 0 to
    /// disable waiting.
    pub min_page_delay_secs: u64,
    pub max_page_delay_secs: u64,
    /// Report file name stem; the generation timestamp is appended.
    pub report_name: String,
    pub report_extension: String,
    pub output_dir: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            carrier: "TNT".to_string(),
            delivered_sentinel: "DELIVERED".to_string(),
            delivered_labels: vec!["Entregado".to_string(), "Delivered".to_string()],
            reference_prefix: "DSD/".to_string(),
            base_tracking_url:
                "https://www.tnt.com/express/es_es/site/herramientas-envio/seguimiento.html"
                    .to_string(),
            batch_size: 30,
            max_attempts: 5,
            refetch_incomplete_only: false,
            request_timeout_secs: 30,
            min_page_delay_secs: 8,
            max_page_delay_secs: 30,
            report_name: "TNT Track Report".to_string(),
            report_extension: "csv".to_string(),
            output_dir: "./TNT Track Reports".to_string(),
        }
    }
}

impl TrackerConfig {
    /// Load settings from a JSON file and validate them.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        let cfg: TrackerConfig = serde_json::from_str(&content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.carrier.trim().is_empty() {
            return Err(ConfigError::Invalid("carrier must be non-empty"));
        }
        if self.delivered_sentinel.trim().is_empty() {
            return Err(ConfigError::Invalid("delivered_sentinel must be non-empty"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be > 0"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be > 0"));
        }
        if Url::parse(&self.base_tracking_url).is_err() {
            return Err(ConfigError::Invalid("base_tracking_url must be a valid URL"));
        }
        if self.min_page_delay_secs > self.max_page_delay_secs {
            return Err(ConfigError::Invalid(
                "min_page_delay_secs must not exceed max_page_delay_secs",
            ));
        }
        if self.report_name.trim().is_empty() {
            return Err(ConfigError::Invalid("report_name must be non-empty"));
        }
        if self.output_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("output_dir must be non-empty"));
        }
        Ok(())
    }

    /// Tracking URL for a single shipment number, used to link directly to
    /// shipments flagged with an exception.
    pub fn single_shipment_url(&self, shipment_number: &str) -> String {
        format!(
            "{}?searchType=con&cons={}",
            self.base_tracking_url, shipment_number
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid() {
        TrackerConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_batch_size() {
        let cfg = TrackerConfig {
            batch_size: 0,
            ..TrackerConfig::default()
        };
        match cfg.validate() {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("batch_size")),
            other => panic!("expected invalid batch_size, got {:?}", other),
        }
    }

    #[test]
    fn rejects_bad_tracking_url() {
        let cfg = TrackerConfig {
            base_tracking_url: "not a url".to_string(),
            ..TrackerConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_inverted_delay_range() {
        let cfg = TrackerConfig {
            min_page_delay_secs: 10,
            max_page_delay_secs: 2,
            ..TrackerConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_overrides_subset_of_fields() {
        let td = tempdir().unwrap();
        let path = td.path().join("tracker.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{ "batch_size": 10, "min_page_delay_secs": 0, "max_page_delay_secs": 0 }}"#
        )
        .unwrap();

        let cfg = TrackerConfig::load(&path).unwrap();
        assert_eq!(cfg.batch_size, 10);
        // Untouched fields keep their defaults.
        assert_eq!(cfg.carrier, "TNT");
        assert_eq!(cfg.max_attempts, 5);
    }

    #[test]
    fn single_shipment_url_embeds_number() {
        let cfg = TrackerConfig::default();
        let url = cfg.single_shipment_url("123456789");
        assert!(url.ends_with("searchType=con&cons=123456789"));
    }
}
