use std::time::Duration;

use log::{info, warn};
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use thiserror::Error;

use crate::batch_planner::FetchTarget;
use crate::config::TrackerConfig;
use crate::delay_manager;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not open a session for {url}: {source}")]
    Session {
        url: String,
        source: reqwest::Error,
    },
    #[error("request failed for {url}: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },
    #[error("carrier page refused the query at {url} (HTTP {status})")]
    Blocked { url: String, status: u16 },
}

/// Rendered markup returned for one fetch target, tagged with the index of
/// the target that produced it so retry passes can replace it selectively.
#[derive(Debug, Clone)]
pub struct RawCapture {
    pub target_index: usize,
    pub html: String,
}

/// The page-rendering capability behind the tracker. Production uses the
/// blocking HTTP engine below; tests substitute a scripted one.
pub trait FetchEngine {
    fn fetch(&self, target: &FetchTarget) -> Result<String, FetchError>;
}

/// Fetches tracking pages over plain blocking HTTP.
///
/// Every call opens its own session (client with a fresh cookie store) and
/// tears it down on all exit paths, so repeated retry passes never pile up
/// connections.
pub struct HttpFetchEngine {
    timeout: Duration,
    accept_language: String,
}

impl HttpFetchEngine {
    pub fn from_config(cfg: &TrackerConfig) -> Self {
        HttpFetchEngine {
            timeout: Duration::from_secs(cfg.request_timeout_secs),
            accept_language: "es-ES,es;q=0.9,en;q=0.8".to_string(),
        }
    }

    fn get_random_user_agent(&self) -> &'static str {
        let uas = [
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
        ];
        let mut rng = rand::thread_rng();
        uas[rng.gen_range(0..uas.len())]
    }

    fn open_session(&self, url: &str) -> Result<Client, FetchError> {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.accept_language) {
            headers.insert(ACCEPT_LANGUAGE, value);
        }

        Client::builder()
            .timeout(self.timeout)
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .map_err(|source| FetchError::Session {
                url: url.to_string(),
                source,
            })
    }
}

impl FetchEngine for HttpFetchEngine {
    fn fetch(&self, target: &FetchTarget) -> Result<String, FetchError> {
        // Session lives for exactly this call; dropped on every return.
        let session = self.open_session(&target.url)?;

        let resp = session
            .get(&target.url)
            .header(USER_AGENT, self.get_random_user_agent())
            .send()
            .map_err(|source| FetchError::Http {
                url: target.url.clone(),
                source,
            })?;

        let status = resp.status();
        if status.as_u16() == 403 || status.as_u16() == 429 {
            return Err(FetchError::Blocked {
                url: target.url.clone(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            // The page sometimes serves partial markup with odd statuses;
            // the completeness check downstream decides whether to retry.
            warn!("Unexpected HTTP {} for {}", status, target.url);
        }

        resp.text().map_err(|source| FetchError::Http {
            url: target.url.clone(),
            source,
        })
    }
}

/// Fetch the given subset of targets in order, one session each, with a
/// politeness delay between pages. Fails the whole pass on the first hard
/// error so a broken session never leaves half-replaced captures behind.
pub fn run_fetch_pass(
    engine: &dyn FetchEngine,
    targets: &[FetchTarget],
    indices: &[usize],
    cfg: &TrackerConfig,
) -> Result<Vec<RawCapture>, FetchError> {
    let mut captures = Vec::with_capacity(indices.len());

    for (i, &target_index) in indices.iter().enumerate() {
        let target = &targets[target_index];
        if i > 0 {
            delay_manager::random_page_delay(cfg.min_page_delay_secs, cfg.max_page_delay_secs);
        }
        info!(
            "Fetching tracking page {}/{} ({} shipment numbers)",
            i + 1,
            indices.len(),
            target.references.len()
        );
        let html = engine.fetch(target)?;
        captures.push(RawCapture { target_index, html });
    }

    Ok(captures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct ScriptedEngine {
        calls: RefCell<Vec<String>>,
        fail_on: Option<usize>,
    }

    impl FetchEngine for ScriptedEngine {
        fn fetch(&self, target: &FetchTarget) -> Result<String, FetchError> {
            let call_no = self.calls.borrow().len();
            self.calls.borrow_mut().push(target.url.clone());
            if Some(call_no) == self.fail_on {
                return Err(FetchError::Blocked {
                    url: target.url.clone(),
                    status: 429,
                });
            }
            Ok(format!("<html>{}</html>", target.references.join("|")))
        }
    }

    fn quiet_cfg() -> TrackerConfig {
        TrackerConfig {
            min_page_delay_secs: 0,
            max_page_delay_secs: 0,
            ..TrackerConfig::default()
        }
    }

    fn target(n: usize) -> FetchTarget {
        FetchTarget {
            references: vec![format!("ref-{}", n)],
            url: format!("https://example.test/track?cons=ref-{}", n),
        }
    }

    #[test]
    fn pass_fetches_requested_indices_in_order() {
        let engine = ScriptedEngine {
            calls: RefCell::new(Vec::new()),
            fail_on: None,
        };
        let targets = vec![target(0), target(1), target(2)];

        let captures = run_fetch_pass(&engine, &targets, &[2, 0], &quiet_cfg()).unwrap();

        assert_eq!(captures.len(), 2);
        assert_eq!(captures[0].target_index, 2);
        assert_eq!(captures[1].target_index, 0);
        assert!(captures[0].html.contains("ref-2"));
        assert_eq!(engine.calls.borrow().len(), 2);
    }

    #[test]
    fn pass_aborts_on_first_error() {
        let engine = ScriptedEngine {
            calls: RefCell::new(Vec::new()),
            fail_on: Some(1),
        };
        let targets = vec![target(0), target(1), target(2)];

        let result = run_fetch_pass(&engine, &targets, &[0, 1, 2], &quiet_cfg());

        assert!(matches!(result, Err(FetchError::Blocked { status: 429, .. })));
        // The third target must not have been attempted.
        assert_eq!(engine.calls.borrow().len(), 2);
    }
}
