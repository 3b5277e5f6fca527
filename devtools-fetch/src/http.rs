//! HTTP-backed plugin repository.

use devtools_core::error::{DevToolsError, Result};
use devtools_core::RepositoryConfig;
use reqwest::blocking::{Client, Response};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::repository::{parse_search_response, Candidate, PluginRepository};

/// Talks to the autocomplete search service and the download site.
///
/// Each request is bounded by the configured timeout and retried with linear
/// backoff on transport errors and 5xx responses. Other statuses fail at once.
pub struct HttpRepository {
    client: Client,
    search_base: Url,
    download_base: Url,
    max_attempts: u32,
    backoff: Duration,
}

impl HttpRepository {
    pub fn new(config: &RepositoryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| DevToolsError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            search_base: parse_base(&config.search_url, "search_url")?,
            download_base: parse_base(&config.download_url, "download_url")?,
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        })
    }

    /// `<search>/autocomplete?q=<name>`
    pub fn search_url(&self, name: &str) -> Result<Url> {
        let mut url = join(&self.search_base, &["autocomplete"])?;
        url.query_pairs_mut().append_pair("q", name);
        Ok(url)
    }

    /// `<download>/plugins/<resource>/download?version=<version>`
    pub fn download_url(&self, candidate: &Candidate) -> Result<Url> {
        let mut url = join(
            &self.download_base,
            &["plugins", &candidate.resource_id, "download"],
        )?;
        url.query_pairs_mut()
            .append_pair("version", &candidate.version_id);
        Ok(url)
    }

    fn get(&self, url: &Url) -> Result<Response> {
        let mut attempt = 1;
        loop {
            debug!(url = %url, attempt, "GET");
            let outcome = self.client.get(url.clone()).send();

            let retryable = match &outcome {
                Ok(response) => response.status().is_server_error(),
                Err(e) => !e.is_builder(),
            };
            if !retryable || attempt >= self.max_attempts {
                return match outcome {
                    Ok(response) if response.status().is_success() => Ok(response),
                    Ok(response) => Err(DevToolsError::Network(format!(
                        "{} returned {}",
                        url,
                        response.status()
                    ))),
                    Err(e) => Err(DevToolsError::Network(format!(
                        "request to {} failed: {}",
                        url, e
                    ))),
                };
            }

            let delay = self.retry_delay(attempt);
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            warn!(url = %url, attempt, delay_ms, "Request failed, retrying");
            std::thread::sleep(delay);
            attempt += 1;
        }
    }

    /// Linear backoff, saturating instead of overflowing on large settings
    fn retry_delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl PluginRepository for HttpRepository {
    fn search(&self, name: &str) -> Result<Vec<Candidate>> {
        let url = self.search_url(name)?;
        let body = self
            .get(&url)?
            .text()
            .map_err(|e| DevToolsError::Network(format!("Failed to read search response: {e}")))?;
        parse_search_response(&body)
    }

    fn download(&self, candidate: &Candidate) -> Result<Vec<u8>> {
        let url = self.download_url(candidate)?;
        let bytes = self
            .get(&url)?
            .bytes()
            .map_err(|e| DevToolsError::Network(format!("Failed to read download: {e}")))?;
        Ok(bytes.to_vec())
    }
}

fn parse_base(raw: &str, key: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| DevToolsError::Config(format!("repository.{key} '{raw}' is not a URL: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(DevToolsError::Config(format!(
            "repository.{key} '{raw}' cannot be used as a base URL"
        )));
    }
    Ok(url)
}

fn join(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| DevToolsError::Config(format!("{} cannot be used as a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository(search: &str, download: &str) -> HttpRepository {
        HttpRepository::new(&RepositoryConfig {
            search_url: search.to_string(),
            download_url: download.to_string(),
            ..RepositoryConfig::default()
        })
        .expect("valid repository config")
    }

    #[test]
    fn test_search_url_encodes_name() {
        let repo = repository("http://search.example", "http://dl.example");
        assert_eq!(
            repo.search_url("Economy API").expect("url").as_str(),
            "http://search.example/autocomplete?q=Economy+API"
        );
    }

    #[test]
    fn test_download_url_layout() {
        let repo = repository("http://search.example", "http://dl.example/forum/");
        assert_eq!(
            repo.download_url(&Candidate::new("30", "1234"))
                .expect("url")
                .as_str(),
            "http://dl.example/forum/plugins/30/download?version=1234"
        );
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let err = HttpRepository::new(&RepositoryConfig {
            search_url: "not a url".to_string(),
            ..RepositoryConfig::default()
        })
        .err()
        .expect("invalid url should fail");
        assert!(matches!(err, DevToolsError::Config(_)));
    }

    #[test]
    fn test_unreachable_host_is_network_error() {
        // Port 9 on localhost is discard; nothing should be listening
        let repo = HttpRepository::new(&RepositoryConfig {
            search_url: "http://127.0.0.1:9".to_string(),
            max_attempts: 1,
            timeout_secs: 2,
            ..RepositoryConfig::default()
        })
        .expect("valid config");
        let err = repo.search("Anything").expect_err("connection should fail");
        assert!(matches!(err, DevToolsError::Network(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_retry_delay_is_linear_and_saturates() {
        let mut config = RepositoryConfig::default();
        config.backoff_ms = 200;
        let repository = HttpRepository::new(&config).expect("valid config");
        assert_eq!(repository.retry_delay(1), Duration::from_millis(200));
        assert_eq!(repository.retry_delay(3), Duration::from_millis(600));

        config.backoff_ms = u64::MAX;
        let repository = HttpRepository::new(&config).expect("valid config");
        assert_eq!(repository.retry_delay(u32::MAX), Duration::MAX);
    }
}
