//! Single-page HTML fetcher for company websites.
//!
//! One GET per call with a bounded timeout and a browser user-agent. The
//! fetcher reports every failure as [`ScoutError::Network`]; deciding what to
//! do about it is the caller's business.

mod guard;

use std::time::Duration;

use reqwest::Client;
use reqwest::redirect::Policy;
use tracing::{debug, instrument};
use url::Url;

use vcscout_shared::{FetchConfig, Result, ScoutError};

pub use guard::is_private_target;

/// Maximum number of redirects followed per fetch.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// PageFetcher
// ---------------------------------------------------------------------------

/// HTTP client for fetching company pages.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    /// Allow loopback/private targets (local development, mock servers).
    allow_private_hosts: bool,
}

impl PageFetcher {
    /// Build a fetcher from the `[fetch]` config section.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let allow_private_hosts = config.allow_private_hosts;

        let redirect = Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if !allow_private_hosts && is_private_target(attempt.url()) {
                attempt.error("redirect to private host blocked")
            } else {
                attempt.follow()
            }
        });

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(redirect)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScoutError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            allow_private_hosts,
        })
    }

    /// Fetch `url` and return the response body as text.
    ///
    /// # Errors
    ///
    /// [`ScoutError::Network`] when the URL does not parse, targets a blocked
    /// host, times out, fails at the transport level, answers with a non-2xx
    /// status, or its body cannot be read.
    #[instrument(skip(self))]
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        let parsed =
            Url::parse(url).map_err(|e| ScoutError::Network(format!("invalid URL '{url}': {e}")))?;

        if !self.allow_private_hosts && is_private_target(&parsed) {
            return Err(ScoutError::Network(format!("{url}: blocked private target")));
        }

        debug!("fetching page");

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| ScoutError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoutError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScoutError::Network(format!("{url}: body read failed: {e}")))?;

        debug!(status = status.as_u16(), bytes = body.len(), "page fetched");

        Ok(body)
    }
}
