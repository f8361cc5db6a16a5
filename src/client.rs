use std::time::Duration;

use ethers_core::types::Address;
use reqwest::{IntoUrl, StatusCode, Url};

use crate::retry::RetryPolicy;
use crate::types::{BetRecord, ErrorResponse, NewBet, RelayParams, RelayResponse};

/// Server faults and transport failures are worth three attempts with 500ms
/// backoff; a rejection is not, since an identical resubmission is rejected
/// identically.
const SUBMIT_RETRY: RetryPolicy = RetryPolicy::new(3, Duration::from_millis(500));

/// Relay API error
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure
    #[error("{0}")]
    Reqwest(#[from] reqwest::Error),
    /// The relay rejected the request; not retried
    #[error("relay rejected request: {reason}")]
    Rejected {
        /// The server's reason string
        reason: String,
    },
    /// The relay failed server-side, even after retries
    #[error("relay failed: {reason}")]
    Failed {
        /// The server's reason string
        reason: String,
    },
    /// Response body did not parse as the expected shape
    #[error("unexpected response from server: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    fn is_transient(&self) -> bool {
        matches!(self, ClientError::Reqwest(_) | ClientError::Failed { .. })
    }
}

/// HTTP client for the relay and bet-history endpoints.
#[derive(Debug, Clone)]
pub struct RelayApiClient {
    url: Url,
    client: reqwest::Client,
}

impl RelayApiClient {
    /// Instantiate against an API base URL (with trailing slash).
    ///
    /// # Errors
    ///
    /// If the url param cannot be parsed as a URL
    pub fn new<S>(url: S) -> Result<Self, reqwest::Error>
    where
        S: IntoUrl,
    {
        Ok(Self {
            url: url.into_url()?,
            client: Default::default(),
        })
    }

    /// Instantiate with a caller-configured reqwest Client.
    pub fn new_with_client<S>(
        url: S,
        client: reqwest::Client,
    ) -> Result<Self, <Url as std::str::FromStr>::Err>
    where
        S: AsRef<str>,
    {
        Ok(Self {
            url: url.as_ref().parse()?,
            client,
        })
    }

    fn relay_url(&self) -> Url {
        self.url.join("relay").expect("base url accepts a path")
    }

    fn bets_url(&self) -> Url {
        self.url.join("bets").expect("base url accepts a path")
    }

    /// Submit a signed bet for relaying; returns the transaction hash.
    ///
    /// 5xx responses and transport failures are retried with backoff; a 4xx
    /// means the request itself is unacceptable and comes back immediately
    /// as [`ClientError::Rejected`].
    pub async fn relay(&self, params: &RelayParams) -> Result<RelayResponse, ClientError> {
        SUBMIT_RETRY
            .run_if(|| self.try_relay(params), ClientError::is_transient)
            .await
    }

    async fn try_relay(&self, params: &RelayParams) -> Result<RelayResponse, ClientError> {
        let url = self.relay_url();
        let resp = self.client.post(url.clone()).json(params).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if status.is_success() {
            return Ok(serde_json::from_str(&text)?);
        }

        let reason = serde_json::from_str::<ErrorResponse>(&text)
            .map(|body| body.error)
            .unwrap_or(text);

        if status.is_client_error() {
            Err(ClientError::Rejected { reason })
        } else {
            tracing::warn!(
                method = "POST",
                url = %url,
                %status,
                reason = reason.as_str(),
                "relay returned a server error"
            );
            Err(ClientError::Failed { reason })
        }
    }

    /// Record a settled bet in the history store.
    ///
    /// `Ok(false)` means the bet was already recorded. Insertion is
    /// idempotent by transaction hash, so the caller can treat that as
    /// success.
    pub async fn save_bet(&self, bet: &NewBet) -> Result<bool, ClientError> {
        let resp = self.client.post(self.bets_url()).json(bet).send().await?;
        let status = resp.status();
        match status {
            StatusCode::CONFLICT => Ok(false),
            s if s.is_success() => Ok(true),
            _ => {
                let reason = resp.text().await.unwrap_or_default();
                Err(ClientError::Failed { reason })
            }
        }
    }

    /// The most recent bets, newest first, optionally for one player.
    pub async fn recent_bets(
        &self,
        limit: usize,
        player: Option<Address>,
    ) -> Result<Vec<BetRecord>, ClientError> {
        let mut url = self.bets_url();
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        if let Some(player) = player {
            url.query_pairs_mut()
                .append_pair("player", &format!("{player:#x}"));
        }

        Ok(self.client.get(url).send().await?.json().await?)
    }
}
