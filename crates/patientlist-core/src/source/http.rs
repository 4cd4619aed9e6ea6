//! REST source for patient records.
//!
//! Fetches `GET {base_url}/patients`, optionally with a bearer token.
//! Rate-limited responses (429) are retried with exponential backoff.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::{debug, warn};

use super::{parse_patients, PatientSource, SourceError};
use crate::models::PatientRecord;

// ============================================================================
// Constants
// ============================================================================

/// Path of the patient collection relative to the base URL
const PATIENTS_PATH: &str = "patients";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Default initial backoff delay for rate limiting; doubles on each retry.
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// HTTP patient source.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpPatientSource {
    client: Client,
    base_url: String,
    token: Option<String>,
    initial_backoff: Duration,
}

impl HttpPatientSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(client, base_url))
    }

    /// Use a preconfigured client (proxy, TLS roots, timeouts).
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }

    /// Delay before the first rate-limit retry
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn patients_url(&self) -> String {
        format!("{}/{}", self.base_url, PATIENTS_PATH)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))
                    .context("Bearer token contains invalid header characters")?,
            );
        }
        Ok(headers)
    }

    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(SourceError::from_status(status, &body).into())
        }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = self
                .client
                .get(url)
                .headers(self.auth_headers()?)
                .send()
                .await
                .map_err(SourceError::from)
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response
                        .text()
                        .await
                        .map_err(SourceError::from)
                        .with_context(|| format!("Failed to read response body from {}", url));
                }
                None => {
                    if retries == MAX_RATE_LIMIT_RETRIES {
                        return Err(SourceError::RateLimited { retries }.into());
                    }
                    retries += 1;
                    warn!(
                        url = url,
                        retry = retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }
}

#[async_trait]
impl PatientSource for HttpPatientSource {
    async fn get_all(&self) -> Result<Vec<PatientRecord>> {
        let url = self.patients_url();
        let text = self.get_text(&url).await?;
        let records = parse_patients(&text)
            .map_err(|e| SourceError::MalformedPayload(e.to_string()))
            .with_context(|| format!("Failed to parse patients response from {}", url))?;
        debug!(count = records.len(), "Patients response received");
        Ok(records)
    }

    fn name(&self) -> &str {
        "http"
    }
}
