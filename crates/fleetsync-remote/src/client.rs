//! REST client for a PostgREST-style backend
//!
//! Every table lives under `<base>/rest/v1/<table>`. Each request carries the
//! project key twice: as the `apikey` header and as a bearer token. Non-success
//! statuses are mapped onto [`RemoteError`] here so callers never inspect raw
//! responses.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use fleetsync_remote::client::RestClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = RestClient::new("https://project.example.co", "anon-key", Duration::from_secs(15))?;
//! let rows: Vec<serde_json::Value> = client.get_json("profiles", &[("select", "*".into())]).await?;
//! println!("{} profiles", rows.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::RemoteError;

/// Path prefix of the REST endpoint
const REST_PREFIX: &str = "/rest/v1";

/// Upsert preference: merge on conflict, no response body
pub const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=minimal";

/// Retry-After used when a 429 carries no usable header
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

// ============================================================================
// RestClient
// ============================================================================

/// HTTP client for the remote backend
///
/// Wraps `reqwest::Client` with key headers and table URL construction.
/// The per-request timeout is set on the inner client, so no caller ever
/// needs its own deadline.
#[derive(Clone)]
pub struct RestClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL without trailing slash
    base_url: String,
    /// Project API key
    api_key: String,
}

impl RestClient {
    /// Creates a client for `base_url` with a request timeout
    ///
    /// # Errors
    /// Fails if the URL does not parse as http(s) or the TLS backend cannot
    /// be initialised.
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let parsed = url::Url::parse(base_url)
            .with_context(|| format!("Invalid remote URL: {}", base_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("Remote URL must use http or https: {}", base_url);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Creates a client with a custom base URL and no timeout (useful for testing)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Returns the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the host part of the base URL, if any
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    /// Full URL of a table endpoint
    pub fn table_url(&self, table: &str) -> String {
        format!("{}{}/{}", self.base_url, REST_PREFIX, table)
    }

    /// Creates a keyed request builder for the given method and table
    pub fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.keyed(self.client.request(method, self.table_url(table)))
    }

    /// Creates a keyed GET against the REST root, used for reachability probes
    pub fn probe(&self) -> RequestBuilder {
        self.keyed(
            self.client
                .get(format!("{}{}/", self.base_url, REST_PREFIX)),
        )
    }

    fn keyed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Sends a request and maps non-success statuses onto [`RemoteError`]
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER));
        let body = response.text().await.unwrap_or_default();

        warn!(status = %status, body = %body, "Remote request failed");
        Err(RemoteError::from_status(status, body, retry_after))
    }

    /// GETs a table with query parameters and decodes the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<T, RemoteError> {
        debug!(table, ?query, "GET");
        let response = self
            .send(self.request(Method::GET, table).query(query))
            .await?;
        decode(response).await
    }

    /// POSTs a JSON body as an upsert resolved on `on_conflict`
    pub async fn upsert_json<B: Serialize + ?Sized>(
        &self,
        table: &str,
        on_conflict: &str,
        body: &B,
    ) -> Result<(), RemoteError> {
        debug!(table, on_conflict, "POST upsert");
        self.send(
            self.request(Method::POST, table)
                .query(&[("on_conflict", on_conflict)])
                .header("Prefer", PREFER_UPSERT)
                .json(body),
        )
        .await?;
        Ok(())
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Decodes a JSON body, reporting parse failures as `InvalidResponse`
pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
}

/// Parses a `Retry-After` value given in seconds or as an HTTP date
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let now = chrono::Utc::now();
        let target = date.with_timezone(&chrono::Utc);
        if target > now {
            if let Ok(secs) = u64::try_from((target - now).num_seconds()) {
                return Duration::from_secs(secs.min(3600));
            }
        }
        return Duration::ZERO;
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
