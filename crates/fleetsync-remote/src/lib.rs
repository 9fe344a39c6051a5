//! FleetSync Remote - REST client for the authoritative replica
//!
//! Provides async access to a PostgREST-style backend:
//! - Bulk reads and batched upserts of collection tables
//! - Single-key reads and upserts of the settings table
//! - A polling change feed backing `IRemoteReplica::subscribe`
//! - A reachability monitor backing `IConnectivity`
//!
//! ## Modules
//!
//! - [`client`] - HTTP client with key headers and status mapping
//! - [`provider`] - `IRemoteReplica` implementation
//! - [`realtime`] - Polling change feed
//! - [`connectivity`] - Backend reachability monitor

pub mod client;
pub mod connectivity;
pub mod provider;
pub mod realtime;

pub use client::RestClient;
pub use connectivity::NetworkMonitor;
pub use provider::RestRemoteReplica;
pub use realtime::ChangeFeed;

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the remote backend
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The API key was rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The key is valid but row-level policy refused the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The table or endpoint does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness or constraint violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limit exceeded; retry after the specified duration
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration the server asked us to wait
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// A network-level error occurred, including timeouts
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response could not be parsed or had an unexpected status
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Maps a non-success HTTP status and its body onto an error
    pub fn from_status(status: StatusCode, body: String, retry_after: Option<Duration>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized(body),
            StatusCode::FORBIDDEN => Self::Forbidden(body),
            StatusCode::NOT_FOUND => Self::NotFound(body),
            StatusCode::CONFLICT => Self::Conflict(body),
            StatusCode::TOO_MANY_REQUESTS => Self::TooManyRequests {
                retry_after: retry_after.unwrap_or(client::DEFAULT_RETRY_AFTER),
            },
            s if s.is_server_error() => Self::ServerError(format!("{}: {}", s, body)),
            s => Self::InvalidResponse(format!("unexpected status {}: {}", s, body)),
        }
    }

    /// Returns true for errors caused by the transport rather than the server
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
