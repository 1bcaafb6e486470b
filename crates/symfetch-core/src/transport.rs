//! Symbol server transport
//!
//! The probe engine only needs a GET that classifies the response as
//! success, not-found, or anything else. [`HttpTransport`] does that over
//! HTTP(S) with the client string symbol servers expect.

use crate::error::{FetchError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Client string sent with every symbol server request
pub const SYMBOL_SERVER_USER_AGENT: &str = "Microsoft-Symbol-Server/10.0.10522.521";

/// Upper bound on establishing a connection to the symbol server
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Classified response status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    /// The artifact is served at the requested path
    Ok,
    /// The server has nothing at the requested path
    NotFound,
    /// Any other status
    Other { code: u16, reason: String },
}

impl ProbeStatus {
    pub fn from_code(code: u16) -> Self {
        match StatusCode::from_u16(code) {
            Ok(status) if status.is_success() => ProbeStatus::Ok,
            Ok(status) if status == StatusCode::NOT_FOUND => ProbeStatus::NotFound,
            Ok(status) => ProbeStatus::Other {
                code,
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            },
            Err(_) => ProbeStatus::Other {
                code,
                reason: String::new(),
            },
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Ok => write!(f, "200 OK"),
            ProbeStatus::NotFound => write!(f, "404 Not Found"),
            ProbeStatus::Other { code, reason } => write!(f, "{}  {}", code, reason),
        }
    }
}

/// One response from the symbol server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    /// URL the response was served from
    pub url: String,
    pub status: ProbeStatus,
    /// Body, only collected for successful responses
    pub body: Vec<u8>,
}

/// GET access to a symbol server
#[async_trait]
pub trait SymbolTransport: Send + Sync {
    /// Fetch `url`.
    ///
    /// Any status is an `Ok` response; `Err` means the exchange itself
    /// failed.
    async fn get(&self, url: &str) -> Result<ProbeResponse>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// `request_timeout` bounds a whole exchange, body included, so a
    /// stalled server cannot hold up the batch.
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(SYMBOL_SERVER_USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT.min(request_timeout))
            .timeout(request_timeout)
            .build()?;
        Ok(HttpTransport { client })
    }
}

#[async_trait]
impl SymbolTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<ProbeResponse> {
        let mut response = self.client.get(url).send().await?;
        let status = ProbeStatus::from_code(response.status().as_u16());
        let served_from = response.url().to_string();

        let mut body = Vec::new();
        if status == ProbeStatus::Ok {
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| FetchError::Transport {
                    url: served_from.clone(),
                    message: e.to_string(),
                })?
            {
                body.extend_from_slice(&chunk);
            }
        }

        debug!(url = %served_from, status = %status, bytes = body.len(), "symbol server response");

        Ok(ProbeResponse {
            url: served_from,
            status,
            body,
        })
    }
}
