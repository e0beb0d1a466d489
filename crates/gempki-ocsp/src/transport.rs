//! OCSP request/response exchange over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client as HttpClient;
use thiserror::Error;
use tracing::debug;

const OCSP_REQUEST_MIME: &str = "application/ocsp-request";
const OCSP_RESPONSE_MIME: &str = "application/ocsp-response";

/// Failures while exchanging bytes with a responder
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("responder returned HTTP {0}")]
    Status(u16),

    #[error("no response within {0} ms")]
    Timeout(u64),

    #[error("connection failed: {0}")]
    Connection(String),
}

/// Sends an encoded OCSP request and returns the encoded response.
///
/// Implementations do not retry.
#[async_trait]
pub trait OcspTransport: Send + Sync {
    async fn send(
        &self,
        url: &str,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;
}

/// `reqwest` transport posting DER bodies
#[derive(Clone)]
pub struct HttpOcspTransport {
    http: HttpClient,
}

impl HttpOcspTransport {
    /// Create a transport with default settings
    pub fn new() -> Result<Self, TransportError> {
        HttpOcspTransportBuilder::new().build()
    }

    #[must_use]
    pub fn builder() -> HttpOcspTransportBuilder {
        HttpOcspTransportBuilder::new()
    }
}

#[async_trait]
impl OcspTransport for HttpOcspTransport {
    async fn send(
        &self,
        url: &str,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        debug!(url = %url, bytes = request.len(), "POST OCSP request");

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, OCSP_REQUEST_MIME)
            .header(ACCEPT, OCSP_RESPONSE_MIME)
            .timeout(timeout)
            .body(request.to_vec())
            .send()
            .await
            .map_err(|e| classify(&e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| classify(&e, timeout))?;
        Ok(body.to_vec())
    }
}

fn classify(e: &reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
    } else if e.is_connect() {
        TransportError::Connection(e.to_string())
    } else {
        TransportError::Http(e.to_string())
    }
}

/// Builder for [`HttpOcspTransport`]
pub struct HttpOcspTransportBuilder {
    user_agent: String,
    connect_timeout: Option<Duration>,
}

impl Default for HttpOcspTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpOcspTransportBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_agent: format!("gempki-rust/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: None,
        }
    }

    /// Set the User-Agent header
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Bound connection setup separately from the exchange
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<HttpOcspTransport, TransportError> {
        let mut builder = HttpClient::builder().user_agent(&self.user_agent).gzip(true);
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(HttpOcspTransport { http })
    }
}
