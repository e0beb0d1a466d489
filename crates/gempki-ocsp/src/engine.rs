//! The OCSP check state machine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gempki_core::tsl::{TrustList, TspService};
use gempki_core::{Certificate, Clock, ErrorCode, GemPkiError, Result};
use tracing::{debug, warn};

use crate::cache::OcspRespCache;
use crate::config::OcspConfig;
use crate::request::OcspRequest;
use crate::response::OcspResponse;
use crate::ssp::ResolveSsp;
use crate::transport::{OcspTransport, TransportError};
use crate::verifier::{resolve_status, OcspResponseVerifier, OcspStage};

/// Where a good answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Fetched from the responder during this call
    Responder,
    /// Served from the response cache
    Cache,
    /// Supplied by the caller
    Provided,
}

/// Outcome of a revocation check that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationStatus {
    /// Not revoked at the reference date
    Good { source: ResponseSource },
    /// Responder unreachable and failures are tolerated
    Skipped { cause: GemPkiError },
}

impl RevocationStatus {
    /// Check whether revocation was not actually proven
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// OCSP engine shared across verification calls
#[derive(Clone)]
pub struct OcspEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    product_type: String,
    config: OcspConfig,
    transport: Arc<dyn OcspTransport>,
    ssp: Arc<dyn ResolveSsp>,
    cache: OcspRespCache,
}

impl OcspEngine {
    #[must_use]
    pub fn new(
        product_type: impl Into<String>,
        config: OcspConfig,
        transport: Arc<dyn OcspTransport>,
        ssp: Arc<dyn ResolveSsp>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = OcspRespCache::new(config.grace_period, clock);
        Self {
            inner: Arc::new(EngineInner {
                product_type: product_type.into(),
                config,
                transport,
                ssp,
                cache,
            }),
        }
    }

    #[must_use]
    pub fn product_type(&self) -> &str {
        &self.inner.product_type
    }

    #[must_use]
    pub fn config(&self) -> &OcspConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn cache(&self) -> &OcspRespCache {
        &self.inner.cache
    }

    /// Prove that `ee`, issued by `issuer`, is not revoked at `reference_date`.
    ///
    /// A fresh cached response skips the network and is only re-evaluated
    /// for status.
    pub async fn check(
        &self,
        ee: &Certificate,
        issuer: &TspService,
        trust_list: &TrustList,
        reference_date: DateTime<Utc>,
    ) -> Result<RevocationStatus> {
        let product_type = self.product_type();
        let fingerprint = ee.fingerprint();

        if let Some(cached) = self.inner.cache.get(&fingerprint) {
            resolve_status(product_type, &cached.single, reference_date)?;
            debug!(
                stage = %OcspStage::StatusResolved,
                fingerprint = %fingerprint,
                source = "cache",
                "OCSP stage"
            );
            return Ok(RevocationStatus::Good {
                source: ResponseSource::Cache,
            });
        }

        let request = self.build_request(ee, issuer)?;
        debug!(stage = %OcspStage::RequestBuilt, fingerprint = %fingerprint, "OCSP stage");

        let url = self.inner.ssp.resolve(product_type, ee, issuer)?;
        let bytes = match self.fetch(&url, request.der()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let cause = GemPkiError::with_detail(
                    product_type,
                    ErrorCode::OcspUnreachable,
                    e.to_string(),
                );
                if self.inner.config.tolerate_failure {
                    warn!(
                        url = %url,
                        fingerprint = %fingerprint,
                        error = %e,
                        "OCSP responder unreachable, revocation check skipped"
                    );
                    return Ok(RevocationStatus::Skipped { cause });
                }
                return Err(cause);
            }
        };
        debug!(
            stage = %OcspStage::ResponseObtained,
            fingerprint = %fingerprint,
            url = %url,
            "OCSP stage"
        );

        let response = self.decode(&bytes)?;
        let verified = OcspResponseVerifier::new(product_type, &self.inner.config, trust_list)
            .verify(ee, request.cert_id(), response, reference_date)?;
        self.inner.cache.put(fingerprint, Arc::new(verified));

        Ok(RevocationStatus::Good {
            source: ResponseSource::Responder,
        })
    }

    /// Verify a caller-supplied response without network or cache.
    pub fn check_provided(
        &self,
        ee: &Certificate,
        issuer: &TspService,
        trust_list: &TrustList,
        response_der: &[u8],
        reference_date: DateTime<Utc>,
    ) -> Result<RevocationStatus> {
        let request = self.build_request(ee, issuer)?;
        let response = self.decode(response_der)?;
        OcspResponseVerifier::new(self.product_type(), &self.inner.config, trust_list).verify(
            ee,
            request.cert_id(),
            response,
            reference_date,
        )?;
        Ok(RevocationStatus::Good {
            source: ResponseSource::Provided,
        })
    }

    fn build_request(&self, ee: &Certificate, issuer: &TspService) -> Result<OcspRequest> {
        OcspRequest::new(ee, &issuer.certificate).map_err(|e| {
            GemPkiError::with_detail(self.product_type(), ErrorCode::CertReadError, e.to_string())
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<OcspResponse> {
        OcspResponse::from_der(bytes).map_err(|e| {
            GemPkiError::with_detail(self.product_type(), ErrorCode::OcspStatusError, e.to_string())
        })
    }

    async fn fetch(&self, url: &str, body: &[u8]) -> std::result::Result<Vec<u8>, TransportError> {
        let timeout = self.inner.config.timeout;
        match tokio::time::timeout(timeout, self.inner.transport.send(url, body, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(
                u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }
}
