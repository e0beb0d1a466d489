//! Signature and freshness checks for candidate trust lists.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::TrustList;
use crate::cert::Certificate;
use crate::crypto::SignatureError;
use crate::error::{ErrorCode, GemPkiError, Result};

/// Failure reported by a [`TslSignatureVerifier`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TslSignatureError {
    /// Payload carries no signature
    #[error("no signature found in trust list")]
    Missing,

    /// Signature structure or canonicalization failed
    #[error("malformed signature: {0}")]
    Malformed(String),

    /// Cryptographic check failed
    #[error(transparent)]
    Crypto(#[from] SignatureError),
}

/// Failure reported by a [`TrustListDecoder`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("trust list decode failed: {0}")]
pub struct TslDecodeError(pub String);

/// Verifies the signature embedded in a raw TSL payload.
///
/// Canonicalization and signature math live behind this seam.
pub trait TslSignatureVerifier: Send + Sync {
    fn verify(
        &self,
        payload: &[u8],
        anchor: &Certificate,
    ) -> std::result::Result<(), TslSignatureError>;
}

/// Decodes a raw TSL payload into the trust list model.
pub trait TrustListDecoder: Send + Sync {
    fn decode(&self, payload: &[u8]) -> std::result::Result<TrustList, TslDecodeError>;
}

/// Decides whether a candidate trust list may replace the current one.
#[derive(Clone)]
pub struct TrustListValidator {
    product_type: String,
    verifier: Arc<dyn TslSignatureVerifier>,
}

impl TrustListValidator {
    #[must_use]
    pub fn new(product_type: impl Into<String>, verifier: Arc<dyn TslSignatureVerifier>) -> Self {
        Self {
            product_type: product_type.into(),
            verifier,
        }
    }

    /// Check the payload signature against the trust anchor.
    pub fn validate_signature(&self, payload: &[u8], anchor: &Certificate) -> Result<()> {
        self.verifier.verify(payload, anchor).map_err(|e| {
            warn!(anchor = %anchor.subject(), error = %e, "trust list signature rejected");
            GemPkiError::with_detail(&self.product_type, ErrorCode::SignatureInvalid, e.to_string())
        })
    }

    /// Check sequencing against the trusted list and the next-update deadline.
    pub fn validate_freshness(
        &self,
        candidate: &TrustList,
        current: &TrustList,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if candidate.sequence_number <= current.sequence_number {
            return Err(GemPkiError::with_detail(
                &self.product_type,
                ErrorCode::SequenceNotIncreasing,
                format!(
                    "candidate {} <= current {}",
                    candidate.sequence_number, current.sequence_number
                ),
            ));
        }

        if candidate.next_update < now {
            return Err(GemPkiError::with_detail(
                &self.product_type,
                ErrorCode::Expired,
                format!("next update {} has passed", candidate.next_update),
            ));
        }

        debug!(
            sequence_number = candidate.sequence_number,
            next_update = %candidate.next_update,
            "trust list is fresh"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{trust_list, DigestSignatureVerifier, TestCa};
    use chrono::Duration;

    fn validator() -> TrustListValidator {
        TrustListValidator::new("TSL-Update", Arc::new(DigestSignatureVerifier))
    }

    #[test]
    fn test_signature_accepted_for_anchor() {
        let anchor = TestCa::new("TSL CA");
        let payload =
            DigestSignatureVerifier::sign(b"<TrustServiceStatusList/>", anchor.certificate());
        assert!(validator()
            .validate_signature(&payload, anchor.certificate())
            .is_ok());
    }

    #[test]
    fn test_signature_rejected_for_other_anchor() {
        let anchor = TestCa::new("TSL CA");
        let other = TestCa::new("Rogue CA");
        let payload =
            DigestSignatureVerifier::sign(b"<TrustServiceStatusList/>", other.certificate());

        let err = validator()
            .validate_signature(&payload, anchor.certificate())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SignatureInvalid);
        assert_eq!(err.product_type, "TSL-Update");
    }

    #[test]
    fn test_equal_sequence_number_is_rejected() {
        let current = trust_list(vec![]);
        let candidate = TrustList {
            sequence_number: current.sequence_number,
            ..current.clone()
        };

        let err = validator()
            .validate_freshness(&candidate, &current, Utc::now())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SequenceNotIncreasing);
    }

    #[test]
    fn test_lower_sequence_number_is_rejected() {
        let current = trust_list(vec![]);
        let candidate = TrustList {
            sequence_number: current.sequence_number - 1,
            ..current.clone()
        };

        let err = validator()
            .validate_freshness(&candidate, &current, Utc::now())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SequenceNotIncreasing);
    }

    #[test]
    fn test_past_next_update_is_expired() {
        let current = trust_list(vec![]);
        let now = Utc::now();
        let candidate = TrustList {
            sequence_number: current.sequence_number + 1,
            next_update: now - Duration::seconds(1),
            ..current.clone()
        };

        let err = validator()
            .validate_freshness(&candidate, &current, now)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Expired);
    }

    #[test]
    fn test_newer_list_is_fresh() {
        let current = trust_list(vec![]);
        let candidate = TrustList {
            sequence_number: current.sequence_number + 1,
            ..current.clone()
        };
        assert!(validator()
            .validate_freshness(&candidate, &current, Utc::now())
            .is_ok());
    }
}
