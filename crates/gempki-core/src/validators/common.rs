use chrono::{DateTime, Utc};
use tracing::debug;

use super::CertificateValidator;
use crate::cert::Certificate;
use crate::error::{ErrorCode, GemPkiError, Result};
use crate::tsl::TspService;

/// Time validity at a reference date
pub struct ValidityValidator<'a> {
    product_type: &'a str,
    reference_date: DateTime<Utc>,
}

impl<'a> ValidityValidator<'a> {
    #[must_use]
    pub const fn new(product_type: &'a str, reference_date: DateTime<Utc>) -> Self {
        Self {
            product_type,
            reference_date,
        }
    }
}

impl CertificateValidator for ValidityValidator<'_> {
    fn validate(&self, cert: &Certificate) -> Result<()> {
        if self.reference_date > cert.not_after() {
            return Err(GemPkiError::with_detail(
                self.product_type,
                ErrorCode::Expired,
                format!("not after {}", cert.not_after()),
            ));
        }
        if self.reference_date < cert.not_before() {
            return Err(GemPkiError::with_detail(
                self.product_type,
                ErrorCode::NotYetValid,
                format!("not before {}", cert.not_before()),
            ));
        }
        Ok(())
    }
}

/// Certificate signature under the issuer's key
pub struct SignatureValidator<'a> {
    product_type: &'a str,
    issuer: Option<&'a Certificate>,
}

impl<'a> SignatureValidator<'a> {
    #[must_use]
    pub const fn new(product_type: &'a str, issuer: Option<&'a Certificate>) -> Self {
        Self {
            product_type,
            issuer,
        }
    }
}

impl CertificateValidator for SignatureValidator<'_> {
    fn validate(&self, cert: &Certificate) -> Result<()> {
        let issuer = self
            .issuer
            .ok_or_else(|| GemPkiError::new(self.product_type, ErrorCode::IssuerCertMissing))?;

        cert.verify_signed_by(issuer).map_err(|e| {
            debug!(
                subject = %cert.subject(),
                issuer = %issuer.subject(),
                error = %e,
                "signature check failed"
            );
            GemPkiError::with_detail(self.product_type, ErrorCode::SignatureInvalid, e.to_string())
        })
    }
}

/// Issuer service status, evaluated at the certificate's notBefore.
pub struct IssuerServiceStatusValidator<'a> {
    product_type: &'a str,
    issuer: &'a TspService,
}

impl<'a> IssuerServiceStatusValidator<'a> {
    #[must_use]
    pub const fn new(product_type: &'a str, issuer: &'a TspService) -> Self {
        Self {
            product_type,
            issuer,
        }
    }
}

impl CertificateValidator for IssuerServiceStatusValidator<'_> {
    fn validate(&self, cert: &Certificate) -> Result<()> {
        if self.issuer.is_service_status_valid_at(cert.not_before()) {
            Ok(())
        } else {
            Err(GemPkiError::with_detail(
                self.product_type,
                ErrorCode::IssuerServiceNotAuthorized,
                format!(
                    "status {:?} since {}",
                    self.issuer.status, self.issuer.status_starting_time
                ),
            ))
        }
    }
}
