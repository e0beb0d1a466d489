//! Ordered verification pipeline for end-entity certificates.
//!
//! Each validator is built up front from its inputs and raises at most one
//! [`ErrorCode`](crate::ErrorCode). A [`VerificationPipeline`] runs them in
//! fixed order and stops at the first failure.

mod common;
mod profile;

pub use common::{IssuerServiceStatusValidator, SignatureValidator, ValidityValidator};
pub use profile::{
    CertTypeValidator, CriticalExtensionsValidator, ExtendedKeyUsageValidator, KeyUsageValidator,
};

use chrono::{DateTime, Utc};

use crate::cert::Certificate;
use crate::error::Result;
use crate::profile::CertificateProfile;
use crate::tsl::TspService;

/// A single check against one certificate
pub trait CertificateValidator: Send + Sync {
    fn validate(&self, cert: &Certificate) -> Result<()>;
}

/// Fixed sequence of validators
pub struct VerificationPipeline<'a> {
    stages: Vec<Box<dyn CertificateValidator + 'a>>,
}

impl<'a> VerificationPipeline<'a> {
    /// Validity, signature and issuer service status
    #[must_use]
    pub fn common(
        product_type: &'a str,
        issuer: &'a TspService,
        reference_date: DateTime<Utc>,
    ) -> Self {
        Self {
            stages: vec![
                Box::new(ValidityValidator::new(product_type, reference_date)),
                Box::new(SignatureValidator::new(product_type, Some(&issuer.certificate))),
                Box::new(IssuerServiceStatusValidator::new(product_type, issuer)),
            ],
        }
    }

    /// Key usage, extended key usage, certificate type and critical extensions
    #[must_use]
    pub fn profile(
        product_type: &'a str,
        issuer: &'a TspService,
        profile: &'a CertificateProfile,
    ) -> Self {
        Self {
            stages: vec![
                Box::new(KeyUsageValidator::new(product_type, profile)),
                Box::new(ExtendedKeyUsageValidator::new(product_type, profile)),
                Box::new(CertTypeValidator::new(product_type, profile, issuer)),
                Box::new(CriticalExtensionsValidator::new(product_type, profile)),
            ],
        }
    }

    /// Common checks followed by profile checks
    #[must_use]
    pub fn full(
        product_type: &'a str,
        issuer: &'a TspService,
        profile: &'a CertificateProfile,
        reference_date: DateTime<Utc>,
    ) -> Self {
        let mut pipeline = Self::common(product_type, issuer, reference_date);
        pipeline
            .stages
            .extend(Self::profile(product_type, issuer, profile).stages);
        pipeline
    }

    /// Run every stage in order, stopping at the first failure
    pub fn verify_all(&self, cert: &Certificate) -> Result<()> {
        self.stages.iter().try_for_each(|stage| stage.validate(cert))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
