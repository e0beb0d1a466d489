use super::CertificateValidator;
use crate::cert::Certificate;
use crate::error::{ErrorCode, GemPkiError, Result};
use crate::profile::CertificateProfile;
use crate::tsl::TspService;

/// Key usage must cover the profile bits
pub struct KeyUsageValidator<'a> {
    product_type: &'a str,
    profile: &'a CertificateProfile,
}

impl<'a> KeyUsageValidator<'a> {
    #[must_use]
    pub const fn new(product_type: &'a str, profile: &'a CertificateProfile) -> Self {
        Self {
            product_type,
            profile,
        }
    }
}

impl CertificateValidator for KeyUsageValidator<'_> {
    fn validate(&self, cert: &Certificate) -> Result<()> {
        if cert.key_usage().contains(self.profile.key_usage) {
            return Ok(());
        }
        Err(GemPkiError::with_detail(
            self.product_type,
            ErrorCode::KeyUsageMismatch,
            format!(
                "has {}, {} requires {}",
                cert.key_usage(),
                self.profile.name,
                self.profile.key_usage
            ),
        ))
    }
}

/// Extended key usage must cover the profile set
pub struct ExtendedKeyUsageValidator<'a> {
    product_type: &'a str,
    profile: &'a CertificateProfile,
}

impl<'a> ExtendedKeyUsageValidator<'a> {
    #[must_use]
    pub const fn new(product_type: &'a str, profile: &'a CertificateProfile) -> Self {
        Self {
            product_type,
            profile,
        }
    }
}

impl CertificateValidator for ExtendedKeyUsageValidator<'_> {
    fn validate(&self, cert: &Certificate) -> Result<()> {
        let missing: Vec<&str> = self
            .profile
            .extended_key_usage
            .iter()
            .filter(|oid| !cert.extended_key_usage().contains(*oid))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(GemPkiError::with_detail(
                self.product_type,
                ErrorCode::ExtendedKeyUsageMismatch,
                format!("missing {}", missing.join(", ")),
            ))
        }
    }
}

/// Declared certificate type must match the profile and be issuable by the issuer.
pub struct CertTypeValidator<'a> {
    product_type: &'a str,
    profile: &'a CertificateProfile,
    issuer: &'a TspService,
}

impl<'a> CertTypeValidator<'a> {
    #[must_use]
    pub const fn new(
        product_type: &'a str,
        profile: &'a CertificateProfile,
        issuer: &'a TspService,
    ) -> Self {
        Self {
            product_type,
            profile,
            issuer,
        }
    }
}

impl CertificateValidator for CertTypeValidator<'_> {
    fn validate(&self, cert: &Certificate) -> Result<()> {
        let declared = cert.policy_oids();
        if declared.is_empty() {
            return Err(GemPkiError::new(self.product_type, ErrorCode::CertTypeMissing));
        }

        let required = self.profile.cert_type.as_str();
        if !declared.iter().any(|oid| oid == required) {
            return Err(GemPkiError::with_detail(
                self.product_type,
                ErrorCode::CertTypeMismatch,
                format!("{} requires {required}", self.profile.name),
            ));
        }

        if !self.issuer.authorizes(required) {
            return Err(GemPkiError::with_detail(
                self.product_type,
                ErrorCode::CertTypeNotAuthorizedByIssuer,
                required,
            ));
        }

        Ok(())
    }
}

/// Every critical extension must be whitelisted
pub struct CriticalExtensionsValidator<'a> {
    product_type: &'a str,
    profile: &'a CertificateProfile,
}

impl<'a> CriticalExtensionsValidator<'a> {
    #[must_use]
    pub const fn new(product_type: &'a str, profile: &'a CertificateProfile) -> Self {
        Self {
            product_type,
            profile,
        }
    }
}

impl CertificateValidator for CriticalExtensionsValidator<'_> {
    fn validate(&self, cert: &Certificate) -> Result<()> {
        match cert
            .critical_extensions()
            .iter()
            .find(|oid| !self.profile.critical_extensions.contains(*oid))
        {
            Some(oid) => Err(GemPkiError::with_detail(
                self.product_type,
                ErrorCode::UnsupportedCriticalExtension,
                oid.as_str(),
            )),
            None => Ok(()),
        }
    }
}
