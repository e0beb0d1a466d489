use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type alias for PKI verification operations
pub type Result<T> = std::result::Result<T, GemPkiError>;

/// Severity class of an [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Verification must refuse trust
    Security,
    /// Environment or infrastructure failure, may be tolerated or retried
    Technical,
    /// Advisory, the caller may choose to proceed
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Security => write!(f, "security"),
            Self::Technical => write!(f, "technical"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// Closed taxonomy of verification failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    /// Reference time is after notAfter
    Expired,
    /// Reference time is before notBefore
    NotYetValid,
    /// Signature does not verify under the issuer or anchor key
    SignatureInvalid,
    /// No issuer certificate available for signature verification
    IssuerCertMissing,
    /// Issuer service status does not authorize the certificate
    IssuerServiceNotAuthorized,
    /// Key usage bits do not cover the profile
    KeyUsageMismatch,
    /// Extended key usage set does not cover the profile
    ExtendedKeyUsageMismatch,
    /// Certificate declares no certificate-type OID
    CertTypeMissing,
    /// Declared certificate type differs from the profile
    CertTypeMismatch,
    /// Issuer is not authorized for the declared certificate type
    CertTypeNotAuthorizedByIssuer,
    /// A critical extension is not whitelisted by the profile
    UnsupportedCriticalExtension,
    /// No issuer record in the trust list
    IssuerNotFound,
    /// More than one distinct issuer certificate matches
    AmbiguousIssuer,
    /// Trust list sequence number did not increase
    SequenceNotIncreasing,
    /// Trust list payload could not be decoded
    TslDecodeError,
    /// Certificate bytes could not be decoded
    CertReadError,
    /// No unique, authorized OCSP responder certificate
    OcspResponderCertMissing,
    /// OCSP response signature does not verify
    OcspSignatureInvalid,
    /// OCSP response lacks the CertHash extension
    CertHashMissing,
    /// OCSP CertHash differs from the certificate hash
    CertHashMismatch,
    /// Certificate is revoked
    CertRevoked,
    /// Responder does not know the certificate
    CertStatusUnknown,
    /// OCSP responder not reachable within the timeout
    OcspUnreachable,
    /// OCSP timestamps outside the tolerance window
    OcspStaleOrSkewed,
    /// OCSP response status not successful or undecodable
    OcspStatusError,
    /// OCSP response does not answer the request's CertID
    OcspCertIdMismatch,
    /// No service supply point available
    SspMissing,
}

impl ErrorCode {
    /// Severity class this code belongs to
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::Expired
            | Self::NotYetValid
            | Self::SignatureInvalid
            | Self::IssuerServiceNotAuthorized
            | Self::KeyUsageMismatch
            | Self::ExtendedKeyUsageMismatch
            | Self::CertTypeMissing
            | Self::CertTypeMismatch
            | Self::CertTypeNotAuthorizedByIssuer
            | Self::UnsupportedCriticalExtension
            | Self::IssuerNotFound
            | Self::AmbiguousIssuer
            | Self::SequenceNotIncreasing
            | Self::OcspResponderCertMissing
            | Self::OcspSignatureInvalid
            | Self::CertHashMissing
            | Self::CertHashMismatch
            | Self::CertRevoked => Severity::Security,
            Self::IssuerCertMissing
            | Self::TslDecodeError
            | Self::CertReadError
            | Self::OcspUnreachable
            | Self::OcspStaleOrSkewed
            | Self::OcspStatusError
            | Self::OcspCertIdMismatch
            | Self::SspMissing => Severity::Technical,
            Self::CertStatusUnknown => Severity::Warning,
        }
    }

    /// Stable identifier, suitable for logs and metrics labels
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Expired => "CERT_EXPIRED",
            Self::NotYetValid => "CERT_NOT_YET_VALID",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::IssuerCertMissing => "ISSUER_CERT_MISSING",
            Self::IssuerServiceNotAuthorized => "ISSUER_SERVICE_NOT_AUTHORIZED",
            Self::KeyUsageMismatch => "KEY_USAGE_MISMATCH",
            Self::ExtendedKeyUsageMismatch => "EXT_KEY_USAGE_MISMATCH",
            Self::CertTypeMissing => "CERT_TYPE_MISSING",
            Self::CertTypeMismatch => "CERT_TYPE_MISMATCH",
            Self::CertTypeNotAuthorizedByIssuer => "CERT_TYPE_NOT_AUTHORIZED_BY_ISSUER",
            Self::UnsupportedCriticalExtension => "UNSUPPORTED_CRITICAL_EXTENSION",
            Self::IssuerNotFound => "ISSUER_NOT_FOUND",
            Self::AmbiguousIssuer => "AMBIGUOUS_ISSUER",
            Self::SequenceNotIncreasing => "TSL_SEQUENCE_NOT_INCREASING",
            Self::TslDecodeError => "TSL_DECODE_ERROR",
            Self::CertReadError => "CERT_READ_ERROR",
            Self::OcspResponderCertMissing => "OCSP_RESPONDER_CERT_MISSING",
            Self::OcspSignatureInvalid => "OCSP_SIGNATURE_INVALID",
            Self::CertHashMissing => "CERTHASH_EXTENSION_MISSING",
            Self::CertHashMismatch => "CERTHASH_MISMATCH",
            Self::CertRevoked => "CERT_REVOKED",
            Self::CertStatusUnknown => "CERT_STATUS_UNKNOWN",
            Self::OcspUnreachable => "OCSP_UNREACHABLE",
            Self::OcspStaleOrSkewed => "OCSP_STALE_OR_SKEWED",
            Self::OcspStatusError => "OCSP_STATUS_ERROR",
            Self::OcspCertIdMismatch => "OCSP_CERT_ID_MISMATCH",
            Self::SspMissing => "SERVICE_SUPPLY_POINT_MISSING",
        }
    }

    /// Human-readable description
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Expired => "certificate is expired",
            Self::NotYetValid => "certificate is not yet valid",
            Self::SignatureInvalid => "signature could not be verified",
            Self::IssuerCertMissing => "issuer certificate is missing",
            Self::IssuerServiceNotAuthorized => {
                "issuer service status does not authorize the certificate"
            }
            Self::KeyUsageMismatch => "key usage does not match the certificate profile",
            Self::ExtendedKeyUsageMismatch => {
                "extended key usage does not match the certificate profile"
            }
            Self::CertTypeMissing => "certificate does not declare a certificate type",
            Self::CertTypeMismatch => "certificate type does not match the certificate profile",
            Self::CertTypeNotAuthorizedByIssuer => {
                "issuer is not authorized to issue this certificate type"
            }
            Self::UnsupportedCriticalExtension => {
                "certificate carries an unsupported critical extension"
            }
            Self::IssuerNotFound => "issuer of the certificate not found in the trust list",
            Self::AmbiguousIssuer => "more than one trust list issuer matches the certificate",
            Self::SequenceNotIncreasing => {
                "trust list sequence number is not greater than the current one"
            }
            Self::TslDecodeError => "trust list could not be decoded",
            Self::CertReadError => "certificate could not be decoded",
            Self::OcspResponderCertMissing => {
                "OCSP responder certificate missing or not authorized"
            }
            Self::OcspSignatureInvalid => "OCSP response signature is invalid",
            Self::CertHashMissing => "OCSP response lacks the CertHash extension",
            Self::CertHashMismatch => "OCSP CertHash does not match the certificate",
            Self::CertRevoked => "certificate is revoked",
            Self::CertStatusUnknown => "certificate status is unknown to the OCSP responder",
            Self::OcspUnreachable => "OCSP responder is unreachable",
            Self::OcspStaleOrSkewed => "OCSP response timestamps are outside the tolerance window",
            Self::OcspStatusError => "OCSP response status is not successful",
            Self::OcspCertIdMismatch => "OCSP response does not match the request",
            Self::SspMissing => "service supply point is missing",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A classified verification failure, labelled with the product context
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{product_type}: {}{}", .code.message(), render_detail(.detail.as_deref()))]
pub struct GemPkiError {
    /// Failure kind
    pub code: ErrorCode,
    /// Product or context label of the caller
    pub product_type: String,
    /// Additional context such as an offending OID
    pub detail: Option<String>,
}

fn render_detail(detail: Option<&str>) -> String {
    detail.map(|d| format!(" ({d})")).unwrap_or_default()
}

impl GemPkiError {
    /// Create an error without detail
    #[must_use]
    pub fn new(product_type: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            code,
            product_type: product_type.into(),
            detail: None,
        }
    }

    /// Create an error with detail
    #[must_use]
    pub fn with_detail(
        product_type: impl Into<String>,
        code: ErrorCode,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            code,
            product_type: product_type.into(),
            detail: Some(detail.into()),
        }
    }

    /// Severity class of the underlying code
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Check if a retry may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.code.severity(), Severity::Technical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_includes_product_type() {
        let err = GemPkiError::new("Konnektor", ErrorCode::Expired);
        assert_eq!(err.to_string(), "Konnektor: certificate is expired");
    }

    #[test]
    fn test_detail_is_appended() {
        let err = GemPkiError::with_detail(
            "IDP",
            ErrorCode::UnsupportedCriticalExtension,
            "1.2.3.4",
        );
        assert_eq!(
            err.to_string(),
            "IDP: certificate carries an unsupported critical extension (1.2.3.4)"
        );
    }

    #[test]
    fn test_severity_classes() {
        assert_eq!(ErrorCode::CertRevoked.severity(), Severity::Security);
        assert_eq!(ErrorCode::OcspUnreachable.severity(), Severity::Technical);
        assert_eq!(ErrorCode::OcspStaleOrSkewed.severity(), Severity::Technical);
        assert_eq!(ErrorCode::CertStatusUnknown.severity(), Severity::Warning);
        assert_eq!(ErrorCode::AmbiguousIssuer.severity(), Severity::Security);
    }

    #[test]
    fn test_only_technical_errors_are_retryable() {
        assert!(GemPkiError::new("p", ErrorCode::OcspUnreachable).is_retryable());
        assert!(!GemPkiError::new("p", ErrorCode::CertHashMismatch).is_retryable());
        assert!(!GemPkiError::new("p", ErrorCode::CertStatusUnknown).is_retryable());
    }
}
