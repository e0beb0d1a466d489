//! Service supply point (responder URL) resolution.

use std::sync::Arc;

use gempki_core::tsl::TspService;
use gempki_core::{Certificate, ErrorCode, GemPkiError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Strategy that finds the responder URL for a certificate
pub trait ResolveSsp: Send + Sync {
    fn resolve(&self, product_type: &str, ee: &Certificate, issuer: &TspService) -> Result<String>;
}

/// URL from the issuer's trust list record
#[derive(Debug, Default, Clone, Copy)]
pub struct TslSsp;

impl ResolveSsp for TslSsp {
    fn resolve(
        &self,
        product_type: &str,
        _ee: &Certificate,
        issuer: &TspService,
    ) -> Result<String> {
        let ssp = issuer.service_supply_point.as_deref().ok_or_else(|| {
            GemPkiError::with_detail(
                product_type,
                ErrorCode::SspMissing,
                issuer.provider_name.as_str(),
            )
        })?;
        checked(product_type, ssp)
    }
}

/// URL from the certificate's authorityInfoAccess extension
#[derive(Debug, Default, Clone, Copy)]
pub struct CertificateSsp;

impl ResolveSsp for CertificateSsp {
    fn resolve(
        &self,
        product_type: &str,
        ee: &Certificate,
        _issuer: &TspService,
    ) -> Result<String> {
        let ssp = ee.ocsp_urls().first().ok_or_else(|| {
            GemPkiError::with_detail(product_type, ErrorCode::SspMissing, ee.subject())
        })?;
        checked(product_type, ssp)
    }
}

fn checked(product_type: &str, ssp: &str) -> Result<String> {
    match Url::parse(ssp) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url.into()),
        _ => Err(GemPkiError::with_detail(
            product_type,
            ErrorCode::SspMissing,
            format!("invalid responder URL {ssp}"),
        )),
    }
}

/// Configurable choice of strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SspSource {
    #[default]
    Tsl,
    Certificate,
}

impl SspSource {
    #[must_use]
    pub fn resolver(self) -> Arc<dyn ResolveSsp> {
        match self {
            Self::Tsl => Arc::new(TslSsp),
            Self::Certificate => Arc::new(CertificateSsp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gempki_core::oid;
    use gempki_core::testkit::{CertSpec, TestCa};

    #[test]
    fn test_tsl_strategy_uses_record() {
        let ca = TestCa::new("CA");
        let ee = ca.issue(&CertSpec::smcb_aut("ee").ocsp_url("http://aia.test/ocsp"));
        let issuer = ca.tsp_service(&[oid::CERT_TYPE_SMC_B_AUT]);

        assert_eq!(
            TslSsp.resolve("test", &ee, &issuer).unwrap(),
            "http://ocsp.tsl.test/ocsp"
        );
        assert_eq!(
            CertificateSsp.resolve("test", &ee, &issuer).unwrap(),
            "http://aia.test/ocsp"
        );
    }

    #[test]
    fn test_missing_ssp() {
        let ca = TestCa::new("CA");
        let ee = ca.issue(&CertSpec::smcb_aut("ee"));
        let mut issuer = ca.tsp_service(&[oid::CERT_TYPE_SMC_B_AUT]);
        issuer.service_supply_point = None;

        assert_eq!(
            TslSsp.resolve("test", &ee, &issuer).unwrap_err().code,
            ErrorCode::SspMissing
        );
        assert_eq!(
            CertificateSsp.resolve("test", &ee, &issuer).unwrap_err().code,
            ErrorCode::SspMissing
        );
    }

    #[test]
    fn test_malformed_url_is_missing() {
        let ca = TestCa::new("CA");
        let ee = ca.issue(&CertSpec::smcb_aut("ee"));
        let mut issuer = ca.tsp_service(&[oid::CERT_TYPE_SMC_B_AUT]);
        issuer.service_supply_point = Some("ldap://directory".to_string());

        let err = TslSsp.resolve("test", &ee, &issuer).unwrap_err();
        assert_eq!(err.code, ErrorCode::SspMissing);
    }

    #[test]
    fn test_source_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            source: SspSource,
        }
        let parsed: Wrapper = serde_json::from_str(r#"{"source":"certificate"}"#).unwrap();
        assert_eq!(parsed.source, SspSource::Certificate);
    }
}
