//! End-entity certificate verification against the trusted list.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gempki_core::tsl::{TrustList, TspService};
use gempki_core::validators::VerificationPipeline;
use gempki_core::{
    Certificate, CertificateProfile, Clock, ErrorCode, GemPkiError, ProfileName, Result,
};
use gempki_ocsp::{OcspEngine, OcspTransport, RevocationStatus};
use tracing::debug;

use crate::config::ValidatedConfig;
use crate::trust_store::TrustStore;

/// Result of a successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub product_type: String,
    /// First configured profile the certificate satisfies
    pub profile: ProfileName,
    pub issuer_subject: String,
    pub revocation: RevocationStatus,
}

impl VerificationReport {
    /// Check whether revocation checking was skipped
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.revocation.is_degraded()
    }
}

/// Verifies end-entity certificates: issuer lookup, common checks, profile
/// checks and OCSP.
#[derive(Clone)]
pub struct CertificateVerifier {
    inner: Arc<VerifierInner>,
}

struct VerifierInner {
    product_type: String,
    profiles: Vec<(ProfileName, CertificateProfile)>,
    store: Arc<TrustStore>,
    ocsp: OcspEngine,
    clock: Arc<dyn Clock>,
}

impl CertificateVerifier {
    /// Build a verifier and its OCSP engine from configuration
    #[must_use]
    pub fn new(
        config: &ValidatedConfig,
        store: Arc<TrustStore>,
        transport: Arc<dyn OcspTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ocsp = OcspEngine::new(
            config.product_type(),
            config.ocsp_config(),
            transport,
            config.ssp_source().resolver(),
            Arc::clone(&clock),
        );
        Self::with_engine(config, store, ocsp, clock)
    }

    /// Build a verifier around an existing OCSP engine
    #[must_use]
    pub fn with_engine(
        config: &ValidatedConfig,
        store: Arc<TrustStore>,
        ocsp: OcspEngine,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(VerifierInner {
                product_type: config.product_type().to_string(),
                profiles: config.profiles().to_vec(),
                store,
                ocsp,
                clock,
            }),
        }
    }

    #[must_use]
    pub fn ocsp(&self) -> &OcspEngine {
        &self.inner.ocsp
    }

    /// Decode DER and verify at the current time
    pub async fn verify_der(&self, der: &[u8]) -> Result<VerificationReport> {
        let cert = Certificate::from_der(der).map_err(|e| {
            GemPkiError::with_detail(
                &self.inner.product_type,
                ErrorCode::CertReadError,
                e.to_string(),
            )
        })?;
        self.verify(&cert).await
    }

    /// Verify at the current time
    pub async fn verify(&self, cert: &Certificate) -> Result<VerificationReport> {
        self.verify_at(cert, self.inner.clock.now()).await
    }

    /// Verify as of `reference_date`, querying OCSP
    pub async fn verify_at(
        &self,
        cert: &Certificate,
        reference_date: DateTime<Utc>,
    ) -> Result<VerificationReport> {
        let list = self.inner.store.snapshot();
        let (issuer, profile) = self.check_structure(&list, cert, reference_date)?;
        let revocation = self
            .inner
            .ocsp
            .check(cert, issuer, &list, reference_date)
            .await?;
        Ok(self.report(profile, issuer, revocation))
    }

    /// Verify with a caller-supplied OCSP response instead of a live query
    pub fn verify_with_ocsp_response(
        &self,
        cert: &Certificate,
        ocsp_response: &[u8],
        reference_date: DateTime<Utc>,
    ) -> Result<VerificationReport> {
        let list = self.inner.store.snapshot();
        let (issuer, profile) = self.check_structure(&list, cert, reference_date)?;
        let revocation =
            self.inner
                .ocsp
                .check_provided(cert, issuer, &list, ocsp_response, reference_date)?;
        Ok(self.report(profile, issuer, revocation))
    }

    /// Issuer lookup, common checks, then the first matching profile.
    fn check_structure<'l>(
        &self,
        list: &'l TrustList,
        cert: &Certificate,
        reference_date: DateTime<Utc>,
    ) -> Result<(&'l TspService, ProfileName)> {
        let product_type = self.inner.product_type.as_str();
        let type_oids: Vec<&str> = self
            .inner
            .profiles
            .iter()
            .map(|(_, p)| p.cert_type.as_str())
            .collect();

        let issuer = list.find_issuer_record(product_type, cert, &type_oids)?;
        VerificationPipeline::common(product_type, issuer, reference_date).verify_all(cert)?;

        let mut first_failure = None;
        let mut declared_failure = None;
        for (name, profile) in &self.inner.profiles {
            match VerificationPipeline::profile(product_type, issuer, profile).verify_all(cert) {
                Ok(()) => {
                    debug!(
                        subject = %cert.subject(),
                        profile = %name,
                        "certificate matches profile"
                    );
                    return Ok((issuer, *name));
                }
                Err(e) => {
                    let declared = cert.policy_oids().contains(&profile.cert_type);
                    if declared && declared_failure.is_none() {
                        declared_failure = Some(e);
                    } else if first_failure.is_none() {
                        first_failure = Some(e);
                    }
                }
            }
        }

        Err(declared_failure
            .or(first_failure)
            .unwrap_or_else(|| GemPkiError::new(product_type, ErrorCode::CertTypeMismatch)))
    }

    fn report(
        &self,
        profile: ProfileName,
        issuer: &TspService,
        revocation: RevocationStatus,
    ) -> VerificationReport {
        VerificationReport {
            product_type: self.inner.product_type.clone(),
            profile,
            issuer_subject: issuer.certificate.subject().to_string(),
            revocation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PkiConfig;
    use gempki_core::oid;
    use gempki_core::testkit::{trust_list, CertSpec, TestCa};
    use gempki_core::SystemClock;
    use gempki_ocsp::testkit::OcspResponseBuilder;
    use gempki_ocsp::{HttpOcspTransport, OcspRequest, ResponseSource};

    struct Fixture {
        ca: TestCa,
        responder: Certificate,
        responder_key: Vec<u8>,
        verifier: CertificateVerifier,
    }

    impl Fixture {
        fn new(profiles: &[ProfileName]) -> Self {
            let ca = TestCa::new("Issuing CA");
            let (responder, key) = ca.issue_with_key(&CertSpec::new("OCSP Signer"));
            let list = trust_list(vec![
                ca.tsp_service(&[oid::CERT_TYPE_SMC_B_AUT, oid::CERT_TYPE_HBA_AUT]),
                TestCa::ocsp_service(&responder),
            ]);
            let config = PkiConfig::new("Konnektor", profiles).validate().unwrap();
            let verifier = CertificateVerifier::new(
                &config,
                Arc::new(TrustStore::new(list)),
                Arc::new(HttpOcspTransport::new().unwrap()),
                Arc::new(SystemClock),
            );
            Self {
                ca,
                responder,
                responder_key: key.serialize_der(),
                verifier,
            }
        }

        fn good_response(&self, ee: &Certificate) -> Vec<u8> {
            let request = OcspRequest::new(ee, self.ca.certificate()).unwrap();
            OcspResponseBuilder::new(&self.responder, &self.responder_key).build(&request, ee)
        }

        fn verify(&self, ee: &Certificate) -> Result<VerificationReport> {
            self.verifier
                .verify_with_ocsp_response(ee, &self.good_response(ee), Utc::now())
        }
    }

    #[test]
    fn test_report_names_first_matching_profile() {
        let f = Fixture::new(&[ProfileName::HpAut, ProfileName::HciAut]);
        let ee = f.ca.issue(&CertSpec::smcb_aut("Praxis"));

        let report = f.verify(&ee).unwrap();
        assert_eq!(report.product_type, "Konnektor");
        assert_eq!(report.profile, ProfileName::HciAut);
        assert_eq!(report.issuer_subject, f.ca.certificate().subject());
        assert_eq!(
            report.revocation,
            RevocationStatus::Good { source: ResponseSource::Provided }
        );
        assert!(!report.is_degraded());
    }

    #[test]
    fn test_declared_profile_error_is_reported() {
        let f = Fixture::new(&[ProfileName::HpAut, ProfileName::HciAut]);
        let ee = f
            .ca
            .issue(&CertSpec::smcb_aut("Praxis").critical_extension("1.2.3.4.5"));

        let err = f.verify(&ee).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedCriticalExtension);
    }

    #[test]
    fn test_first_profile_error_without_declared_type() {
        let f = Fixture::new(&[ProfileName::HpAut, ProfileName::HciAut]);
        let ee = f.ca.issue(&CertSpec::new("Untyped").eku(&[oid::EKU_CLIENT_AUTH]));

        let err = f.verify(&ee).unwrap_err();
        assert_eq!(err.code, ErrorCode::CertTypeMissing);
    }

    #[test]
    fn test_common_checks_run_before_profiles() {
        let f = Fixture::new(&[ProfileName::HciAut]);
        let now = Utc::now();
        let ee = f.ca.issue(
            &CertSpec::smcb_aut("Praxis")
                .valid_between(now - chrono::Duration::days(30), now - chrono::Duration::days(1))
                .critical_extension("1.2.3.4.5"),
        );

        assert_eq!(f.verify(&ee).unwrap_err().code, ErrorCode::Expired);
    }

    #[test]
    fn test_unknown_issuer() {
        let f = Fixture::new(&[ProfileName::HciAut]);
        let stranger = TestCa::new("Other CA");
        let ee = stranger.issue(&CertSpec::smcb_aut("Praxis"));

        let err = f
            .verifier
            .verify_with_ocsp_response(&ee, b"unused", Utc::now())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::IssuerNotFound);
    }

    #[tokio::test]
    async fn test_undecodable_certificate() {
        let f = Fixture::new(&[ProfileName::HciAut]);
        let err = f.verifier.verify_der(b"not a certificate").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::CertReadError);

        let ee = f.ca.issue(&CertSpec::smcb_aut("Praxis"));
        let mut padded = ee.der().to_vec();
        padded.push(0);
        let err = f.verifier.verify_der(&padded).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::CertReadError);
    }
}
