//! Validation of a decoded OCSP response against a request.

use std::fmt;

use chrono::{DateTime, Utc};
use gempki_core::tsl::{ServiceStatus, TrustList};
use gempki_core::{crypto, Certificate, ErrorCode, GemPkiError, Result};
use tracing::{debug, warn};
use x509_ocsp::CertId;

use crate::cert_hash::CertHash;
use crate::config::{to_chrono, OcspConfig};
use crate::request::cert_id_matches;
use crate::response::{
    BasicResponse, CertStatus, OcspResponse, ResponderId, ResponseStatus, SingleResponse,
};

/// States of one OCSP check, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcspStage {
    RequestBuilt,
    ResponseObtained,
    IdentityChecked,
    SignatureChecked,
    HashChecked,
    TimingChecked,
    StatusResolved,
}

impl OcspStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RequestBuilt => "request_built",
            Self::ResponseObtained => "response_obtained",
            Self::IdentityChecked => "identity_checked",
            Self::SignatureChecked => "signature_checked",
            Self::HashChecked => "hash_checked",
            Self::TimingChecked => "timing_checked",
            Self::StatusResolved => "status_resolved",
        }
    }
}

impl fmt::Display for OcspStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response that passed every stage, with the entry that answered.
#[derive(Debug, Clone)]
pub struct VerifiedResponse {
    pub response: OcspResponse,
    pub single: SingleResponse,
    pub responder: Certificate,
}

/// Runs identity, signature, cert-id, hash, timing and status checks.
pub struct OcspResponseVerifier<'a> {
    product_type: &'a str,
    config: &'a OcspConfig,
    trust_list: &'a TrustList,
}

impl<'a> OcspResponseVerifier<'a> {
    #[must_use]
    pub const fn new(
        product_type: &'a str,
        config: &'a OcspConfig,
        trust_list: &'a TrustList,
    ) -> Self {
        Self {
            product_type,
            config,
            trust_list,
        }
    }

    /// Verify `response` as the answer to `cert_id` for `ee`.
    pub fn verify(
        &self,
        ee: &Certificate,
        cert_id: &CertId,
        response: OcspResponse,
        reference_date: DateTime<Utc>,
    ) -> Result<VerifiedResponse> {
        let fingerprint = ee.fingerprint();
        let basic = self.successful(&response)?;

        let responder = self.identify_responder(basic)?;
        debug!(
            stage = %OcspStage::IdentityChecked,
            fingerprint = %fingerprint,
            responder = %responder.subject(),
            "OCSP stage"
        );

        crypto::verify_signature(
            &basic.signature_algorithm,
            &responder.public_key_ref(),
            &basic.tbs_der,
            &basic.signature,
        )
        .map_err(|e| self.error(ErrorCode::OcspSignatureInvalid, e.to_string()))?;
        debug!(stage = %OcspStage::SignatureChecked, fingerprint = %fingerprint, "OCSP stage");

        let single = basic
            .responses
            .iter()
            .find(|s| cert_id_matches(&s.cert_id, cert_id))
            .cloned()
            .ok_or_else(|| GemPkiError::new(self.product_type, ErrorCode::OcspCertIdMismatch))?;

        if self.config.enforce_cert_hash {
            self.check_cert_hash(&single, ee)?;
            debug!(stage = %OcspStage::HashChecked, fingerprint = %fingerprint, "OCSP stage");
        }

        check_timing(self.config, basic.produced_at, &single, reference_date)
            .map_err(|detail| self.error(ErrorCode::OcspStaleOrSkewed, detail))?;
        debug!(stage = %OcspStage::TimingChecked, fingerprint = %fingerprint, "OCSP stage");

        resolve_status(self.product_type, &single, reference_date)?;
        debug!(stage = %OcspStage::StatusResolved, fingerprint = %fingerprint, "OCSP stage");

        Ok(VerifiedResponse {
            response,
            single,
            responder,
        })
    }

    fn successful<'r>(&self, response: &'r OcspResponse) -> Result<&'r BasicResponse> {
        match (response.status, &response.basic) {
            (ResponseStatus::Successful, Some(basic)) => Ok(basic),
            (status, _) => Err(self.error(ErrorCode::OcspStatusError, format!("{status:?}"))),
        }
    }

    /// Exactly one candidate, matching the responder ID and authorized by the list.
    fn identify_responder(&self, basic: &BasicResponse) -> Result<Certificate> {
        let names_responder = |cert: &Certificate| -> bool {
            match &basic.responder_id {
                ResponderId::ByName(name) => cert.subject_der() == name.as_slice(),
                ResponderId::ByKey(hash) => crypto::sha1(cert.public_key()) == *hash,
            }
        };

        let mut candidates: Vec<&Certificate> = Vec::new();
        if basic.certificates.is_empty() {
            for service in self.trust_list.ocsp_responders() {
                if names_responder(&service.certificate)
                    && !candidates.contains(&&service.certificate)
                {
                    candidates.push(&service.certificate);
                }
            }
        } else {
            candidates.extend(basic.certificates.iter());
        }

        let [responder] = candidates.as_slice() else {
            return Err(self.error(
                ErrorCode::OcspResponderCertMissing,
                format!("{} responder candidates", candidates.len()),
            ));
        };
        let responder: &Certificate = responder;

        if !names_responder(responder) {
            return Err(self.error(
                ErrorCode::OcspResponderCertMissing,
                format!("{} is not the named responder", responder.subject()),
            ));
        }

        if !self.is_authorized_responder(responder) {
            return Err(self.error(
                ErrorCode::OcspResponderCertMissing,
                format!("{} is not authorized by the trust list", responder.subject()),
            ));
        }

        Ok(responder.clone())
    }

    fn is_authorized_responder(&self, responder: &Certificate) -> bool {
        self.trust_list
            .ocsp_responders()
            .filter(|service| service.status == ServiceStatus::Granted)
            .any(|service| {
                service.certificate == *responder
                    || (responder.is_issued_by_name_and_key(&service.certificate)
                        && responder.verify_signed_by(&service.certificate).is_ok())
            })
    }

    fn check_cert_hash(&self, single: &SingleResponse, ee: &Certificate) -> Result<()> {
        let raw = single
            .cert_hash
            .as_deref()
            .ok_or_else(|| GemPkiError::new(self.product_type, ErrorCode::CertHashMissing))?;

        let cert_hash = CertHash::decode(raw)
            .map_err(|e| self.error(ErrorCode::CertHashMismatch, e.to_string()))?;
        if cert_hash.matches(ee) {
            Ok(())
        } else {
            Err(GemPkiError::new(self.product_type, ErrorCode::CertHashMismatch))
        }
    }

    fn error(&self, code: ErrorCode, detail: impl Into<String>) -> GemPkiError {
        GemPkiError::with_detail(self.product_type, code, detail)
    }
}

/// Check producedAt, thisUpdate and nextUpdate against `reference`.
///
/// Equal to a bound passes. Returns the violated bound as detail.
pub fn check_timing(
    config: &OcspConfig,
    produced_at: DateTime<Utc>,
    single: &SingleResponse,
    reference: DateTime<Utc>,
) -> std::result::Result<(), String> {
    let tolerance = to_chrono(config.time_tolerance);
    let past = to_chrono(config.produced_at_past_tolerance);
    let latest = reference + tolerance;

    if single.this_update > latest {
        return Err(format!("thisUpdate {} is in the future", single.this_update));
    }
    if produced_at > latest {
        return Err(format!("producedAt {produced_at} is in the future"));
    }
    if produced_at < reference - past {
        return Err(format!("producedAt {produced_at} is too old"));
    }
    if let Some(next_update) = single.next_update {
        if next_update < reference - tolerance {
            return Err(format!("nextUpdate {next_update} has passed"));
        }
    }
    Ok(())
}

/// Map the single response status to an outcome at `reference`.
pub fn resolve_status(
    product_type: &str,
    single: &SingleResponse,
    reference: DateTime<Utc>,
) -> Result<()> {
    match single.status {
        CertStatus::Good => Ok(()),
        CertStatus::Revoked { revocation_time } if reference < revocation_time => Ok(()),
        CertStatus::Revoked { revocation_time } => Err(GemPkiError::with_detail(
            product_type,
            ErrorCode::CertRevoked,
            format!("revoked at {revocation_time}"),
        )),
        CertStatus::Unknown => {
            warn!(product_type = %product_type, "OCSP responder reports status unknown");
            Err(GemPkiError::new(product_type, ErrorCode::CertStatusUnknown))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{cert_id_for, OcspRequest};
    use crate::testkit::OcspResponseBuilder;
    use chrono::Duration;
    use gempki_core::oid;
    use gempki_core::testkit::{trust_list, CertSpec, TestCa};
    use gempki_core::tsl::TspService;

    struct Fixture {
        ca: TestCa,
        ee: Certificate,
        responder: Certificate,
        responder_key: Vec<u8>,
        list: TrustList,
        request: OcspRequest,
    }

    impl Fixture {
        fn new() -> Self {
            let ca = TestCa::new("Issuing CA");
            let ee = ca.issue(&CertSpec::smcb_aut("Praxis"));
            let (responder, key) = ca.issue_with_key(
                &CertSpec::new("OCSP Signer").eku(&[oid::EKU_OCSP_SIGNING]),
            );
            let list = trust_list(vec![
                ca.tsp_service(&[oid::CERT_TYPE_SMC_B_AUT]),
                TestCa::ocsp_service(&responder),
            ]);
            let request = OcspRequest::new(&ee, ca.certificate()).unwrap();
            Self {
                ca,
                ee,
                responder,
                responder_key: key.serialize_der(),
                list,
                request,
            }
        }

        fn builder(&self) -> OcspResponseBuilder {
            OcspResponseBuilder::new(&self.responder, &self.responder_key)
        }

        fn verify_with(
            &self,
            config: &OcspConfig,
            der: &[u8],
            at: DateTime<Utc>,
        ) -> Result<VerifiedResponse> {
            let response = OcspResponse::from_der(der).unwrap();
            OcspResponseVerifier::new("test", config, &self.list).verify(
                &self.ee,
                self.request.cert_id(),
                response,
                at,
            )
        }

        fn verify(&self, der: &[u8]) -> Result<VerifiedResponse> {
            self.verify_with(&OcspConfig::default(), der, Utc::now())
        }
    }

    fn code(result: Result<VerifiedResponse>) -> ErrorCode {
        result.unwrap_err().code
    }

    fn single(this_update: DateTime<Utc>, next_update: Option<DateTime<Utc>>) -> SingleResponse {
        let ca = TestCa::new("CA");
        let ee = ca.issue(&CertSpec::new("ee"));
        SingleResponse {
            cert_id: cert_id_for(&ee, ca.certificate()).unwrap(),
            status: CertStatus::Good,
            this_update,
            next_update,
            cert_hash: None,
        }
    }

    #[test]
    fn test_good_response_passes() {
        let f = Fixture::new();
        let der = f.builder().build(&f.request, &f.ee);
        let verified = f.verify(&der).unwrap();
        assert_eq!(verified.single.status, CertStatus::Good);
        assert_eq!(verified.responder, f.responder);
    }

    #[test]
    fn test_unsuccessful_status() {
        let f = Fixture::new();
        let der = OcspResponseBuilder::unsuccessful(x509_ocsp::OcspResponseStatus::InternalError);
        assert_eq!(code(f.verify(&der)), ErrorCode::OcspStatusError);
    }

    #[test]
    fn test_responder_from_trust_list_when_not_embedded() {
        let f = Fixture::new();
        let by_name = f.builder().without_embedded_signer().build(&f.request, &f.ee);
        let by_key = f
            .builder()
            .without_embedded_signer()
            .responder_by_key()
            .build(&f.request, &f.ee);
        assert!(f.verify(&by_name).is_ok());
        assert!(f.verify(&by_key).is_ok());
    }

    #[test]
    fn test_unlisted_responder_is_rejected() {
        let f = Fixture::new();
        let (rogue, key) = f.ca.issue_with_key(&CertSpec::new("Rogue Responder"));
        let der = OcspResponseBuilder::new(&rogue, &key.serialize_der()).build(&f.request, &f.ee);
        assert_eq!(code(f.verify(&der)), ErrorCode::OcspResponderCertMissing);

        let unknown = OcspResponseBuilder::new(&rogue, &key.serialize_der())
            .without_embedded_signer()
            .build(&f.request, &f.ee);
        assert_eq!(code(f.verify(&unknown)), ErrorCode::OcspResponderCertMissing);
    }

    #[test]
    fn test_responder_issued_by_listed_ocsp_ca_is_authorized() {
        let ocsp_ca = TestCa::new("OCSP CA");
        let ca = TestCa::new("Issuing CA");
        let ee = ca.issue(&CertSpec::smcb_aut("Praxis"));
        let (responder, key) = ocsp_ca.issue_with_key(&CertSpec::new("Delegated Responder"));
        let list = trust_list(vec![
            ca.tsp_service(&[oid::CERT_TYPE_SMC_B_AUT]),
            TestCa::ocsp_service(ocsp_ca.certificate()),
        ]);
        let request = OcspRequest::new(&ee, ca.certificate()).unwrap();
        let der = OcspResponseBuilder::new(&responder, &key.serialize_der()).build(&request, &ee);

        let config = OcspConfig::default();
        let result = OcspResponseVerifier::new("test", &config, &list).verify(
            &ee,
            request.cert_id(),
            OcspResponse::from_der(&der).unwrap(),
            Utc::now(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_withdrawn_responder_record_is_not_authorized() {
        let mut f = Fixture::new();
        for service in &mut f.list.services {
            if service.certificate == f.responder {
                service.status = ServiceStatus::Withdrawn;
            }
        }
        let der = f.builder().build(&f.request, &f.ee);
        assert_eq!(code(f.verify(&der)), ErrorCode::OcspResponderCertMissing);
    }

    #[test]
    fn test_duplicate_listing_counts_once() {
        let mut f = Fixture::new();
        let duplicate: TspService = TestCa::ocsp_service(&f.responder);
        f.list.services.push(duplicate);
        let der = f.builder().without_embedded_signer().build(&f.request, &f.ee);
        assert!(f.verify(&der).is_ok());
    }

    #[test]
    fn test_more_than_one_embedded_certificate_is_rejected() {
        let f = Fixture::new();
        let der = f
            .builder()
            .embed_extra(f.ca.certificate())
            .build(&f.request, &f.ee);
        let err = f.verify(&der).unwrap_err();
        assert_eq!(err.code, ErrorCode::OcspResponderCertMissing);
        assert_eq!(err.detail.as_deref(), Some("2 responder candidates"));
    }

    #[test]
    fn test_two_listed_responders_with_same_name_are_ambiguous() {
        let mut f = Fixture::new();
        let (namesake, _) = f.ca.issue_with_key(
            &CertSpec::new("OCSP Signer").eku(&[oid::EKU_OCSP_SIGNING]),
        );
        assert_ne!(namesake, f.responder);
        assert_eq!(namesake.subject_der(), f.responder.subject_der());
        f.list.services.push(TestCa::ocsp_service(&namesake));

        let der = f.builder().without_embedded_signer().build(&f.request, &f.ee);
        let err = f.verify(&der).unwrap_err();
        assert_eq!(err.code, ErrorCode::OcspResponderCertMissing);
        assert_eq!(err.detail.as_deref(), Some("2 responder candidates"));

        // Embedding the signer resolves the ambiguity
        let embedded = f.builder().build(&f.request, &f.ee);
        assert!(f.verify(&embedded).is_ok());
    }

    #[test]
    fn test_tampered_signature() {
        let f = Fixture::new();
        let der = f.builder().tampered_signature().build(&f.request, &f.ee);
        assert_eq!(code(f.verify(&der)), ErrorCode::OcspSignatureInvalid);
    }

    #[test]
    fn test_answer_for_other_certificate() {
        let f = Fixture::new();
        let other = f.ca.issue(&CertSpec::smcb_aut("Other"));
        let der = f
            .builder()
            .for_cert_id(cert_id_for(&other, f.ca.certificate()).unwrap())
            .build(&f.request, &f.ee);
        assert_eq!(code(f.verify(&der)), ErrorCode::OcspCertIdMismatch);
    }

    #[test]
    fn test_cert_hash_enforcement() {
        let f = Fixture::new();
        let missing = f.builder().without_cert_hash().build(&f.request, &f.ee);
        let wrong = f.builder().wrong_cert_hash().build(&f.request, &f.ee);

        assert_eq!(code(f.verify(&missing)), ErrorCode::CertHashMissing);
        assert_eq!(code(f.verify(&wrong)), ErrorCode::CertHashMismatch);

        let lenient = OcspConfig::default().enforce_cert_hash(false);
        assert!(f.verify_with(&lenient, &missing, Utc::now()).is_ok());
        assert!(f.verify_with(&lenient, &wrong, Utc::now()).is_ok());
    }

    #[test]
    fn test_revoked_respects_reference_date() {
        let f = Fixture::new();
        let revoked_at = Utc::now() - Duration::hours(1);
        let der = f.builder().revoked(revoked_at).build(&f.request, &f.ee);

        // Timing is checked against the reference date too, so widen it
        let config = OcspConfig::default()
            .time_tolerance(std::time::Duration::from_secs(4 * 3600))
            .produced_at_past_tolerance(std::time::Duration::from_secs(4 * 3600));
        let before = f.verify_with(&config, &der, revoked_at - Duration::minutes(30));
        let exact = DateTime::from_timestamp(revoked_at.timestamp(), 0).unwrap();
        let at = f.verify_with(&config, &der, exact);

        assert!(before.is_ok());
        assert_eq!(code(at), ErrorCode::CertRevoked);
        assert_eq!(code(f.verify(&der)), ErrorCode::CertRevoked);
    }

    #[test]
    fn test_unknown_status_is_warning() {
        let f = Fixture::new();
        let der = f.builder().unknown().build(&f.request, &f.ee);
        let err = f.verify(&der).unwrap_err();
        assert_eq!(err.code, ErrorCode::CertStatusUnknown);
        assert_eq!(err.severity(), gempki_core::Severity::Warning);
    }

    #[test]
    fn test_stale_response_fails_timing() {
        let f = Fixture::new();
        let old = Utc::now() - Duration::hours(2);
        let der = f
            .builder()
            .produced_at(old)
            .this_update(old)
            .next_update(Some(old + Duration::minutes(10)))
            .build(&f.request, &f.ee);
        assert_eq!(code(f.verify(&der)), ErrorCode::OcspStaleOrSkewed);
    }

    #[test]
    fn test_produced_at_future_boundary_is_inclusive() {
        let config = OcspConfig::default();
        let produced_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let entry = single(produced_at - Duration::minutes(1), None);
        let tolerance = Duration::milliseconds(37_500);

        // producedAt = reference + tolerance
        let reference = produced_at - tolerance;
        assert!(check_timing(&config, produced_at, &entry, reference).is_ok());

        // producedAt = reference + tolerance + 1ms
        let reference = produced_at - tolerance - Duration::milliseconds(1);
        assert!(check_timing(&config, produced_at, &entry, reference).is_err());
    }

    #[test]
    fn test_produced_at_past_uses_wider_allowance() {
        let config = OcspConfig::default();
        let produced_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let entry = single(produced_at, None);

        // 40s in the past: beyond the symmetric tolerance, inside the past allowance
        let reference = produced_at + Duration::seconds(40);
        assert!(check_timing(&config, produced_at, &entry, reference).is_ok());

        let reference = produced_at + Duration::milliseconds(47_500);
        assert!(check_timing(&config, produced_at, &entry, reference).is_ok());
        let reference = produced_at + Duration::milliseconds(47_501);
        assert!(check_timing(&config, produced_at, &entry, reference).is_err());
    }

    #[test]
    fn test_this_update_in_future_fails() {
        let config = OcspConfig::default();
        let reference = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let entry = single(reference + Duration::seconds(38), None);
        let detail = check_timing(&config, reference, &entry, reference).unwrap_err();
        assert!(detail.contains("thisUpdate"));

        let old = single(reference - Duration::days(3), None);
        assert!(check_timing(&config, reference, &old, reference).is_ok());
    }

    #[test]
    fn test_next_update_boundary() {
        let config = OcspConfig::default();
        let reference = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let tolerance = Duration::milliseconds(37_500);

        let at_bound = single(reference - Duration::hours(1), Some(reference - tolerance));
        assert!(check_timing(&config, reference, &at_bound, reference).is_ok());

        let passed = single(
            reference - Duration::hours(1),
            Some(reference - tolerance - Duration::milliseconds(1)),
        );
        assert!(check_timing(&config, reference, &passed, reference).is_err());
    }
}
