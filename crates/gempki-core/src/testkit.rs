//! Certificate and trust list fixtures for tests.
//!
//! Generates ECDSA P-256 hierarchies with `rcgen` at test time. Fixture
//! construction panics on failure.

use chrono::{DateTime, Duration, Utc};
use der::asn1::{Ia5String, ObjectIdentifier};
use der::Encode;
use rcgen::{
    BasicConstraints, CertificateParams, CustomExtension, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose,
};
use std::collections::BTreeSet;
use time::OffsetDateTime;
use x509_cert::ext::pkix::certpolicy::PolicyInformation;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{AccessDescription, AuthorityInfoAccessSyntax, CertificatePolicies};

use crate::cert::Certificate;
use crate::crypto;
use crate::oid;
use crate::tsl::{
    ServiceStatus, ServiceType, TrustList, TslSignatureError, TslSignatureVerifier, TspService,
};

/// Requested properties of a generated certificate
#[derive(Debug, Clone)]
pub struct CertSpec {
    common_name: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    key_usages: Vec<KeyUsagePurpose>,
    ekus: Vec<String>,
    policies: Vec<String>,
    ocsp_urls: Vec<String>,
    critical_extensions: Vec<String>,
    authority_key_id: bool,
}

impl CertSpec {
    /// Valid from yesterday for a year, digitalSignature only
    #[must_use]
    pub fn new(common_name: impl Into<String>) -> Self {
        let now = truncate(Utc::now());
        Self {
            common_name: common_name.into(),
            not_before: now - Duration::days(1),
            not_after: now + Duration::days(365),
            key_usages: vec![KeyUsagePurpose::DigitalSignature],
            ekus: Vec::new(),
            policies: Vec::new(),
            ocsp_urls: Vec::new(),
            critical_extensions: Vec::new(),
            authority_key_id: true,
        }
    }

    /// SMC-B authentication certificate matching `C.HCI.AUT`
    #[must_use]
    pub fn smcb_aut(common_name: impl Into<String>) -> Self {
        Self::new(common_name)
            .policy(oid::CERT_TYPE_SMC_B_AUT)
            .eku(&[oid::EKU_CLIENT_AUTH])
    }

    #[must_use]
    pub fn valid_between(mut self, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        self.not_before = truncate(not_before);
        self.not_after = truncate(not_after);
        self
    }

    #[must_use]
    pub fn key_usage(mut self, usages: &[KeyUsagePurpose]) -> Self {
        self.key_usages = usages.to_vec();
        self
    }

    #[must_use]
    pub fn eku(mut self, oids: &[&str]) -> Self {
        self.ekus = oids.iter().map(ToString::to_string).collect();
        self
    }

    /// Add a certificate-policy (certificate type) OID
    #[must_use]
    pub fn policy(mut self, oid: &str) -> Self {
        self.policies.push(oid.to_string());
        self
    }

    /// Add an authorityInfoAccess OCSP URL
    #[must_use]
    pub fn ocsp_url(mut self, url: &str) -> Self {
        self.ocsp_urls.push(url.to_string());
        self
    }

    /// Add an unknown extension marked critical
    #[must_use]
    pub fn critical_extension(mut self, oid: &str) -> Self {
        self.critical_extensions.push(oid.to_string());
        self
    }

    /// Omit the authority key identifier
    #[must_use]
    pub fn without_authority_key_id(mut self) -> Self {
        self.authority_key_id = false;
        self
    }

    fn params(&self) -> CertificateParams {
        let mut params =
            CertificateParams::new(Vec::<String>::new()).expect("empty SAN list is valid");
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, self.common_name.as_str());
        dn.push(DnType::CountryName, "DE");
        params.distinguished_name = dn;
        params.not_before = to_offset(self.not_before);
        params.not_after = to_offset(self.not_after);
        params.key_usages.clone_from(&self.key_usages);
        params.extended_key_usages = self.ekus.iter().map(|o| eku_purpose(o)).collect();
        params.use_authority_key_identifier_extension = self.authority_key_id;

        if !self.policies.is_empty() {
            let policies = CertificatePolicies(
                self.policies
                    .iter()
                    .map(|p| PolicyInformation {
                        policy_identifier: object_id(p),
                        policy_qualifiers: None,
                    })
                    .collect(),
            );
            params.custom_extensions.push(CustomExtension::from_oid_content(
                &oid_arcs(oid::EXT_CERTIFICATE_POLICIES),
                policies.to_der().expect("encode certificatePolicies"),
            ));
        }

        if !self.ocsp_urls.is_empty() {
            let aia = AuthorityInfoAccessSyntax(
                self.ocsp_urls
                    .iter()
                    .map(|url| AccessDescription {
                        access_method: object_id(oid::AD_OCSP),
                        access_location: GeneralName::UniformResourceIdentifier(
                            Ia5String::new(url).expect("ASCII URL"),
                        ),
                    })
                    .collect(),
            );
            params.custom_extensions.push(CustomExtension::from_oid_content(
                &oid_arcs(oid::EXT_AUTHORITY_INFO_ACCESS),
                aia.to_der().expect("encode authorityInfoAccess"),
            ));
        }

        for critical in &self.critical_extensions {
            // DER NULL as opaque content
            let mut ext = CustomExtension::from_oid_content(&oid_arcs(critical), vec![0x05, 0x00]);
            ext.set_criticality(true);
            params.custom_extensions.push(ext);
        }

        params
    }
}

/// A generated issuing CA
pub struct TestCa {
    key: KeyPair,
    cert: rcgen::Certificate,
    certificate: Certificate,
}

impl TestCa {
    /// Self-signed CA valid from yesterday for ten years
    #[must_use]
    pub fn new(common_name: &str) -> Self {
        let now = Utc::now();
        let spec = CertSpec::new(common_name)
            .valid_between(now - Duration::days(1), now + Duration::days(3650))
            .key_usage(&[
                KeyUsagePurpose::KeyCertSign,
                KeyUsagePurpose::CrlSign,
                KeyUsagePurpose::DigitalSignature,
            ])
            .without_authority_key_id();
        let mut params = spec.params();
        params.is_ca = IsCa::Ca(BasicConstraints::Constrained(0));

        let key = KeyPair::generate().expect("generate CA key");
        let cert = params.self_signed(&key).expect("self-sign CA");
        let certificate = Certificate::from_der(cert.der()).expect("decode generated CA");
        Self {
            key,
            cert,
            certificate,
        }
    }

    #[must_use]
    pub const fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    #[must_use]
    pub const fn key_pair(&self) -> &KeyPair {
        &self.key
    }

    /// Issue an end-entity certificate
    #[must_use]
    pub fn issue(&self, spec: &CertSpec) -> Certificate {
        self.issue_with_key(spec).0
    }

    /// Issue an end-entity certificate and return its key
    #[must_use]
    pub fn issue_with_key(&self, spec: &CertSpec) -> (Certificate, KeyPair) {
        let key = KeyPair::generate().expect("generate EE key");
        let cert = spec
            .params()
            .signed_by(&key, &self.cert, &self.key)
            .expect("sign EE certificate");
        let certificate = Certificate::from_der(cert.der()).expect("decode generated EE");
        (certificate, key)
    }

    /// Granted CA/PKC record for this CA
    #[must_use]
    pub fn tsp_service(&self, cert_type_oids: &[&str]) -> TspService {
        TspService {
            provider_name: self.certificate.subject().to_string(),
            service_type: ServiceType::CaPkc,
            certificate: self.certificate.clone(),
            cert_type_oids: cert_type_oids.iter().map(ToString::to_string).collect::<BTreeSet<_>>(),
            status: ServiceStatus::Granted,
            status_starting_time: Utc::now() - Duration::days(365),
            service_supply_point: Some("http://ocsp.tsl.test/ocsp".to_string()),
        }
    }

    /// Granted OCSP responder record for `responder`
    #[must_use]
    pub fn ocsp_service(responder: &Certificate) -> TspService {
        TspService {
            provider_name: responder.subject().to_string(),
            service_type: ServiceType::OcspResponder,
            certificate: responder.clone(),
            cert_type_oids: BTreeSet::new(),
            status: ServiceStatus::Granted,
            status_starting_time: Utc::now() - Duration::days(365),
            service_supply_point: None,
        }
    }
}

/// Trust list with sequence number 100, signed by a throwaway TSL signer
#[must_use]
pub fn trust_list(services: Vec<TspService>) -> TrustList {
    let signer = TestCa::new("TSL Signer");
    trust_list_signed_by(signer.certificate(), 100, services)
}

/// Trust list with explicit signer and sequence number
#[must_use]
pub fn trust_list_signed_by(
    signer: &Certificate,
    sequence_number: u64,
    services: Vec<TspService>,
) -> TrustList {
    let now = Utc::now();
    TrustList {
        id: Some(format!("ID{sequence_number}")),
        sequence_number,
        issue_date: now - Duration::days(1),
        next_update: now + Duration::days(30),
        signer_certificate: signer.clone(),
        services,
    }
}

/// Stand-in TSL signature: payload followed by SHA-256 over anchor
/// fingerprint and payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct DigestSignatureVerifier;

impl DigestSignatureVerifier {
    const TAG_LEN: usize = 32;

    /// Append the tag binding `body` to `anchor`
    #[must_use]
    pub fn sign(body: &[u8], anchor: &Certificate) -> Vec<u8> {
        let mut signed = body.to_vec();
        signed.extend(Self::tag(body, anchor));
        signed
    }

    fn tag(body: &[u8], anchor: &Certificate) -> Vec<u8> {
        let mut input = anchor.fingerprint().into_bytes();
        input.extend_from_slice(body);
        crypto::sha256(&input)
    }
}

impl TslSignatureVerifier for DigestSignatureVerifier {
    fn verify(&self, payload: &[u8], anchor: &Certificate) -> Result<(), TslSignatureError> {
        if payload.len() < Self::TAG_LEN {
            return Err(TslSignatureError::Missing);
        }
        let (body, tag) = payload.split_at(payload.len() - Self::TAG_LEN);
        if Self::tag(body, anchor) == tag {
            Ok(())
        } else {
            Err(crypto::SignatureError::Mismatch.into())
        }
    }
}

fn truncate(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(t.timestamp(), 0).expect("timestamp in range")
}

fn to_offset(t: DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(t.timestamp()).expect("timestamp in range")
}

fn oid_arcs(oid: &str) -> Vec<u64> {
    oid.split('.')
        .map(|arc| arc.parse().expect("numeric OID arc"))
        .collect()
}

fn object_id(oid: &str) -> ObjectIdentifier {
    ObjectIdentifier::new(oid).expect("valid OID")
}

fn eku_purpose(oid: &str) -> ExtendedKeyUsagePurpose {
    match oid {
        oid::EKU_SERVER_AUTH => ExtendedKeyUsagePurpose::ServerAuth,
        oid::EKU_CLIENT_AUTH => ExtendedKeyUsagePurpose::ClientAuth,
        oid::EKU_OCSP_SIGNING => ExtendedKeyUsagePurpose::OcspSigning,
        other => panic!("unsupported test EKU {other}"),
    }
}
