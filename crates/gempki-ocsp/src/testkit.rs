//! OCSP response fixtures for tests.
//!
//! Responses are signed with ECDSA P-256 via `ring`. Construction panics on
//! failure.

use chrono::{DateTime, Duration, Utc};
use der::asn1::{BitString, GeneralizedTime, Null, ObjectIdentifier, OctetString};
use der::{Decode, Encode};
use gempki_core::{crypto, oid, Certificate};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::spki::AlgorithmIdentifierOwned;
use x509_ocsp::{
    BasicOcspResponse, CertId, OcspGeneralizedTime, OcspResponseStatus, ResponderId,
    ResponseBytes, ResponseData, RevokedInfo, SingleResponse, Version,
};

use crate::cert_hash::{CertHash, ID_CERT_HASH};
use crate::request::OcspRequest;
use crate::response::{CertStatus, ID_PKIX_OCSP_BASIC};

const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap(oid::SIG_ECDSA_SHA256);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CertHashMode {
    Correct,
    Absent,
    Wrong,
}

/// Builder for signed OCSP responses
pub struct OcspResponseBuilder {
    signer: Certificate,
    key: EcdsaKeyPair,
    status: CertStatus,
    produced_at: DateTime<Utc>,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
    cert_hash: CertHashMode,
    by_key: bool,
    embed_signer: bool,
    extra_certs: Vec<Certificate>,
    tamper: bool,
    cert_id: Option<CertId>,
}

impl OcspResponseBuilder {
    /// Good response produced now, next update in one hour, with CertHash
    /// and the signer embedded.
    #[must_use]
    pub fn new(signer: &Certificate, signer_pkcs8: &[u8]) -> Self {
        let key = EcdsaKeyPair::from_pkcs8(
            &ECDSA_P256_SHA256_ASN1_SIGNING,
            signer_pkcs8,
            &SystemRandom::new(),
        )
        .expect("P-256 PKCS#8 signer key");
        let now = whole_seconds(Utc::now());
        Self {
            signer: signer.clone(),
            key,
            status: CertStatus::Good,
            produced_at: now,
            this_update: now,
            next_update: Some(now + Duration::hours(1)),
            cert_hash: CertHashMode::Correct,
            by_key: false,
            embed_signer: true,
            extra_certs: Vec::new(),
            tamper: false,
            cert_id: None,
        }
    }

    #[must_use]
    pub fn revoked(mut self, revocation_time: DateTime<Utc>) -> Self {
        self.status = CertStatus::Revoked {
            revocation_time: whole_seconds(revocation_time),
        };
        self
    }

    #[must_use]
    pub const fn unknown(mut self) -> Self {
        self.status = CertStatus::Unknown;
        self
    }

    /// Set producedAt, truncated to whole seconds
    #[must_use]
    pub fn produced_at(mut self, at: DateTime<Utc>) -> Self {
        self.produced_at = whole_seconds(at);
        self
    }

    #[must_use]
    pub fn this_update(mut self, at: DateTime<Utc>) -> Self {
        self.this_update = whole_seconds(at);
        self
    }

    #[must_use]
    pub fn next_update(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.next_update = at.map(whole_seconds);
        self
    }

    #[must_use]
    pub const fn without_cert_hash(mut self) -> Self {
        self.cert_hash = CertHashMode::Absent;
        self
    }

    #[must_use]
    pub const fn wrong_cert_hash(mut self) -> Self {
        self.cert_hash = CertHashMode::Wrong;
        self
    }

    /// Name the responder by key hash instead of subject
    #[must_use]
    pub const fn responder_by_key(mut self) -> Self {
        self.by_key = true;
        self
    }

    #[must_use]
    pub const fn without_embedded_signer(mut self) -> Self {
        self.embed_signer = false;
        self
    }

    /// Embed `cert` after the signer
    #[must_use]
    pub fn embed_extra(mut self, cert: &Certificate) -> Self {
        self.extra_certs.push(cert.clone());
        self
    }

    /// Corrupt the signature after signing
    #[must_use]
    pub const fn tampered_signature(mut self) -> Self {
        self.tamper = true;
        self
    }

    /// Answer a different CertID than the request's
    #[must_use]
    pub fn for_cert_id(mut self, cert_id: CertId) -> Self {
        self.cert_id = Some(cert_id);
        self
    }

    /// Encode a successful response answering `request` for `ee`
    #[must_use]
    pub fn build(&self, request: &OcspRequest, ee: &Certificate) -> Vec<u8> {
        let single = SingleResponse {
            cert_id: self.cert_id.clone().unwrap_or_else(|| request.cert_id().clone()),
            cert_status: match self.status {
                CertStatus::Good => x509_ocsp::CertStatus::Good(Null),
                CertStatus::Revoked { revocation_time } => {
                    x509_ocsp::CertStatus::Revoked(RevokedInfo {
                        revocation_time: ocsp_time(revocation_time),
                        revocation_reason: None,
                    })
                }
                CertStatus::Unknown => x509_ocsp::CertStatus::Unknown(Null),
            },
            this_update: ocsp_time(self.this_update),
            next_update: self.next_update.map(ocsp_time),
            single_extensions: self.cert_hash_extension(ee).map(|ext| vec![ext]),
        };

        let responder_id = if self.by_key {
            ResponderId::ByKey(
                OctetString::new(crypto::sha1(self.signer.public_key())).expect("key hash"),
            )
        } else {
            ResponderId::ByName(Name::from_der(self.signer.subject_der()).expect("subject name"))
        };

        let data = ResponseData {
            version: Version::V1,
            responder_id,
            produced_at: ocsp_time(self.produced_at),
            responses: vec![single],
            response_extensions: None,
        };

        let tbs = data.to_der().expect("encode tbsResponseData");
        let mut signature = self
            .key
            .sign(&SystemRandom::new(), &tbs)
            .expect("sign response")
            .as_ref()
            .to_vec();
        if self.tamper {
            if let Some(last) = signature.last_mut() {
                *last ^= 0x01;
            }
        }

        let embedded: Vec<x509_cert::Certificate> = self
            .embed_signer
            .then_some(&self.signer)
            .into_iter()
            .chain(&self.extra_certs)
            .map(|cert| x509_cert::Certificate::from_der(cert.der()).expect("embedded certificate"))
            .collect();
        let certs = (!embedded.is_empty()).then_some(embedded);

        let basic = BasicOcspResponse {
            tbs_response_data: data,
            signature_algorithm: AlgorithmIdentifierOwned {
                oid: ECDSA_WITH_SHA256,
                parameters: None,
            },
            signature: BitString::from_bytes(&signature).expect("signature bits"),
            certs,
        };

        x509_ocsp::OcspResponse {
            response_status: OcspResponseStatus::Successful,
            response_bytes: Some(ResponseBytes {
                response_type: ID_PKIX_OCSP_BASIC,
                response: OctetString::new(basic.to_der().expect("encode basic response"))
                    .expect("response octets"),
            }),
        }
        .to_der()
        .expect("encode response")
    }

    /// Encode a response carrying only a non-successful status
    #[must_use]
    pub fn unsuccessful(status: OcspResponseStatus) -> Vec<u8> {
        x509_ocsp::OcspResponse {
            response_status: status,
            response_bytes: None,
        }
        .to_der()
        .expect("encode response")
    }

    fn cert_hash_extension(&self, ee: &Certificate) -> Option<Extension> {
        let hashed = match self.cert_hash {
            CertHashMode::Absent => return None,
            CertHashMode::Correct => crypto::sha256(ee.der()),
            CertHashMode::Wrong => crypto::sha256(b"some other certificate"),
        };
        let value = CertHash {
            hash_algorithm: AlgorithmIdentifierOwned {
                oid: ObjectIdentifier::new_unwrap(oid::HASH_SHA256),
                parameters: None,
            },
            certificate_hash: OctetString::new(hashed).expect("hash octets"),
        };
        Some(Extension {
            extn_id: ID_CERT_HASH,
            critical: false,
            extn_value: OctetString::new(value.to_der().expect("encode CertHash"))
                .expect("extension octets"),
        })
    }
}

fn whole_seconds(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(t.timestamp(), 0).expect("timestamp in range")
}

fn ocsp_time(t: DateTime<Utc>) -> OcspGeneralizedTime {
    let secs = u64::try_from(t.timestamp()).expect("post-epoch time");
    OcspGeneralizedTime(
        GeneralizedTime::from_unix_duration(std::time::Duration::from_secs(secs))
            .expect("generalized time"),
    )
}
