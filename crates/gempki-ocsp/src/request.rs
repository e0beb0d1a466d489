//! OCSP request construction.

use der::asn1::{ObjectIdentifier, OctetString};
use der::{Any, AnyRef, Decode, Encode};
use gempki_core::{crypto, Certificate};
use x509_cert::spki::AlgorithmIdentifierOwned;
use x509_ocsp::{CertId, Request, TbsRequest, Version};

use crate::response::OcspCodecError;

/// id-sha1, the CertID hash the TI responders expect
pub const ID_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");

/// A single-certificate OCSP request
#[derive(Debug, Clone)]
pub struct OcspRequest {
    cert_id: CertId,
    der: Vec<u8>,
}

impl OcspRequest {
    /// Build an unsigned request for `ee`, issued by `issuer`.
    pub fn new(ee: &Certificate, issuer: &Certificate) -> Result<Self, OcspCodecError> {
        let cert_id = cert_id_for(ee, issuer)?;
        let request = x509_ocsp::OcspRequest {
            tbs_request: TbsRequest {
                version: Version::V1,
                requestor_name: None,
                request_list: vec![Request {
                    req_cert: cert_id.clone(),
                    single_request_extensions: None,
                }],
                request_extensions: None,
            },
            optional_signature: None,
        };
        let der = request.to_der()?;
        Ok(Self { cert_id, der })
    }

    /// CertID the response must answer
    #[must_use]
    pub const fn cert_id(&self) -> &CertId {
        &self.cert_id
    }

    /// DER encoding for the HTTP body
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

/// SHA-1 CertID over the issuer name, issuer key and `ee` serial.
pub fn cert_id_for(ee: &Certificate, issuer: &Certificate) -> Result<CertId, OcspCodecError> {
    let parsed = x509_cert::Certificate::from_der(ee.der())?;
    Ok(CertId {
        hash_algorithm: AlgorithmIdentifierOwned {
            oid: ID_SHA1,
            parameters: Some(Any::from(AnyRef::NULL)),
        },
        issuer_name_hash: OctetString::new(crypto::sha1(issuer.subject_der()))?,
        issuer_key_hash: OctetString::new(crypto::sha1(issuer.public_key()))?,
        serial_number: parsed.tbs_certificate.serial_number,
    })
}

/// Compare CertIDs by hash algorithm, both hashes and serial.
///
/// Algorithm parameters are ignored; responders differ on NULL versus absent.
#[must_use]
pub fn cert_id_matches(a: &CertId, b: &CertId) -> bool {
    a.hash_algorithm.oid == b.hash_algorithm.oid
        && a.issuer_name_hash == b.issuer_name_hash
        && a.issuer_key_hash == b.issuer_key_hash
        && a.serial_number == b.serial_number
}
