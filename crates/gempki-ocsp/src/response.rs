//! OCSP response decoding into an owned view.

use chrono::{DateTime, Utc};
use der::asn1::ObjectIdentifier;
use der::{Decode, Encode};
use gempki_core::Certificate;
use thiserror::Error;
use x509_ocsp::{BasicOcspResponse, CertId, OcspGeneralizedTime};

use crate::cert_hash::ID_CERT_HASH;

/// id-pkix-ocsp-basic
pub const ID_PKIX_OCSP_BASIC: ObjectIdentifier =
    ObjectIdentifier::new_unwrap(gempki_core::oid::OCSP_BASIC);

/// OCSP codec failures
#[derive(Error, Debug)]
pub enum OcspCodecError {
    #[error("ASN.1 error: {0}")]
    Der(#[from] der::Error),

    #[error("successful response without responseBytes")]
    MissingResponseBytes,

    #[error("unsupported response type {0}")]
    UnsupportedResponseType(String),

    #[error("time out of range")]
    InvalidTime,

    #[error("embedded certificate: {0}")]
    Certificate(#[from] gempki_core::CertificateError),
}

/// OCSPResponseStatus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Successful,
    MalformedRequest,
    InternalError,
    TryLater,
    SigRequired,
    Unauthorized,
}

impl From<x509_ocsp::OcspResponseStatus> for ResponseStatus {
    fn from(status: x509_ocsp::OcspResponseStatus) -> Self {
        use x509_ocsp::OcspResponseStatus as S;
        match status {
            S::Successful => Self::Successful,
            S::MalformedRequest => Self::MalformedRequest,
            S::InternalError => Self::InternalError,
            S::TryLater => Self::TryLater,
            S::SigRequired => Self::SigRequired,
            S::Unauthorized => Self::Unauthorized,
        }
    }
}

/// How the responder names itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderId {
    /// DER of the responder subject name
    ByName(Vec<u8>),
    /// SHA-1 of the responder public key
    ByKey(Vec<u8>),
}

/// Revocation state reported for one certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertStatus {
    Good,
    Revoked { revocation_time: DateTime<Utc> },
    Unknown,
}

/// One `SingleResponse` entry
#[derive(Debug, Clone)]
pub struct SingleResponse {
    pub cert_id: CertId,
    pub status: CertStatus,
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
    /// Raw value of the `CertHash` extension, if present
    pub cert_hash: Option<Vec<u8>>,
}

/// Decoded `BasicOCSPResponse`
#[derive(Debug, Clone)]
pub struct BasicResponse {
    pub responder_id: ResponderId,
    pub produced_at: DateTime<Utc>,
    pub responses: Vec<SingleResponse>,
    /// DER of `tbsResponseData`, the signed bytes
    pub tbs_der: Vec<u8>,
    pub signature_algorithm: String,
    pub signature: Vec<u8>,
    /// Certificates embedded by the responder
    pub certificates: Vec<Certificate>,
}

/// A decoded OCSP response
#[derive(Debug, Clone)]
pub struct OcspResponse {
    pub status: ResponseStatus,
    /// Present exactly when the status is successful
    pub basic: Option<BasicResponse>,
    der: Vec<u8>,
}

impl OcspResponse {
    /// Decode a DER-encoded `OCSPResponse`.
    pub fn from_der(der: &[u8]) -> Result<Self, OcspCodecError> {
        let outer = x509_ocsp::OcspResponse::from_der(der)?;
        let status = ResponseStatus::from(outer.response_status);

        let basic = match (status, outer.response_bytes) {
            (ResponseStatus::Successful, None) => return Err(OcspCodecError::MissingResponseBytes),
            (ResponseStatus::Successful, Some(bytes)) => {
                if bytes.response_type != ID_PKIX_OCSP_BASIC {
                    return Err(OcspCodecError::UnsupportedResponseType(
                        bytes.response_type.to_string(),
                    ));
                }
                Some(decode_basic(bytes.response.as_bytes())?)
            }
            _ => None,
        };

        Ok(Self {
            status,
            basic,
            der: der.to_vec(),
        })
    }

    /// Encoded response as received
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

fn decode_basic(der: &[u8]) -> Result<BasicResponse, OcspCodecError> {
    let basic = BasicOcspResponse::from_der(der)?;
    let data = &basic.tbs_response_data;

    let responder_id = match &data.responder_id {
        x509_ocsp::ResponderId::ByName(name) => ResponderId::ByName(name.to_der()?),
        x509_ocsp::ResponderId::ByKey(hash) => ResponderId::ByKey(hash.as_bytes().to_vec()),
    };

    let responses = data
        .responses
        .iter()
        .map(decode_single)
        .collect::<Result<Vec<_>, _>>()?;

    let certificates = basic
        .certs
        .iter()
        .flatten()
        .map(|c| -> Result<Certificate, OcspCodecError> {
            Ok(Certificate::from_der(&c.to_der()?)?)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BasicResponse {
        responder_id,
        produced_at: to_utc(&data.produced_at)?,
        responses,
        tbs_der: data.to_der()?,
        signature_algorithm: basic.signature_algorithm.oid.to_string(),
        signature: basic.signature.raw_bytes().to_vec(),
        certificates,
    })
}

fn decode_single(single: &x509_ocsp::SingleResponse) -> Result<SingleResponse, OcspCodecError> {
    let status = match &single.cert_status {
        x509_ocsp::CertStatus::Good(_) => CertStatus::Good,
        x509_ocsp::CertStatus::Revoked(info) => CertStatus::Revoked {
            revocation_time: to_utc(&info.revocation_time)?,
        },
        x509_ocsp::CertStatus::Unknown(_) => CertStatus::Unknown,
    };

    let cert_hash = single
        .single_extensions
        .iter()
        .flatten()
        .find(|ext| ext.extn_id == ID_CERT_HASH)
        .map(|ext| ext.extn_value.as_bytes().to_vec());

    Ok(SingleResponse {
        cert_id: single.cert_id.clone(),
        status,
        this_update: to_utc(&single.this_update)?,
        next_update: single.next_update.as_ref().map(to_utc).transpose()?,
        cert_hash,
    })
}

fn to_utc(t: &OcspGeneralizedTime) -> Result<DateTime<Utc>, OcspCodecError> {
    let since_epoch = t.0.to_unix_duration();
    let secs = i64::try_from(since_epoch.as_secs()).map_err(|_| OcspCodecError::InvalidTime)?;
    DateTime::from_timestamp(secs, since_epoch.subsec_nanos()).ok_or(OcspCodecError::InvalidTime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::OcspResponseBuilder;
    use crate::OcspRequest;
    use chrono::Duration;
    use gempki_core::testkit::{CertSpec, TestCa};

    #[test]
    fn test_decode_good_response() {
        let ca = TestCa::new("CA");
        let ee = ca.issue(&CertSpec::smcb_aut("ee"));
        let (responder, key) = ca.issue_with_key(&CertSpec::new("OCSP Signer"));
        let request = OcspRequest::new(&ee, ca.certificate()).unwrap();

        let der = OcspResponseBuilder::new(&responder, &key.serialize_der())
            .build(&request, &ee);
        let response = OcspResponse::from_der(&der).unwrap();

        assert_eq!(response.status, ResponseStatus::Successful);
        let basic = response.basic.unwrap();
        assert_eq!(basic.responses.len(), 1);
        assert_eq!(basic.responses[0].status, CertStatus::Good);
        assert!(basic.responses[0].cert_hash.is_some());
        assert_eq!(
            basic.responder_id,
            ResponderId::ByName(responder.subject_der().to_vec())
        );
    }

    #[test]
    fn test_decode_revoked_time() {
        let ca = TestCa::new("CA");
        let ee = ca.issue(&CertSpec::smcb_aut("ee"));
        let (responder, key) = ca.issue_with_key(&CertSpec::new("OCSP Signer"));
        let request = OcspRequest::new(&ee, ca.certificate()).unwrap();
        let revoked_at = DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap()
            - Duration::hours(2);

        let der = OcspResponseBuilder::new(&responder, &key.serialize_der())
            .revoked(revoked_at)
            .build(&request, &ee);
        let basic = OcspResponse::from_der(&der).unwrap().basic.unwrap();
        assert_eq!(
            basic.responses[0].status,
            CertStatus::Revoked {
                revocation_time: revoked_at
            }
        );
    }

    #[test]
    fn test_decode_unsuccessful_status() {
        let der = OcspResponseBuilder::unsuccessful(x509_ocsp::OcspResponseStatus::TryLater);
        let response = OcspResponse::from_der(&der).unwrap();
        assert_eq!(response.status, ResponseStatus::TryLater);
        assert!(response.basic.is_none());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            OcspResponse::from_der(b"not an ocsp response"),
            Err(OcspCodecError::Der(_))
        ));
    }
}
