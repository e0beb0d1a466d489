//! Owned, decoded view of an X.509 certificate.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::{FromDer, X509Certificate};
use x509_parser::time::ASN1Time;

use crate::crypto::{self, PublicKeyRef, SignatureError};
use crate::oid;

const EKU_ANY: &str = "2.5.29.37.0";
const EKU_CODE_SIGNING: &str = "1.3.6.1.5.5.7.3.3";
const EKU_EMAIL_PROTECTION: &str = "1.3.6.1.5.5.7.3.4";
const EKU_TIME_STAMPING: &str = "1.3.6.1.5.5.7.3.8";

/// Errors decoding certificate bytes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CertificateError {
    /// PEM armour invalid or not a certificate
    #[error("PEM decode failed: {0}")]
    Pem(String),

    /// DER structure invalid
    #[error("X.509 decode failed: {0}")]
    Der(String),

    /// Validity time not representable
    #[error("invalid validity time")]
    InvalidTime,
}

/// Key usage bitset, bit `n` is the named bit `n` of RFC 5280.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct KeyUsage(u16);

impl KeyUsage {
    /// digitalSignature
    pub const DIGITAL_SIGNATURE: Self = Self(1);
    /// nonRepudiation / contentCommitment
    pub const NON_REPUDIATION: Self = Self(1 << 1);
    /// keyEncipherment
    pub const KEY_ENCIPHERMENT: Self = Self(1 << 2);
    /// dataEncipherment
    pub const DATA_ENCIPHERMENT: Self = Self(1 << 3);
    /// keyAgreement
    pub const KEY_AGREEMENT: Self = Self(1 << 4);
    /// keyCertSign
    pub const KEY_CERT_SIGN: Self = Self(1 << 5);
    /// cRLSign
    pub const CRL_SIGN: Self = Self(1 << 6);
    /// encipherOnly
    pub const ENCIPHER_ONLY: Self = Self(1 << 7);
    /// decipherOnly
    pub const DECIPHER_ONLY: Self = Self(1 << 8);

    /// Empty set
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Union of two sets
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Check that every bit of `other` is set
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check for the empty set
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn from_parsed(ku: &x509_parser::extensions::KeyUsage) -> Self {
        let named = [
            (ku.digital_signature(), Self::DIGITAL_SIGNATURE),
            (ku.non_repudiation(), Self::NON_REPUDIATION),
            (ku.key_encipherment(), Self::KEY_ENCIPHERMENT),
            (ku.data_encipherment(), Self::DATA_ENCIPHERMENT),
            (ku.key_agreement(), Self::KEY_AGREEMENT),
            (ku.key_cert_sign(), Self::KEY_CERT_SIGN),
            (ku.crl_sign(), Self::CRL_SIGN),
            (ku.encipher_only(), Self::ENCIPHER_ONLY),
            (ku.decipher_only(), Self::DECIPHER_ONLY),
        ];
        named
            .into_iter()
            .filter(|(set, _)| *set)
            .fold(Self::empty(), |acc, (_, bit)| acc.union(bit))
    }
}

impl std::ops::BitOr for KeyUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Decoded X.509 certificate.
///
/// Only the fields the verification pipeline reads are kept; the original
/// DER is retained for hashing and OCSP request building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    serial: Vec<u8>,
    subject: String,
    subject_der: Vec<u8>,
    issuer: String,
    issuer_der: Vec<u8>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    key_algorithm: String,
    key_curve: Option<String>,
    public_key: Vec<u8>,
    signature_algorithm: String,
    signature: Vec<u8>,
    tbs: Vec<u8>,
    key_usage: KeyUsage,
    extended_key_usage: BTreeSet<String>,
    policies: Vec<String>,
    critical_extensions: BTreeSet<String>,
    subject_key_id: Option<Vec<u8>>,
    authority_key_id: Option<Vec<u8>>,
    ocsp_urls: Vec<String>,
}

impl Certificate {
    /// Decode a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, CertificateError> {
        let (rest, cert) =
            X509Certificate::from_der(der).map_err(|e| CertificateError::Der(e.to_string()))?;
        if !rest.is_empty() {
            return Err(CertificateError::Der(format!(
                "{} bytes of trailing data",
                rest.len()
            )));
        }

        let validity = cert.validity();
        let spki = cert.public_key();

        let mut decoded = Self {
            der: der.to_vec(),
            serial: cert.raw_serial().to_vec(),
            subject: cert.subject().to_string(),
            subject_der: cert.subject().as_raw().to_vec(),
            issuer: cert.issuer().to_string(),
            issuer_der: cert.issuer().as_raw().to_vec(),
            not_before: asn1_to_utc(validity.not_before)?,
            not_after: asn1_to_utc(validity.not_after)?,
            key_algorithm: spki.algorithm.algorithm.to_id_string(),
            key_curve: spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|p| p.as_oid().ok())
                .map(|o| o.to_id_string()),
            public_key: spki.subject_public_key.data.to_vec(),
            signature_algorithm: cert.signature_algorithm.algorithm.to_id_string(),
            signature: cert.signature_value.data.to_vec(),
            tbs: cert.tbs_certificate.as_ref().to_vec(),
            key_usage: KeyUsage::empty(),
            extended_key_usage: BTreeSet::new(),
            policies: Vec::new(),
            critical_extensions: BTreeSet::new(),
            subject_key_id: None,
            authority_key_id: None,
            ocsp_urls: Vec::new(),
        };

        for ext in cert.extensions() {
            if ext.critical {
                decoded.critical_extensions.insert(ext.oid.to_id_string());
            }
            match ext.parsed_extension() {
                ParsedExtension::KeyUsage(ku) => decoded.key_usage = KeyUsage::from_parsed(ku),
                ParsedExtension::ExtendedKeyUsage(eku) => {
                    let flagged = [
                        (eku.any, EKU_ANY),
                        (eku.server_auth, oid::EKU_SERVER_AUTH),
                        (eku.client_auth, oid::EKU_CLIENT_AUTH),
                        (eku.code_signing, EKU_CODE_SIGNING),
                        (eku.email_protection, EKU_EMAIL_PROTECTION),
                        (eku.time_stamping, EKU_TIME_STAMPING),
                        (eku.ocsp_signing, oid::EKU_OCSP_SIGNING),
                    ];
                    decoded.extended_key_usage.extend(
                        flagged
                            .into_iter()
                            .filter(|(set, _)| *set)
                            .map(|(_, o)| o.to_string()),
                    );
                    decoded
                        .extended_key_usage
                        .extend(eku.other.iter().map(|o| o.to_id_string()));
                }
                ParsedExtension::CertificatePolicies(policies) => {
                    decoded
                        .policies
                        .extend(policies.iter().map(|p| p.policy_id.to_id_string()));
                }
                ParsedExtension::SubjectKeyIdentifier(kid) => {
                    decoded.subject_key_id = Some(kid.0.to_vec());
                }
                ParsedExtension::AuthorityKeyIdentifier(aki) => {
                    decoded.authority_key_id = aki.key_identifier.as_ref().map(|k| k.0.to_vec());
                }
                ParsedExtension::AuthorityInfoAccess(aia) => {
                    for desc in &aia.accessdescs {
                        if desc.access_method.to_id_string() != oid::AD_OCSP {
                            continue;
                        }
                        if let GeneralName::URI(uri) = &desc.access_location {
                            decoded.ocsp_urls.push(uri.to_string());
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(decoded)
    }

    /// Decode a PEM-armoured certificate.
    pub fn from_pem(input: &[u8]) -> Result<Self, CertificateError> {
        let block = pem::parse(input).map_err(|e| CertificateError::Pem(e.to_string()))?;
        if block.tag() != "CERTIFICATE" {
            return Err(CertificateError::Pem(format!(
                "unexpected PEM tag {}",
                block.tag()
            )));
        }
        Self::from_der(block.contents())
    }

    /// Encoded certificate
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Hex SHA-256 of the DER encoding
    #[must_use]
    pub fn fingerprint(&self) -> String {
        crypto::sha256_hex(&self.der)
    }

    /// Serial number, big-endian as encoded
    #[must_use]
    pub fn serial(&self) -> &[u8] {
        &self.serial
    }

    /// Serial number as colon-separated hex
    #[must_use]
    pub fn serial_hex(&self) -> String {
        self.serial
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Subject distinguished name, display form
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Subject distinguished name, DER
    #[must_use]
    pub fn subject_der(&self) -> &[u8] {
        &self.subject_der
    }

    /// Issuer distinguished name, display form
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issuer distinguished name, DER
    #[must_use]
    pub fn issuer_der(&self) -> &[u8] {
        &self.issuer_der
    }

    #[must_use]
    pub const fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    #[must_use]
    pub const fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Check `not_before <= at <= not_after`
    #[must_use]
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }

    /// Contents of the SPKI BIT STRING
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Key material for signature checks
    #[must_use]
    pub fn public_key_ref(&self) -> PublicKeyRef<'_> {
        PublicKeyRef {
            algorithm: &self.key_algorithm,
            curve: self.key_curve.as_deref(),
            key: &self.public_key,
        }
    }

    /// Signature algorithm OID
    #[must_use]
    pub fn signature_algorithm(&self) -> &str {
        &self.signature_algorithm
    }

    /// Key usage bits, empty if the extension is absent
    #[must_use]
    pub const fn key_usage(&self) -> KeyUsage {
        self.key_usage
    }

    /// Extended key usage OIDs
    #[must_use]
    pub const fn extended_key_usage(&self) -> &BTreeSet<String> {
        &self.extended_key_usage
    }

    /// Certificate policy OIDs, which carry the certificate type
    #[must_use]
    pub fn policy_oids(&self) -> &[String] {
        &self.policies
    }

    /// OIDs of extensions marked critical
    #[must_use]
    pub const fn critical_extensions(&self) -> &BTreeSet<String> {
        &self.critical_extensions
    }

    #[must_use]
    pub fn subject_key_id(&self) -> Option<&[u8]> {
        self.subject_key_id.as_deref()
    }

    #[must_use]
    pub fn authority_key_id(&self) -> Option<&[u8]> {
        self.authority_key_id.as_deref()
    }

    /// OCSP responder URLs from authorityInfoAccess
    #[must_use]
    pub fn ocsp_urls(&self) -> &[String] {
        &self.ocsp_urls
    }

    /// Check whether `issuer` plausibly issued this certificate.
    ///
    /// Names must match; key identifiers are compared when both sides carry one.
    #[must_use]
    pub fn is_issued_by_name_and_key(&self, issuer: &Self) -> bool {
        if self.issuer_der != issuer.subject_der {
            return false;
        }
        match (self.authority_key_id(), issuer.subject_key_id()) {
            (Some(aki), Some(ski)) => aki == ski,
            _ => true,
        }
    }

    /// Verify this certificate's signature with the issuer's public key.
    pub fn verify_signed_by(&self, issuer: &Self) -> Result<(), SignatureError> {
        crypto::verify_signature(
            &self.signature_algorithm,
            &issuer.public_key_ref(),
            &self.tbs,
            &self.signature,
        )
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (serial {})", self.subject, self.serial_hex())
    }
}

/// Convert an ASN.1 `GeneralizedTime` / `UTCTime` to `DateTime<Utc>`.
fn asn1_to_utc(t: ASN1Time) -> Result<DateTime<Utc>, CertificateError> {
    Utc.timestamp_opt(t.timestamp(), 0)
        .single()
        .ok_or(CertificateError::InvalidTime)
}
