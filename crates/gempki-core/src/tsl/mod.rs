//! Trust service status list (TSL) model and issuer lookup.

mod validator;

pub use validator::{
    TrustListDecoder, TrustListValidator, TslDecodeError, TslSignatureError, TslSignatureVerifier,
};

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::debug;

use crate::cert::Certificate;
use crate::error::{ErrorCode, GemPkiError, Result};

const STATUS_INACCORD: &str = "http://uri.etsi.org/TrstSvc/Svcstatus/inaccord";
const STATUS_GRANTED: &str = "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/granted";
const STATUS_REVOKED: &str = "http://uri.etsi.org/TrstSvc/Svcstatus/revoked";
const STATUS_WITHDRAWN: &str = "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/withdrawn";

const TYPE_CA_PKC: &str = "http://uri.etsi.org/TrstSvc/Svctype/CA/PKC";
const TYPE_OCSP: &str = "http://uri.etsi.org/TrstSvc/Svctype/Certstatus/OCSP";
const TYPE_TRUST_ANCHOR: &str = "http://uri.etsi.org/TrstSvc/Svctype/TSL-TrustAnchor";

/// Authorization status of a trust service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceStatus {
    Granted,
    Withdrawn,
    Other(String),
}

impl ServiceStatus {
    /// Map an ETSI status URI, accepting both vocabularies in use.
    #[must_use]
    pub fn from_uri(uri: &str) -> Self {
        match uri {
            STATUS_INACCORD | STATUS_GRANTED => Self::Granted,
            STATUS_REVOKED | STATUS_WITHDRAWN => Self::Withdrawn,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Service type identifier of a trust service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceType {
    /// Certificate issuing CA
    CaPkc,
    /// OCSP responder
    OcspResponder,
    /// Trust anchor announced for TSL signature checks
    TrustAnchor,
    Other(String),
}

impl ServiceType {
    #[must_use]
    pub fn from_uri(uri: &str) -> Self {
        match uri {
            TYPE_CA_PKC => Self::CaPkc,
            TYPE_OCSP => Self::OcspResponder,
            TYPE_TRUST_ANCHOR => Self::TrustAnchor,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One trust service entry, binding a certificate to its authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TspService {
    /// Name of the trust service provider
    pub provider_name: String,
    pub service_type: ServiceType,
    /// Service (issuer, responder or anchor) certificate
    pub certificate: Certificate,
    /// Certificate-type OIDs the service may issue
    pub cert_type_oids: BTreeSet<String>,
    pub status: ServiceStatus,
    pub status_starting_time: DateTime<Utc>,
    /// OCSP responder URL for certificates issued by this service
    pub service_supply_point: Option<String>,
}

impl TspService {
    /// Check whether the service may issue the given certificate type
    #[must_use]
    pub fn authorizes(&self, cert_type: &str) -> bool {
        self.cert_type_oids.contains(cert_type)
    }

    /// Check the service status as of `timestamp`.
    ///
    /// A granted service is valid. A withdrawn service is valid only for
    /// timestamps before its status starting time, so passing a certificate's
    /// notBefore keeps certificates issued before the withdrawal valid.
    #[must_use]
    pub fn is_service_status_valid_at(&self, timestamp: DateTime<Utc>) -> bool {
        match self.status {
            ServiceStatus::Granted => true,
            ServiceStatus::Withdrawn => timestamp < self.status_starting_time,
            ServiceStatus::Other(_) => false,
        }
    }
}

/// A parsed and trusted TSL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustList {
    /// TSL identifier
    pub id: Option<String>,
    pub sequence_number: u64,
    pub issue_date: DateTime<Utc>,
    pub next_update: DateTime<Utc>,
    /// Certificate that signed the list
    pub signer_certificate: Certificate,
    pub services: Vec<TspService>,
}

impl TrustList {
    /// Find the CA record that issued `cert` and may issue one of
    /// `cert_type_oids`.
    pub fn find_issuer_record<S: AsRef<str>>(
        &self,
        product_type: &str,
        cert: &Certificate,
        cert_type_oids: &[S],
    ) -> Result<&TspService> {
        self.unique_issuer(product_type, cert, |service| {
            cert_type_oids
                .iter()
                .any(|oid| service.authorizes(oid.as_ref()))
        })
    }

    /// Find the CA record that issued `cert`, regardless of certificate type.
    pub fn find_issuer_of(&self, product_type: &str, cert: &Certificate) -> Result<&TspService> {
        self.unique_issuer(product_type, cert, |_| true)
    }

    fn unique_issuer<F>(
        &self,
        product_type: &str,
        cert: &Certificate,
        accept: F,
    ) -> Result<&TspService>
    where
        F: Fn(&TspService) -> bool,
    {
        let mut matches = self.services.iter().filter(|service| {
            service.service_type == ServiceType::CaPkc
                && cert.is_issued_by_name_and_key(&service.certificate)
                && accept(service)
        });

        let Some(first) = matches.next() else {
            debug!(issuer = %cert.issuer(), "no issuer record in trust list");
            return Err(GemPkiError::with_detail(
                product_type,
                ErrorCode::IssuerNotFound,
                cert.issuer(),
            ));
        };

        if matches.any(|other| other.certificate != first.certificate) {
            return Err(GemPkiError::with_detail(
                product_type,
                ErrorCode::AmbiguousIssuer,
                cert.issuer(),
            ));
        }

        Ok(first)
    }

    /// Records of OCSP responders
    pub fn ocsp_responders(&self) -> impl Iterator<Item = &TspService> {
        self.services
            .iter()
            .filter(|s| s.service_type == ServiceType::OcspResponder)
    }

    /// Most recent granted trust anchor whose starting time has passed.
    #[must_use]
    pub fn active_trust_anchor(&self, now: DateTime<Utc>) -> Option<&Certificate> {
        self.services
            .iter()
            .filter(|s| {
                s.service_type == ServiceType::TrustAnchor
                    && s.status == ServiceStatus::Granted
                    && s.status_starting_time <= now
            })
            .max_by_key(|s| s.status_starting_time)
            .map(|s| &s.certificate)
    }
}
