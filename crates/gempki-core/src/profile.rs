//! Certificate profiles of the TI PKI.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::cert::KeyUsage;
use crate::oid;

/// Structural requirements a certificate of one type must meet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateProfile {
    /// Profile name, e.g. `C.HCI.AUT`
    pub name: String,
    /// Required certificate-type policy OID
    pub cert_type: String,
    /// Key usage bits that must all be present
    pub key_usage: KeyUsage,
    /// Extended key usages that must all be present
    pub extended_key_usage: BTreeSet<String>,
    /// Extensions permitted to be marked critical
    pub critical_extensions: BTreeSet<String>,
}

impl CertificateProfile {
    /// Profile with the default critical-extension whitelist
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        cert_type: impl Into<String>,
        key_usage: KeyUsage,
        extended_key_usage: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            cert_type: cert_type.into(),
            key_usage,
            extended_key_usage: extended_key_usage.iter().map(ToString::to_string).collect(),
            critical_extensions: [oid::EXT_KEY_USAGE, oid::EXT_BASIC_CONSTRAINTS]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// Replace the critical-extension whitelist
    #[must_use]
    pub fn with_critical_extensions(mut self, oids: &[&str]) -> Self {
        self.critical_extensions = oids.iter().map(ToString::to_string).collect();
        self
    }
}

/// Named profiles known to the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileName {
    /// SMC-B authentication
    #[serde(rename = "C.HCI.AUT")]
    HciAut,
    /// SMC-B organisational signature
    #[serde(rename = "C.HCI.OSIG")]
    HciOsig,
    /// HBA authentication
    #[serde(rename = "C.HP.AUT")]
    HpAut,
    /// eGK authentication
    #[serde(rename = "C.CH.AUT")]
    ChAut,
    /// Service TLS server
    #[serde(rename = "C.FD.TLS-S")]
    FdTlsS,
    /// Service TLS client
    #[serde(rename = "C.FD.TLS-C")]
    FdTlsC,
}

impl ProfileName {
    /// Every named profile
    pub const ALL: [Self; 6] = [
        Self::HciAut,
        Self::HciOsig,
        Self::HpAut,
        Self::ChAut,
        Self::FdTlsS,
        Self::FdTlsC,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HciAut => "C.HCI.AUT",
            Self::HciOsig => "C.HCI.OSIG",
            Self::HpAut => "C.HP.AUT",
            Self::ChAut => "C.CH.AUT",
            Self::FdTlsS => "C.FD.TLS-S",
            Self::FdTlsC => "C.FD.TLS-C",
        }
    }

    /// Build the profile definition
    #[must_use]
    pub fn profile(self) -> CertificateProfile {
        let name = self.as_str();
        match self {
            Self::HciAut => CertificateProfile::new(
                name,
                oid::CERT_TYPE_SMC_B_AUT,
                KeyUsage::DIGITAL_SIGNATURE,
                &[oid::EKU_CLIENT_AUTH],
            ),
            Self::HciOsig => CertificateProfile::new(
                name,
                oid::CERT_TYPE_SMC_B_OSIG,
                KeyUsage::NON_REPUDIATION,
                &[],
            ),
            Self::HpAut => CertificateProfile::new(
                name,
                oid::CERT_TYPE_HBA_AUT,
                KeyUsage::DIGITAL_SIGNATURE,
                &[oid::EKU_CLIENT_AUTH],
            ),
            Self::ChAut => CertificateProfile::new(
                name,
                oid::CERT_TYPE_EGK_AUT,
                KeyUsage::DIGITAL_SIGNATURE,
                &[oid::EKU_CLIENT_AUTH],
            ),
            Self::FdTlsS => CertificateProfile::new(
                name,
                oid::CERT_TYPE_FD_TLS_S,
                KeyUsage::DIGITAL_SIGNATURE,
                &[oid::EKU_SERVER_AUTH],
            ),
            Self::FdTlsC => CertificateProfile::new(
                name,
                oid::CERT_TYPE_FD_TLS_C,
                KeyUsage::DIGITAL_SIGNATURE,
                &[oid::EKU_CLIENT_AUTH],
            ),
        }
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ProfileName> for CertificateProfile {
    fn from(name: ProfileName) -> Self {
        name.profile()
    }
}
