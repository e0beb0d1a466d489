//! Verifier configuration loaded from TOML.

use std::path::Path;
use std::time::Duration;

use gempki_core::{CertificateProfile, ProfileName};
use gempki_ocsp::{OcspConfig, SspSource};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading and validation failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for a [`CertificateVerifier`](crate::CertificateVerifier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PkiConfig {
    /// Context label used in error messages.
    pub product_type: String,

    /// Responder timeout (seconds).
    #[serde(default = "default_ocsp_timeout")]
    pub ocsp_timeout_secs: u64,

    /// Skip revocation instead of failing when the responder is unreachable.
    #[serde(default)]
    pub tolerate_ocsp_failure: bool,

    /// Require the OCSP CertHash extension.
    #[serde(default = "default_true")]
    pub enforce_cert_hash: bool,

    /// Reuse window for cached OCSP responses (seconds).
    #[serde(default = "default_grace_period")]
    pub ocsp_grace_period_secs: u64,

    /// Symmetric OCSP timestamp tolerance (milliseconds).
    #[serde(default = "default_time_tolerance")]
    pub ocsp_time_tolerance_ms: u64,

    /// Allowance for producedAt in the past (milliseconds).
    #[serde(default = "default_produced_at_past_tolerance")]
    pub produced_at_past_tolerance_ms: u64,

    /// Where responder URLs come from.
    #[serde(default)]
    pub ssp_source: SspSource,

    /// Profiles a certificate may satisfy, tried in order.
    pub profiles: Vec<ProfileName>,
}

impl PkiConfig {
    /// Configuration with defaults for everything but the label and profiles
    #[must_use]
    pub fn new(product_type: impl Into<String>, profiles: &[ProfileName]) -> Self {
        Self {
            product_type: product_type.into(),
            ocsp_timeout_secs: default_ocsp_timeout(),
            tolerate_ocsp_failure: false,
            enforce_cert_hash: true,
            ocsp_grace_period_secs: default_grace_period(),
            ocsp_time_tolerance_ms: default_time_tolerance(),
            produced_at_past_tolerance_ms: default_produced_at_past_tolerance(),
            ssp_source: SspSource::default(),
            profiles: profiles.to_vec(),
        }
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Check required fields and value ranges.
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        if self.product_type.trim().is_empty() {
            return Err(ConfigError::Invalid("product_type must not be empty".into()));
        }
        if self.ocsp_timeout_secs == 0 {
            return Err(ConfigError::Invalid("ocsp_timeout_secs must be > 0".into()));
        }
        if self.profiles.is_empty() {
            return Err(ConfigError::Invalid("at least one profile is required".into()));
        }
        if self.produced_at_past_tolerance_ms < self.ocsp_time_tolerance_ms {
            return Err(ConfigError::Invalid(format!(
                "produced_at_past_tolerance_ms ({}) must be >= ocsp_time_tolerance_ms ({})",
                self.produced_at_past_tolerance_ms, self.ocsp_time_tolerance_ms
            )));
        }

        let profiles = self.profiles.iter().map(|name| (*name, name.profile())).collect();
        Ok(ValidatedConfig {
            config: self,
            profiles,
        })
    }
}

/// A configuration that passed [`PkiConfig::validate`]
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    config: PkiConfig,
    profiles: Vec<(ProfileName, CertificateProfile)>,
}

impl ValidatedConfig {
    #[must_use]
    pub fn product_type(&self) -> &str {
        &self.config.product_type
    }

    /// Resolved profiles in configured order
    #[must_use]
    pub fn profiles(&self) -> &[(ProfileName, CertificateProfile)] {
        &self.profiles
    }

    #[must_use]
    pub const fn ssp_source(&self) -> SspSource {
        self.config.ssp_source
    }

    /// OCSP subset of the settings
    #[must_use]
    pub const fn ocsp_config(&self) -> OcspConfig {
        OcspConfig::new()
            .timeout(Duration::from_secs(self.config.ocsp_timeout_secs))
            .tolerate_failure(self.config.tolerate_ocsp_failure)
            .enforce_cert_hash(self.config.enforce_cert_hash)
            .grace_period(Duration::from_secs(self.config.ocsp_grace_period_secs))
            .time_tolerance(Duration::from_millis(self.config.ocsp_time_tolerance_ms))
            .produced_at_past_tolerance(Duration::from_millis(
                self.config.produced_at_past_tolerance_ms,
            ))
    }

    #[must_use]
    pub const fn config(&self) -> &PkiConfig {
        &self.config
    }
}

// Default value functions for serde.
const fn default_ocsp_timeout() -> u64 {
    10
}

const fn default_true() -> bool {
    true
}

const fn default_grace_period() -> u64 {
    30
}

const fn default_time_tolerance() -> u64 {
    37_500
}

const fn default_produced_at_past_tolerance() -> u64 {
    47_500
}
