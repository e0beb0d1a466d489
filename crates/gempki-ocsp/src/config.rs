//! OCSP verification settings.

use std::time::Duration;

/// Default timeout for a responder round trip
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default symmetric tolerance for response timestamps
pub const DEFAULT_TIME_TOLERANCE: Duration = Duration::from_millis(37_500);

/// Default allowance for producedAt in the past: tolerance plus timeout
pub const DEFAULT_PRODUCED_AT_PAST_TOLERANCE: Duration = Duration::from_millis(47_500);

/// Default maximum age of a cached response
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Settings for OCSP checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspConfig {
    /// Upper bound for one responder round trip
    pub timeout: Duration,

    /// Return a skipped outcome instead of failing when unreachable
    pub tolerate_failure: bool,

    /// Require and compare the CertHash extension
    pub enforce_cert_hash: bool,

    /// Maximum age of a cached response
    pub grace_period: Duration,

    /// Symmetric tolerance for thisUpdate, producedAt and nextUpdate
    pub time_tolerance: Duration,

    /// Allowance for producedAt in the past
    pub produced_at_past_tolerance: Duration,
}

impl Default for OcspConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OcspConfig {
    /// Create a configuration with default settings
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            tolerate_failure: false,
            enforce_cert_hash: true,
            grace_period: DEFAULT_GRACE_PERIOD,
            time_tolerance: DEFAULT_TIME_TOLERANCE,
            produced_at_past_tolerance: DEFAULT_PRODUCED_AT_PAST_TOLERANCE,
        }
    }

    /// Set the responder timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set whether unreachable responders are tolerated
    #[must_use]
    pub const fn tolerate_failure(mut self, tolerate: bool) -> Self {
        self.tolerate_failure = tolerate;
        self
    }

    /// Set whether the CertHash extension is enforced
    #[must_use]
    pub const fn enforce_cert_hash(mut self, enforce: bool) -> Self {
        self.enforce_cert_hash = enforce;
        self
    }

    /// Set the cache grace period
    #[must_use]
    pub const fn grace_period(mut self, period: Duration) -> Self {
        self.grace_period = period;
        self
    }

    /// Set the symmetric timestamp tolerance
    #[must_use]
    pub const fn time_tolerance(mut self, tolerance: Duration) -> Self {
        self.time_tolerance = tolerance;
        self
    }

    /// Set the producedAt-in-the-past allowance
    #[must_use]
    pub const fn produced_at_past_tolerance(mut self, tolerance: Duration) -> Self {
        self.produced_at_past_tolerance = tolerance;
        self
    }
}

/// Convert for timestamp arithmetic, saturating at one year.
pub(crate) fn to_chrono(d: Duration) -> chrono::Duration {
    const MAX_MILLIS: i64 = 365 * 24 * 60 * 60 * 1000;
    let millis = i64::try_from(d.as_millis()).map_or(MAX_MILLIS, |ms| ms.min(MAX_MILLIS));
    chrono::Duration::milliseconds(millis)
}
