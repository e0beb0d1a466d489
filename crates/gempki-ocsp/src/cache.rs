//! Short-lived cache of verified OCSP responses.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gempki_core::Clock;
use tracing::debug;

use crate::config::to_chrono;
use crate::verifier::VerifiedResponse;

#[derive(Debug, Clone)]
struct CacheEntry {
    response: Arc<VerifiedResponse>,
    inserted_at: DateTime<Utc>,
}

/// Responses keyed by end-entity certificate fingerprint.
///
/// Only responses that passed full verification are stored. An entry older
/// than the grace period is treated as absent.
#[derive(Debug)]
pub struct OcspRespCache {
    grace_period: chrono::Duration,
    clock: Arc<dyn Clock>,
    entries: DashMap<String, CacheEntry>,
}

impl OcspRespCache {
    #[must_use]
    pub fn new(grace_period: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            grace_period: to_chrono(grace_period),
            clock,
            entries: DashMap::new(),
        }
    }

    /// Fresh response for `fingerprint`, if any
    pub fn get(&self, fingerprint: &str) -> Option<Arc<VerifiedResponse>> {
        let now = self.clock.now();
        // Clone out so the shard lock is released before any removal
        let entry = self.entries.get(fingerprint).map(|e| e.value().clone())?;

        if self.is_fresh(&entry, now) {
            debug!(fingerprint = %fingerprint, "OCSP cache hit");
            return Some(entry.response);
        }

        debug!(
            fingerprint = %fingerprint,
            inserted_at = %entry.inserted_at,
            "OCSP cache entry expired"
        );
        self.entries.remove_if(fingerprint, |_, e| !self.is_fresh(e, now));
        None
    }

    /// Insert or overwrite
    pub fn put(&self, fingerprint: impl Into<String>, response: Arc<VerifiedResponse>) {
        self.entries.insert(
            fingerprint.into(),
            CacheEntry {
                response,
                inserted_at: self.clock.now(),
            },
        );
    }

    /// Drop all expired entries
    pub fn remove_expired(&self) {
        let now = self.clock.now();
        self.entries.retain(|_, e| self.is_fresh(e, now));
    }

    /// Number of stored entries, expired ones included until removed
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.inserted_at <= self.grace_period
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::OcspRequest;
    use crate::response::OcspResponse;
    use crate::testkit::OcspResponseBuilder;
    use crate::{OcspConfig, OcspResponseVerifier};
    use gempki_core::oid;
    use gempki_core::testkit::{trust_list, CertSpec, TestCa};
    use gempki_core::ManualClock;

    fn verified() -> Arc<VerifiedResponse> {
        let ca = TestCa::new("CA");
        let ee = ca.issue(&CertSpec::smcb_aut("ee"));
        let (responder, key) = ca.issue_with_key(&CertSpec::new("OCSP Signer"));
        let list = trust_list(vec![
            ca.tsp_service(&[oid::CERT_TYPE_SMC_B_AUT]),
            TestCa::ocsp_service(&responder),
        ]);
        let request = OcspRequest::new(&ee, ca.certificate()).unwrap();
        let der = OcspResponseBuilder::new(&responder, &key.serialize_der()).build(&request, &ee);
        let config = OcspConfig::default();
        let verified = OcspResponseVerifier::new("test", &config, &list)
            .verify(&ee, request.cert_id(), OcspResponse::from_der(&der).unwrap(), Utc::now())
            .unwrap();
        Arc::new(verified)
    }

    fn cache(clock: &Arc<ManualClock>) -> OcspRespCache {
        let clock: Arc<dyn Clock> = clock.clone();
        OcspRespCache::new(Duration::from_secs(30), clock)
    }

    #[test]
    fn test_entry_lives_for_grace_period() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache(&clock);
        cache.put("fp", verified());

        clock.advance(chrono::Duration::seconds(30));
        assert!(cache.get("fp").is_some());

        clock.advance(chrono::Duration::milliseconds(1));
        assert!(cache.get("fp").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_overwrites_and_restarts_grace_period() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache(&clock);
        let response = verified();

        cache.put("fp", response.clone());
        clock.advance(chrono::Duration::seconds(20));
        cache.put("fp", response);
        clock.advance(chrono::Duration::seconds(20));

        assert!(cache.get("fp").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove_expired_sweeps() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache(&clock);
        let response = verified();

        cache.put("old", response.clone());
        clock.advance(chrono::Duration::seconds(31));
        cache.put("new", response);
        assert_eq!(cache.len(), 2);

        cache.remove_expired();
        assert_eq!(cache.len(), 1);
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = Arc::new(cache(&clock));
        let response = verified();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let response = Arc::clone(&response);
                std::thread::spawn(move || {
                    for n in 0..100 {
                        let key = format!("fp-{}", (i + n) % 10);
                        cache.put(key.clone(), Arc::clone(&response));
                        assert!(cache.get(&key).is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 10);
    }
}
