//! Trusted TSL storage and rotation.

use std::sync::Arc;

use arc_swap::ArcSwap;
use gempki_core::tsl::{TrustList, TrustListDecoder, TrustListValidator, TslSignatureVerifier};
use gempki_core::validators::{CertificateValidator, ValidityValidator};
use gempki_core::{Certificate, Clock, ErrorCode, GemPkiError, Result};
use gempki_ocsp::OcspEngine;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Holds the currently trusted list.
///
/// Readers take a [`snapshot`](Self::snapshot) and keep using it for the
/// whole verification, so a concurrent rotation is never observed halfway.
#[derive(Debug)]
pub struct TrustStore {
    current: ArcSwap<TrustList>,
}

impl TrustStore {
    #[must_use]
    pub fn new(initial: TrustList) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// The trusted list at this instant
    #[must_use]
    pub fn snapshot(&self) -> Arc<TrustList> {
        self.current.load_full()
    }

    fn replace(&self, list: TrustList) -> Arc<TrustList> {
        let list = Arc::new(list);
        self.current.store(Arc::clone(&list));
        list
    }
}

/// Validates candidate lists and swaps them into a [`TrustStore`].
pub struct TslUpdater {
    product_type: String,
    store: Arc<TrustStore>,
    decoder: Arc<dyn TrustListDecoder>,
    validator: TrustListValidator,
    clock: Arc<dyn Clock>,
    signer_ocsp: Option<OcspEngine>,
    update_lock: Mutex<()>,
}

impl TslUpdater {
    #[must_use]
    pub fn new(
        product_type: impl Into<String>,
        store: Arc<TrustStore>,
        decoder: Arc<dyn TrustListDecoder>,
        signature_verifier: Arc<dyn TslSignatureVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let product_type = product_type.into();
        Self {
            validator: TrustListValidator::new(product_type.clone(), signature_verifier),
            product_type,
            store,
            decoder,
            clock,
            signer_ocsp: None,
            update_lock: Mutex::new(()),
        }
    }

    /// Also check the candidate signer certificate via OCSP
    #[must_use]
    pub fn with_signer_ocsp(mut self, engine: OcspEngine) -> Self {
        self.signer_ocsp = Some(engine);
        self
    }

    /// Validate `payload` and, if it is acceptable, make it the trusted list.
    ///
    /// On any failure the current list stays in place.
    pub async fn update(&self, payload: &[u8]) -> Result<Arc<TrustList>> {
        let _guard = self.update_lock.lock().await;
        let current = self.store.snapshot();
        let now = self.clock.now();

        let candidate = self.decoder.decode(payload).map_err(|e| {
            GemPkiError::with_detail(&self.product_type, ErrorCode::TslDecodeError, e.to_string())
        })?;
        debug!(sequence_number = candidate.sequence_number, "decoded candidate trust list");

        let anchor = current
            .active_trust_anchor(now)
            .unwrap_or(&current.signer_certificate);
        self.validator.validate_signature(payload, anchor)?;
        self.check_signer_binding(&candidate.signer_certificate, anchor)?;
        self.validator.validate_freshness(&candidate, &current, now)?;

        ValidityValidator::new(&self.product_type, now).validate(&candidate.signer_certificate)?;

        if let Some(engine) = &self.signer_ocsp {
            let signer = &candidate.signer_certificate;
            let issuer = current.find_issuer_of(&self.product_type, signer)?;
            let status = engine.check(signer, issuer, &current, now).await?;
            if status.is_degraded() {
                warn!(
                    signer = %signer.subject(),
                    "trust list signer accepted without revocation check"
                );
            }
        }

        info!(
            previous = current.sequence_number,
            sequence_number = candidate.sequence_number,
            "trust list rotated"
        );
        Ok(self.store.replace(candidate))
    }

    /// The declared signer must be the anchor or a certificate issued by it.
    fn check_signer_binding(&self, signer: &Certificate, anchor: &Certificate) -> Result<()> {
        if signer == anchor {
            return Ok(());
        }
        if !signer.is_issued_by_name_and_key(anchor) {
            return Err(GemPkiError::with_detail(
                &self.product_type,
                ErrorCode::SignatureInvalid,
                format!(
                    "signer {} not issued by anchor {}",
                    signer.subject(),
                    anchor.subject()
                ),
            ));
        }
        signer.verify_signed_by(anchor).map_err(|e| {
            warn!(
                signer = %signer.subject(),
                anchor = %anchor.subject(),
                error = %e,
                "trust list signer not signed by anchor"
            );
            GemPkiError::with_detail(
                &self.product_type,
                ErrorCode::SignatureInvalid,
                e.to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use gempki_core::testkit::{trust_list_signed_by, CertSpec, DigestSignatureVerifier, TestCa};
    use gempki_core::tsl::{ServiceStatus, ServiceType, TslDecodeError, TspService};
    use gempki_core::SystemClock;
    use std::collections::BTreeSet;

    /// Looks up pre-built lists by the body's first byte
    struct TableDecoder {
        lists: Vec<TrustList>,
    }

    impl TrustListDecoder for TableDecoder {
        fn decode(&self, payload: &[u8]) -> std::result::Result<TrustList, TslDecodeError> {
            payload
                .first()
                .and_then(|index| self.lists.get(usize::from(*index)))
                .cloned()
                .ok_or_else(|| TslDecodeError("unknown payload".into()))
        }
    }

    fn anchor_record(anchor: &Certificate, starting: chrono::DateTime<Utc>) -> TspService {
        TspService {
            provider_name: "TSL CA".into(),
            service_type: ServiceType::TrustAnchor,
            certificate: anchor.clone(),
            cert_type_oids: BTreeSet::new(),
            status: ServiceStatus::Granted,
            status_starting_time: starting,
            service_supply_point: None,
        }
    }

    struct Fixture {
        signer: TestCa,
        store: Arc<TrustStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let signer = TestCa::new("TSL Signer");
            let store = Arc::new(TrustStore::new(trust_list_signed_by(
                signer.certificate(),
                100,
                Vec::new(),
            )));
            Self { signer, store }
        }

        fn updater(&self, lists: Vec<TrustList>) -> TslUpdater {
            TslUpdater::new(
                "test",
                Arc::clone(&self.store),
                Arc::new(TableDecoder { lists }),
                Arc::new(DigestSignatureVerifier),
                Arc::new(SystemClock),
            )
        }
    }

    #[tokio::test]
    async fn test_newer_list_signed_by_current_signer_rotates() {
        let f = Fixture::new();
        let next = trust_list_signed_by(f.signer.certificate(), 101, Vec::new());
        let updater = f.updater(vec![next]);

        let payload = DigestSignatureVerifier::sign(&[0], f.signer.certificate());
        let rotated = updater.update(&payload).await.unwrap();

        assert_eq!(rotated.sequence_number, 101);
        assert_eq!(f.store.snapshot().sequence_number, 101);
    }

    #[tokio::test]
    async fn test_stale_sequence_is_rejected_and_current_kept() {
        let f = Fixture::new();
        let same = trust_list_signed_by(f.signer.certificate(), 100, Vec::new());
        let updater = f.updater(vec![same]);

        let payload = DigestSignatureVerifier::sign(&[0], f.signer.certificate());
        let err = updater.update(&payload).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::SequenceNotIncreasing);
        assert_eq!(f.store.snapshot().sequence_number, 100);
    }

    #[tokio::test]
    async fn test_signature_by_other_key_is_rejected() {
        let f = Fixture::new();
        let impostor = TestCa::new("TSL Signer");
        let next = trust_list_signed_by(impostor.certificate(), 101, Vec::new());
        let updater = f.updater(vec![next]);

        let payload = DigestSignatureVerifier::sign(&[0], impostor.certificate());
        let err = updater.update(&payload).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::SignatureInvalid);
        assert_eq!(f.store.snapshot().sequence_number, 100);
    }

    #[tokio::test]
    async fn test_declared_signer_must_match_verifying_anchor() {
        let f = Fixture::new();
        let rogue = TestCa::new("TSL Signer");
        let hijack = trust_list_signed_by(rogue.certificate(), 101, Vec::new());
        let follow_up = trust_list_signed_by(rogue.certificate(), 102, Vec::new());
        let updater = f.updater(vec![hijack, follow_up]);

        let err = updater
            .update(&DigestSignatureVerifier::sign(&[0], f.signer.certificate()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SignatureInvalid);
        assert_eq!(f.store.snapshot().sequence_number, 100);

        let err = updater
            .update(&DigestSignatureVerifier::sign(&[1], rogue.certificate()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SignatureInvalid);
        assert_eq!(f.store.snapshot().sequence_number, 100);
    }

    #[tokio::test]
    async fn test_signer_issued_by_anchor_is_accepted() {
        let f = Fixture::new();
        let successor = f.signer.issue(&CertSpec::new("TSL Signer 2"));
        let next = trust_list_signed_by(&successor, 101, Vec::new());
        let updater = f.updater(vec![next]);

        let rotated = updater
            .update(&DigestSignatureVerifier::sign(&[0], f.signer.certificate()))
            .await
            .unwrap();
        assert_eq!(rotated.signer_certificate, successor);
    }

    #[tokio::test]
    async fn test_announced_trust_anchor_verifies_next_list() {
        let f = Fixture::new();
        let new_anchor = TestCa::new("TSL CA 2");
        let announcing = trust_list_signed_by(
            f.signer.certificate(),
            101,
            vec![anchor_record(new_anchor.certificate(), Utc::now() - Duration::hours(1))],
        );
        let successor = trust_list_signed_by(new_anchor.certificate(), 102, Vec::new());
        let updater = f.updater(vec![announcing, successor]);

        updater
            .update(&DigestSignatureVerifier::sign(&[0], f.signer.certificate()))
            .await
            .unwrap();

        // The old signer no longer verifies once an anchor is announced
        let by_old = updater
            .update(&DigestSignatureVerifier::sign(&[1], f.signer.certificate()))
            .await
            .unwrap_err();
        assert_eq!(by_old.code, ErrorCode::SignatureInvalid);

        let rotated = updater
            .update(&DigestSignatureVerifier::sign(&[1], new_anchor.certificate()))
            .await
            .unwrap();
        assert_eq!(rotated.sequence_number, 102);
    }

    #[tokio::test]
    async fn test_expired_signer_is_rejected() {
        let f = Fixture::new();
        let now = Utc::now();
        let expired_signer = f.signer.issue(
            &CertSpec::new("Old Signer")
                .valid_between(now - Duration::days(400), now - Duration::days(1)),
        );
        let next = trust_list_signed_by(&expired_signer, 101, Vec::new());
        let updater = f.updater(vec![next]);

        let err = updater
            .update(&DigestSignatureVerifier::sign(&[0], f.signer.certificate()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Expired);
        assert_eq!(f.store.snapshot().sequence_number, 100);
    }

    #[tokio::test]
    async fn test_undecodable_payload() {
        let f = Fixture::new();
        let updater = f.updater(Vec::new());
        let err = updater.update(&[7]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TslDecodeError);
    }

    #[tokio::test]
    async fn test_snapshot_survives_rotation() {
        let f = Fixture::new();
        let before = f.store.snapshot();
        let next = trust_list_signed_by(f.signer.certificate(), 101, Vec::new());
        f.updater(vec![next])
            .update(&DigestSignatureVerifier::sign(&[0], f.signer.certificate()))
            .await
            .unwrap();

        assert_eq!(before.sequence_number, 100);
        assert_eq!(f.store.snapshot().sequence_number, 101);
    }

    #[tokio::test]
    async fn test_concurrent_updates_apply_once() {
        let f = Fixture::new();
        let next = trust_list_signed_by(f.signer.certificate(), 101, Vec::new());
        let updater = Arc::new(f.updater(vec![next]));
        let payload = DigestSignatureVerifier::sign(&[0], f.signer.certificate());

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let updater = Arc::clone(&updater);
                let payload = payload.clone();
                tokio::spawn(async move { updater.update(&payload).await })
            })
            .collect();

        let mut applied = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => applied += 1,
                Err(e) => assert_eq!(e.code, ErrorCode::SequenceNotIncreasing),
            }
        }
        assert_eq!(applied, 1);
    }
}
