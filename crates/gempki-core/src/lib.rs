//! Core types for certificate verification in the TI PKI.
//!
//! This crate provides the synchronous building blocks:
//!
//! - **Certificates**: an owned, decoded [`Certificate`] view
//! - **Profiles**: the [`CertificateProfile`] catalogue
//! - **Trust lists**: the [`TrustList`](tsl::TrustList) model, issuer lookup
//!   and candidate validation
//! - **Validators**: the ordered [`VerificationPipeline`](validators::VerificationPipeline)
//! - **Errors**: the [`ErrorCode`] taxonomy and [`GemPkiError`]
//!
//! # Example
//!
//! ```rust,ignore
//! use gempki_core::{validators::VerificationPipeline, ProfileName, Result};
//!
//! fn check(list: &TrustList, cert: &Certificate) -> Result<()> {
//!     let profile = ProfileName::HciAut.profile();
//!     let issuer = list.find_issuer_record("Konnektor", cert, &[&profile.cert_type])?;
//!     VerificationPipeline::full("Konnektor", issuer, &profile, Utc::now()).verify_all(cert)
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/gempki-core/2.0.0")]

mod cert;
pub mod clock;
pub mod crypto;
mod error;
pub mod oid;
mod profile;
pub mod tsl;
pub mod validators;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use cert::{Certificate, CertificateError, KeyUsage};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorCode, GemPkiError, Result, Severity};
pub use profile::{CertificateProfile, ProfileName};
