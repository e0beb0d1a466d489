//! OCSP verification for the TI PKI.
//!
//! [`OcspEngine`] builds a request for an end-entity certificate, obtains a
//! response from the responder named by a [`ResolveSsp`] strategy (or from
//! its [`OcspRespCache`]), and checks responder identity, signature,
//! certificate hash, timing and revocation status.
//!
//! ```rust,ignore
//! let engine = OcspEngine::new(
//!     "Konnektor",
//!     OcspConfig::default(),
//!     Arc::new(HttpOcspTransport::new()?),
//!     SspSource::Tsl.resolver(),
//!     Arc::new(SystemClock),
//! );
//! let status = engine.check(&ee, issuer, &trust_list, Utc::now()).await?;
//! ```

#![doc(html_root_url = "https://docs.rs/gempki-ocsp/2.0.0")]

mod cache;
pub mod cert_hash;
mod config;
mod engine;
mod request;
mod response;
mod ssp;
mod transport;
mod verifier;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use cache::OcspRespCache;
pub use config::*;
pub use engine::{OcspEngine, ResponseSource, RevocationStatus};
pub use request::{cert_id_for, cert_id_matches, OcspRequest, ID_SHA1};
pub use response::{
    BasicResponse, CertStatus, OcspCodecError, OcspResponse, ResponderId, ResponseStatus,
    SingleResponse, ID_PKIX_OCSP_BASIC,
};
pub use ssp::{CertificateSsp, ResolveSsp, SspSource, TslSsp};
pub use transport::{HttpOcspTransport, HttpOcspTransportBuilder, OcspTransport, TransportError};
pub use verifier::{check_timing, resolve_status, OcspResponseVerifier, OcspStage, VerifiedResponse};
