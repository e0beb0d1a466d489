//! Certificate verification for the German healthcare telematics PKI.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gempki::{CertificateVerifier, HttpOcspTransport, PkiConfig, SystemClock, TrustStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PkiConfig::load("gempki.toml".as_ref())?.validate()?;
//!     let store = Arc::new(TrustStore::new(initial_trust_list()?));
//!
//!     let verifier = CertificateVerifier::new(
//!         &config,
//!         store,
//!         Arc::new(HttpOcspTransport::new()?),
//!         Arc::new(SystemClock),
//!     );
//!
//!     let report = verifier.verify_der(&std::fs::read("smcb-aut.der")?).await?;
//!     println!("{} via {}", report.profile, report.issuer_subject);
//!     if report.is_degraded() {
//!         println!("revocation status not checked");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `default` - Uses rustls for TLS
//! - `rustls` - Use rustls for the OCSP transport
//! - `native-tls` - Use system native TLS

#![doc(html_root_url = "https://docs.rs/gempki/2.0.0")]

mod config;
mod trust_store;
mod verifier;

// Re-export core types
pub use gempki_core::*;

// Re-export OCSP
pub use gempki_ocsp as ocsp;
pub use gempki_ocsp::{
    HttpOcspTransport, OcspConfig, OcspEngine, OcspTransport, ResponseSource, RevocationStatus,
    SspSource, TransportError,
};

pub use config::{ConfigError, PkiConfig, ValidatedConfig};
pub use trust_store::{TrustStore, TslUpdater};
pub use verifier::{CertificateVerifier, VerificationReport};

// Re-export runtime for convenience
pub use tokio;
