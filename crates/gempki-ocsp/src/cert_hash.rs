//! The common-PKI `CertHash` single-response extension.
//!
//! ```text
//! CertHash ::= SEQUENCE {
//!     hashAlgorithm     AlgorithmIdentifier,
//!     certificateHash   OCTET STRING }
//! ```

use der::asn1::{ObjectIdentifier, OctetString};
use der::{Decode, Sequence};
use gempki_core::{crypto, oid, Certificate};
use x509_cert::spki::AlgorithmIdentifierOwned;

/// Extension OID of `CertHash`
pub const ID_CERT_HASH: ObjectIdentifier = ObjectIdentifier::new_unwrap(oid::EXT_OCSP_CERT_HASH);

/// Decoded `CertHash` value
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct CertHash {
    pub hash_algorithm: AlgorithmIdentifierOwned,
    pub certificate_hash: OctetString,
}

impl CertHash {
    /// Decode the extension value
    pub fn decode(value: &[u8]) -> der::Result<Self> {
        Self::from_der(value)
    }

    /// Check the hash against the full DER of `cert`.
    ///
    /// Unknown hash algorithms never match.
    #[must_use]
    pub fn matches(&self, cert: &Certificate) -> bool {
        crypto::digest_by_oid(&self.hash_algorithm.oid.to_string(), cert.der())
            .is_some_and(|digest| digest == self.certificate_hash.as_bytes())
    }
}
