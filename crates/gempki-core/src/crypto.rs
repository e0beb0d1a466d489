//! Digest and raw signature primitives via `ring`.

use ring::digest::{self, Algorithm as DigestAlgorithm};
use ring::signature::{self, VerificationAlgorithm};
use thiserror::Error;

use crate::oid;

/// Failure of a raw signature check
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// Algorithm (or key/curve combination) not supported
    #[error("unsupported signature algorithm {algorithm} for key {key_algorithm}")]
    UnsupportedAlgorithm {
        /// Signature algorithm OID
        algorithm: String,
        /// Public key algorithm or curve OID
        key_algorithm: String,
    },

    /// Signature does not verify
    #[error("signature mismatch")]
    Mismatch,
}

/// Public key material needed to verify a signature.
#[derive(Debug, Clone, Copy)]
pub struct PublicKeyRef<'a> {
    /// SPKI algorithm OID
    pub algorithm: &'a str,
    /// Named curve OID for EC keys
    pub curve: Option<&'a str>,
    /// Contents of the SPKI BIT STRING
    pub key: &'a [u8],
}

/// Compute SHA-256 of raw bytes, hex encoded.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Compute SHA-256 of raw bytes.
#[must_use]
pub fn sha256(data: &[u8]) -> Vec<u8> {
    digest::digest(&digest::SHA256, data).as_ref().to_vec()
}

/// Compute SHA-1 of raw bytes (OCSP CertID only).
#[must_use]
pub fn sha1(data: &[u8]) -> Vec<u8> {
    digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, data)
        .as_ref()
        .to_vec()
}

/// Digest by hash algorithm OID, `None` if the algorithm is unknown.
#[must_use]
pub fn digest_by_oid(algorithm: &str, data: &[u8]) -> Option<Vec<u8>> {
    let alg: &'static DigestAlgorithm = match algorithm {
        oid::HASH_SHA1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
        oid::HASH_SHA256 => &digest::SHA256,
        oid::HASH_SHA384 => &digest::SHA384,
        oid::HASH_SHA512 => &digest::SHA512,
        _ => return None,
    };
    Some(digest::digest(alg, data).as_ref().to_vec())
}

fn verification_algorithm(
    signature_algorithm: &str,
    key: &PublicKeyRef<'_>,
) -> Option<&'static dyn VerificationAlgorithm> {
    match (signature_algorithm, key.algorithm, key.curve) {
        (oid::SIG_RSA_SHA256, oid::KEY_RSA, _) => Some(&signature::RSA_PKCS1_2048_8192_SHA256),
        (oid::SIG_RSA_SHA384, oid::KEY_RSA, _) => Some(&signature::RSA_PKCS1_2048_8192_SHA384),
        (oid::SIG_RSA_SHA512, oid::KEY_RSA, _) => Some(&signature::RSA_PKCS1_2048_8192_SHA512),
        (oid::SIG_RSA_PSS, oid::KEY_RSA, _) => Some(&signature::RSA_PSS_2048_8192_SHA256),
        (oid::SIG_ECDSA_SHA256, oid::KEY_EC, Some(oid::CURVE_P256)) => {
            Some(&signature::ECDSA_P256_SHA256_ASN1)
        }
        (oid::SIG_ECDSA_SHA384, oid::KEY_EC, Some(oid::CURVE_P256)) => {
            Some(&signature::ECDSA_P256_SHA384_ASN1)
        }
        (oid::SIG_ECDSA_SHA256, oid::KEY_EC, Some(oid::CURVE_P384)) => {
            Some(&signature::ECDSA_P384_SHA256_ASN1)
        }
        (oid::SIG_ECDSA_SHA384, oid::KEY_EC, Some(oid::CURVE_P384)) => {
            Some(&signature::ECDSA_P384_SHA384_ASN1)
        }
        _ => None,
    }
}

/// Verify `signature` over `message` with the given key.
pub fn verify_signature(
    signature_algorithm: &str,
    key: &PublicKeyRef<'_>,
    message: &[u8],
    signature_value: &[u8],
) -> Result<(), SignatureError> {
    let alg = verification_algorithm(signature_algorithm, key).ok_or_else(|| {
        SignatureError::UnsupportedAlgorithm {
            algorithm: signature_algorithm.to_string(),
            key_algorithm: key.curve.unwrap_or(key.algorithm).to_string(),
        }
    })?;

    signature::UnparsedPublicKey::new(alg, key.key)
        .verify(message, signature_value)
        .map_err(|_| SignatureError::Mismatch)
}
