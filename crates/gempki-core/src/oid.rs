//! Object identifiers used across the TI PKI.

// Extensions
/// subjectKeyIdentifier
pub const EXT_SUBJECT_KEY_IDENTIFIER: &str = "2.5.29.14";
/// keyUsage
pub const EXT_KEY_USAGE: &str = "2.5.29.15";
/// basicConstraints
pub const EXT_BASIC_CONSTRAINTS: &str = "2.5.29.19";
/// certificatePolicies
pub const EXT_CERTIFICATE_POLICIES: &str = "2.5.29.32";
/// authorityKeyIdentifier
pub const EXT_AUTHORITY_KEY_IDENTIFIER: &str = "2.5.29.35";
/// extKeyUsage
pub const EXT_EXTENDED_KEY_USAGE: &str = "2.5.29.37";
/// authorityInfoAccess
pub const EXT_AUTHORITY_INFO_ACCESS: &str = "1.3.6.1.5.5.7.1.1";
/// CertHash OCSP single extension (Common PKI)
pub const EXT_OCSP_CERT_HASH: &str = "1.3.36.8.3.13";

/// id-ad-ocsp access method
pub const AD_OCSP: &str = "1.3.6.1.5.5.7.48.1";
/// id-pkix-ocsp-basic response type
pub const OCSP_BASIC: &str = "1.3.6.1.5.5.7.48.1.1";

// Extended key usages
/// id-kp-serverAuth
pub const EKU_SERVER_AUTH: &str = "1.3.6.1.5.5.7.3.1";
/// id-kp-clientAuth
pub const EKU_CLIENT_AUTH: &str = "1.3.6.1.5.5.7.3.2";
/// id-kp-OCSPSigning
pub const EKU_OCSP_SIGNING: &str = "1.3.6.1.5.5.7.3.9";

// Certificate types (gematik policy OIDs)
/// Electronic health card authentication
pub const CERT_TYPE_EGK_AUT: &str = "1.2.276.0.76.4.70";
/// Health professional card authentication
pub const CERT_TYPE_HBA_AUT: &str = "1.2.276.0.76.4.75";
/// Institution card encryption
pub const CERT_TYPE_SMC_B_ENC: &str = "1.2.276.0.76.4.76";
/// Institution card authentication
pub const CERT_TYPE_SMC_B_AUT: &str = "1.2.276.0.76.4.77";
/// Institution card organisational signature
pub const CERT_TYPE_SMC_B_OSIG: &str = "1.2.276.0.76.4.78";
/// Service TLS client
pub const CERT_TYPE_FD_TLS_C: &str = "1.2.276.0.76.4.168";
/// Service TLS server
pub const CERT_TYPE_FD_TLS_S: &str = "1.2.276.0.76.4.169";

// Digests
/// SHA-1
pub const HASH_SHA1: &str = "1.3.14.3.2.26";
/// SHA-256
pub const HASH_SHA256: &str = "2.16.840.1.101.3.4.2.1";
/// SHA-384
pub const HASH_SHA384: &str = "2.16.840.1.101.3.4.2.2";
/// SHA-512
pub const HASH_SHA512: &str = "2.16.840.1.101.3.4.2.3";

// Keys and signatures
/// rsaEncryption
pub const KEY_RSA: &str = "1.2.840.113549.1.1.1";
/// id-ecPublicKey
pub const KEY_EC: &str = "1.2.840.10045.2.1";
/// secp256r1
pub const CURVE_P256: &str = "1.2.840.10045.3.1.7";
/// secp384r1
pub const CURVE_P384: &str = "1.3.132.0.34";
/// sha256WithRSAEncryption
pub const SIG_RSA_SHA256: &str = "1.2.840.113549.1.1.11";
/// sha384WithRSAEncryption
pub const SIG_RSA_SHA384: &str = "1.2.840.113549.1.1.12";
/// sha512WithRSAEncryption
pub const SIG_RSA_SHA512: &str = "1.2.840.113549.1.1.13";
/// RSASSA-PSS
pub const SIG_RSA_PSS: &str = "1.2.840.113549.1.1.10";
/// ecdsa-with-SHA256
pub const SIG_ECDSA_SHA256: &str = "1.2.840.10045.4.3.2";
/// ecdsa-with-SHA384
pub const SIG_ECDSA_SHA384: &str = "1.2.840.10045.4.3.3";
