//! Cryptographic operations.
//!
//! RSA key generation, PKCS#1 export and the PKCS#1 v1.5/SHA-256 signatures
//! used to sign certificates.

pub mod keypair;
