//! Certificate construction.
//!
//! Templates describe the authority and leaf certificates; the signer turns
//! them into DER and PEM.

pub mod encoding;
pub mod name;
pub mod template;
pub mod x509_signing;
