//! Error types for genca.
//!
//! Every stage of the issuance pipeline reports failures through
//! [`GenCaError`]. Configuration errors are fatal for the whole run; the
//! remaining variants are tied to the issuance of a single certificate.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for genca operations.
#[derive(Error, Debug)]
pub enum GenCaError {
    /// Configuration file missing, unreadable, malformed or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// RSA key pair generation failed
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// Certificate encoding, signing or signature verification failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// Creating an output directory or writing an output file failed
    #[error("Write error at {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// PEM encoding/decoding error
    #[error("PEM error: {0}")]
    Pem(String),
}

impl GenCaError {
    /// Whether this error must abort the whole run rather than a single certificate.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GenCaError::Config(_))
    }
}

impl From<serde_yaml::Error> for GenCaError {
    fn from(err: serde_yaml::Error) -> Self {
        GenCaError::Config(err.to_string())
    }
}

/// A specialized Result type for genca operations.
pub type Result<T> = std::result::Result<T, GenCaError>;
