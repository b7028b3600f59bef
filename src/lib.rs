//! genca: issue a self-signed certificate authority and CA-signed leaf
//! certificates from a declarative YAML configuration.
//!
//! A run reads `config.yml`, generates a 4096-bit RSA authority, self-signs
//! it, then generates and signs one leaf certificate per configured entry.
//! Certificates and PKCS#1 private keys are written as PEM below `ssl/`.
//!
//! # Architecture
//!
//! Issuance is a pipeline of small functions, each returning `Result`:
//! name building ([`cert::name`]), key generation ([`crypto::keypair`]),
//! template construction ([`cert::template`]), signing
//! ([`cert::x509_signing`]), PEM encoding ([`cert::encoding`]) and output
//! ([`storage::writer`]). [`issuer::Issuer`] drives the pipeline for a whole
//! configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use genca::config::{Config, CONFIG_FILENAME};
//! use genca::issuer::Issuer;
//! use genca::storage::writer::OutputWriter;
//! use std::path::Path;
//!
//! fn example() -> genca::Result<()> {
//!     let config = Config::load(Path::new(CONFIG_FILENAME))?;
//!     let report = Issuer::new(config, OutputWriter::for_working_directory(Path::new("."))).run()?;
//!     println!("Issued {} leaf certificates", report.issued.len());
//!     Ok(())
//! }
//! ```

pub mod cert;
pub mod config;
pub mod crypto;
pub mod error;
pub mod issuer;
pub mod storage;

// Re-export commonly used types
pub use error::{GenCaError, Result};
