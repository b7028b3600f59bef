//! Issuance run orchestration.
//!
//! The authority is issued and written first; each leaf is then issued in
//! configuration order, signed by the authority's key. A failure while
//! issuing the authority aborts the run. A failure on a leaf is logged and
//! recorded in the [`IssuanceReport`], and the remaining leaves still run.

use crate::cert::encoding::encode_key;
use crate::cert::template::{
    CertificateAuthoritySpec, CertificateTemplate, LeafCertificateSpec, SerialPolicy,
};
use crate::cert::x509_signing::{self_sign, sign_leaf, IssuedCertificate};
use crate::config::Config;
use crate::crypto::keypair::{generate_rsa_keypair, KeyPair};
use crate::error::{GenCaError, Result};
use crate::storage::artifact::OutputArtifact;
use crate::storage::writer::{CertRole, OutputWriter};

/// The materialized authority: its certificate and the key that signs leaves.
#[derive(Debug)]
pub struct Authority {
    pub certificate: IssuedCertificate,
    key: KeyPair,
}

impl Authority {
    /// The authority's key pair, borrowed for signing.
    pub fn key(&self) -> &KeyPair {
        &self.key
    }
}

/// A leaf that could not be issued or written.
#[derive(Debug)]
pub struct LeafFailure {
    pub label: String,
    pub error: GenCaError,
}

/// Outcome of a completed run.
#[derive(Debug, Default)]
pub struct IssuanceReport {
    /// Every file written, authority first, in issuance order.
    pub artifacts: Vec<OutputArtifact>,
    /// Labels of the leaves issued successfully, in configuration order.
    pub issued: Vec<String>,
    pub failures: Vec<LeafFailure>,
}

impl IssuanceReport {
    /// Whether every configured certificate was issued and written.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives one issuance run for a configuration.
#[derive(Debug)]
pub struct Issuer {
    config: Config,
    writer: OutputWriter,
    serials: SerialPolicy,
}

impl Issuer {
    pub fn new(config: Config, writer: OutputWriter) -> Self {
        Self {
            config,
            writer,
            serials: SerialPolicy::default(),
        }
    }

    /// Use a different serial number policy.
    pub fn with_serial_policy(mut self, serials: SerialPolicy) -> Self {
        self.serials = serials;
        self
    }

    /// Issue the authority, then every configured leaf.
    pub fn run(&self) -> Result<IssuanceReport> {
        let mut report = IssuanceReport::default();

        let authority_spec = self.config.authority_spec();
        let (authority, artifacts) = self.issue_authority(&authority_spec)?;
        report.artifacts.extend(artifacts);

        for spec in self.config.leaf_specs() {
            match self.issue_leaf(&spec, &authority) {
                Ok((_, artifacts)) => {
                    report.artifacts.extend(artifacts);
                    report.issued.push(spec.label);
                }
                Err(error) => {
                    tracing::error!(cert = %spec.label, error = %error, "failed to issue certificate");
                    report.failures.push(LeafFailure {
                        label: spec.label,
                        error,
                    });
                }
            }
        }

        tracing::info!(
            issued = report.issued.len(),
            failed = report.failures.len(),
            output = %self.writer.root().display(),
            "issuance finished"
        );

        Ok(report)
    }

    /// Generate, self-sign and write the authority.
    pub fn issue_authority(
        &self,
        spec: &CertificateAuthoritySpec,
    ) -> Result<(Authority, Vec<OutputArtifact>)> {
        tracing::info!("Generating CA...");
        let key = generate_rsa_keypair()?;
        let template = CertificateTemplate::certificate_authority(spec, self.serials)?;
        let certificate = self_sign(&template, &key)?;
        let key_pem = encode_key(&key)?;

        tracing::debug!(
            subject = %template.subject,
            serial = %hex::encode(&template.serial_number),
            not_after = %template.not_after,
            "signed CA certificate"
        );

        tracing::info!("Writing CA...");
        let artifacts = self
            .writer
            .write(&CertRole::Authority, &certificate.pem, &key_pem)?;

        Ok((Authority { certificate, key }, artifacts))
    }

    /// Generate, sign and write one leaf with the authority's key.
    pub fn issue_leaf(
        &self,
        spec: &LeafCertificateSpec,
        authority: &Authority,
    ) -> Result<(IssuedCertificate, Vec<OutputArtifact>)> {
        tracing::info!("Generating cert '{}'...", spec.label);
        let key = generate_rsa_keypair()?;
        let template = CertificateTemplate::leaf(spec, self.serials)?;
        let certificate = sign_leaf(&template, &key, &authority.certificate, authority.key())?;
        let key_pem = encode_key(&key)?;

        tracing::debug!(
            cert = %spec.label,
            subject = %template.subject,
            serial = %hex::encode(&template.serial_number),
            sans = template.subject_alt_names.len(),
            "signed leaf certificate"
        );

        tracing::info!("Writing cert '{}'...", spec.label);
        let role = CertRole::Leaf(spec.label.clone());
        let artifacts = self.writer.write(&role, &certificate.pem, &key_pem)?;

        Ok((certificate, artifacts))
    }
}
