//! X.509 certificate signing using x509-cert.
//!
//! The authority certificate is self-signed; every leaf is signed by the
//! authority's key and names the authority's subject as its issuer.

use crate::cert::encoding::encode_certificate;
use crate::cert::template::CertificateTemplate;
use crate::crypto::keypair::{public_key_from_spki, verify_sha256, KeyPair};
use crate::error::{GenCaError, Result};
use chrono::{DateTime, Utc};
use der::asn1::{Any, BitString, GeneralizedTime, Null, UtcTime};
use der::{Decode, Encode};
use rsa::RsaPublicKey;
use spki::AlgorithmIdentifierOwned;
use std::time::Duration;
use x509_cert::certificate::Certificate;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::TbsCertificate;

/// A signed certificate together with the templates that produced it.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub template: CertificateTemplate,
    /// The issuer's template; equal to `template` for a self-signed authority.
    pub signer_template: CertificateTemplate,
    pub der: Vec<u8>,
    pub pem: String,
}

impl IssuedCertificate {
    /// Decode the DER bytes into an x509-cert structure.
    pub fn certificate(&self) -> Result<Certificate> {
        cert_from_der(&self.der)
    }

    /// The public key certified by this certificate.
    pub fn public_key(&self) -> Result<RsaPublicKey> {
        let cert = self.certificate()?;
        public_key_from_spki(&cert.tbs_certificate.subject_public_key_info)
    }

    /// Whether this certificate is self-signed.
    pub fn is_self_signed(&self) -> bool {
        self.template == self.signer_template
    }
}

/// Sign `template` for `subject_key` with the issuer's key.
///
/// For a self-signed authority pass the same template and key twice (or use
/// [`self_sign`]). The issuer template must describe a CA. The encoded
/// certificate is verified against the issuer's public key before it is
/// returned.
///
/// # Example
///
/// ```no_run
/// use genca::cert::template::{CertificateAuthoritySpec, CertificateTemplate, SerialPolicy};
/// use genca::cert::x509_signing::sign;
/// use genca::crypto::keypair::generate_rsa_keypair;
///
/// # fn example(spec: &CertificateAuthoritySpec) -> genca::error::Result<()> {
/// let keypair = generate_rsa_keypair()?;
/// let template = CertificateTemplate::certificate_authority(spec, SerialPolicy::Random)?;
/// let issued = sign(&template, &keypair, &template, &keypair)?;
/// assert!(issued.pem.contains("BEGIN CERTIFICATE"));
/// # Ok(())
/// # }
/// ```
pub fn sign(
    template: &CertificateTemplate,
    subject_key: &KeyPair,
    issuer_template: &CertificateTemplate,
    issuer_key: &KeyPair,
) -> Result<IssuedCertificate> {
    if !issuer_template.is_ca {
        return Err(GenCaError::Signing(format!(
            "Issuer '{}' is not a certificate authority",
            issuer_template.subject
        )));
    }

    let serial = SerialNumber::new(&template.serial_number)
        .map_err(|e| GenCaError::Signing(format!("Failed to create serial number: {}", e)))?;
    let subject = template.subject.to_rdn_sequence()?;
    let issuer = issuer_template.subject.to_rdn_sequence()?;
    let validity = create_validity(template.not_before, template.not_after)?;
    let spki = subject_key.subject_public_key_info()?;
    let signature_algorithm = sha256_with_rsa_algorithm()?;
    let extensions = template.extensions()?;

    let tbs = TbsCertificate {
        version: x509_cert::certificate::Version::V3,
        serial_number: serial,
        signature: signature_algorithm.clone(),
        issuer,
        validity,
        subject,
        subject_public_key_info: spki,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: if extensions.is_empty() {
            None
        } else {
            Some(extensions)
        },
    };

    // Signed with the issuer's key, which is the subject's own key when self-signing
    let signature = sign_tbs(&tbs, issuer_key)?;

    let cert = Certificate {
        tbs_certificate: tbs,
        signature_algorithm,
        signature,
    };

    let der = cert
        .to_der()
        .map_err(|e| GenCaError::Signing(format!("Failed to encode certificate: {}", e)))?;

    verify_signature(&cert, issuer_key.public_key())?;

    Ok(IssuedCertificate {
        template: template.clone(),
        signer_template: issuer_template.clone(),
        pem: encode_certificate(&der),
        der,
    })
}

/// Self-sign an authority template.
pub fn self_sign(template: &CertificateTemplate, keypair: &KeyPair) -> Result<IssuedCertificate> {
    sign(template, keypair, template, keypair)
}

/// Sign a leaf template with an already issued authority.
///
/// Fails when `ca_key` is not the key certified by `ca`.
pub fn sign_leaf(
    template: &CertificateTemplate,
    leaf_key: &KeyPair,
    ca: &IssuedCertificate,
    ca_key: &KeyPair,
) -> Result<IssuedCertificate> {
    if !ca_key.matches(&ca.public_key()?) {
        return Err(GenCaError::Signing(format!(
            "Key does not belong to authority '{}'",
            ca.template.subject
        )));
    }

    sign(template, leaf_key, &ca.template, ca_key)
}

/// Check that `cert_der` names `issuer_der`'s subject as issuer and carries a
/// valid signature from the issuer's key.
pub fn verify_issued_by(cert_der: &[u8], issuer_der: &[u8]) -> Result<()> {
    let cert = cert_from_der(cert_der)?;
    let issuer = cert_from_der(issuer_der)?;

    if cert.tbs_certificate.issuer != issuer.tbs_certificate.subject {
        return Err(GenCaError::Signing(format!(
            "Issuer name '{}' does not match '{}'",
            cert.tbs_certificate.issuer, issuer.tbs_certificate.subject
        )));
    }

    let issuer_key = public_key_from_spki(&issuer.tbs_certificate.subject_public_key_info)?;
    verify_signature(&cert, &issuer_key)
}

/// Decode a DER certificate.
pub fn cert_from_der(der: &[u8]) -> Result<Certificate> {
    Certificate::from_der(der)
        .map_err(|e| GenCaError::Signing(format!("Failed to decode certificate: {}", e)))
}

// Helper functions

fn verify_signature(cert: &Certificate, issuer_key: &RsaPublicKey) -> Result<()> {
    if cert.signature_algorithm.oid != const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION {
        return Err(GenCaError::Signing(format!(
            "Unsupported signature algorithm {}",
            cert.signature_algorithm.oid
        )));
    }

    let tbs_der = cert
        .tbs_certificate
        .to_der()
        .map_err(|e| GenCaError::Signing(format!("Failed to encode TBS: {}", e)))?;

    verify_sha256(issuer_key, &tbs_der, cert.signature.raw_bytes())
}

fn create_validity(not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Result<Validity> {
    Ok(Validity {
        not_before: to_x509_time(not_before)?,
        not_after: to_x509_time(not_after)?,
    })
}

/// UTCTime through 2049, GeneralizedTime afterwards.
fn to_x509_time(time: DateTime<Utc>) -> Result<Time> {
    let seconds = u64::try_from(time.timestamp()).map_err(|_| {
        GenCaError::Signing(format!("Time {} predates the Unix epoch", time))
    })?;

    let date_time = der::DateTime::from_unix_duration(Duration::from_secs(seconds))
        .map_err(|e| GenCaError::Signing(format!("Time {} out of range: {}", time, e)))?;

    if date_time.year() < 2050 {
        let utc = UtcTime::from_date_time(date_time)
            .map_err(|e| GenCaError::Signing(format!("Failed to create validity: {}", e)))?;
        Ok(Time::UtcTime(utc))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

fn sha256_with_rsa_algorithm() -> Result<AlgorithmIdentifierOwned> {
    let parameters = Any::encode_from(&Null)
        .map_err(|e| GenCaError::Signing(format!("Failed to encode parameters: {}", e)))?;

    Ok(AlgorithmIdentifierOwned {
        oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
        parameters: Some(parameters),
    })
}

fn sign_tbs(tbs: &TbsCertificate, signing_key: &KeyPair) -> Result<BitString> {
    let tbs_der = tbs
        .to_der()
        .map_err(|e| GenCaError::Signing(format!("Failed to encode TBS: {}", e)))?;

    let signature = signing_key.sign_sha256(&tbs_der)?;

    BitString::from_bytes(&signature).map_err(|e| {
        GenCaError::Signing(format!("Failed to create signature bitstring: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::name::DistinguishedName;
    use crate::cert::template::{
        CertificateAuthoritySpec, LeafCertificateSpec, SerialPolicy,
    };
    use crate::config::DnRecord;
    use crate::crypto::keypair::test_keys;
    use chrono::TimeZone;

    fn ca_template(years: u32) -> CertificateTemplate {
        let spec = CertificateAuthoritySpec {
            validity_years: years,
            name: DistinguishedName::from(&DnRecord {
                organization: "Test Org".to_string(),
                country: "US".to_string(),
                common_name: "Test Root CA".to_string(),
                ..DnRecord::default()
            }),
        };
        CertificateTemplate::certificate_authority(&spec, SerialPolicy::Random).unwrap()
    }

    fn leaf_template() -> CertificateTemplate {
        let spec = LeafCertificateSpec {
            label: "web1".to_string(),
            validity_years: 1,
            name: DistinguishedName::from(&DnRecord {
                common_name: "web1.local".to_string(),
                ..DnRecord::default()
            }),
            ip_addresses: vec!["10.0.0.5".to_string()],
            dns_names: vec!["web1.local".to_string()],
        };
        CertificateTemplate::leaf(&spec, SerialPolicy::Random).unwrap()
    }

    fn issue_ca() -> IssuedCertificate {
        self_sign(&ca_template(10), test_keys::authority()).unwrap()
    }

    #[test]
    fn test_self_signed_ca() {
        let ca = issue_ca();

        assert!(ca.is_self_signed());
        assert!(ca.pem.contains("BEGIN CERTIFICATE"));
        assert!(verify_issued_by(&ca.der, &ca.der).is_ok());

        let cert = ca.certificate().unwrap();
        assert_eq!(cert.tbs_certificate.issuer, cert.tbs_certificate.subject);
        assert_eq!(cert.tbs_certificate.version, x509_cert::certificate::Version::V3);
    }

    #[test]
    fn test_leaf_signed_by_ca() {
        let ca = issue_ca();
        let leaf = sign_leaf(&leaf_template(), test_keys::leaf(), &ca, test_keys::authority()).unwrap();

        assert!(!leaf.is_self_signed());
        assert_eq!(leaf.signer_template, ca.template);
        assert!(verify_issued_by(&leaf.der, &ca.der).is_ok());

        // Issuer should be the CA's subject
        let ca_cert = ca.certificate().unwrap();
        let leaf_cert = leaf.certificate().unwrap();
        assert_eq!(leaf_cert.tbs_certificate.issuer, ca_cert.tbs_certificate.subject);

        // The leaf certifies its own key, not the CA's
        assert!(test_keys::leaf().matches(&leaf.public_key().unwrap()));
    }

    #[test]
    fn test_leaf_does_not_verify_against_itself() {
        let ca = issue_ca();
        let leaf = sign_leaf(&leaf_template(), test_keys::leaf(), &ca, test_keys::authority()).unwrap();

        assert!(verify_issued_by(&leaf.der, &leaf.der).is_err());
        assert!(verify_issued_by(&ca.der, &leaf.der).is_err());
    }

    #[test]
    fn test_leaf_issuer_must_be_ca() {
        let leaf = leaf_template();
        let result = sign(&leaf, test_keys::leaf(), &leaf, test_keys::leaf());
        assert!(matches!(result, Err(GenCaError::Signing(_))));
    }

    #[test]
    fn test_sign_leaf_rejects_mismatched_ca_key() {
        let ca = issue_ca();
        let result = sign_leaf(&leaf_template(), test_keys::leaf(), &ca, test_keys::leaf());
        assert!(matches!(result, Err(GenCaError::Signing(_))));
    }

    #[test]
    fn test_serial_and_validity_encoded() {
        let template = ca_template(10);
        let ca = self_sign(&template, test_keys::authority()).unwrap();
        let cert = ca.certificate().unwrap();

        assert_eq!(cert.tbs_certificate.serial_number.as_bytes(), template.serial_number.as_slice());

        let not_before = cert.tbs_certificate.validity.not_before.to_unix_duration();
        let not_after = cert.tbs_certificate.validity.not_after.to_unix_duration();
        assert_eq!(not_before.as_secs() as i64, template.not_before.timestamp());
        assert_eq!(not_after.as_secs() as i64, template.not_after.timestamp());
    }

    #[test]
    fn test_to_x509_time_switches_to_generalized_after_2049() {
        let before = Utc.with_ymd_and_hms(2049, 12, 31, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2050, 1, 1, 0, 0, 0).unwrap();

        assert!(matches!(to_x509_time(before).unwrap(), Time::UtcTime(_)));
        assert!(matches!(to_x509_time(after).unwrap(), Time::GeneralTime(_)));
    }

    #[test]
    fn test_long_lived_ca_encodes() {
        // 40 years from now lands past 2049 and needs GeneralizedTime
        let ca = self_sign(&ca_template(40), test_keys::authority()).unwrap();
        let cert = ca.certificate().unwrap();
        assert!(matches!(cert.tbs_certificate.validity.not_after, Time::GeneralTime(_)));
    }

    #[test]
    fn test_signature_algorithm() {
        let cert = issue_ca().certificate().unwrap();
        assert_eq!(
            cert.signature_algorithm.oid,
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION
        );
        assert_eq!(cert.signature_algorithm, cert.tbs_certificate.signature);
    }

    #[test]
    fn test_cert_from_der_rejects_garbage() {
        assert!(cert_from_der(&[0x30, 0x03, 0x02, 0x01]).is_err());
    }
}
