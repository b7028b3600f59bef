//! Unsigned certificate templates for the authority and leaf roles.
//!
//! A [`CertificateTemplate`] carries everything the signer needs except the
//! keys: serial number, subject, validity window, usage flags and subject
//! alternative names.

use crate::cert::name::DistinguishedName;
use crate::error::{GenCaError, Result};
use chrono::{DateTime, Months, SubsecRound, Utc};
use const_oid::AssociatedOid;
use der::asn1::{Ia5String, OctetString};
use der::Encode;
use std::net::IpAddr;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages, SubjectAltName,
    SubjectKeyIdentifier,
};
use x509_cert::ext::Extension;

/// Serial historically stamped on every authority certificate.
pub const LEGACY_CA_SERIAL: u64 = 2019;

/// Serial historically stamped on every leaf certificate.
pub const LEGACY_LEAF_SERIAL: u64 = 1658;

/// Placeholder subject key identifier carried by leaf certificates.
pub const SUBJECT_KEY_ID_PLACEHOLDER: [u8; 5] = [1, 2, 3, 4, 6];

const SERIAL_LEN: usize = 20;

/// The authority section of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateAuthoritySpec {
    pub validity_years: u32,
    pub name: DistinguishedName,
}

/// One leaf certificate to issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCertificateSpec {
    /// Unique per run; names the output directory and files.
    pub label: String,
    pub validity_years: u32,
    pub name: DistinguishedName,
    pub ip_addresses: Vec<String>,
    pub dns_names: Vec<String>,
}

/// How serial numbers are assigned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SerialPolicy {
    /// A fresh random 160-bit serial per certificate.
    #[default]
    Random,
    /// The fixed per-role constants [`LEGACY_CA_SERIAL`] and [`LEGACY_LEAF_SERIAL`].
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsageFlag {
    DigitalSignature,
    CertSign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsageFlag {
    ClientAuth,
    ServerAuth,
}

/// A subject alternative name entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectAltNameEntry {
    Dns(String),
    Ip(IpAddr),
}

/// An unsigned certificate descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateTemplate {
    /// Big-endian, positive, minimally encoded.
    pub serial_number: Vec<u8>,
    pub subject: DistinguishedName,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub is_ca: bool,
    pub key_usage: Vec<KeyUsageFlag>,
    pub extended_key_usage: Vec<ExtendedKeyUsageFlag>,
    pub subject_alt_names: Vec<SubjectAltNameEntry>,
    pub subject_key_id: Option<Vec<u8>>,
    pub basic_constraints_valid: bool,
}

impl CertificateTemplate {
    /// Template for the self-signed authority.
    pub fn certificate_authority(
        spec: &CertificateAuthoritySpec,
        serials: SerialPolicy,
    ) -> Result<Self> {
        let (not_before, not_after) = validity_window(Utc::now(), spec.validity_years)?;

        Ok(Self {
            serial_number: serial_for(serials, LEGACY_CA_SERIAL),
            subject: spec.name.clone(),
            not_before,
            not_after,
            is_ca: true,
            key_usage: vec![KeyUsageFlag::DigitalSignature, KeyUsageFlag::CertSign],
            extended_key_usage: vec![
                ExtendedKeyUsageFlag::ClientAuth,
                ExtendedKeyUsageFlag::ServerAuth,
            ],
            subject_alt_names: Vec::new(),
            subject_key_id: None,
            basic_constraints_valid: true,
        })
    }

    /// Template for a leaf certificate.
    ///
    /// IP strings that do not parse are dropped from the SAN list with a
    /// warning instead of failing the leaf.
    pub fn leaf(spec: &LeafCertificateSpec, serials: SerialPolicy) -> Result<Self> {
        let (not_before, not_after) = validity_window(Utc::now(), spec.validity_years)?;

        let mut subject_alt_names: Vec<SubjectAltNameEntry> = spec
            .dns_names
            .iter()
            .map(|dns| SubjectAltNameEntry::Dns(dns.clone()))
            .collect();

        for ip in &spec.ip_addresses {
            match ip.trim().parse::<IpAddr>() {
                Ok(addr) => subject_alt_names.push(SubjectAltNameEntry::Ip(addr)),
                Err(_) => tracing::warn!(
                    cert = %spec.label,
                    ip = %ip,
                    "skipping malformed IP address in subject alternative names"
                ),
            }
        }

        Ok(Self {
            serial_number: serial_for(serials, LEGACY_LEAF_SERIAL),
            subject: spec.name.clone(),
            not_before,
            not_after,
            is_ca: false,
            key_usage: vec![KeyUsageFlag::DigitalSignature],
            extended_key_usage: vec![
                ExtendedKeyUsageFlag::ClientAuth,
                ExtendedKeyUsageFlag::ServerAuth,
            ],
            subject_alt_names,
            subject_key_id: Some(SUBJECT_KEY_ID_PLACEHOLDER.to_vec()),
            basic_constraints_valid: false,
        })
    }

    /// X.509 v3 extensions described by this template.
    pub fn extensions(&self) -> Result<Vec<Extension>> {
        let mut extensions = Vec::new();

        if let Some((first, rest)) = self.key_usage.split_first() {
            let mut usages = KeyUsage(key_usage_bit(*first).into());
            for flag in rest {
                usages.0 |= key_usage_bit(*flag);
            }
            extensions.push(build_extension(&usages, true)?);
        }

        if !self.extended_key_usage.is_empty() {
            let purposes = self
                .extended_key_usage
                .iter()
                .map(|flag| match flag {
                    ExtendedKeyUsageFlag::ClientAuth => const_oid::db::rfc5280::ID_KP_CLIENT_AUTH,
                    ExtendedKeyUsageFlag::ServerAuth => const_oid::db::rfc5280::ID_KP_SERVER_AUTH,
                })
                .collect();
            extensions.push(build_extension(&ExtendedKeyUsage(purposes), false)?);
        }

        if self.basic_constraints_valid {
            let constraints = BasicConstraints {
                ca: self.is_ca,
                path_len_constraint: None,
            };
            extensions.push(build_extension(&constraints, true)?);
        }

        if let Some(key_id) = &self.subject_key_id {
            let octets = OctetString::new(key_id.clone()).map_err(template_error)?;
            extensions.push(build_extension(&SubjectKeyIdentifier(octets), false)?);
        }

        if !self.subject_alt_names.is_empty() {
            let names = self
                .subject_alt_names
                .iter()
                .map(general_name)
                .collect::<Result<Vec<_>>>()?;
            extensions.push(build_extension(&SubjectAltName(names), false)?);
        }

        Ok(extensions)
    }
}

/// Validity window starting at `start` (truncated to whole seconds) and
/// ending `years` calendar years later.
///
/// A window starting on Feb 29 ends on Feb 28 when the target year is not a
/// leap year.
pub fn validity_window(
    start: DateTime<Utc>,
    years: u32,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let not_before = start.trunc_subsecs(0);
    let months = years
        .checked_mul(12)
        .ok_or_else(|| GenCaError::Signing(format!("Validity of {} years is too long", years)))?;

    let not_after = not_before
        .checked_add_months(Months::new(months))
        .ok_or_else(|| GenCaError::Signing(format!("Validity of {} years is too long", years)))?;

    Ok((not_before, not_after))
}

fn serial_for(policy: SerialPolicy, legacy: u64) -> Vec<u8> {
    match policy {
        SerialPolicy::Random => generate_serial_number(),
        SerialPolicy::Legacy => minimal_be_bytes(legacy),
    }
}

fn generate_serial_number() -> Vec<u8> {
    let mut bytes = [0u8; SERIAL_LEN];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    // Positive and without a redundant leading byte
    bytes[0] = (bytes[0] & 0x7F) | 0x40;
    bytes.to_vec()
}

fn minimal_be_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len() - 1);
    let mut out = bytes[first..].to_vec();
    if out[0] & 0x80 != 0 {
        out.insert(0, 0);
    }
    out
}

fn key_usage_bit(flag: KeyUsageFlag) -> KeyUsages {
    match flag {
        KeyUsageFlag::DigitalSignature => KeyUsages::DigitalSignature,
        KeyUsageFlag::CertSign => KeyUsages::KeyCertSign,
    }
}

fn general_name(entry: &SubjectAltNameEntry) -> Result<GeneralName> {
    match entry {
        SubjectAltNameEntry::Dns(dns) => {
            let name = Ia5String::new(dns).map_err(template_error)?;
            Ok(GeneralName::DnsName(name))
        }
        SubjectAltNameEntry::Ip(addr) => {
            let octets = match addr {
                IpAddr::V4(v4) => v4.octets().to_vec(),
                IpAddr::V6(v6) => v6.octets().to_vec(),
            };
            let value = OctetString::new(octets).map_err(template_error)?;
            Ok(GeneralName::IpAddress(value))
        }
    }
}

fn build_extension<T: AssociatedOid + Encode>(value: &T, critical: bool) -> Result<Extension> {
    let der = value.to_der().map_err(template_error)?;
    Ok(Extension {
        extn_id: T::OID,
        critical,
        extn_value: OctetString::new(der).map_err(template_error)?,
    })
}

fn template_error(err: der::Error) -> GenCaError {
    GenCaError::Signing(format!("Invalid certificate template: {}", err))
}
