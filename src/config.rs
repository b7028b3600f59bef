//! YAML configuration for an issuance run.
//!
//! The document has a `ca` section describing the authority and a `cert`
//! list with one entry per leaf certificate:
//!
//! ```yaml
//! ca:
//!   expiryTime: 10
//!   dn:
//!     organization: Example Org
//!     country: US
//!     commonName: Example Root CA
//! cert:
//!   - name: web1
//!     expiryTime: 1
//!     dns: [web1.local]
//!     ip: [10.0.0.5]
//!     dn:
//!       commonName: web1.local
//! ```
//!
//! Unknown fields are ignored and missing fields take their zero value.

use crate::cert::name::DistinguishedName;
use crate::cert::template::{CertificateAuthoritySpec, LeafCertificateSpec};
use crate::error::{GenCaError, Result};
use crate::storage::writer::CA_LABEL;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Fixed configuration file name, resolved against the working directory.
pub const CONFIG_FILENAME: &str = "config.yml";

/// The seven distinguished-name fields accepted in a `dn` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DnRecord {
    pub organization: String,
    pub country: String,
    pub province: String,
    pub locality: String,
    pub street_address: String,
    pub postal_code: String,
    pub common_name: String,
}

/// The `ca` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaSection {
    /// Validity in whole years.
    pub expiry_time: u32,
    pub dn: DnRecord,
}

/// One entry of the `cert` list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CertEntry {
    /// Display name, output directory and file stem.
    pub name: String,
    pub expiry_time: u32,
    pub dns: Vec<String>,
    pub ip: Vec<String>,
    pub dn: DnRecord,
}

/// A parsed and validated configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ca: CaSection,
    pub cert: Vec<CertEntry>,
}

impl Config {
    /// Load and validate a configuration file.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use genca::config::{Config, CONFIG_FILENAME};
    /// use std::path::Path;
    ///
    /// let config = Config::load(Path::new(CONFIG_FILENAME)).unwrap();
    /// println!("{} leaf certificates configured", config.cert.len());
    /// ```
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            GenCaError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate a configuration document from YAML text.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping.
        let config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration back to YAML and write it to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml).map_err(|source| GenCaError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the constraints serde cannot express: leaf names must be usable
    /// as a single path component and must be unique within the run.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for (index, entry) in self.cert.iter().enumerate() {
            validate_label(&entry.name)
                .map_err(|reason| GenCaError::Config(format!("cert[{}]: {}", index, reason)))?;

            if !seen.insert(entry.name.as_str()) {
                return Err(GenCaError::Config(format!(
                    "cert[{}]: duplicate name '{}'",
                    index, entry.name
                )));
            }
        }

        Ok(())
    }

    /// The authority specification derived from the `ca` section.
    pub fn authority_spec(&self) -> CertificateAuthoritySpec {
        CertificateAuthoritySpec::from(&self.ca)
    }

    /// Leaf specifications, in configuration order.
    pub fn leaf_specs(&self) -> Vec<LeafCertificateSpec> {
        self.cert.iter().map(LeafCertificateSpec::from).collect()
    }
}

fn validate_label(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("name is required".to_string());
    }
    if name == CA_LABEL {
        return Err(format!("name '{}' is reserved for the authority", CA_LABEL));
    }
    if name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(format!("name '{}' is not a valid directory name", name));
    }
    Ok(())
}

impl From<&CaSection> for CertificateAuthoritySpec {
    fn from(section: &CaSection) -> Self {
        CertificateAuthoritySpec {
            validity_years: section.expiry_time,
            name: DistinguishedName::from(&section.dn),
        }
    }
}

impl From<&CertEntry> for LeafCertificateSpec {
    fn from(entry: &CertEntry) -> Self {
        LeafCertificateSpec {
            label: entry.name.clone(),
            validity_years: entry.expiry_time,
            name: DistinguishedName::from(&entry.dn),
            ip_addresses: entry.ip.clone(),
            dns_names: entry.dns.clone(),
        }
    }
}
