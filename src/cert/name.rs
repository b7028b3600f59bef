//! Distinguished name construction.
//!
//! Maps a configuration `dn` record onto a [`DistinguishedName`] and encodes
//! it as an X.509 `RdnSequence`.

use crate::config::DnRecord;
use crate::error::{GenCaError, Result};
use const_oid::ObjectIdentifier;
use der::asn1::{Any, PrintableStringRef, SetOfVec, Utf8StringRef};
use std::fmt;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

/// Subject (and issuer) name of a certificate.
///
/// Every attribute except the common name is a list, following X.509 naming
/// where an attribute type may carry several values. Names built from
/// configuration always hold exactly one value per list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub country: Vec<String>,
    pub organization: Vec<String>,
    pub locality: Vec<String>,
    pub province: Vec<String>,
    pub street_address: Vec<String>,
    pub postal_code: Vec<String>,
    pub common_name: String,
}

impl From<&DnRecord> for DistinguishedName {
    fn from(record: &DnRecord) -> Self {
        DistinguishedName {
            country: vec![record.country.clone()],
            organization: vec![record.organization.clone()],
            locality: vec![record.locality.clone()],
            province: vec![record.province.clone()],
            street_address: vec![record.street_address.clone()],
            postal_code: vec![record.postal_code.clone()],
            common_name: record.common_name.clone(),
        }
    }
}

impl DistinguishedName {
    /// Attribute (type, value) pairs in encoding order: C, O, L, ST, STREET,
    /// POSTALCODE, CN. An empty common name is left out.
    fn attributes(&self) -> Vec<(ObjectIdentifier, &str)> {
        use const_oid::db::rfc4519;

        let lists = [
            (rfc4519::C, &self.country),
            (rfc4519::O, &self.organization),
            (rfc4519::L, &self.locality),
            (rfc4519::ST, &self.province),
            (rfc4519::STREET, &self.street_address),
            (rfc4519::POSTAL_CODE, &self.postal_code),
        ];

        let mut attributes = Vec::new();
        for (oid, values) in lists {
            for value in values {
                attributes.push((oid, value.as_str()));
            }
        }

        if !self.common_name.is_empty() {
            attributes.push((rfc4519::CN, self.common_name.as_str()));
        }

        attributes
    }

    /// Encode as an `RdnSequence` with one attribute per RDN.
    pub fn to_rdn_sequence(&self) -> Result<RdnSequence> {
        let mut rdns = Vec::new();

        for (oid, value) in self.attributes() {
            let attr = AttributeTypeAndValue {
                oid,
                value: encode_directory_string(value)?,
            };

            let mut attr_set = SetOfVec::new();
            attr_set.insert_ordered(attr).map_err(|e| {
                GenCaError::Signing(format!("Failed to add name attribute: {}", e))
            })?;

            rdns.push(RelativeDistinguishedName::from(attr_set));
        }

        Ok(RdnSequence(rdns))
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .attributes()
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(oid, value)| format!("{}={}", short_name(oid), value))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

fn short_name(oid: ObjectIdentifier) -> &'static str {
    use const_oid::db::rfc4519;

    const SHORT_NAMES: [(ObjectIdentifier, &str); 7] = [
        (rfc4519::C, "C"),
        (rfc4519::O, "O"),
        (rfc4519::L, "L"),
        (rfc4519::ST, "ST"),
        (rfc4519::STREET, "STREET"),
        (rfc4519::POSTAL_CODE, "POSTALCODE"),
        (rfc4519::CN, "CN"),
    ];

    SHORT_NAMES
        .iter()
        .find(|(known, _)| *known == oid)
        .map(|(_, short)| *short)
        .unwrap_or("?")
}

/// PrintableString when the value allows it, UTF8String otherwise.
fn encode_directory_string(value: &str) -> Result<Any> {
    let encoded = match PrintableStringRef::new(value) {
        Ok(printable) => Any::encode_from(&printable),
        Err(_) => {
            let utf8 = Utf8StringRef::new(value)
                .map_err(|e| GenCaError::Signing(format!("Invalid name value: {}", e)))?;
            Any::encode_from(&utf8)
        }
    };

    encoded.map_err(|e| GenCaError::Signing(format!("Failed to encode name value: {}", e)))
}
