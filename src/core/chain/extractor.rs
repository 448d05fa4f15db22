// src/core/chain/extractor.rs

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use x509_parser::extensions::GeneralName;
use x509_parser::objects::{oid2sn, oid_registry};
use x509_parser::oid_registry::Oid;
use x509_parser::prelude::*;

use crate::core::chain::extensions::{
    ExtensionRegistry, OID_AD_CA_ISSUERS, OID_AD_CA_REPOSITORY, OID_AD_OCSP, OID_AD_TIME_STAMPING,
};
use crate::core::chain::mapper::EntityTarget;
use crate::core::models::{Entity, ExtKeyUsage, KeyUsage};

/// The value of one general name, detached from the certificate buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneralNameValue {
    DnsName(String),
    IpAddress(Vec<u8>),
    Rfc822Name(String),
    Uri(String),
    /// Directory names, other names and the remaining forms are kept only as a marker.
    Unsupported,
}

impl GeneralNameValue {
    pub fn kind(&self) -> Option<GeneralNameKind> {
        match self {
            GeneralNameValue::DnsName(_) => Some(GeneralNameKind::DnsName),
            GeneralNameValue::IpAddress(_) => Some(GeneralNameKind::IpAddress),
            GeneralNameValue::Rfc822Name(_) => Some(GeneralNameKind::Rfc822Name),
            GeneralNameValue::Uri(_) => Some(GeneralNameKind::Uri),
            GeneralNameValue::Unsupported => None,
        }
    }

    /// The textual value for string-typed names.
    pub fn text(&self) -> Option<&str> {
        match self {
            GeneralNameValue::DnsName(s) | GeneralNameValue::Rfc822Name(s) | GeneralNameValue::Uri(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&GeneralName<'_>> for GeneralNameValue {
    fn from(name: &GeneralName<'_>) -> Self {
        match name {
            GeneralName::DNSName(s) => GeneralNameValue::DnsName(s.to_string()),
            GeneralName::IPAddress(bytes) => GeneralNameValue::IpAddress(bytes.to_vec()),
            GeneralName::RFC822Name(s) => GeneralNameValue::Rfc822Name(s.to_string()),
            GeneralName::URI(s) => GeneralNameValue::Uri(s.to_string()),
            _ => GeneralNameValue::Unsupported,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneralNameKind {
    DnsName,
    IpAddress,
    Rfc822Name,
    Uri,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessMethod {
    Ocsp,
    CaIssuers,
    CaRepository,
    TimeStamping,
    Other(String),
}

impl AccessMethod {
    pub fn from_oid(oid: &Oid<'_>) -> Self {
        if *oid == OID_AD_OCSP {
            AccessMethod::Ocsp
        } else if *oid == OID_AD_CA_ISSUERS {
            AccessMethod::CaIssuers
        } else if *oid == OID_AD_CA_REPOSITORY {
            AccessMethod::CaRepository
        } else if *oid == OID_AD_TIME_STAMPING {
            AccessMethod::TimeStamping
        } else {
            AccessMethod::Other(oid.to_id_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDescription {
    pub method: AccessMethod,
    pub location: GeneralNameValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoAccess {
    Authority,
    Subject,
}

/// Every policy-relevant attribute of one certificate.
///
/// Missing extensions leave their fields at the defaults; `None` in the
/// list-valued extension fields means the extension itself was absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateFields {
    pub version: u32,
    pub serial_number: String,
    pub subject_common_names: Vec<String>,
    pub issuer_common_name: String,
    pub organizations: Vec<String>,
    pub organizational_units: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub signature_algorithm: String,
    pub public_key_algorithm: String,
    pub key_usage: Vec<KeyUsage>,
    pub ext_key_usage: Vec<ExtKeyUsage>,
    pub is_ca: bool,
    pub crl_distribution_points: Vec<String>,
    pub subject_key_id: String,
    pub authority_key_id: String,
    pub subject_alt_names: Option<Vec<GeneralNameValue>>,
    pub authority_info_access: Option<Vec<AccessDescription>>,
    pub subject_info_access: Option<Vec<AccessDescription>>,
}

impl Default for CertificateFields {
    fn default() -> Self {
        Self {
            version: 0,
            serial_number: String::new(),
            subject_common_names: Vec::new(),
            issuer_common_name: String::new(),
            organizations: Vec::new(),
            organizational_units: Vec::new(),
            not_before: DateTime::<Utc>::default(),
            not_after: DateTime::<Utc>::default(),
            signature_algorithm: String::new(),
            public_key_algorithm: String::new(),
            key_usage: Vec::new(),
            ext_key_usage: Vec::new(),
            is_ca: false,
            crl_distribution_points: Vec::new(),
            subject_key_id: String::new(),
            authority_key_id: String::new(),
            subject_alt_names: None,
            authority_info_access: None,
            subject_info_access: None,
        }
    }
}

impl CertificateFields {
    /// First subject CN, or an empty string.
    pub fn subject_common_name(&self) -> &str {
        self.subject_common_names.first().map(String::as_str).unwrap_or_default()
    }
}

/// Pulls the flat field record out of a parsed certificate.
pub fn extract_fields(cert: &X509Certificate<'_>, registry: &ExtensionRegistry) -> CertificateFields {
    let validity = cert.validity();
    let mut fields = CertificateFields {
        version: cert.version().0,
        serial_number: cert.serial.to_string(),
        subject_common_names: attribute_values(cert.subject().iter_common_name()),
        issuer_common_name: attribute_values(cert.issuer().iter_common_name())
            .into_iter()
            .next()
            .unwrap_or_default(),
        organizations: attribute_values(cert.subject().iter_organization()),
        organizational_units: attribute_values(cert.subject().iter_organizational_unit()),
        not_before: asn1_time_to_chrono_utc(&validity.not_before),
        not_after: asn1_time_to_chrono_utc(&validity.not_after),
        signature_algorithm: algorithm_name(&cert.signature_algorithm.algorithm),
        public_key_algorithm: algorithm_name(&cert.public_key().algorithm.algorithm),
        ..CertificateFields::default()
    };

    for ext in cert.extensions() {
        registry.apply(ext, &mut fields);
    }

    debug!(
        serial = %fields.serial_number,
        subject = %fields.subject_common_name(),
        is_ca = fields.is_ca,
        "Extracted certificate fields."
    );
    fields
}

fn attribute_values<'a, 'b: 'a>(attrs: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>) -> Vec<String> {
    attrs
        .filter_map(|attr| match attr.as_str() {
            Ok(value) => Some(value.to_string()),
            Err(e) => {
                warn!(oid = %attr.attr_type().to_id_string(), error = %e, "Skipping non-string name attribute.");
                None
            }
        })
        .collect()
}

fn algorithm_name(oid: &Oid<'_>) -> String {
    oid2sn(oid, oid_registry())
        .map(str::to_string)
        .unwrap_or_else(|_| oid.to_id_string())
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    let timestamp = time.timestamp();
    DateTime::from_timestamp(timestamp, 0).unwrap_or_else(|| {
        warn!(timestamp, "Validity time out of range, using the Unix epoch.");
        DateTime::<Utc>::default()
    })
}

/// Builds `target` entities from every SAN entry of kind `kind`.
///
/// An absent SAN extension gives an empty list. Entries whose value does not
/// make a valid entity are skipped.
pub fn extract_san(fields: &CertificateFields, kind: GeneralNameKind, target: EntityTarget) -> Vec<Entity> {
    let Some(names) = &fields.subject_alt_names else {
        return Vec::new();
    };

    names
        .iter()
        .filter(|name| name.kind() == Some(kind))
        .filter_map(|name| match target.construct(name) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!(serial = %fields.serial_number, error = %e, "Skipping invalid SAN entry.");
                None
            }
        })
        .collect()
}

/// Returns the location of the first access description using `method`.
pub fn extract_info_access<'f>(
    fields: &'f CertificateFields,
    extension: InfoAccess,
    method: AccessMethod,
) -> Option<&'f GeneralNameValue> {
    let descriptions = match extension {
        InfoAccess::Authority => fields.authority_info_access.as_ref()?,
        InfoAccess::Subject => fields.subject_info_access.as_ref()?,
    };
    descriptions
        .iter()
        .find(|desc| desc.method == method)
        .map(|desc| &desc.location)
}
