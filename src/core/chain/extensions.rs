// src/core/chain/extensions.rs

//! Dispatch table from X.509 extension OIDs to field extraction functions.
//!
//! The table is built once with [`ExtensionRegistry::standard`] and handed to
//! the extractor by reference. Each handler is a plain function that reads one
//! extension and writes the matching fields of a [`CertificateFields`] record,
//! so every extension kind can be exercised on its own.

use std::fmt::Write;
use strum::{Display, IntoStaticStr};
use tracing::{debug, warn};
use x509_parser::der_parser::asn1_rs::{FromDer, Sequence};
use x509_parser::der_parser::oid;
use x509_parser::error::X509Error;
use x509_parser::extensions::{
    DistributionPointName, ExtendedKeyUsage, GeneralName, KeyUsage as X509KeyUsage, ParsedExtension,
    X509Extension,
};
use x509_parser::oid_registry::{
    Oid, OID_PKIX_AUTHORITY_INFO_ACCESS, OID_X509_EXT_AUTHORITY_KEY_IDENTIFIER, OID_X509_EXT_BASIC_CONSTRAINTS,
    OID_X509_EXT_CRL_DISTRIBUTION_POINTS, OID_X509_EXT_EXTENDED_KEY_USAGE, OID_X509_EXT_KEY_USAGE,
    OID_X509_EXT_SUBJECT_ALT_NAME, OID_X509_EXT_SUBJECT_KEY_IDENTIFIER,
};

use crate::core::chain::extractor::{AccessDescription, AccessMethod, CertificateFields, GeneralNameValue};
use crate::core::errors::ExtensionError;
use crate::core::models::{ExtKeyUsage, KeyUsage};

pub const OID_PKIX_SUBJECT_INFO_ACCESS: Oid<'static> = oid!(1.3.6.1.5.5.7.1.11);
pub const OID_AD_OCSP: Oid<'static> = oid!(1.3.6.1.5.5.7.48.1);
pub const OID_AD_CA_ISSUERS: Oid<'static> = oid!(1.3.6.1.5.5.7.48.2);
pub const OID_AD_TIME_STAMPING: Oid<'static> = oid!(1.3.6.1.5.5.7.48.3);
pub const OID_AD_CA_REPOSITORY: Oid<'static> = oid!(1.3.6.1.5.5.7.48.5);
pub const OID_KP_IPSEC_IKE: Oid<'static> = oid!(1.3.6.1.5.5.7.3.17);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum ExtensionKind {
    KeyUsage,
    ExtendedKeyUsage,
    BasicConstraints,
    CrlDistributionPoints,
    SubjectKeyIdentifier,
    AuthorityKeyIdentifier,
    SubjectAltName,
    AuthorityInfoAccess,
    SubjectInfoAccess,
}

pub type ExtensionHandler = fn(&X509Extension<'_>, &mut CertificateFields) -> Result<(), ExtensionError>;

pub struct ExtensionEntry {
    pub kind: ExtensionKind,
    pub oid: Oid<'static>,
    pub handler: ExtensionHandler,
}

pub struct ExtensionRegistry {
    entries: Vec<ExtensionEntry>,
}

impl ExtensionRegistry {
    /// The handlers for every extension the graph projection cares about.
    pub fn standard() -> Self {
        let entries = vec![
            ExtensionEntry {
                kind: ExtensionKind::KeyUsage,
                oid: OID_X509_EXT_KEY_USAGE,
                handler: extract_key_usage,
            },
            ExtensionEntry {
                kind: ExtensionKind::ExtendedKeyUsage,
                oid: OID_X509_EXT_EXTENDED_KEY_USAGE,
                handler: extract_ext_key_usage,
            },
            ExtensionEntry {
                kind: ExtensionKind::BasicConstraints,
                oid: OID_X509_EXT_BASIC_CONSTRAINTS,
                handler: extract_basic_constraints,
            },
            ExtensionEntry {
                kind: ExtensionKind::CrlDistributionPoints,
                oid: OID_X509_EXT_CRL_DISTRIBUTION_POINTS,
                handler: extract_crl_distribution_points,
            },
            ExtensionEntry {
                kind: ExtensionKind::SubjectKeyIdentifier,
                oid: OID_X509_EXT_SUBJECT_KEY_IDENTIFIER,
                handler: extract_subject_key_id,
            },
            ExtensionEntry {
                kind: ExtensionKind::AuthorityKeyIdentifier,
                oid: OID_X509_EXT_AUTHORITY_KEY_IDENTIFIER,
                handler: extract_authority_key_id,
            },
            ExtensionEntry {
                kind: ExtensionKind::SubjectAltName,
                oid: OID_X509_EXT_SUBJECT_ALT_NAME,
                handler: extract_subject_alt_names,
            },
            ExtensionEntry {
                kind: ExtensionKind::AuthorityInfoAccess,
                oid: OID_PKIX_AUTHORITY_INFO_ACCESS,
                handler: extract_authority_info_access,
            },
            ExtensionEntry {
                kind: ExtensionKind::SubjectInfoAccess,
                oid: OID_PKIX_SUBJECT_INFO_ACCESS,
                handler: extract_subject_info_access,
            },
        ];
        Self { entries }
    }

    pub fn lookup(&self, oid: &Oid<'_>) -> Option<&ExtensionEntry> {
        self.entries.iter().find(|entry| entry.oid == *oid)
    }

    /// Runs the handler registered for `ext`, if any.
    ///
    /// A handler failure leaves the affected fields at their defaults.
    pub fn apply(&self, ext: &X509Extension<'_>, fields: &mut CertificateFields) {
        let Some(entry) = self.lookup(&ext.oid) else {
            debug!(oid = %ext.oid.to_id_string(), "No handler for extension, ignoring.");
            return;
        };
        if let Err(e) = (entry.handler)(ext, fields) {
            warn!(extension = %entry.kind, error = %e, "Skipping malformed extension.");
        }
    }
}

fn mismatch(kind: ExtensionKind) -> ExtensionError {
    ExtensionError::UnexpectedStructure { name: kind.into() }
}

/// Formats a key identifier as colon separated uppercase hex.
pub fn format_key_identifier(key_id: &[u8]) -> String {
    let mut result = String::with_capacity(key_id.len() * 3);
    for (i, b) in key_id.iter().enumerate() {
        if i > 0 {
            result.push(':');
        }
        let _ = write!(result, "{:02X}", b);
    }
    result
}

/// Reads the nine key usage bits. `EncipherOnly` and `DecipherOnly` only
/// count when `KeyAgreement` is set.
pub fn key_usage_set(ku: &X509KeyUsage) -> Vec<KeyUsage> {
    let bits = [
        (ku.digital_signature(), KeyUsage::DigitalSignature),
        (ku.non_repudiation(), KeyUsage::ContentCommitment),
        (ku.key_encipherment(), KeyUsage::KeyEncipherment),
        (ku.data_encipherment(), KeyUsage::DataEncipherment),
        (ku.key_agreement(), KeyUsage::KeyAgreement),
        (ku.key_cert_sign(), KeyUsage::CertSign),
        (ku.crl_sign(), KeyUsage::CrlSign),
        (ku.key_agreement() && ku.encipher_only(), KeyUsage::EncipherOnly),
        (ku.key_agreement() && ku.decipher_only(), KeyUsage::DecipherOnly),
    ];
    bits.into_iter().filter(|(set, _)| *set).map(|(_, usage)| usage).collect()
}

pub fn ext_key_usage_set(eku: &ExtendedKeyUsage<'_>) -> Vec<ExtKeyUsage> {
    let purposes = [
        (eku.client_auth, ExtKeyUsage::ClientAuth),
        (eku.server_auth, ExtKeyUsage::ServerAuth),
        (eku.code_signing, ExtKeyUsage::CodeSigning),
        (eku.email_protection, ExtKeyUsage::EmailProtection),
        (eku.other.iter().any(|oid| *oid == OID_KP_IPSEC_IKE), ExtKeyUsage::IpsecEndSystem),
        (eku.time_stamping, ExtKeyUsage::TimeStamping),
        (eku.ocsp_signing, ExtKeyUsage::OcspSigning),
    ];
    purposes.into_iter().filter(|(set, _)| *set).map(|(_, usage)| usage).collect()
}

fn extract_key_usage(ext: &X509Extension<'_>, fields: &mut CertificateFields) -> Result<(), ExtensionError> {
    match ext.parsed_extension() {
        ParsedExtension::KeyUsage(ku) => {
            fields.key_usage = key_usage_set(ku);
            Ok(())
        }
        _ => Err(mismatch(ExtensionKind::KeyUsage)),
    }
}

fn extract_ext_key_usage(ext: &X509Extension<'_>, fields: &mut CertificateFields) -> Result<(), ExtensionError> {
    match ext.parsed_extension() {
        ParsedExtension::ExtendedKeyUsage(eku) => {
            fields.ext_key_usage = ext_key_usage_set(eku);
            Ok(())
        }
        _ => Err(mismatch(ExtensionKind::ExtendedKeyUsage)),
    }
}

fn extract_basic_constraints(ext: &X509Extension<'_>, fields: &mut CertificateFields) -> Result<(), ExtensionError> {
    match ext.parsed_extension() {
        ParsedExtension::BasicConstraints(bc) => {
            fields.is_ca = bc.ca;
            Ok(())
        }
        _ => Err(mismatch(ExtensionKind::BasicConstraints)),
    }
}

// Only the first name of each distribution point is kept.
fn extract_crl_distribution_points(
    ext: &X509Extension<'_>,
    fields: &mut CertificateFields,
) -> Result<(), ExtensionError> {
    let ParsedExtension::CRLDistributionPoints(cdp) = ext.parsed_extension() else {
        return Err(mismatch(ExtensionKind::CrlDistributionPoints));
    };
    fields.crl_distribution_points = cdp
        .points
        .iter()
        .filter_map(|point| match &point.distribution_point {
            Some(DistributionPointName::FullName(names)) => names.first(),
            _ => None,
        })
        .filter_map(|name| GeneralNameValue::from(name).text().map(str::to_string))
        .collect();
    Ok(())
}

fn extract_subject_key_id(ext: &X509Extension<'_>, fields: &mut CertificateFields) -> Result<(), ExtensionError> {
    match ext.parsed_extension() {
        ParsedExtension::SubjectKeyIdentifier(ski) => {
            fields.subject_key_id = format_key_identifier(ski.0);
            Ok(())
        }
        _ => Err(mismatch(ExtensionKind::SubjectKeyIdentifier)),
    }
}

fn extract_authority_key_id(ext: &X509Extension<'_>, fields: &mut CertificateFields) -> Result<(), ExtensionError> {
    match ext.parsed_extension() {
        ParsedExtension::AuthorityKeyIdentifier(aki) => {
            fields.authority_key_id = aki
                .key_identifier
                .as_ref()
                .map(|key_id| format_key_identifier(key_id.0))
                .unwrap_or_default();
            Ok(())
        }
        _ => Err(mismatch(ExtensionKind::AuthorityKeyIdentifier)),
    }
}

fn extract_subject_alt_names(ext: &X509Extension<'_>, fields: &mut CertificateFields) -> Result<(), ExtensionError> {
    match ext.parsed_extension() {
        ParsedExtension::SubjectAlternativeName(san) => {
            fields.subject_alt_names = Some(san.general_names.iter().map(GeneralNameValue::from).collect());
            Ok(())
        }
        _ => Err(mismatch(ExtensionKind::SubjectAltName)),
    }
}

fn extract_authority_info_access(
    ext: &X509Extension<'_>,
    fields: &mut CertificateFields,
) -> Result<(), ExtensionError> {
    match ext.parsed_extension() {
        ParsedExtension::AuthorityInfoAccess(aia) => {
            let descriptions = aia
                .accessdescs
                .iter()
                .map(|desc| AccessDescription {
                    method: AccessMethod::from_oid(&desc.access_method),
                    location: GeneralNameValue::from(&desc.access_location),
                })
                .collect();
            fields.authority_info_access = Some(descriptions);
            Ok(())
        }
        _ => Err(mismatch(ExtensionKind::AuthorityInfoAccess)),
    }
}

// SubjectInfoAccessSyntax shares the AuthorityInfoAccessSyntax layout, so the
// raw extension value is walked directly.
fn extract_subject_info_access(
    ext: &X509Extension<'_>,
    fields: &mut CertificateFields,
) -> Result<(), ExtensionError> {
    let descriptions = parse_access_descriptions(ext.value).ok_or(ExtensionError::Unparseable {
        name: ExtensionKind::SubjectInfoAccess.into(),
    })?;
    fields.subject_info_access = Some(descriptions);
    Ok(())
}

/// Parses `SEQUENCE OF AccessDescription` from a DER body.
pub fn parse_access_descriptions(data: &[u8]) -> Option<Vec<AccessDescription>> {
    let (rest, outer) = <Sequence as FromDer>::from_der(data).ok()?;
    if !rest.is_empty() {
        return None;
    }

    let mut descriptions = Vec::new();
    let mut remaining: &[u8] = outer.content.as_ref();
    while !remaining.is_empty() {
        let (next, desc) = <Sequence as FromDer>::from_der(remaining).ok()?;
        let (location, method) = <Oid as FromDer>::from_der(desc.content.as_ref()).ok()?;
        let (_, name) = <GeneralName as FromDer<X509Error>>::from_der(location).ok()?;
        descriptions.push(AccessDescription {
            method: AccessMethod::from_oid(&method),
            location: GeneralNameValue::from(&name),
        });
        remaining = next;
    }
    Some(descriptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{der_tlv, AD_CA_REPOSITORY, AD_OCSP};

    #[test]
    fn key_identifier_is_uppercase_hex_with_colons() {
        assert_eq!(format_key_identifier(&[0x01, 0xab, 0xff]), "01:AB:FF");
        assert_eq!(format_key_identifier(&[]), "");
    }

    #[test]
    fn registry_covers_every_extension_kind() {
        let registry = ExtensionRegistry::standard();
        for oid in [
            OID_X509_EXT_KEY_USAGE,
            OID_X509_EXT_EXTENDED_KEY_USAGE,
            OID_X509_EXT_BASIC_CONSTRAINTS,
            OID_X509_EXT_CRL_DISTRIBUTION_POINTS,
            OID_X509_EXT_SUBJECT_KEY_IDENTIFIER,
            OID_X509_EXT_AUTHORITY_KEY_IDENTIFIER,
            OID_X509_EXT_SUBJECT_ALT_NAME,
            OID_PKIX_AUTHORITY_INFO_ACCESS,
            OID_PKIX_SUBJECT_INFO_ACCESS,
        ] {
            assert!(registry.lookup(&oid).is_some(), "missing handler for {}", oid.to_id_string());
        }
        assert!(registry.lookup(&OID_AD_OCSP).is_none());
    }

    #[test]
    fn ext_key_usage_drops_unknown_purposes() {
        let eku = ExtendedKeyUsage {
            any: true,
            server_auth: true,
            client_auth: false,
            code_signing: false,
            email_protection: false,
            time_stamping: false,
            ocsp_signing: true,
            other: vec![OID_KP_IPSEC_IKE, OID_AD_TIME_STAMPING],
        };
        assert_eq!(
            ext_key_usage_set(&eku),
            vec![ExtKeyUsage::ServerAuth, ExtKeyUsage::IpsecEndSystem, ExtKeyUsage::OcspSigning]
        );
    }

    #[test]
    fn parses_raw_access_descriptions_in_order() {
        let mut first = der_tlv(0x06, AD_CA_REPOSITORY);
        first.extend(der_tlv(0x86, b"http://repo.example.com/"));
        let mut second = der_tlv(0x06, AD_OCSP);
        second.extend(der_tlv(0x86, b"http://ocsp.example.com"));
        let mut body = der_tlv(0x30, &first);
        body.extend(der_tlv(0x30, &second));
        let raw = der_tlv(0x30, &body);

        let parsed = parse_access_descriptions(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].method, AccessMethod::CaRepository);
        assert_eq!(parsed[0].location, GeneralNameValue::Uri("http://repo.example.com/".to_string()));
        assert_eq!(parsed[1].method, AccessMethod::Ocsp);
    }

    #[test]
    fn raw_access_descriptions_reject_garbage() {
        assert!(parse_access_descriptions(&[0x30, 0x05, 0x01]).is_none());
        assert!(parse_access_descriptions(&[]).is_none());
    }
}
