// src/core/chain/mapper.rs

//! Pure conversions from extracted field values to graph entities.

use crate::core::chain::extractor::{CertificateFields, GeneralNameValue};
use crate::core::errors::EntityError;
use crate::core::models::{Certificate, Entity, Fqdn, Identifier, IpAddress, Organization, Url};

/// The entity kind a raw general name should become.
///
/// Each variant has exactly one constructor; the choice is made at the call
/// site instead of through a name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityTarget {
    Domain,
    IpAddress,
    Email,
    Url,
}

impl EntityTarget {
    pub fn construct(self, value: &GeneralNameValue) -> Result<Entity, EntityError> {
        match (self, value) {
            (EntityTarget::IpAddress, GeneralNameValue::IpAddress(octets)) => {
                IpAddress::from_octets(octets).map(Entity::IpAddress)
            }
            (EntityTarget::IpAddress, other) => IpAddress::parse(other.text().unwrap_or_default()).map(Entity::IpAddress),
            (EntityTarget::Domain, other) => domain(other.text().unwrap_or_default()),
            (EntityTarget::Email, other) => Identifier::email(other.text().unwrap_or_default()).map(Entity::Identifier),
            (EntityTarget::Url, other) => url(other.text().unwrap_or_default()),
        }
    }
}

pub fn certificate(fields: &CertificateFields) -> Entity {
    Entity::Certificate(Certificate {
        version: fields.version,
        serial_number: fields.serial_number.clone(),
        subject_common_name: fields.subject_common_name().to_string(),
        issuer_common_name: fields.issuer_common_name.clone(),
        not_before: fields.not_before,
        not_after: fields.not_after,
        key_usage: fields.key_usage.clone(),
        ext_key_usage: fields.ext_key_usage.clone(),
        signature_algorithm: fields.signature_algorithm.clone(),
        public_key_algorithm: fields.public_key_algorithm.clone(),
        is_ca: fields.is_ca,
        crl_distribution_points: fields.crl_distribution_points.clone(),
        subject_key_id: fields.subject_key_id.clone(),
        authority_key_id: fields.authority_key_id.clone(),
    })
}

pub fn domain(name: &str) -> Result<Entity, EntityError> {
    Fqdn::parse(name).map(Entity::Fqdn)
}

pub fn organization(name: &str) -> Result<Entity, EntityError> {
    Organization::new(name).map(Entity::Organization)
}

pub fn url(text: &str) -> Result<Entity, EntityError> {
    Url::parse(text).map(Entity::Url)
}

/// Converts an info-access location into a URL entity.
pub fn location_url(location: &GeneralNameValue) -> Result<Entity, EntityError> {
    match location {
        GeneralNameValue::Uri(text) => url(text),
        other => Err(EntityError::InvalidUrl {
            value: other.text().unwrap_or_default().to_string(),
            reason: "access location is not a URI".to_string(),
        }),
    }
}
