// src/core/models.rs

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use strum::Display;

use crate::core::errors::EntityError;

// --- Certificate Attributes ---

/// The nine bits of the X.509 KeyUsage extension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum KeyUsage {
    DigitalSignature,
    ContentCommitment,
    KeyEncipherment,
    DataEncipherment,
    KeyAgreement,
    CertSign,
    #[strum(serialize = "CRLSign")]
    #[serde(rename = "CRLSign")]
    CrlSign,
    EncipherOnly,
    DecipherOnly,
}

/// Extended key usage purposes that are tracked. Anything else is dropped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum ExtKeyUsage {
    ClientAuth,
    ServerAuth,
    CodeSigning,
    EmailProtection,
    #[strum(serialize = "IPSECEndSystem")]
    #[serde(rename = "IPSECEndSystem")]
    IpsecEndSystem,
    TimeStamping,
    #[strum(serialize = "OCSPSigning")]
    #[serde(rename = "OCSPSigning")]
    OcspSigning,
}

// --- Entities ---

/// A TLS certificate node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Certificate {
    pub version: u32,
    /// Decimal rendering of the serial number.
    pub serial_number: String,
    pub subject_common_name: String,
    pub issuer_common_name: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub key_usage: Vec<KeyUsage>,
    pub ext_key_usage: Vec<ExtKeyUsage>,
    pub signature_algorithm: String,
    pub public_key_algorithm: String,
    pub is_ca: bool,
    pub crl_distribution_points: Vec<String>,
    /// Colon separated uppercase hex, empty when the extension is absent.
    pub subject_key_id: String,
    pub authority_key_id: String,
}

lazy_static! {
    static ref DNS_LABEL: Regex = Regex::new(r"^[a-z0-9_]([a-z0-9_-]{0,61}[a-z0-9_])?$").unwrap();
}

const MAX_FQDN_LEN: usize = 253;

/// A fully qualified domain name, lowercased and without a trailing dot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fqdn {
    pub name: String,
}

impl Fqdn {
    /// Normalizes and validates a hostname.
    ///
    /// A leading `*` label is accepted so that wildcard SAN entries survive.
    pub fn parse(text: &str) -> Result<Self, EntityError> {
        let name = text.trim().trim_end_matches('.').to_ascii_lowercase();
        if name.is_empty() || name.len() > MAX_FQDN_LEN {
            return Err(EntityError::InvalidDomain(text.to_string()));
        }

        for (i, label) in name.split('.').enumerate() {
            let wildcard = i == 0 && label == "*";
            if !wildcard && !DNS_LABEL.is_match(label) {
                return Err(EntityError::InvalidDomain(text.to_string()));
            }
        }

        Ok(Self { name })
    }
}

impl fmt::Display for Fqdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// An organization, or an organizational unit modeled as one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Organization {
    pub name: String,
}

impl Organization {
    pub fn new(name: &str) -> Result<Self, EntityError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EntityError::EmptyOrganization);
        }
        Ok(Self { name: name.to_string() })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
pub enum IpVersion {
    IPv4,
    IPv6,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct IpAddress {
    pub address: IpAddr,
    #[serde(rename = "type")]
    pub version: IpVersion,
}

impl IpAddress {
    pub fn new(address: IpAddr) -> Self {
        let version = match address {
            IpAddr::V4(_) => IpVersion::IPv4,
            IpAddr::V6(_) => IpVersion::IPv6,
        };
        Self { address, version }
    }

    /// Builds an address from the raw octets of a SAN `iPAddress` entry.
    pub fn from_octets(octets: &[u8]) -> Result<Self, EntityError> {
        match octets.len() {
            4 => {
                let arr: [u8; 4] = octets.try_into().map_err(|_| EntityError::InvalidIpOctets(4))?;
                Ok(Self::new(IpAddr::V4(Ipv4Addr::from(arr))))
            }
            16 => {
                let arr: [u8; 16] = octets.try_into().map_err(|_| EntityError::InvalidIpOctets(16))?;
                Ok(Self::new(IpAddr::V6(Ipv6Addr::from(arr))))
            }
            n => Err(EntityError::InvalidIpOctets(n)),
        }
    }

    pub fn parse(text: &str) -> Result<Self, EntityError> {
        text.trim()
            .parse::<IpAddr>()
            .map(Self::new)
            .map_err(|_| EntityError::InvalidIpAddress(text.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    EmailAddress,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub kind: IdentifierKind,
    pub value: String,
}

impl Identifier {
    /// Validates `local@domain`; the domain part is normalized like an [`Fqdn`].
    pub fn email(text: &str) -> Result<Self, EntityError> {
        let invalid = || EntityError::InvalidEmail(text.to_string());
        let text = text.trim();
        let (local, domain) = text.rsplit_once('@').ok_or_else(invalid)?;
        if local.is_empty() || local.len() > 64 || local.chars().any(|c| c.is_whitespace() || c == '@') {
            return Err(invalid());
        }
        let domain = Fqdn::parse(domain).map_err(|_| invalid())?;
        Ok(Self {
            kind: IdentifierKind::EmailAddress,
            value: format!("{}@{}", local, domain),
        })
    }
}

/// An absolute URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Url {
    pub url: url::Url,
}

impl Url {
    pub fn parse(text: &str) -> Result<Self, EntityError> {
        let url = url::Url::parse(text.trim()).map_err(|e| EntityError::InvalidUrl {
            value: text.to_string(),
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() {
            return Err(EntityError::InvalidUrl {
                value: text.to_string(),
                reason: "not a hierarchical URL".to_string(),
            });
        }
        Ok(Self { url })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
pub enum EntityKind {
    #[strum(serialize = "TLSCertificate")]
    Certificate,
    #[strum(serialize = "FQDN")]
    Fqdn,
    Organization,
    IPAddress,
    Identifier,
    #[strum(serialize = "URL")]
    Url,
}

/// A graph node value. Nodes are identified by [`Entity::natural_key`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "asset")]
pub enum Entity {
    Certificate(Certificate),
    Fqdn(Fqdn),
    Organization(Organization),
    IpAddress(IpAddress),
    Identifier(Identifier),
    Url(Url),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Certificate(_) => EntityKind::Certificate,
            Entity::Fqdn(_) => EntityKind::Fqdn,
            Entity::Organization(_) => EntityKind::Organization,
            Entity::IpAddress(_) => EntityKind::IPAddress,
            Entity::Identifier(_) => EntityKind::Identifier,
            Entity::Url(_) => EntityKind::Url,
        }
    }

    /// Identity used by deduplicating stores.
    ///
    /// Certificates are keyed on issuer common name plus serial number, the
    /// closest approximation of the (issuer, serial) pair that the node keeps.
    pub fn natural_key(&self) -> String {
        match self {
            Entity::Certificate(c) => format!("{}:{}#{}", self.kind(), c.issuer_common_name, c.serial_number),
            Entity::Fqdn(d) => format!("{}:{}", self.kind(), d.name),
            Entity::Organization(o) => format!("{}:{}", self.kind(), o.name),
            Entity::IpAddress(ip) => format!("{}:{}", self.kind(), ip.address),
            Entity::Identifier(id) => format!("{}:{}:{}", self.kind(), id.kind, id.value),
            Entity::Url(u) => format!("{}:{}", self.kind(), u.url),
        }
    }

    pub fn as_certificate(&self) -> Option<&Certificate> {
        match self {
            Entity::Certificate(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Certificate(c) => write!(f, "{} (serial {})", c.subject_common_name, c.serial_number),
            Entity::Fqdn(d) => write!(f, "{}", d),
            Entity::Organization(o) => write!(f, "{}", o.name),
            Entity::IpAddress(ip) => write!(f, "{}", ip.address),
            Entity::Identifier(id) => write!(f, "{}", id.value),
            Entity::Url(u) => write!(f, "{}", u.url),
        }
    }
}

// --- Relations ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    IssuingCertificate,
    CommonName,
    SanDnsName,
    SanIpAddress,
    SanEmailAddress,
    SanUrl,
    CertificateAuthority,
    VerifiedFor,
    OrgUnit,
    OcspServer,
    /// Used for both the AIA "CA Issuers" and the SIA "CA Repository" locations.
    IssuingCertificateUrl,
}

impl Relation {
    /// The entity kinds this relation is allowed to connect, as `(from, to)`.
    pub fn endpoints(&self) -> (EntityKind, EntityKind) {
        match self {
            Relation::IssuingCertificate => (EntityKind::Certificate, EntityKind::Certificate),
            Relation::CommonName | Relation::SanDnsName => (EntityKind::Certificate, EntityKind::Fqdn),
            Relation::SanIpAddress => (EntityKind::Certificate, EntityKind::IPAddress),
            Relation::SanEmailAddress => (EntityKind::Certificate, EntityKind::Identifier),
            Relation::SanUrl | Relation::OcspServer | Relation::IssuingCertificateUrl => {
                (EntityKind::Certificate, EntityKind::Url)
            }
            Relation::CertificateAuthority => (EntityKind::Certificate, EntityKind::Organization),
            Relation::VerifiedFor => (EntityKind::Fqdn, EntityKind::Organization),
            Relation::OrgUnit => (EntityKind::Organization, EntityKind::Organization),
        }
    }
}

// --- Discovery Side Channel ---

/// The labels under which discovered values are reported to a presentation layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
pub enum FieldKind {
    #[strum(serialize = "CN")]
    CommonName,
    #[strum(serialize = "O")]
    Organization,
    #[strum(serialize = "OU")]
    OrganizationalUnit,
    #[strum(serialize = "SAN")]
    SubjectAltName,
    #[strum(serialize = "OCSP")]
    Ocsp,
    #[strum(serialize = "ISS CERT")]
    IssuerCertificate,
    #[strum(serialize = "CA REPO")]
    CaRepository,
}

#[derive(Debug, Clone, Serialize)]
pub struct Discovery {
    pub kind: FieldKind,
    pub entity: Entity,
}
