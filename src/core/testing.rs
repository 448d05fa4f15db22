// src/core/testing.rs

//! Certificate fixtures for unit tests, generated with `rcgen`.
//!
//! SAN, AIA and SIA bodies are assembled by hand so tests can also produce
//! entries that a well-behaved generator would refuse to write.

use rcgen::{
    BasicConstraints, CertificateParams, CrlDistributionPoint, CustomExtension, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyIdMethod, KeyPair, KeyUsagePurpose, SerialNumber,
};

const OID_SAN: &[u64] = &[2, 5, 29, 17];
const OID_AIA: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 1, 1];
const OID_SIA: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 1, 11];
const OID_AKI: &[u64] = &[2, 5, 29, 35];

// DER bodies of the id-ad-* access method OIDs.
pub const AD_OCSP: &[u8] = &[0x2B, 0x06, 0x01, 0x05, 0x05, 0x07, 0x30, 0x01];
pub const AD_CA_ISSUERS: &[u8] = &[0x2B, 0x06, 0x01, 0x05, 0x05, 0x07, 0x30, 0x02];
pub const AD_CA_REPOSITORY: &[u8] = &[0x2B, 0x06, 0x01, 0x05, 0x05, 0x07, 0x30, 0x05];

const TAG_SEQUENCE: u8 = 0x30;
const TAG_OID: u8 = 0x06;
const TAG_KEY_ID: u8 = 0x80;
const TAG_RFC822: u8 = 0x81;
const TAG_DNS: u8 = 0x82;
const TAG_URI: u8 = 0x86;
const TAG_IP: u8 = 0x87;

pub fn der_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xFF {
        out.extend_from_slice(&[0x81, len as u8]);
    } else {
        out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]);
    }
    out.extend_from_slice(content);
    out
}

fn access_descriptions(entries: &[(&'static [u8], String)]) -> Vec<u8> {
    let body: Vec<u8> = entries
        .iter()
        .flat_map(|(method, uri)| {
            let mut desc = der_tlv(TAG_OID, method);
            desc.extend(der_tlv(TAG_URI, uri.as_bytes()));
            der_tlv(TAG_SEQUENCE, &desc)
        })
        .collect();
    der_tlv(TAG_SEQUENCE, &body)
}

pub struct CertBuilder {
    common_name: Option<String>,
    organizations: Vec<String>,
    org_units: Vec<String>,
    is_ca: Option<bool>,
    serial: Option<Vec<u8>>,
    key_id: Option<Vec<u8>>,
    authority_key_id: Option<Vec<u8>>,
    san: Vec<(u8, Vec<u8>)>,
    key_usages: Vec<KeyUsagePurpose>,
    ext_key_usages: Vec<ExtendedKeyUsagePurpose>,
    crl_uris: Vec<String>,
    aia: Vec<(&'static [u8], String)>,
    sia: Vec<(&'static [u8], String)>,
}

impl CertBuilder {
    pub fn new(common_name: &str) -> Self {
        Self {
            common_name: Some(common_name.to_string()),
            organizations: Vec::new(),
            org_units: Vec::new(),
            is_ca: None,
            serial: None,
            key_id: None,
            authority_key_id: None,
            san: Vec::new(),
            key_usages: Vec::new(),
            ext_key_usages: Vec::new(),
            crl_uris: Vec::new(),
            aia: Vec::new(),
            sia: Vec::new(),
        }
    }

    pub fn without_common_name(mut self) -> Self {
        self.common_name = None;
        self
    }

    pub fn organization(mut self, name: &str) -> Self {
        self.organizations.push(name.to_string());
        self
    }

    pub fn org_unit(mut self, name: &str) -> Self {
        self.org_units.push(name.to_string());
        self
    }

    pub fn ca(mut self, is_ca: bool) -> Self {
        self.is_ca = Some(is_ca);
        self
    }

    pub fn serial(mut self, bytes: &[u8]) -> Self {
        self.serial = Some(bytes.to_vec());
        self
    }

    pub fn key_id(mut self, bytes: &[u8]) -> Self {
        self.key_id = Some(bytes.to_vec());
        self
    }

    pub fn authority_key_id(mut self, bytes: &[u8]) -> Self {
        self.authority_key_id = Some(bytes.to_vec());
        self
    }

    pub fn san_dns(mut self, name: &str) -> Self {
        self.san.push((TAG_DNS, name.as_bytes().to_vec()));
        self
    }

    pub fn san_ip(mut self, octets: &[u8]) -> Self {
        self.san.push((TAG_IP, octets.to_vec()));
        self
    }

    pub fn san_email(mut self, email: &str) -> Self {
        self.san.push((TAG_RFC822, email.as_bytes().to_vec()));
        self
    }

    pub fn san_uri(mut self, uri: &str) -> Self {
        self.san.push((TAG_URI, uri.as_bytes().to_vec()));
        self
    }

    pub fn key_usage(mut self, usage: KeyUsagePurpose) -> Self {
        self.key_usages.push(usage);
        self
    }

    pub fn ext_key_usage(mut self, usage: ExtendedKeyUsagePurpose) -> Self {
        self.ext_key_usages.push(usage);
        self
    }

    pub fn crl(mut self, uri: &str) -> Self {
        self.crl_uris.push(uri.to_string());
        self
    }

    pub fn ocsp(mut self, uri: &str) -> Self {
        self.aia.push((AD_OCSP, uri.to_string()));
        self
    }

    pub fn ca_issuers(mut self, uri: &str) -> Self {
        self.aia.push((AD_CA_ISSUERS, uri.to_string()));
        self
    }

    pub fn ca_repository(mut self, uri: &str) -> Self {
        self.sia.push((AD_CA_REPOSITORY, uri.to_string()));
        self
    }

    pub fn build(self) -> rcgen::Certificate {
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        if let Some(cn) = &self.common_name {
            dn.push(DnType::CommonName, cn.as_str());
        }
        // rcgen keeps one value per attribute type.
        if let Some(o) = self.organizations.first() {
            dn.push(DnType::OrganizationName, o.as_str());
        }
        if let Some(ou) = self.org_units.first() {
            dn.push(DnType::OrganizationalUnitName, ou.as_str());
        }
        params.distinguished_name = dn;

        params.is_ca = match self.is_ca {
            None => IsCa::NoCa,
            Some(true) => IsCa::Ca(BasicConstraints::Unconstrained),
            Some(false) => IsCa::ExplicitNoCa,
        };
        if let Some(serial) = &self.serial {
            params.serial_number = Some(SerialNumber::from_slice(serial));
        }
        if let Some(key_id) = self.key_id {
            params.key_identifier_method = KeyIdMethod::PreSpecified(key_id);
        }
        params.key_usages = self.key_usages;
        params.extended_key_usages = self.ext_key_usages;
        if !self.crl_uris.is_empty() {
            params.crl_distribution_points = vec![CrlDistributionPoint { uris: self.crl_uris }];
        }

        if let Some(key_id) = &self.authority_key_id {
            params.custom_extensions.push(CustomExtension::from_oid_content(
                OID_AKI,
                der_tlv(TAG_SEQUENCE, &der_tlv(TAG_KEY_ID, key_id)),
            ));
        }
        if !self.san.is_empty() {
            let names: Vec<u8> = self.san.iter().flat_map(|(tag, value)| der_tlv(*tag, value)).collect();
            params
                .custom_extensions
                .push(CustomExtension::from_oid_content(OID_SAN, der_tlv(TAG_SEQUENCE, &names)));
        }
        if !self.aia.is_empty() {
            params
                .custom_extensions
                .push(CustomExtension::from_oid_content(OID_AIA, access_descriptions(&self.aia)));
        }
        if !self.sia.is_empty() {
            params
                .custom_extensions
                .push(CustomExtension::from_oid_content(OID_SIA, access_descriptions(&self.sia)));
        }

        let key = KeyPair::generate().expect("key generation");
        params.self_signed(&key).expect("self-signed certificate")
    }
}
