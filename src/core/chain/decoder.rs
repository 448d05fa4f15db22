// src/core/chain/decoder.rs

use strum::Display;
use tracing::{debug, warn};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;

use crate::core::errors::DecodeError;

/// The envelope a certificate arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Encoding {
    #[strum(serialize = "PEM")]
    Pem,
    #[strum(serialize = "DER")]
    Der,
}

/// A certificate that is known to parse as X.509.
///
/// The DER body is kept owned; [`DecodedCertificate::x509`] borrows a parsed
/// view of it on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCertificate {
    der: Vec<u8>,
    encoding: Encoding,
}

impl DecodedCertificate {
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn x509(&self) -> Result<X509Certificate<'_>, DecodeError> {
        parse_der_body(&self.der).ok_or(DecodeError::MalformedCertificate { len: self.der.len() })
    }
}

/// Decodes one raw blob, trying PEM first and DER second.
pub fn decode_certificate(raw: &[u8]) -> Result<DecodedCertificate, DecodeError> {
    if let Ok((_, pem)) = parse_x509_pem(raw) {
        if pem.label == "CERTIFICATE" && parse_der_body(&pem.contents).is_some() {
            debug!(len = raw.len(), "Decoded certificate from PEM.");
            return Ok(DecodedCertificate {
                der: pem.contents,
                encoding: Encoding::Pem,
            });
        }
        debug!(label = %pem.label, "PEM block did not hold a usable certificate, trying DER.");
    }

    if parse_der_body(raw).is_some() {
        debug!(len = raw.len(), "Decoded certificate from DER.");
        return Ok(DecodedCertificate {
            der: raw.to_vec(),
            encoding: Encoding::Der,
        });
    }

    warn!(len = raw.len(), "Input is neither a PEM nor a DER certificate.");
    Err(DecodeError::MalformedCertificate { len: raw.len() })
}

// Trailing bytes after the certificate are treated as a malformed input.
fn parse_der_body(der: &[u8]) -> Option<X509Certificate<'_>> {
    match X509Certificate::from_der(der) {
        Ok((rest, cert)) if rest.is_empty() => Some(cert),
        Ok((rest, _)) => {
            debug!(trailing = rest.len(), "Certificate followed by trailing data.");
            None
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::CertBuilder;

    #[test]
    fn decodes_pem() {
        let cert = CertBuilder::new("www.example.com").build();
        let decoded = decode_certificate(cert.pem().as_bytes()).unwrap();
        assert_eq!(decoded.encoding(), Encoding::Pem);
        assert_eq!(decoded.der(), cert.der().as_ref());
    }

    #[test]
    fn decodes_der() {
        let cert = CertBuilder::new("www.example.com").build();
        let decoded = decode_certificate(cert.der()).unwrap();
        assert_eq!(decoded.encoding(), Encoding::Der);
        assert!(decoded.x509().is_ok());
    }

    #[test]
    fn rejects_garbage_with_length() {
        let err = decode_certificate(&[0, 1, 2, 3, 4]).unwrap_err();
        assert_eq!(err, DecodeError::MalformedCertificate { len: 5 });
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(
            decode_certificate(&[]),
            Err(DecodeError::MalformedCertificate { len: 0 })
        );
    }

    #[test]
    fn rejects_truncated_der() {
        let cert = CertBuilder::new("www.example.com").build();
        let der = cert.der();
        let truncated = &der[..der.len() / 2];
        assert!(decode_certificate(truncated).is_err());
    }

    #[test]
    fn rejects_pem_armor_around_garbage() {
        let pem = "-----BEGIN CERTIFICATE-----\nAAECAwQ=\n-----END CERTIFICATE-----\n";
        let err = decode_certificate(pem.as_bytes()).unwrap_err();
        assert_eq!(err, DecodeError::MalformedCertificate { len: pem.len() });
    }
}
