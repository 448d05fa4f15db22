// src/core/errors.rs

//! Error taxonomy for the certificate graph core.
//!
//! Once the base domain node exists, only two kinds of failure stop a chain
//! walk: a certificate that cannot be decoded at all, and an error coming
//! back from the store adapter. Everything else is logged and skipped where
//! it occurs.

use std::path::PathBuf;
use thiserror::Error;

/// Raised by the decoder when a blob is neither a PEM nor a DER X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("input of {len} bytes is not a valid PEM or DER X.509 certificate")]
    MalformedCertificate { len: usize },
}

/// A value that survived extraction but cannot be turned into a typed entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    #[error("invalid domain name: {0:?}")]
    InvalidDomain(String),
    #[error("invalid IP address octets (length {0})")]
    InvalidIpOctets(usize),
    #[error("invalid IP address: {0:?}")]
    InvalidIpAddress(String),
    #[error("invalid email address: {0:?}")]
    InvalidEmail(String),
    #[error("invalid URL {value:?}: {reason}")]
    InvalidUrl { value: String, reason: String },
    #[error("organization name is empty")]
    EmptyOrganization,
}

/// An extension whose body does not match the type announced by its OID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtensionError {
    #[error("extension {name} could not be parsed")]
    Unparseable { name: &'static str },
    #[error("extension {name} has an unexpected structure")]
    UnexpectedStructure { name: &'static str },
}

/// Failure of a whole chain projection.
///
/// `E` is the store adapter's error type; it is carried through untouched.
#[derive(Debug, Error)]
pub enum ProjectionError<E>
where
    E: std::error::Error + 'static,
{
    #[error("base domain rejected: {0}")]
    BaseDomain(#[source] EntityError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("store adapter failure: {0}")]
    Store(#[source] E),
}

/// Failure to read certificate input files.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} holds no certificate data", path.display())]
    Empty { path: PathBuf },
}
