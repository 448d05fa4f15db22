// src/core/chain/mod.rs

// Everything needed to turn a raw certificate chain into graph writes.
// The stages run in this order for every certificate of the chain.

/// PEM/DER detection and X.509 parsing.
pub mod decoder;

/// The OID-keyed table of extension handlers used by the extractor.
pub mod extensions;

/// Flattens a parsed certificate into `CertificateFields`.
pub mod extractor;

/// Turns extracted values into typed entities.
pub mod mapper;

/// Walks the chain and writes nodes and edges through a `GraphStore`.
pub mod projector;

pub use decoder::{decode_certificate, DecodedCertificate, Encoding};
pub use extensions::ExtensionRegistry;
pub use extractor::{extract_fields, CertificateFields};
pub use projector::{ChainProjector, ProjectionSummary};
