// src/core/source.rs

//! Reads certificate chains from files on disk.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use x509_parser::pem::parse_x509_pem;

use crate::core::errors::SourceError;

const PEM_BEGIN: &[u8] = b"-----BEGIN";

/// Reads every file in `paths` and returns one raw blob per certificate, in order.
///
/// PEM files may hold several certificates and are split into one blob per
/// block. Anything else is passed through untouched as a single DER blob; the
/// decoder decides later whether it is a certificate.
pub async fn load_chain(paths: &[PathBuf]) -> Result<Vec<Vec<u8>>, SourceError> {
    let mut chain = Vec::new();
    for path in paths {
        let data = read_file(path).await?;
        let blobs = split_blobs(&data);
        debug!(path = %path.display(), certificates = blobs.len(), "Loaded certificate file.");
        chain.extend(blobs);
    }
    info!(files = paths.len(), certificates = chain.len(), "Certificate chain loaded.");
    Ok(chain)
}

async fn read_file(path: &Path) -> Result<Vec<u8>, SourceError> {
    let data = tokio::fs::read(path).await.map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if data.trim_ascii().is_empty() {
        return Err(SourceError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(data)
}

/// Splits a file into raw certificate blobs, keeping PEM blocks as PEM text.
///
/// Text around the blocks (`openssl s_client` headers, bundle comments) is
/// dropped. Data without any PEM block is returned as a single blob.
pub fn split_blobs(data: &[u8]) -> Vec<Vec<u8>> {
    let Some(first) = find_pem_begin(data) else {
        return vec![data.to_vec()];
    };

    let mut blobs = Vec::new();
    let mut remaining = &data[first..];
    loop {
        match parse_x509_pem(remaining) {
            Ok((rest, _)) => {
                let consumed = remaining.len() - rest.len();
                blobs.push(remaining[..consumed].to_vec());
                match find_pem_begin(rest) {
                    Some(next) => remaining = &rest[next..],
                    None => {
                        if !rest.trim_ascii().is_empty() {
                            debug!(trailing = rest.len(), "Ignoring text after the last PEM block.");
                        }
                        break;
                    }
                }
            }
            Err(e) => {
                // Hand the broken tail to the decoder so the walk stops there.
                warn!(error = %e, "Unreadable PEM block in bundle.");
                blobs.push(remaining.to_vec());
                break;
            }
        }
    }
    blobs
}

fn find_pem_begin(data: &[u8]) -> Option<usize> {
    data.windows(PEM_BEGIN.len()).position(|window| window == PEM_BEGIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chain::decoder::{decode_certificate, Encoding};
    use crate::core::testing::CertBuilder;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("certgraph-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn pem_bundle_is_split_in_order() {
        let leaf = CertBuilder::new("leaf.example.com").build();
        let ca = CertBuilder::new("ca.example.com").ca(true).build();
        let bundle = format!("{}\n{}\n", leaf.pem(), ca.pem());

        let blobs = split_blobs(bundle.as_bytes());
        assert_eq!(blobs.len(), 2);
        let first = decode_certificate(&blobs[0]).unwrap();
        let second = decode_certificate(&blobs[1]).unwrap();
        assert_eq!(first.encoding(), Encoding::Pem);
        assert_eq!(first.der(), leaf.der().as_ref());
        assert_eq!(second.der(), ca.der().as_ref());
    }

    #[test]
    fn text_around_pem_blocks_is_skipped() {
        let leaf = CertBuilder::new("leaf.example.com").build();
        let ca = CertBuilder::new("ca.example.com").ca(true).build();
        let showcerts = format!(
            "CONNECTED(00000003)\ndepth=1 CN = ca.example.com\n---\nCertificate chain\n 0 s:CN = leaf.example.com\n{}\n 1 s:CN = ca.example.com\n{}\n---\nServer certificate\n",
            leaf.pem(),
            ca.pem()
        );
        let bundle = format!("# Subject: CN=leaf.example.com\n{}\n# Issuer: CN=ca.example.com\n{}", leaf.pem(), ca.pem());

        for text in [showcerts, bundle] {
            let blobs = split_blobs(text.as_bytes());
            assert_eq!(blobs.len(), 2);
            assert_eq!(decode_certificate(&blobs[0]).unwrap().der(), leaf.der().as_ref());
            assert_eq!(decode_certificate(&blobs[1]).unwrap().der(), ca.der().as_ref());
        }
    }

    #[tokio::test]
    async fn commented_bundle_projects_every_certificate() {
        use crate::core::chain::{ChainProjector, ExtensionRegistry};
        use crate::core::models::Relation;
        use crate::core::store::MemoryStore;

        let leaf = CertBuilder::new("leaf.example.com").build();
        let ca = CertBuilder::new("ca.example.com").ca(true).build();
        let path = temp_file(
            "commented-bundle.pem",
            format!("subject=CN = leaf.example.com\n{}\n# CA\n{}", leaf.pem(), ca.pem()).as_bytes(),
        );

        let chain = load_chain(&[path.clone()]).await.unwrap();
        let store = MemoryStore::new();
        let registry = ExtensionRegistry::standard();
        let summary = ChainProjector::new(&store, &registry)
            .project_domain("example.com", &chain)
            .await
            .unwrap();
        assert_eq!(summary.certificates, 2);
        assert_eq!(store.into_graph().unwrap().edges_of(Relation::IssuingCertificate).count(), 1);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn non_pem_data_is_one_blob() {
        let cert = CertBuilder::new("a.example.com").build();
        let blobs = split_blobs(cert.der());
        assert_eq!(blobs, vec![cert.der().to_vec()]);
    }

    #[tokio::test]
    async fn load_chain_reads_files_in_order() {
        let leaf = CertBuilder::new("leaf.example.com").build();
        let ca = CertBuilder::new("ca.example.com").ca(true).build();
        let leaf_path = temp_file("order-leaf.der", leaf.der());
        let ca_path = temp_file("order-ca.pem", ca.pem().as_bytes());

        let chain = load_chain(&[leaf_path.clone(), ca_path.clone()]).await.unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(decode_certificate(&chain[0]).unwrap().encoding(), Encoding::Der);
        assert_eq!(decode_certificate(&chain[1]).unwrap().der(), ca.der().as_ref());

        let _ = std::fs::remove_file(leaf_path);
        let _ = std::fs::remove_file(ca_path);
    }

    #[tokio::test]
    async fn missing_and_empty_files_are_errors() {
        let missing = std::env::temp_dir().join("certgraph-definitely-missing.pem");
        assert!(matches!(load_chain(&[missing]).await, Err(SourceError::Io { .. })));

        let empty = temp_file("empty.pem", b"  \n");
        assert!(matches!(load_chain(&[empty.clone()]).await, Err(SourceError::Empty { .. })));
        let _ = std::fs::remove_file(empty);
    }
}
