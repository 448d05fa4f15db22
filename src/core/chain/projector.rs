// src/core/chain/projector.rs

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::core::chain::decoder::decode_certificate;
use crate::core::chain::extensions::ExtensionRegistry;
use crate::core::chain::extractor::{
    extract_fields, extract_info_access, extract_san, AccessMethod, CertificateFields, GeneralNameKind, InfoAccess,
};
use crate::core::chain::mapper::{self, EntityTarget};
use crate::core::errors::{EntityError, ProjectionError};
use crate::core::models::{Discovery, Entity, FieldKind, Relation};
use crate::core::store::GraphStore;

/// Counters for one chain projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionSummary {
    pub certificates: usize,
    pub entities: usize,
    pub relations: usize,
    pub skipped: usize,
}

/// Walks a leaf-first certificate chain and writes its graph through a store.
///
/// Writes happen one at a time and in chain order; the `issuing_certificate`
/// edge of each certificate needs the node of the one before it.
pub struct ChainProjector<'a, S: GraphStore> {
    store: &'a S,
    registry: &'a ExtensionRegistry,
    discoveries: Option<UnboundedSender<Discovery>>,
}

impl<'a, S: GraphStore> ChainProjector<'a, S> {
    pub fn new(store: &'a S, registry: &'a ExtensionRegistry) -> Self {
        Self {
            store,
            registry,
            discoveries: None,
        }
    }

    /// Attaches a channel that receives every discovered value.
    pub fn with_discoveries(mut self, tx: UnboundedSender<Discovery>) -> Self {
        self.discoveries = Some(tx);
        self
    }

    /// Creates the base domain node, then projects `chain` onto it.
    pub async fn project_domain<B: AsRef<[u8]>>(
        &self,
        domain: &str,
        chain: &[B],
    ) -> Result<ProjectionSummary, ProjectionError<S::Error>> {
        let base_entity = mapper::domain(domain).map_err(ProjectionError::BaseDomain)?;
        let base = self.store.create_entity(&base_entity).await.map_err(ProjectionError::Store)?;
        let mut summary = self.project_chain(&base, chain).await?;
        summary.entities += 1;
        Ok(summary)
    }

    /// Projects a chain of raw certificates onto an existing base domain node.
    ///
    /// A certificate that does not decode stops the walk; everything written
    /// for the certificates before it stays in the store.
    pub async fn project_chain<B: AsRef<[u8]>>(
        &self,
        base: &S::NodeRef,
        chain: &[B],
    ) -> Result<ProjectionSummary, ProjectionError<S::Error>> {
        info!(certificates = chain.len(), "Starting chain projection.");
        let mut summary = ProjectionSummary::default();
        let mut previous: Option<S::NodeRef> = None;

        for (position, raw) in chain.iter().enumerate() {
            let decoded = decode_certificate(raw.as_ref()).inspect_err(|e| {
                warn!(position, error = %e, "Aborting chain walk on undecodable certificate.");
            })?;
            let x509 = decoded.x509()?;
            let fields = extract_fields(&x509, self.registry);
            debug!(position, encoding = %decoded.encoding(), serial = %fields.serial_number, "Decoded certificate.");

            let node = self
                .project_certificate(base, previous.as_ref(), &fields, &mut summary)
                .await
                .map_err(ProjectionError::Store)?;
            previous = Some(node);
        }

        info!(
            certificates = summary.certificates,
            entities = summary.entities,
            relations = summary.relations,
            skipped = summary.skipped,
            "Chain projection finished."
        );
        Ok(summary)
    }

    /// Writes the nodes and edges of one certificate and returns its node.
    pub async fn project_certificate(
        &self,
        base: &S::NodeRef,
        previous: Option<&S::NodeRef>,
        fields: &CertificateFields,
        summary: &mut ProjectionSummary,
    ) -> Result<S::NodeRef, S::Error> {
        let cert = self.store_entity(&mapper::certificate(fields), summary).await?;
        summary.certificates += 1;

        if let Some(previous) = previous {
            self.relate(Relation::IssuingCertificate, previous, &cert, summary).await?;
        }

        for cn in &fields.subject_common_names {
            let Some(entity) = self.accept(mapper::domain(cn), FieldKind::CommonName, summary) else {
                continue;
            };
            let domain = self.store_entity(&entity, summary).await?;
            self.relate(Relation::CommonName, &cert, &domain, summary).await?;
            self.discover(FieldKind::CommonName, entity);
        }

        // CA certificates claim their organizations directly; everything else
        // vouches for the base domain.
        let mut organizations = Vec::with_capacity(fields.organizations.len());
        for name in &fields.organizations {
            let Some(entity) = self.accept(mapper::organization(name), FieldKind::Organization, summary) else {
                continue;
            };
            let org = self.store_entity(&entity, summary).await?;
            self.discover(FieldKind::Organization, entity);
            self.attribute(fields.is_ca, base, &cert, &org, summary).await?;
            organizations.push(org);
        }

        let primary = organizations.first().cloned();
        for name in &fields.organizational_units {
            let Some(entity) = self.accept(mapper::organization(name), FieldKind::OrganizationalUnit, summary) else {
                continue;
            };
            let unit = self.store_entity(&entity, summary).await?;
            self.discover(FieldKind::OrganizationalUnit, entity);
            match &primary {
                Some(primary) => self.relate(Relation::OrgUnit, primary, &unit, summary).await?,
                None => self.attribute(fields.is_ca, base, &cert, &unit, summary).await?,
            }
        }

        // Every organization, not only the primary one, is verified for each SAN domain.
        for entity in extract_san(fields, GeneralNameKind::DnsName, EntityTarget::Domain) {
            let domain = self.store_entity(&entity, summary).await?;
            self.relate(Relation::SanDnsName, &cert, &domain, summary).await?;
            self.discover(FieldKind::SubjectAltName, entity);
            for org in &organizations {
                self.relate(Relation::VerifiedFor, &domain, org, summary).await?;
            }
        }

        let san_targets = [
            (GeneralNameKind::IpAddress, EntityTarget::IpAddress, Relation::SanIpAddress),
            (GeneralNameKind::Rfc822Name, EntityTarget::Email, Relation::SanEmailAddress),
            (GeneralNameKind::Uri, EntityTarget::Url, Relation::SanUrl),
        ];
        for (kind, target, relation) in san_targets {
            for entity in extract_san(fields, kind, target) {
                let node = self.store_entity(&entity, summary).await?;
                self.relate(relation, &cert, &node, summary).await?;
                self.discover(FieldKind::SubjectAltName, entity);
            }
        }

        // CA Issuers and CA Repository locations share `issuing_certificate_url`.
        let access_locations = [
            (InfoAccess::Authority, AccessMethod::Ocsp, Relation::OcspServer, FieldKind::Ocsp),
            (
                InfoAccess::Authority,
                AccessMethod::CaIssuers,
                Relation::IssuingCertificateUrl,
                FieldKind::IssuerCertificate,
            ),
            (
                InfoAccess::Subject,
                AccessMethod::CaRepository,
                Relation::IssuingCertificateUrl,
                FieldKind::CaRepository,
            ),
        ];
        for (extension, method, relation, field) in access_locations {
            let Some(location) = extract_info_access(fields, extension, method) else {
                continue;
            };
            let Some(entity) = self.accept(mapper::location_url(location), field, summary) else {
                continue;
            };
            let url = self.store_entity(&entity, summary).await?;
            self.relate(relation, &cert, &url, summary).await?;
            self.discover(field, entity);
        }

        Ok(cert)
    }

    async fn attribute(
        &self,
        is_ca: bool,
        base: &S::NodeRef,
        cert: &S::NodeRef,
        org: &S::NodeRef,
        summary: &mut ProjectionSummary,
    ) -> Result<(), S::Error> {
        if is_ca {
            self.relate(Relation::CertificateAuthority, cert, org, summary).await
        } else {
            self.relate(Relation::VerifiedFor, base, org, summary).await
        }
    }

    async fn store_entity(&self, entity: &Entity, summary: &mut ProjectionSummary) -> Result<S::NodeRef, S::Error> {
        let node = self.store.create_entity(entity).await?;
        summary.entities += 1;
        Ok(node)
    }

    async fn relate(
        &self,
        relation: Relation,
        from: &S::NodeRef,
        to: &S::NodeRef,
        summary: &mut ProjectionSummary,
    ) -> Result<(), S::Error> {
        self.store.create_relation(relation, from, to).await?;
        summary.relations += 1;
        Ok(())
    }

    fn accept(
        &self,
        entity: Result<Entity, EntityError>,
        field: FieldKind,
        summary: &mut ProjectionSummary,
    ) -> Option<Entity> {
        match entity {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!(%field, error = %e, "Skipping value that is not a valid entity.");
                summary.skipped += 1;
                None
            }
        }
    }

    fn discover(&self, kind: FieldKind, entity: Entity) {
        if let Some(tx) = &self.discoveries {
            // A closed receiver only means nobody is listening any more.
            let _ = tx.send(Discovery { kind, entity });
        }
    }
}
