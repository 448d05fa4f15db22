// src/core/store.rs

//! The store adapter contract and an in-memory, deduplicating implementation.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::core::models::{Entity, Relation};

/// Persistence for the projected graph.
///
/// Implementations must be idempotent: creating an entity or relation that
/// already exists returns the existing reference. The projection engine never
/// checks for existing nodes itself.
pub trait GraphStore {
    type NodeRef: Clone + fmt::Debug + Send + Sync;
    type EdgeRef: fmt::Debug + Send;
    type Error: std::error::Error + Send + Sync + 'static;

    fn create_entity(&self, entity: &Entity) -> impl Future<Output = Result<Self::NodeRef, Self::Error>> + Send;

    fn create_relation(
        &self,
        relation: Relation,
        from: &Self::NodeRef,
        to: &Self::NodeRef,
    ) -> impl Future<Output = Result<Self::EdgeRef, Self::Error>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeId(pub usize);

#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("relation {relation} cannot link {from} to {to}")]
    KindMismatch { relation: Relation, from: String, to: String },
    #[error("store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub relation: Relation,
    pub from: NodeId,
    pub to: NodeId,
}

#[derive(Debug, Default, Serialize)]
pub struct Graph {
    pub nodes: Vec<Entity>,
    pub edges: Vec<Edge>,
    #[serde(skip)]
    node_index: HashMap<String, NodeId>,
    #[serde(skip)]
    edge_index: HashMap<(Relation, NodeId, NodeId), EdgeId>,
}

impl Graph {
    pub fn node(&self, id: NodeId) -> Option<&Entity> {
        self.nodes.get(id.0)
    }

    pub fn find(&self, entity: &Entity) -> Option<NodeId> {
        self.node_index.get(&entity.natural_key()).copied()
    }

    /// Edges of one relation type, in creation order.
    pub fn edges_of(&self, relation: Relation) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |edge| edge.relation == relation)
    }

    pub fn has_edge(&self, relation: Relation, from: &Entity, to: &Entity) -> bool {
        match (self.find(from), self.find(to)) {
            (Some(from), Some(to)) => self.edge_index.contains_key(&(relation, from, to)),
            _ => false,
        }
    }

    /// Number of distinct `(relation, from, to)` triples, which equals the
    /// edge count as long as edges were only added through the store.
    pub fn distinct_edges(&self) -> usize {
        self.edges
            .iter()
            .map(|edge| (edge.relation, edge.from, edge.to))
            .collect::<HashSet<_>>()
            .len()
    }

    fn upsert_node(&mut self, entity: &Entity) -> NodeId {
        let key = entity.natural_key();
        if let Some(id) = self.node_index.get(&key) {
            return *id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(entity.clone());
        self.node_index.insert(key, id);
        id
    }

    fn upsert_edge(&mut self, relation: Relation, from: NodeId, to: NodeId) -> Result<EdgeId, MemoryStoreError> {
        let from_entity = self.node(from).ok_or(MemoryStoreError::UnknownNode(from))?;
        let to_entity = self.node(to).ok_or(MemoryStoreError::UnknownNode(to))?;
        let (from_kind, to_kind) = relation.endpoints();
        if from_entity.kind() != from_kind || to_entity.kind() != to_kind {
            return Err(MemoryStoreError::KindMismatch {
                relation,
                from: from_entity.kind().to_string(),
                to: to_entity.kind().to_string(),
            });
        }

        if let Some(id) = self.edge_index.get(&(relation, from, to)) {
            return Ok(*id);
        }
        let id = EdgeId(self.edges.len());
        self.edges.push(Edge { relation, from, to });
        self.edge_index.insert((relation, from, to), id);
        Ok(id)
    }
}

/// Deduplicates entities by natural key and edges by `(relation, from, to)`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    graph: Mutex<Graph>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against the current graph.
    pub fn with_graph<R>(&self, f: impl FnOnce(&Graph) -> R) -> Result<R, MemoryStoreError> {
        let graph = self.graph.lock().map_err(|_| MemoryStoreError::Poisoned)?;
        Ok(f(&graph))
    }

    pub fn into_graph(self) -> Result<Graph, MemoryStoreError> {
        self.graph.into_inner().map_err(|_| MemoryStoreError::Poisoned)
    }
}

impl GraphStore for MemoryStore {
    type NodeRef = NodeId;
    type EdgeRef = EdgeId;
    type Error = MemoryStoreError;

    async fn create_entity(&self, entity: &Entity) -> Result<NodeId, MemoryStoreError> {
        let mut graph = self.graph.lock().map_err(|_| MemoryStoreError::Poisoned)?;
        let id = graph.upsert_node(entity);
        debug!(node = id.0, kind = %entity.kind(), "Stored entity.");
        Ok(id)
    }

    async fn create_relation(&self, relation: Relation, from: &NodeId, to: &NodeId) -> Result<EdgeId, MemoryStoreError> {
        let mut graph = self.graph.lock().map_err(|_| MemoryStoreError::Poisoned)?;
        let id = graph.upsert_edge(relation, *from, *to)?;
        debug!(%relation, from = from.0, to = to.0, "Stored relation.");
        Ok(id)
    }
}
