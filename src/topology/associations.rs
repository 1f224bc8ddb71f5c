//! Attachment to route-table edges.
//!
//! Associations and propagations are emitted by the unit that owns the
//! attachment. Both are keyed by `keys::edge_key`, so the identity of an
//! edge only depends on the attachment and the route table name.

use std::collections::BTreeSet;

use log::{debug, info};
use serde::Serialize;

use crate::config::ExternallyManagedConfig;
use crate::error::{NetworkError, Result};
use crate::keys;
use crate::topology::maps::{AttachmentEntry, TopologyBuildContext};
use crate::topology::types::Scope;

/// The two kinds of attachment/route-table edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Association,
    Propagation,
}

impl EdgeKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            EdgeKind::Association => "association",
            EdgeKind::Propagation => "propagation",
        }
    }
}

/// Edges whose lifecycle belongs to an out-of-band import
#[derive(Debug, Clone, Default)]
pub struct ExternallyManaged {
    associations: BTreeSet<String>,
    propagations: BTreeSet<String>,
}

impl ExternallyManaged {
    pub fn from_config(config: &ExternallyManagedConfig) -> Self {
        Self {
            associations: config.associations.iter().cloned().collect(),
            propagations: config.propagations.iter().cloned().collect(),
        }
    }

    pub fn insert(&mut self, kind: EdgeKind, edge_key: impl Into<String>) {
        match kind {
            EdgeKind::Association => self.associations.insert(edge_key.into()),
            EdgeKind::Propagation => self.propagations.insert(edge_key.into()),
        };
    }

    pub fn contains(&self, kind: EdgeKind, edge_key: &str) -> bool {
        match kind {
            EdgeKind::Association => self.associations.contains(edge_key),
            EdgeKind::Propagation => self.propagations.contains(edge_key),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.associations.is_empty() && self.propagations.is_empty()
    }
}

/// An association or propagation to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociationRecord {
    pub kind: EdgeKind,
    pub edge_key: String,
    pub logical_id: String,
    pub attachment_key: String,
    pub attachment_id: String,
    pub route_table: String,
    pub route_table_id: String,
    pub scope: Scope,
}

/// An edge left alone because it is externally managed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEdge {
    pub kind: EdgeKind,
    pub edge_key: String,
}

/// Output of one build call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EdgeBatch {
    pub records: Vec<AssociationRecord>,
    pub skipped: Vec<SkippedEdge>,
}

impl EdgeBatch {
    pub fn extend(&mut self, other: EdgeBatch) {
        self.records.extend(other.records);
        self.skipped.extend(other.skipped);
    }

    pub fn edge_keys(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.edge_key.as_str()).collect()
    }
}

/// Associations and propagations of every attachment a unit owns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EdgeGraph {
    pub associations: EdgeBatch,
    pub propagations: EdgeBatch,
}

pub struct AssociationGraphBuilder<'c> {
    ctx: &'c TopologyBuildContext,
    external: &'c ExternallyManaged,
    requested: BTreeSet<(EdgeKind, String)>,
}

impl<'c> AssociationGraphBuilder<'c> {
    pub fn new(ctx: &'c TopologyBuildContext, external: &'c ExternallyManaged) -> Self {
        Self {
            ctx,
            external,
            requested: BTreeSet::new(),
        }
    }

    pub fn build_associations(&mut self, attachment_key: &str, route_tables: &[String]) -> Result<EdgeBatch> {
        self.build_edges(EdgeKind::Association, attachment_key, route_tables)
    }

    pub fn build_propagations(&mut self, attachment_key: &str, route_tables: &[String]) -> Result<EdgeBatch> {
        self.build_edges(EdgeKind::Propagation, attachment_key, route_tables)
    }

    /// All associations of owned attachments, then all their propagations
    pub fn build_all(&mut self) -> Result<EdgeGraph> {
        let ctx = self.ctx;
        let owned: Vec<(&String, &AttachmentEntry)> = ctx.owned_attachments().collect();
        let mut graph = EdgeGraph::default();

        for (key, entry) in &owned {
            let batch = self.build_associations(key, &entry.descriptor.associations)?;
            graph.associations.extend(batch);
        }
        for (key, entry) in &owned {
            let batch = self.build_propagations(key, &entry.descriptor.propagations)?;
            graph.propagations.extend(batch);
        }

        info!(
            "Planned {} associations and {} propagations for {} ({} externally managed)",
            graph.associations.records.len(),
            graph.propagations.records.len(),
            ctx.scope,
            graph.associations.skipped.len() + graph.propagations.skipped.len()
        );
        Ok(graph)
    }

    fn build_edges(&mut self, kind: EdgeKind, attachment_key: &str, route_tables: &[String]) -> Result<EdgeBatch> {
        let ctx = self.ctx;
        let scope = &ctx.scope;
        let mut batch = EdgeBatch::default();

        for route_table in route_tables {
            let edge_key = keys::edge_key(attachment_key, route_table);

            if self.external.contains(kind, &edge_key) {
                debug!("Skipping externally managed {} {}", kind.suffix(), edge_key);
                batch.skipped.push(SkippedEdge { kind, edge_key });
                continue;
            }
            if !self.requested.insert((kind, edge_key.clone())) {
                return Err(NetworkError::DuplicateAssociation {
                    key: edge_key,
                    scope: scope.clone(),
                });
            }

            let entry = ctx.attachment(attachment_key).ok_or_else(|| {
                NetworkError::configuration(attachment_key, scope, "attachment has not been resolved")
            })?;
            let descriptor = &entry.descriptor;
            let route_table_id = ctx
                .route_table_id(&descriptor.region, &descriptor.gateway, route_table)
                .ok_or_else(|| {
                    NetworkError::configuration(
                        keys::route_table_key(&descriptor.gateway, route_table),
                        scope,
                        "route table is not defined on the gateway",
                    )
                })?;

            let account = descriptor.templated.then_some(descriptor.owner.account.as_str());
            batch.records.push(AssociationRecord {
                kind,
                logical_id: keys::association_logical_id(&descriptor.attachment_name, route_table, account, kind.suffix()),
                edge_key,
                attachment_key: attachment_key.to_string(),
                attachment_id: entry.id.clone(),
                route_table: route_table.clone(),
                route_table_id: route_table_id.to_string(),
                scope: scope.clone(),
            });
        }

        Ok(batch)
    }
}
