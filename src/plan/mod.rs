//! Plan output of one deployment unit.
//!
//! A `NetworkPlan` is everything the deployment driver has to create for a
//! single (account, region): edges, routes, peering connections and the
//! values to publish once the resources exist. It serializes to YAML or JSON.

use chrono::Utc;
use serde::Serialize;

use crate::resolver::ResolverStats;
use crate::topology::associations::{AssociationRecord, EdgeGraph, SkippedEdge};
use crate::topology::dns::ResolverRuleAssociation;
use crate::topology::gateway_routes::GatewayRouteRecord;
use crate::topology::peering::{
    CrossAccountRoute, CrossAccountRouteHandler, PeeringConnection, PeeringPlan, PeeringRoute, Publication,
};
use crate::topology::{AttachmentKind, Scope, TopologyBuildContext};

/// Information about how the plan was produced
#[derive(Debug, Clone, Serialize)]
pub struct PlanMetadata {
    pub scope: Scope,
    pub prefix: String,
    pub generated_at: String,
    pub lookups: ResolverStats,
}

impl PlanMetadata {
    pub fn new(scope: Scope, prefix: &str, lookups: ResolverStats) -> Self {
        Self {
            scope,
            prefix: prefix.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            lookups,
        }
    }
}

/// An attachment the unit resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentSummary {
    pub key: String,
    pub id: String,
    pub gateway_id: String,
    pub kind: AttachmentKind,
    pub owner: Scope,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkPlan {
    pub metadata: PlanMetadata,
    pub attachments: Vec<AttachmentSummary>,
    pub associations: Vec<AssociationRecord>,
    pub propagations: Vec<AssociationRecord>,
    pub skipped_edges: Vec<SkippedEdge>,
    pub gateway_routes: Vec<GatewayRouteRecord>,
    pub peering_connections: Vec<PeeringConnection>,
    pub peering_routes: Vec<PeeringRoute>,
    pub cross_account_routes: Vec<CrossAccountRoute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_account_route_handler: Option<CrossAccountRouteHandler>,
    pub resolver_rule_associations: Vec<ResolverRuleAssociation>,
    pub publications: Vec<Publication>,
}

impl NetworkPlan {
    pub fn assemble(
        metadata: PlanMetadata,
        ctx: &TopologyBuildContext,
        edges: EdgeGraph,
        gateway_routes: Vec<GatewayRouteRecord>,
        peering: PeeringPlan,
        resolver_rule_associations: Vec<ResolverRuleAssociation>,
    ) -> Self {
        let attachments = ctx
            .attachments
            .iter()
            .map(|(key, entry)| AttachmentSummary {
                key: key.clone(),
                id: entry.id.clone(),
                gateway_id: entry.gateway_id.clone(),
                kind: entry.descriptor.kind,
                owner: entry.descriptor.owner.clone(),
            })
            .collect();

        let mut skipped_edges = edges.associations.skipped;
        skipped_edges.extend(edges.propagations.skipped);

        Self {
            metadata,
            attachments,
            associations: edges.associations.records,
            propagations: edges.propagations.records,
            skipped_edges,
            gateway_routes,
            peering_connections: peering.connections,
            peering_routes: peering.routes,
            cross_account_routes: peering.cross_account_routes,
            cross_account_route_handler: peering.handler,
            resolver_rule_associations,
            publications: peering.publications,
        }
    }

    /// Number of objects the driver has to create
    pub fn resource_count(&self) -> usize {
        self.associations.len()
            + self.propagations.len()
            + self.gateway_routes.len()
            + self.peering_connections.len()
            + self.peering_routes.len()
            + self.cross_account_routes.len()
            + usize::from(self.cross_account_route_handler.is_some())
            + self.resolver_rule_associations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resource_count() == 0
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_plan() -> NetworkPlan {
        let scope = Scope::new("A", "r1");
        NetworkPlan::assemble(
            PlanMetadata::new(scope.clone(), "accel", ResolverStats::default()),
            &TopologyBuildContext::new(scope),
            EdgeGraph::default(),
            Vec::new(),
            PeeringPlan::default(),
            Vec::new(),
        )
    }

    #[test]
    fn test_empty_plan_serializes() {
        let plan = empty_plan();
        assert!(plan.is_empty());

        let yaml = plan.to_yaml().unwrap();
        assert!(yaml.contains("account: A"));
        assert!(!yaml.contains("cross_account_route_handler"));

        let json: serde_json::Value = serde_json::from_str(&plan.to_json().unwrap()).unwrap();
        assert_eq!(json["metadata"]["scope"]["region"], "r1");
        assert_eq!(json["metadata"]["lookups"]["remote_reads"], 0);
    }
}
