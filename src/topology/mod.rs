//! Network topology module.
//!
//! This module turns the declarative topology into the keyed maps of one
//! deployment unit and then into association, route and peering records.

pub mod types;
pub mod maps;
pub mod associations;
pub mod gateway_routes;
pub mod dns;
pub mod peering;

// Re-export key types for easier access
pub use types::{AttachmentKind, ResourceKind, RouteDestination, Scope};
pub use maps::{AttachmentDescriptor, AttachmentEntry, TopologyBuildContext, TopologyMapBuilder};
pub use associations::{AssociationGraphBuilder, EdgeBatch, EdgeGraph, EdgeKind, ExternallyManaged};
pub use peering::{PeeringConnection, PeeringPlan, PeeringRouteResolver, PeeringState};
