//! Deployment unit orchestration.
//!
//! This module runs the planner stages for one (account, region) in their
//! required order: maps first, then associations, propagations, gateway
//! routes, peering and resolver rules. Every stage reads the maps by key, so
//! nothing is emitted before the maps are complete.

use std::collections::BTreeMap;

use log::{info, warn};

use crate::accounts::AccountRegistry;
use crate::backend::{Backend, ValuePublisher};
use crate::config::Config;
use crate::error::{NetworkError, Result};
use crate::plan::{NetworkPlan, PlanMetadata};
use crate::resolver::CrossBoundaryResolver;
use crate::topology::dns::build_resolver_rule_associations;
use crate::topology::gateway_routes::build_gateway_routes;
use crate::topology::{AssociationGraphBuilder, ExternallyManaged, PeeringRouteResolver, Scope, TopologyMapBuilder};

/// Plan the network resources of one deployment unit
pub fn plan_unit(config: &Config, scope: &Scope, backend: &dyn Backend) -> Result<NetworkPlan> {
    let accounts = AccountRegistry::from_config(config);
    accounts.require_id(&scope.account, scope)?;

    info!("Planning network resources for {}", scope);
    let mut resolver = CrossBoundaryResolver::new(backend, &accounts, scope.clone(), &config.global);

    let ctx = TopologyMapBuilder::new(config, &accounts).build(&mut resolver)?;

    let external = ExternallyManaged::from_config(&config.network.externally_managed);
    let edges = AssociationGraphBuilder::new(&ctx, &external).build_all()?;
    let gateway_routes = build_gateway_routes(config, &ctx)?;
    let peering = PeeringRouteResolver::new(config, &accounts).build(&mut resolver)?;
    let resolver_rules = build_resolver_rule_associations(config, &accounts, &mut resolver)?;

    let metadata = PlanMetadata::new(scope.clone(), resolver.prefix(), resolver.stats());
    let plan = NetworkPlan::assemble(metadata, &ctx, edges, gateway_routes, peering, resolver_rules);

    info!(
        "Plan for {} has {} resources ({} remote reads, {} cache hits)",
        scope,
        plan.resource_count(),
        plan.metadata.lookups.remote_reads,
        plan.metadata.lookups.cache_hits
    );
    Ok(plan)
}

/// Publish the ids of created resources so that other units can read them.
///
/// `created` maps a resource key (such as a peering connection key) to the
/// id the provisioning API assigned. Returns the number of values published.
pub fn publish_plan(
    plan: &NetworkPlan,
    created: &BTreeMap<String, String>,
    publisher: &mut dyn ValuePublisher,
) -> Result<usize> {
    let mut published = 0;
    for publication in &plan.publications {
        let Some(id) = created.get(&publication.resource_key) else {
            warn!("{} was not created, nothing to publish at {}", publication.resource_key, publication.path);
            continue;
        };
        publisher
            .publish(&publication.scope, &publication.path, id)
            .map_err(|source| NetworkError::RemoteLookup {
                key: publication.path.clone(),
                scope: publication.scope.clone(),
                source,
            })?;
        published += 1;
    }
    info!("Published {} values for {}", published, plan.metadata.scope);
    Ok(published)
}
