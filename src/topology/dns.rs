//! Resolver rule associations.
//!
//! Rules are created once by their owner and shared into the accounts that
//! use them. Each VPC deployed to the current scope associates with the
//! rules it lists.

use log::info;
use serde::Serialize;

use crate::accounts::AccountRegistry;
use crate::config::Config;
use crate::error::{NetworkError, Result};
use crate::keys;
use crate::resolver::CrossBoundaryResolver;
use crate::topology::types::Scope;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolverRuleAssociation {
    pub key: String,
    pub logical_id: String,
    pub rule: String,
    pub rule_id: String,
    pub vpc: String,
    pub vpc_id: String,
    pub scope: Scope,
}

pub fn build_resolver_rule_associations(
    config: &Config,
    accounts: &AccountRegistry,
    resolver: &mut CrossBoundaryResolver,
) -> Result<Vec<ResolverRuleAssociation>> {
    let scope = resolver.caller().clone();
    let prefix = resolver.prefix().to_string();
    let mut records = Vec::new();

    for vpc in &config.network.vpcs {
        if vpc.resolver_rules.is_empty() || vpc.region != scope.region {
            continue;
        }
        if !accounts.vpc_accounts(vpc).contains(&scope.account) {
            continue;
        }

        let vpc_id = resolver.resolve(&keys::vpc_ref(&prefix, &vpc.name), &scope)?;
        for rule_name in &vpc.resolver_rules {
            let rule = config.find_resolver_rule(rule_name).ok_or_else(|| {
                NetworkError::configuration(format!("resolverRule:{}", rule_name), &scope, "resolver rule is not defined")
            })?;
            if rule.region != vpc.region {
                return Err(NetworkError::configuration(
                    format!("resolverRule:{}", rule_name),
                    &scope,
                    format!("rule lives in {} but VPC '{}' is in {}", rule.region, vpc.name, vpc.region),
                ));
            }

            let owner = Scope::new(rule.account.clone(), rule.region.clone());
            let rule_id = resolver.resolve(&keys::resolver_rule_ref(&prefix, &rule.name), &owner)?;
            records.push(ResolverRuleAssociation {
                key: keys::resolver_rule_association_key(&rule.name, &vpc.name, &scope.account),
                logical_id: format!("{}-{}-rule-association", vpc.name, rule.name),
                rule: rule.name.clone(),
                rule_id,
                vpc: vpc.name.clone(),
                vpc_id: vpc_id.clone(),
                scope: scope.clone(),
            });
        }
    }

    if !records.is_empty() {
        info!("Planned {} resolver rule associations for {}", records.len(), scope);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::topology::ResourceKind;

    const TOPOLOGY: &str = r#"
global:
  home_region: r1
accounts:
  - name: A
    id: "111111111111"
  - name: B
    id: "222222222222"
network:
  vpcs:
    - name: App
      account: B
      region: r1
      cidrs: ["10.1.0.0/16"]
      resolver_rules: [corp-forward]
  resolver_rules:
    - name: corp-forward
      account: A
      region: r1
"#;

    #[test]
    fn test_shared_rule_is_associated() {
        let config: Config = serde_yaml::from_str(TOPOLOGY).unwrap();
        let accounts = AccountRegistry::from_config(&config);
        let b = Scope::new("B", "r1");
        let backend = MemoryBackend::new()
            .with_value(&b, "/accel/network/vpc/App/id", "vpc-app")
            .with_share(ResourceKind::ResolverRule, "corp-forward", "111111111111", "r1", "rslvr-rr-1");
        let mut resolver = CrossBoundaryResolver::new(&backend, &accounts, b, &config.global);

        let records = build_resolver_rule_associations(&config, &accounts, &mut resolver).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "corp-forward_App_B");
        assert_eq!(records[0].rule_id, "rslvr-rr-1");
        assert_eq!(records[0].vpc_id, "vpc-app");
        assert!(backend.assumed_roles().is_empty());
    }

    #[test]
    fn test_other_accounts_skip_vpc() {
        let config: Config = serde_yaml::from_str(TOPOLOGY).unwrap();
        let accounts = AccountRegistry::from_config(&config);
        let backend = MemoryBackend::new();
        let mut resolver = CrossBoundaryResolver::new(&backend, &accounts, Scope::new("A", "r1"), &config.global);

        let records = build_resolver_rule_associations(&config, &accounts, &mut resolver).unwrap();
        assert!(records.is_empty());
        assert_eq!(backend.counts(), Default::default());
    }
}
