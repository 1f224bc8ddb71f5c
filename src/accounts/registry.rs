//! Account registry.
//!
//! This file keeps the organization's accounts in configuration order and
//! answers the two questions every stage asks: "what is the id of account X"
//! and "which accounts does this templated resource deploy to".

use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::config::{AccountConfig, Config, DeploymentTargets, VpcConfig, VpcPlacement};
use crate::error::{NetworkError, Result};
use crate::topology::Scope;

/// A member account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub name: String,
    pub id: String,
    pub organizational_unit: Option<String>,
}

/// Registry of all accounts in the topology
#[derive(Debug, Default)]
pub struct AccountRegistry {
    /// Accounts in configuration order
    accounts: Vec<AccountInfo>,
    /// Account name -> position in `accounts`
    by_name: HashMap<String, usize>,
}

impl AccountRegistry {
    pub fn from_config(config: &Config) -> Self {
        Self::from_accounts(&config.accounts)
    }

    pub fn from_accounts(accounts: &[AccountConfig]) -> Self {
        let mut registry = AccountRegistry::default();
        for account in accounts {
            if registry.by_name.contains_key(&account.name) {
                continue;
            }
            registry.by_name.insert(account.name.clone(), registry.accounts.len());
            registry.accounts.push(AccountInfo {
                name: account.name.clone(),
                id: account.id.clone(),
                organizational_unit: account.organizational_unit.clone(),
            });
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&AccountInfo> {
        self.by_name.get(name).map(|idx| &self.accounts[*idx])
    }

    pub fn account_id(&self, name: &str) -> Option<&str> {
        self.get(name).map(|a| a.id.as_str())
    }

    /// Account id for `name`, or a configuration error naming the scope that
    /// referenced it
    pub fn require_id(&self, name: &str, referenced_from: &Scope) -> Result<&str> {
        self.account_id(name).ok_or_else(|| {
            NetworkError::configuration(
                format!("account:{}", name),
                referenced_from,
                "account is not part of the organization",
            )
        })
    }

    /// Names of the accounts placed in an organizational unit
    pub fn accounts_in_ou(&self, ou: &str) -> Vec<&str> {
        self.accounts
            .iter()
            .filter(|a| a.organizational_unit.as_deref() == Some(ou))
            .map(|a| a.name.as_str())
            .collect()
    }

    /// Expand deployment targets into account names.
    ///
    /// Explicit accounts come first, then organizational-unit members, in
    /// configuration order without duplicates. Excluded accounts are dropped
    /// silently.
    pub fn resolve_targets(&self, targets: &DeploymentTargets) -> Vec<String> {
        let excluded: BTreeSet<&str> = targets.excluded_accounts.iter().map(String::as_str).collect();
        let mut seen = BTreeSet::new();
        let mut resolved = Vec::new();

        let candidates = targets
            .accounts
            .iter()
            .map(String::as_str)
            .chain(targets.organizational_units.iter().flat_map(|ou| self.accounts_in_ou(ou)));

        for account in candidates {
            if excluded.contains(account) {
                debug!("Skipping excluded account {}", account);
                continue;
            }
            if seen.insert(account) {
                resolved.push(account.to_string());
            }
        }

        resolved
    }

    /// Accounts a VPC is deployed to
    pub fn vpc_accounts(&self, vpc: &VpcConfig) -> Vec<String> {
        match &vpc.placement {
            VpcPlacement::Single { account } => vec![account.clone()],
            VpcPlacement::Templated { deployment_targets } => self.resolve_targets(deployment_targets),
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn registry() -> AccountRegistry {
        let accounts = vec![
            AccountConfig { name: "Network".into(), id: "111111111111".into(), organizational_unit: Some("Infrastructure".into()) },
            AccountConfig { name: "Dev".into(), id: "222222222222".into(), organizational_unit: Some("Workloads".into()) },
            AccountConfig { name: "Prod".into(), id: "333333333333".into(), organizational_unit: Some("Workloads".into()) },
            AccountConfig { name: "Sandbox".into(), id: "444444444444".into(), organizational_unit: Some("Workloads".into()) },
        ];
        AccountRegistry::from_accounts(&accounts)
    }

    #[test]
    fn test_lookup_by_name() {
        let registry = registry();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.account_id("Dev"), Some("222222222222"));
        assert_eq!(registry.account_id("Missing"), None);
    }

    #[test]
    fn test_require_id_unknown_account() {
        let registry = registry();
        let scope = Scope::new("Network", "us-east-1");
        let err = registry.require_id("Missing", &scope).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.key(), "account:Missing");
    }

    #[test]
    fn test_targets_with_exclusions() {
        let registry = registry();
        let targets = DeploymentTargets {
            accounts: vec!["Network".into(), "Dev".into()],
            organizational_units: vec!["Workloads".into()],
            excluded_accounts: vec!["Sandbox".into()],
        };
        assert_eq!(registry.resolve_targets(&targets), vec!["Network", "Dev", "Prod"]);
    }

    #[test]
    fn test_excluding_every_account_is_not_an_error() {
        let registry = registry();
        let targets = DeploymentTargets {
            accounts: vec!["Dev".into()],
            organizational_units: vec![],
            excluded_accounts: vec!["Dev".into()],
        };
        assert!(registry.resolve_targets(&targets).is_empty());
    }
}
