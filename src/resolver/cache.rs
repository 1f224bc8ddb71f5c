//! Per-run memoization.
//!
//! Both caches live for exactly one execution of a deployment unit and are
//! dropped with the resolver.

use std::collections::HashMap;

use crate::backend::RemoteIdentity;
use crate::keys::RolePurpose;
use crate::topology::Scope;

/// Key of a resolved value: where it was read and from whom
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: String,
    pub owner: Scope,
}

impl CacheKey {
    pub fn new(path: &str, owner: &Scope) -> Self {
        Self {
            path: path.to_string(),
            owner: owner.clone(),
        }
    }
}

/// Resolved values, written at most once per key
#[derive(Debug, Default)]
pub struct ResolvedValueCache {
    values: HashMap<CacheKey, String>,
    hits: usize,
}

impl ResolvedValueCache {
    pub fn get(&mut self, key: &CacheKey) -> Option<String> {
        let value = self.values.get(key).cloned();
        if value.is_some() {
            self.hits += 1;
        }
        value
    }

    /// Store a value. The first value stored for a key wins.
    pub fn insert(&mut self, key: CacheKey, value: String) -> String {
        self.values.entry(key).or_insert(value).clone()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}

/// Key of a remote lookup helper
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HelperKey {
    pub purpose: RolePurpose,
    pub account: String,
    pub region: String,
}

/// One identity per `(purpose, account, region)`, created on first use
#[derive(Debug, Default)]
pub struct LookupHelpers {
    helpers: HashMap<HelperKey, RemoteIdentity>,
}

impl LookupHelpers {
    pub fn get_or_create(&mut self, key: HelperKey, create: impl FnOnce() -> RemoteIdentity) -> RemoteIdentity {
        self.helpers.entry(key).or_insert_with(create).clone()
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_value_wins() {
        let mut cache = ResolvedValueCache::default();
        let key = CacheKey::new("/p", &Scope::new("A", "r1"));

        assert_eq!(cache.insert(key.clone(), "one".into()), "one");
        assert_eq!(cache.insert(key.clone(), "two".into()), "one");
        assert_eq!(cache.get(&key), Some("one".to_string()));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_same_key_same_scope_only() {
        let mut cache = ResolvedValueCache::default();
        cache.insert(CacheKey::new("/p", &Scope::new("A", "r1")), "a".into());
        assert_eq!(cache.get(&CacheKey::new("/p", &Scope::new("A", "r2"))), None);
        assert_eq!(cache.hits(), 0);
    }

    #[test]
    fn test_helper_created_once() {
        let mut helpers = LookupHelpers::default();
        let key = HelperKey {
            purpose: RolePurpose::ParameterShare,
            account: "B".into(),
            region: "r1".into(),
        };
        let mut created = 0;
        for _ in 0..3 {
            helpers.get_or_create(key.clone(), || {
                created += 1;
                RemoteIdentity {
                    account: "B".into(),
                    account_id: "222222222222".into(),
                    region: "r1".into(),
                    role_name: None,
                }
            });
        }
        assert_eq!(created, 1);
        assert_eq!(helpers.len(), 1);
    }
}
