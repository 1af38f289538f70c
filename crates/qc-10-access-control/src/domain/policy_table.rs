//! # Policy Table
//!
//! Layered resource → policy mappings with one generation per block-version
//! stratum.
//!
//! ```text
//!   Current (>= 2330)           V2320                 V220
//!   ┌──────────────┐      ┌──────────────────┐  ┌──────────────────┐
//!   │ latest       │      │ resource_2320    │  │ resource_220     │
//!   ├──────────────┤      │ exceptional_2320 │  │ exceptional_220  │
//!   │ tx_type      │      └──────────────────┘  └──────────────────┘
//!   │ msg_type     │
//!   │ sender       │
//!   │ resource     │
//!   └──────────────┘
//! ```
//!
//! A table is immutable once published; chain-config updates build a new
//! table and swap it in whole.

use crate::domain::defaults::{is_restrained, is_self_resource};
use crate::domain::errors::{AccessControlError, AccessControlResult};
use crate::domain::policy::{Policy, Rule};
use crate::domain::version::PolicyStratum;
use shared_types::ResourcePolicyConfig;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, warn};

/// One of the sibling mappings of a [`PolicyTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyMap {
    TxType,
    MsgType,
    Sender,
    Resource,
    Latest,
    Resource220,
    Exceptional220,
    Resource2320,
    Exceptional2320,
}

/// Resource policy tables of one provider.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    maps: HashMap<PolicyMap, HashMap<String, Policy>>,
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert into one mapping, replacing any previous entry.
    pub fn insert(&mut self, map: PolicyMap, resource: impl Into<String>, policy: Policy) {
        self.maps
            .entry(map)
            .or_default()
            .insert(resource.into(), policy);
    }

    fn get(&self, map: PolicyMap, resource: &str) -> Option<&Policy> {
        self.maps.get(&map).and_then(|entries| entries.get(resource))
    }

    pub fn remove(&mut self, map: PolicyMap, resource: &str) -> Option<Policy> {
        self.maps
            .get_mut(&map)
            .and_then(|entries| entries.remove(resource))
    }

    fn legacy_maps(stratum: PolicyStratum) -> Option<(PolicyMap, PolicyMap)> {
        match stratum {
            PolicyStratum::V220 => Some((PolicyMap::Resource220, PolicyMap::Exceptional220)),
            PolicyStratum::V2320 => Some((PolicyMap::Resource2320, PolicyMap::Exceptional2320)),
            PolicyStratum::Current => None,
        }
    }

    /// Historical lookup: resource map, then exceptional map.
    fn legacy_lookup(&self, stratum: PolicyStratum, resource: &str) -> Option<&Policy> {
        let (primary, exceptional) = Self::legacy_maps(stratum)?;
        self.get(primary, resource)
            .or_else(|| self.get(exceptional, resource))
    }

    fn current_lookup(&self, specific: PolicyMap, resource: &str) -> Option<&Policy> {
        self.get(PolicyMap::Latest, resource)
            .or_else(|| self.get(specific, resource))
    }

    // =========================================================================
    // LOOKUPS
    // =========================================================================

    /// Policy of a tx type. Absence is an error.
    pub fn tx_type_policy(&self, tx_type: &str, stratum: PolicyStratum) -> AccessControlResult<Policy> {
        let found = match stratum {
            PolicyStratum::Current => self.current_lookup(PolicyMap::TxType, tx_type),
            legacy => self.legacy_lookup(legacy, tx_type),
        };
        found
            .cloned()
            .ok_or_else(|| AccessControlError::PolicyNotFound(tx_type.to_string()))
    }

    /// Policy of an inter-node message class. Absence is an error.
    pub fn msg_type_policy(&self, msg_type: &str, stratum: PolicyStratum) -> AccessControlResult<Policy> {
        let found = match stratum {
            PolicyStratum::Current => self.current_lookup(PolicyMap::MsgType, msg_type),
            legacy => self.legacy_lookup(legacy, msg_type),
        };
        found
            .cloned()
            .ok_or_else(|| AccessControlError::PolicyNotFound(msg_type.to_string()))
    }

    /// Constraint on the transaction sender. Historical strata have none.
    ///
    /// Overrides in `latest` target endorsers and are not consulted here.
    pub fn sender_policy(&self, resource: &str, stratum: PolicyStratum) -> Option<Policy> {
        match stratum {
            PolicyStratum::Current => self.get(PolicyMap::Sender, resource).cloned(),
            _ => None,
        }
    }

    /// Endorsement policy of a resource.
    ///
    /// In the current stratum absence means "no endorser constraint"; in the
    /// historical strata absence from both maps is `PolicyNotFound`.
    pub fn resource_policy(
        &self,
        resource: &str,
        stratum: PolicyStratum,
    ) -> AccessControlResult<Option<Policy>> {
        match stratum {
            PolicyStratum::Current => Ok(self.current_lookup(PolicyMap::Resource, resource).cloned()),
            legacy => self
                .legacy_lookup(legacy, resource)
                .cloned()
                .map(Some)
                .ok_or_else(|| AccessControlError::PolicyNotFound(resource.to_string())),
        }
    }

    /// Any policy registered under `resource`, searching every mapping of
    /// the stratum.
    pub fn policy(&self, resource: &str, stratum: PolicyStratum) -> AccessControlResult<Policy> {
        let found = match stratum {
            PolicyStratum::Current => [
                PolicyMap::Latest,
                PolicyMap::Resource,
                PolicyMap::TxType,
                PolicyMap::MsgType,
                PolicyMap::Sender,
            ]
            .into_iter()
            .find_map(|map| self.get(map, resource)),
            legacy => self.legacy_lookup(legacy, resource),
        };
        found
            .cloned()
            .ok_or_else(|| AccessControlError::PolicyNotFound(resource.to_string()))
    }

    /// Effective endorsement policies of the current stratum, sorted by
    /// resource name.
    pub fn all_resource_policies(&self) -> Vec<(String, Policy)> {
        let mut merged: BTreeMap<String, Policy> = BTreeMap::new();
        for map in [PolicyMap::TxType, PolicyMap::MsgType, PolicyMap::Resource, PolicyMap::Latest] {
            if let Some(entries) = self.maps.get(&map) {
                merged.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        merged.into_iter().collect()
    }

    pub fn len(&self, map: PolicyMap) -> usize {
        self.maps.get(&map).map_or(0, HashMap::len)
    }

    // =========================================================================
    // CHAIN-CONFIG OVERRIDES
    // =========================================================================

    /// Apply resource-policy overrides from chain config.
    ///
    /// Rejected entries are logged and skipped. `DELETE` removes a prior
    /// override. Accepted overrides land in `latest` and in both historical
    /// resource maps. Returns the number of entries applied.
    pub fn install_overrides(
        &mut self,
        configs: &[ResourcePolicyConfig],
        known_orgs: &HashSet<String>,
    ) -> usize {
        let mut applied = 0;
        for config in configs {
            match self.install_override(config, known_orgs) {
                Ok(()) => applied += 1,
                Err(e) => warn!(
                    resource = %config.resource_name,
                    error = %e,
                    "Resource policy override skipped"
                ),
            }
        }
        applied
    }

    fn install_override(
        &mut self,
        config: &ResourcePolicyConfig,
        known_orgs: &HashSet<String>,
    ) -> AccessControlResult<()> {
        let resource = config.resource_name.as_str();
        if is_restrained(resource) {
            return Err(AccessControlError::ConfigurationError(format!(
                "policy of {resource} cannot be changed"
            )));
        }

        let policy = Policy::from_config(&config.policy)?;

        if !known_orgs.is_empty() {
            if let Some(unknown) = policy.org_list().iter().find(|org| !known_orgs.contains(*org)) {
                return Err(AccessControlError::ConfigurationError(format!(
                    "unknown organization '{unknown}' in org list"
                )));
            }
        }

        if policy.rule() == Rule::SelfOrg && !is_self_resource(resource) {
            return Err(AccessControlError::ConfigurationError(format!(
                "SELF is not applicable to {resource}"
            )));
        }

        let targets = [PolicyMap::Latest, PolicyMap::Resource220, PolicyMap::Resource2320];
        if policy.rule() == Rule::Delete {
            for map in targets {
                self.remove(map, resource);
            }
            info!(resource, "Resource policy override deleted");
        } else {
            for map in targets {
                self.insert(map, resource, policy.clone());
            }
            info!(resource, rule = %policy.rule(), "Resource policy override installed");
        }
        Ok(())
    }
}
