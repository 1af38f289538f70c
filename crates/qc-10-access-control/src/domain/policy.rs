//! # Policy Value Object
//!
//! An immutable `(rule, org_list, role_list)` triple. Empty lists leave the
//! corresponding dimension unconstrained.
//!
//! ## Invariants
//!
//! - A `MAJORITY` policy always ranges over `ADMIN` only.
//! - `DELETE` is a configuration instruction and is never evaluated.

use crate::domain::entities::Role;
use crate::domain::errors::{AccessControlError, AccessControlResult};
use shared_types::PolicyConfig;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Boolean function over a set of endorsements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// At least one valid endorsement.
    Any,
    /// Every organization in scope endorsed.
    All,
    /// Strictly more than half of the organizations endorsed.
    Majority,
    /// An admin of the target organization endorsed.
    SelfOrg,
    /// Never satisfied.
    Forbidden,
    /// Removes a configured override; never evaluated.
    Delete,
    /// At least `N` distinct organizations.
    Threshold(u32),
    /// At least `numerator/denominator` of the organizations in scope.
    Portion { numerator: u32, denominator: u32 },
}

impl Rule {
    /// Whether the rule counts organizations (as opposed to a fixed verdict).
    #[must_use]
    pub fn is_counting(&self) -> bool {
        !matches!(self, Self::SelfOrg | Self::Forbidden | Self::Delete)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("ANY"),
            Self::All => f.write_str("ALL"),
            Self::Majority => f.write_str("MAJORITY"),
            Self::SelfOrg => f.write_str("SELF"),
            Self::Forbidden => f.write_str("FORBIDDEN"),
            Self::Delete => f.write_str("DELETE"),
            Self::Threshold(n) => write!(f, "{n}"),
            Self::Portion {
                numerator,
                denominator,
            } => write!(f, "{numerator}/{denominator}"),
        }
    }
}

impl FromStr for Rule {
    type Err = AccessControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = |why: &str| {
            AccessControlError::ConfigurationError(format!("invalid rule '{raw}': {why}"))
        };

        match raw.to_ascii_uppercase().as_str() {
            "ANY" => return Ok(Self::Any),
            "ALL" => return Ok(Self::All),
            "MAJORITY" => return Ok(Self::Majority),
            "SELF" => return Ok(Self::SelfOrg),
            "FORBIDDEN" => return Ok(Self::Forbidden),
            "DELETE" => return Ok(Self::Delete),
            _ => {}
        }

        if let Some((num, den)) = raw.split_once('/') {
            let numerator: u32 = num
                .trim()
                .parse()
                .map_err(|_| invalid("numerator is not an integer"))?;
            let denominator: u32 = den
                .trim()
                .parse()
                .map_err(|_| invalid("denominator is not an integer"))?;
            if numerator == 0 || denominator == 0 {
                return Err(invalid("fraction must be positive"));
            }
            return Ok(Self::Portion {
                numerator,
                denominator,
            });
        }

        let n: u32 = raw.parse().map_err(|_| invalid("unsupported rule"))?;
        if n == 0 {
            return Err(invalid("threshold must be positive"));
        }
        Ok(Self::Threshold(n))
    }
}

/// Resource policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    rule: Rule,
    org_list: Vec<String>,
    role_list: Vec<Role>,
}

impl Policy {
    /// Build a policy. `MAJORITY` forces the role list to `[ADMIN]`.
    pub fn new(rule: Rule, org_list: Vec<String>, role_list: Vec<Role>) -> Self {
        let role_list = if rule == Rule::Majority {
            vec![Role::Admin]
        } else {
            role_list
        };
        Self {
            rule,
            org_list,
            role_list,
        }
    }

    /// Policy with no org constraint.
    pub fn with_roles(rule: Rule, role_list: &[Role]) -> Self {
        Self::new(rule, Vec::new(), role_list.to_vec())
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    pub fn org_list(&self) -> &[String] {
        &self.org_list
    }

    pub fn role_list(&self) -> &[Role] {
        &self.role_list
    }

    /// Whether `org_id` falls within the org dimension.
    pub fn covers_org(&self, org_id: &str) -> bool {
        self.org_list.is_empty() || self.org_list.iter().any(|org| org == org_id)
    }

    /// Whether `role` falls within the role dimension.
    pub fn covers_role(&self, role: Role) -> bool {
        self.role_list.is_empty() || self.role_list.contains(&role)
    }

    /// Parse a configured policy.
    ///
    /// Rejects unsupported rule strings, unknown roles, duplicate
    /// organizations and non-admin roles under `MAJORITY`. Org existence
    /// and `SELF` scope are checked by the policy table, which knows the
    /// chain's organizations.
    pub fn from_config(config: &PolicyConfig) -> AccessControlResult<Self> {
        let rule: Rule = config.rule.parse()?;

        let mut seen = HashSet::new();
        for org in &config.org_list {
            if !seen.insert(org.as_str()) {
                return Err(AccessControlError::ConfigurationError(format!(
                    "duplicate organization '{org}' in org list"
                )));
            }
        }

        let role_list = config
            .role_list
            .iter()
            .map(|role| role.parse::<Role>())
            .collect::<AccessControlResult<Vec<_>>>()?;

        if rule == Rule::Majority && role_list.iter().any(|role| *role != Role::Admin) {
            return Err(AccessControlError::ConfigurationError(
                "MAJORITY only supports the ADMIN role".to_string(),
            ));
        }

        Ok(Self::new(rule, config.org_list.clone(), role_list))
    }

    /// Configuration form of this policy.
    pub fn to_config(&self) -> PolicyConfig {
        PolicyConfig {
            rule: self.rule.to_string(),
            org_list: self.org_list.clone(),
            role_list: self
                .role_list
                .iter()
                .map(|role| role.as_str().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Human readable org/role scope, used in shortfall messages.
    pub fn scope_description(&self) -> String {
        let roles: Vec<&str> = self.role_list.iter().map(Role::as_str).collect();
        match (self.org_list.is_empty(), roles.is_empty()) {
            (true, true) => String::new(),
            (true, false) => format!("role list [{}]", roles.join(", ")),
            (false, true) => format!("org list [{}]", self.org_list.join(", ")),
            (false, false) => format!(
                "org list [{}], role list [{}]",
                self.org_list.join(", "),
                roles.join(", ")
            ),
        }
    }
}
