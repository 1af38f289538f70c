//! # Rule Evaluator
//!
//! Decides whether a refined endorsement set satisfies a policy.
//!
//! ## Counting
//!
//! Endorsements are counted per organization: several endorsements from one
//! organization count once. Public chains have no organizations and count
//! distinct admins instead. Ties favor acceptance except for `MAJORITY`,
//! which is strict.

use crate::domain::entities::Role;
use crate::domain::errors::{AccessControlError, AccessControlResult};
use crate::domain::member::ResolvedMember;
use crate::domain::policy::{Policy, Rule};
use std::collections::HashSet;
use std::sync::Arc;

/// What one unit of endorsement is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountingMode {
    /// Distinct organizations.
    PerOrganization,
    /// Distinct members (public chains).
    PerMember,
}

/// Chain facts the evaluator needs besides the policy.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Resource name, for error messages.
    pub resource: &'a str,
    /// Chain-wide organization count (admin count on public chains).
    pub org_count: usize,
    pub counting: CountingMode,
    /// Historical `MAJORITY`: an endorser outside the role list fails the check.
    pub strict_majority: bool,
    /// Organization a `SELF` rule targets.
    pub target_org: Option<&'a str>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(resource: &'a str, org_count: usize, counting: CountingMode) -> Self {
        Self {
            resource,
            org_count,
            counting,
            strict_majority: false,
            target_org: None,
        }
    }

    #[must_use]
    pub fn with_target_org(mut self, target_org: Option<&'a str>) -> Self {
        self.target_org = target_org;
        self
    }

    #[must_use]
    pub fn with_strict_majority(mut self, strict: bool) -> Self {
        self.strict_majority = strict;
        self
    }
}

/// Number of distinct endorsing units.
pub fn distinct_count<'m>(
    members: impl IntoIterator<Item = &'m ResolvedMember>,
    counting: CountingMode,
) -> usize {
    let units: HashSet<&str> = members
        .into_iter()
        .map(|member| match counting {
            CountingMode::PerOrganization => member.org_id(),
            CountingMode::PerMember => member.uid(),
        })
        .collect();
    units.len()
}

/// Size of the voter base a counting rule ranges over.
#[must_use]
pub fn voter_base(policy: &Policy, ctx: &EvaluationContext<'_>) -> usize {
    match ctx.counting {
        CountingMode::PerOrganization if !policy.org_list().is_empty() => policy.org_list().len(),
        _ => ctx.org_count,
    }
}

/// Minimum number of distinct units a counting rule needs.
#[must_use]
pub fn required_count(policy: &Policy, ctx: &EvaluationContext<'_>) -> usize {
    let base = voter_base(policy, ctx);
    let required = match policy.rule() {
        Rule::Any => 1,
        Rule::All => base,
        Rule::Majority => ctx.org_count / 2 + 1,
        Rule::Threshold(n) => n as usize,
        Rule::Portion {
            numerator,
            denominator,
        } => (base * numerator as usize).div_ceil(denominator as usize),
        Rule::SelfOrg | Rule::Forbidden | Rule::Delete => 1,
    };
    required.max(1)
}

/// Endorsers inside the policy's org and role dimensions.
pub fn valid_endorsers<'m>(
    policy: &'m Policy,
    endorsers: &'m [Arc<ResolvedMember>],
) -> impl Iterator<Item = &'m ResolvedMember> + 'm {
    endorsers
        .iter()
        .map(Arc::as_ref)
        .filter(move |member| policy.covers_org(member.org_id()) && policy.covers_role(member.role()))
}

/// Evaluate `policy` over refined endorsers.
pub fn evaluate(
    policy: &Policy,
    endorsers: &[Arc<ResolvedMember>],
    ctx: &EvaluationContext<'_>,
) -> AccessControlResult<()> {
    let rule = policy.rule();

    if endorsers.is_empty() {
        return Err(AccessControlError::unsatisfied(
            ctx.resource,
            rule,
            required_count(policy, ctx),
            0,
            policy.scope_description(),
        ));
    }

    match rule {
        Rule::Forbidden => {
            return Err(AccessControlError::Forbidden(ctx.resource.to_string()));
        }
        Rule::Delete => {
            return Err(AccessControlError::ConfigurationError(format!(
                "DELETE policy registered for {}",
                ctx.resource
            )));
        }
        Rule::SelfOrg => return evaluate_self(endorsers, ctx),
        _ => {}
    }

    check_strict_roles(policy, endorsers, ctx)?;

    let received = distinct_count(valid_endorsers(policy, endorsers), ctx.counting);
    let required = required_count(policy, ctx);
    if received >= required {
        Ok(())
    } else {
        Err(AccessControlError::unsatisfied(
            ctx.resource,
            rule,
            required,
            received,
            policy.scope_description(),
        ))
    }
}

/// Historical `MAJORITY`: every endorser must hold a listed role.
///
/// A no-op for other rules and for the current stratum.
pub fn check_strict_roles(
    policy: &Policy,
    endorsers: &[Arc<ResolvedMember>],
    ctx: &EvaluationContext<'_>,
) -> AccessControlResult<()> {
    if policy.rule() != Rule::Majority || !ctx.strict_majority {
        return Ok(());
    }
    let Some(outsider) = endorsers.iter().find(|member| !policy.covers_role(member.role())) else {
        return Ok(());
    };
    Err(AccessControlError::unsatisfied(
        ctx.resource,
        Rule::Majority,
        required_count(policy, ctx),
        distinct_count(valid_endorsers(policy, endorsers), ctx.counting),
        format!(
            "endorser {} has role {} outside {}",
            outsider.member_id(),
            outsider.role(),
            policy.scope_description()
        ),
    ))
}

fn evaluate_self(endorsers: &[Arc<ResolvedMember>], ctx: &EvaluationContext<'_>) -> AccessControlResult<()> {
    let Some(target) = ctx.target_org else {
        return Err(AccessControlError::unsatisfied(
            ctx.resource,
            Rule::SelfOrg,
            1,
            0,
            "no target organization",
        ));
    };

    let accepted = endorsers
        .iter()
        .any(|member| member.org_id() == target && member.role() == Role::Admin);
    if accepted {
        Ok(())
    } else {
        Err(AccessControlError::unsatisfied(
            ctx.resource,
            Rule::SelfOrg,
            1,
            0,
            format!("ADMIN of {target}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{TestKey, TestSigner};
    use shared_types::HashType;

    fn member(org: &str, role: Role) -> Arc<ResolvedMember> {
        let key = TestKey::generate(org);
        Arc::new(
            ResolvedMember::from_public_key(key.member(), org, role, key.public_key(), HashType::Sha256)
                .unwrap(),
        )
    }

    fn ctx(org_count: usize) -> EvaluationContext<'static> {
        EvaluationContext::new("R", org_count, CountingMode::PerOrganization)
    }

    fn admins(orgs: &[&str]) -> Vec<Arc<ResolvedMember>> {
        orgs.iter().map(|org| member(org, Role::Admin)).collect()
    }

    #[test]
    fn test_empty_endorsements_reject() {
        let policy = Policy::with_roles(Rule::Any, &[]);
        assert!(matches!(
            evaluate(&policy, &[], &ctx(4)),
            Err(AccessControlError::PolicyUnsatisfied { received: 0, .. })
        ));
    }

    #[test]
    fn test_any_unconstrained_accepts_single() {
        let policy = Policy::with_roles(Rule::Any, &[]);
        assert!(evaluate(&policy, &[member("org1", Role::Client)], &ctx(4)).is_ok());
    }

    #[test]
    fn test_any_role_mismatch_names_role() {
        let policy = Policy::with_roles(Rule::Any, &[Role::Admin]);
        let err = evaluate(&policy, &[member("org1", Role::Client)], &ctx(4)).unwrap_err();
        assert!(err.to_string().contains("ADMIN"));
    }

    #[test]
    fn test_majority_is_strict() {
        let policy = Policy::with_roles(Rule::Majority, &[Role::Admin]);
        assert!(evaluate(&policy, &admins(&["org1", "org2"]), &ctx(4)).is_err());
        assert!(evaluate(&policy, &admins(&["org1", "org2", "org3"]), &ctx(4)).is_ok());
    }

    #[test]
    fn test_majority_counts_orgs_not_endorsements() {
        let policy = Policy::with_roles(Rule::Majority, &[Role::Admin]);
        let same_org = admins(&["org1", "org1", "org1"]);
        assert!(evaluate(&policy, &same_org, &ctx(4)).is_err());
    }

    #[test]
    fn test_strict_majority_rejects_outsider() {
        let policy = Policy::with_roles(Rule::Majority, &[Role::Admin]);
        let mut endorsers = admins(&["org1", "org2", "org3"]);
        endorsers.push(member("org4", Role::Client));

        assert!(evaluate(&policy, &endorsers, &ctx(4)).is_ok());
        assert!(evaluate(&policy, &endorsers, &ctx(4).with_strict_majority(true)).is_err());
        assert!(evaluate(&policy, &admins(&["org1", "org2", "org3", "org4"]), &ctx(4).with_strict_majority(true)).is_ok());
    }

    #[test]
    fn test_strict_majority_reports_counted_orgs() {
        let policy = Policy::with_roles(Rule::Majority, &[Role::Admin]);
        let mut endorsers = admins(&["org1", "org2"]);
        endorsers.push(member("org3", Role::Client));

        let err = evaluate(&policy, &endorsers, &ctx(4).with_strict_majority(true)).unwrap_err();
        assert!(matches!(
            err,
            AccessControlError::PolicyUnsatisfied {
                required: 3,
                received: 2,
                ..
            }
        ));
        assert!(check_strict_roles(&policy, &endorsers, &ctx(4)).is_ok());
    }

    #[test]
    fn test_all_uses_org_list_or_chain_count() {
        let scoped = Policy::new(Rule::All, vec!["org1".into(), "org2".into()], vec![]);
        assert!(evaluate(&scoped, &admins(&["org1", "org2"]), &ctx(4)).is_ok());
        assert!(evaluate(&scoped, &admins(&["org1", "org3"]), &ctx(4)).is_err());

        let chain_wide = Policy::with_roles(Rule::All, &[]);
        assert!(evaluate(&chain_wide, &admins(&["org1", "org2", "org3"]), &ctx(4)).is_err());
        assert!(evaluate(&chain_wide, &admins(&["org1", "org2", "org3", "org4"]), &ctx(4)).is_ok());
    }

    #[test]
    fn test_threshold_and_portion() {
        let two = Policy::with_roles(Rule::Threshold(2), &[]);
        assert!(evaluate(&two, &admins(&["org1"]), &ctx(4)).is_err());
        assert!(evaluate(&two, &admins(&["org1", "org2"]), &ctx(4)).is_ok());

        let half = Policy::with_roles(
            Rule::Portion {
                numerator: 1,
                denominator: 2,
            },
            &[],
        );
        assert!(evaluate(&half, &admins(&["org1"]), &ctx(4)).is_err());
        assert!(evaluate(&half, &admins(&["org1", "org2"]), &ctx(4)).is_ok());

        let two_thirds = Policy::with_roles(
            Rule::Portion {
                numerator: 2,
                denominator: 3,
            },
            &[],
        );
        assert_eq!(required_count(&two_thirds, &ctx(4)), 3);
    }

    #[test]
    fn test_self_scope() {
        let policy = Policy::with_roles(Rule::SelfOrg, &[Role::Admin]);
        let endorsers = admins(&["org1"]);
        assert!(evaluate(&policy, &endorsers, &ctx(4).with_target_org(Some("org1"))).is_ok());
        assert!(evaluate(&policy, &endorsers, &ctx(4).with_target_org(Some("org2"))).is_err());
        assert!(evaluate(&policy, &endorsers, &ctx(4)).is_err());

        let client = [member("org1", Role::Client)];
        assert!(evaluate(&policy, &client, &ctx(4).with_target_org(Some("org1"))).is_err());
    }

    #[test]
    fn test_forbidden() {
        let policy = Policy::with_roles(Rule::Forbidden, &[]);
        assert!(matches!(
            evaluate(&policy, &admins(&["org1"]), &ctx(1)),
            Err(AccessControlError::Forbidden(_))
        ));
    }

    #[test]
    fn test_per_member_counting() {
        let policy = Policy::with_roles(Rule::Majority, &[Role::Admin]);
        let public = |n| EvaluationContext::new("R", n, CountingMode::PerMember);
        let endorsers = admins(&["public", "public"]);
        assert!(evaluate(&policy, &endorsers, &public(3)).is_ok());
        assert!(evaluate(&policy, &endorsers, &public(4)).is_err());
    }

    #[test]
    fn test_deterministic() {
        let policy = Policy::with_roles(Rule::Threshold(2), &[Role::Admin]);
        let endorsers = admins(&["org1", "org2"]);
        let first = evaluate(&policy, &endorsers, &ctx(4));
        for _ in 0..10 {
            assert_eq!(evaluate(&policy, &endorsers, &ctx(4)), first);
        }
    }
}
