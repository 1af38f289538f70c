//! # Multi-Sign Progression
//!
//! Folds the votes of a multi-sign proposal against the resource policy.
//!
//! ```text
//! PROCESSING ──(agree satisfies policy)──────────→ PASSED
//!      │
//!      └────(reject satisfies dual policy)───────→ REFUSED
//! ```
//!
//! The dual of a rule is what rejections must reach before the policy can
//! no longer be satisfied: `ANY` ↔ `ALL`, and `MAJORITY` refuses once half
//! of the voter base rejected, which settles even-sized deadlocks.

use crate::domain::errors::{AccessControlError, AccessControlResult};
use crate::domain::evaluator::{distinct_count, evaluate, valid_endorsers, voter_base, EvaluationContext};
use crate::domain::member::ResolvedMember;
use crate::domain::policy::{Policy, Rule};
use shared_types::MultiSignStatus;
use std::sync::Arc;

/// Fail unless `rule` can be collected through multi-sign.
pub fn ensure_supported(resource: &str, policy: &Policy) -> AccessControlResult<()> {
    if policy.rule().is_counting() {
        Ok(())
    } else {
        Err(AccessControlError::RuleNotSupportedByMultiSign {
            resource: resource.to_string(),
            rule: policy.rule().to_string(),
        })
    }
}

/// Whether the rejections make the policy unreachable.
fn refused(policy: &Policy, rejecters: &[Arc<ResolvedMember>], ctx: &EvaluationContext<'_>) -> bool {
    let rejected = distinct_count(valid_endorsers(policy, rejecters), ctx.counting);
    if rejected == 0 {
        return false;
    }
    let base = voter_base(policy, ctx);
    match policy.rule() {
        Rule::Any => rejected >= base,
        Rule::All => true,
        Rule::Majority => rejected * 2 >= ctx.org_count,
        Rule::Threshold(n) => base.saturating_sub(rejected) < n as usize,
        Rule::Portion {
            numerator,
            denominator,
        } => base.saturating_sub(rejected) * (denominator as usize) < base * (numerator as usize),
        Rule::SelfOrg | Rule::Forbidden | Rule::Delete => false,
    }
}

/// Next status of a proposal.
///
/// Terminal statuses are final: asking again is an error.
pub fn progress(
    status: MultiSignStatus,
    policy: &Policy,
    agreed: &[Arc<ResolvedMember>],
    rejected: &[Arc<ResolvedMember>],
    ctx: &EvaluationContext<'_>,
) -> AccessControlResult<MultiSignStatus> {
    if status.is_terminal() {
        return Err(AccessControlError::MultiSignFinished(status));
    }
    ensure_supported(ctx.resource, policy)?;

    if !agreed.is_empty() && evaluate(policy, agreed, ctx).is_ok() {
        return Ok(MultiSignStatus::Passed);
    }
    if refused(policy, rejected, ctx) {
        return Ok(MultiSignStatus::Refused);
    }
    Ok(MultiSignStatus::Processing)
}
