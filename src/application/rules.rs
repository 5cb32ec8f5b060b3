//! Rule matching: first full match over the ordered response-rule list.
//!
//! A data-driven interpreter over criteria, not per-rule dispatch code. The
//! matcher itself does not enforce catch-all placement; that is validated at
//! config load time, so `NoMatchingRule` is a configuration defect if it
//! ever surfaces here.

use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Profile, ResponseRule};

/// Find the first rule whose criteria all hold for the profile.
///
/// Deterministic: the same profile and rule list always select the same
/// index. Reordering rules changes only which of several matching rules
/// wins, never whether an individual rule matches.
pub fn match_rule<'a>(
    rules: &'a [ResponseRule],
    profile: &Profile,
    reasoning_requested: bool,
) -> DomainResult<(usize, &'a ResponseRule)> {
    for (index, rule) in rules.iter().enumerate() {
        if rule.criteria.matches(profile, reasoning_requested) {
            debug!(index, rule = %rule.name, "Response rule matched");
            return Ok((index, rule));
        }
    }
    Err(DomainError::NoMatchingRule)
}
