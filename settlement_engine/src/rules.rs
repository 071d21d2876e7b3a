//! Commission rule resolution.
//!
//! Rule rows come from the rule administration collaborator and are read-only here. Selection is
//! a pure function so that precedence is deterministic and unit-testable: scope Product beats
//! Category beats Global; within a scope, a rule pinned to the partner's level beats a
//! level-agnostic rule; any remaining tie breaks on the lowest rule id.

use csl_common::Money;

use crate::db_types::{CommissionRule, Order, PartnerLevel};

/// The outcome of resolving a rule against an order: the winning rule and the amount it yields.
#[derive(Debug, Clone)]
pub struct ResolvedCommission {
    pub rule: CommissionRule,
    pub amount: Money,
}

/// Returns true if the rule applies to an order with the given product and category ids.
fn rule_matches(rule: &CommissionRule, product_ids: &[String], category_ids: &[String]) -> bool {
    if !rule.active {
        return false;
    }
    match rule.scope {
        crate::db_types::RuleScope::Global => true,
        crate::db_types::RuleScope::Product => {
            rule.scope_id.as_ref().map(|id| product_ids.contains(id)).unwrap_or(false)
        },
        crate::db_types::RuleScope::Category => {
            rule.scope_id.as_ref().map(|id| category_ids.contains(id)).unwrap_or(false)
        },
    }
}

/// Selects the single applicable rule, or `None` if nothing matches. A `None` here is a valid,
/// non-error outcome: the order simply earns no commission.
pub fn select_rule<'a>(
    rules: &'a [CommissionRule],
    product_ids: &[String],
    category_ids: &[String],
    partner_level: PartnerLevel,
) -> Option<&'a CommissionRule> {
    rules
        .iter()
        .filter(|r| rule_matches(r, product_ids, category_ids))
        .filter(|r| r.partner_level.is_none() || r.partner_level == Some(partner_level))
        .min_by_key(|r| {
            // Lower key wins: scope rank inverted, level-specific before level-agnostic, then id.
            let level_rank = if r.partner_level.is_some() { 0 } else { 1 };
            (std::cmp::Reverse(r.scope.rank()), level_rank, r.id)
        })
}

/// Resolves the commission for an order: picks the winning rule and computes the amount from the
/// order's net total. Returns `None` when no rule matches or the computed amount is zero.
pub fn resolve(
    rules: &[CommissionRule],
    order: &Order,
    product_ids: &[String],
    category_ids: &[String],
    partner_level: PartnerLevel,
) -> Option<ResolvedCommission> {
    let rule = select_rule(rules, product_ids, category_ids, partner_level)?;
    let amount = rule.amount_for(order.net_total());
    if amount.is_zero() {
        return None;
    }
    Some(ResolvedCommission { rule: rule.clone(), amount })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::RuleScope;

    fn rule(id: i64, scope: RuleScope, scope_id: Option<&str>, level: Option<PartnerLevel>) -> CommissionRule {
        CommissionRule {
            id,
            scope,
            scope_id: scope_id.map(String::from),
            partner_level: level,
            percent: Some(10.0),
            fixed_amount: None,
            active: true,
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn product_scope_beats_category_and_global() {
        let rules = vec![
            rule(1, RuleScope::Global, None, None),
            rule(2, RuleScope::Category, Some("cat-1"), None),
            rule(3, RuleScope::Product, Some("prod-1"), None),
        ];
        let winner =
            select_rule(&rules, &ids(&["prod-1"]), &ids(&["cat-1"]), PartnerLevel::Affiliate).unwrap();
        assert_eq!(winner.id, 3);
    }

    #[test]
    fn category_scope_beats_global() {
        let rules = vec![rule(1, RuleScope::Global, None, None), rule(2, RuleScope::Category, Some("cat-1"), None)];
        let winner = select_rule(&rules, &ids(&["prod-9"]), &ids(&["cat-1"]), PartnerLevel::Affiliate).unwrap();
        assert_eq!(winner.id, 2);
    }

    #[test]
    fn scoped_rule_for_other_products_does_not_match() {
        let rules = vec![rule(1, RuleScope::Product, Some("prod-1"), None), rule(2, RuleScope::Global, None, None)];
        let winner = select_rule(&rules, &ids(&["prod-2"]), &[], PartnerLevel::Affiliate).unwrap();
        assert_eq!(winner.id, 2);
    }

    #[test]
    fn level_specific_rule_beats_level_agnostic_within_scope() {
        let rules = vec![
            rule(1, RuleScope::Global, None, None),
            rule(2, RuleScope::Global, None, Some(PartnerLevel::Agent)),
        ];
        let winner = select_rule(&rules, &[], &[], PartnerLevel::Agent).unwrap();
        assert_eq!(winner.id, 2);
        // ... but only for partners at that level.
        let winner = select_rule(&rules, &[], &[], PartnerLevel::Affiliate).unwrap();
        assert_eq!(winner.id, 1);
    }

    #[test]
    fn level_filter_never_outranks_scope() {
        let rules = vec![
            rule(1, RuleScope::Product, Some("prod-1"), None),
            rule(2, RuleScope::Global, None, Some(PartnerLevel::Leader)),
        ];
        let winner = select_rule(&rules, &ids(&["prod-1"]), &[], PartnerLevel::Leader).unwrap();
        assert_eq!(winner.id, 1);
    }

    #[test]
    fn remaining_ties_break_on_lowest_id() {
        let rules = vec![rule(7, RuleScope::Global, None, None), rule(3, RuleScope::Global, None, None)];
        let winner = select_rule(&rules, &[], &[], PartnerLevel::Affiliate).unwrap();
        assert_eq!(winner.id, 3);
    }

    #[test]
    fn inactive_rules_are_invisible() {
        let mut r = rule(1, RuleScope::Global, None, None);
        r.active = false;
        assert!(select_rule(&[r], &[], &[], PartnerLevel::Affiliate).is_none());
    }

    #[test]
    fn no_match_is_a_valid_outcome() {
        let rules = vec![rule(1, RuleScope::Product, Some("prod-1"), None)];
        assert!(select_rule(&rules, &ids(&["prod-2"]), &[], PartnerLevel::Affiliate).is_none());
    }
}
