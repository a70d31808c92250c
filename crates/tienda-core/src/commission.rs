//! # Commission Engine
//!
//! Matches completed sales against commission rules and accrues amounts
//! into per-vendor summaries. Read-mostly: computed on demand over a sale
//! set, nothing is persisted.
//!
//! Multiple matching rules on one sale ALL accrue - there is no mutual
//! exclusion between rules. That is the contract, not an accident.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::money::{Money, RateBps};
use crate::types::{CommissionRule, CommissionScope, RateKind};

/// The slice of a completed sale the engine needs.
#[derive(Debug, Clone)]
pub struct CommissionSale {
    pub sale_id: String,
    pub actor_id: String,
    pub total_cents: i64,
    pub completed_at: DateTime<Utc>,
    pub lines: Vec<CommissionLine>,
}

/// Line-level scope data (product/category of the sold variant).
#[derive(Debug, Clone)]
pub struct CommissionLine {
    pub product_id: Option<String>,
    pub category_id: Option<String>,
}

/// Accrued totals for one vendor.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct VendorSummary {
    pub actor_id: String,
    /// Sales counted once, regardless of how many rules matched each.
    pub sale_count: i64,
    pub total_sold_cents: i64,
    pub commission_cents: i64,
}

/// Runs every active rule over every sale and accrues the matches.
///
/// A rule matches when its active window contains the sale date and its
/// scope matches (`all` always; `employee` against the sale's actor;
/// `category`/`product` when any line belongs to the reference).
/// Percentage rules accrue `total × value bps`; fixed rules accrue a flat
/// `value` per matching sale. Summaries come back ordered by actor id.
pub fn accrue(sales: &[CommissionSale], rules: &[CommissionRule]) -> Vec<VendorSummary> {
    let mut by_actor: BTreeMap<String, VendorSummary> = BTreeMap::new();

    for sale in sales {
        let entry = by_actor
            .entry(sale.actor_id.clone())
            .or_insert_with(|| VendorSummary {
                actor_id: sale.actor_id.clone(),
                sale_count: 0,
                total_sold_cents: 0,
                commission_cents: 0,
            });
        entry.sale_count += 1;
        entry.total_sold_cents += sale.total_cents;

        for rule in rules {
            if !rule_applies(rule, sale) {
                continue;
            }
            let amount = match rule.kind {
                RateKind::Percentage => {
                    RateBps::from_bps_i64(rule.value).apply(Money::from_cents(sale.total_cents))
                }
                RateKind::Fixed => Money::from_cents(rule.value),
            };
            entry.commission_cents += amount.cents();
        }
    }

    by_actor.into_values().collect()
}

fn rule_applies(rule: &CommissionRule, sale: &CommissionSale) -> bool {
    if !rule.is_active {
        return false;
    }
    if rule.valid_from.is_some_and(|from| sale.completed_at < from) {
        return false;
    }
    if rule.valid_until.is_some_and(|until| sale.completed_at > until) {
        return false;
    }

    match rule.scope {
        CommissionScope::All => true,
        CommissionScope::Employee => rule.reference_id.as_deref() == Some(sale.actor_id.as_str()),
        CommissionScope::Category => sale.lines.iter().any(|l| {
            l.category_id.as_deref().is_some() && l.category_id.as_deref() == rule.reference_id.as_deref()
        }),
        CommissionScope::Product => sale.lines.iter().any(|l| {
            l.product_id.as_deref().is_some() && l.product_id.as_deref() == rule.reference_id.as_deref()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(kind: RateKind, value: i64, scope: CommissionScope, reference: Option<&str>) -> CommissionRule {
        CommissionRule {
            id: uuid::Uuid::new_v4().to_string(),
            name: "regla".into(),
            kind,
            value,
            scope,
            reference_id: reference.map(str::to_string),
            valid_from: None,
            valid_until: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn sale(actor: &str, total: i64) -> CommissionSale {
        CommissionSale {
            sale_id: uuid::Uuid::new_v4().to_string(),
            actor_id: actor.into(),
            total_cents: total,
            completed_at: Utc::now(),
            lines: vec![CommissionLine {
                product_id: Some("p1".into()),
                category_id: Some("ropa".into()),
            }],
        }
    }

    #[test]
    fn percentage_and_fixed_accrual() {
        let sales = vec![sale("ana", 100_000)];
        let rules = vec![rule(RateKind::Percentage, 500, CommissionScope::All, None)];
        let summaries = accrue(&sales, &rules);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].commission_cents, 5_000); // 5% of $1000

        let rules = vec![rule(RateKind::Fixed, 1_500, CommissionScope::All, None)];
        let summaries = accrue(&sales, &rules);
        assert_eq!(summaries[0].commission_cents, 1_500);
    }

    #[test]
    fn two_matching_rules_are_additive() {
        // If two independent rules both match one sale, the sale's
        // contribution equals the sum of each rule's own contribution.
        let sales = vec![sale("ana", 50_000)];
        let pct = rule(RateKind::Percentage, 1000, CommissionScope::All, None);
        let fixed = rule(RateKind::Fixed, 700, CommissionScope::Employee, Some("ana"));

        let only_pct = accrue(&sales, std::slice::from_ref(&pct))[0].commission_cents;
        let only_fixed = accrue(&sales, std::slice::from_ref(&fixed))[0].commission_cents;
        let both = accrue(&sales, &[pct, fixed])[0].commission_cents;

        assert_eq!(both, only_pct + only_fixed);
    }

    #[test]
    fn scope_filters_apply() {
        let sales = vec![sale("ana", 10_000), sale("benito", 20_000)];

        // Employee scope only accrues for the referenced actor.
        let rules = vec![rule(RateKind::Fixed, 100, CommissionScope::Employee, Some("benito"))];
        let summaries = accrue(&sales, &rules);
        let ana = summaries.iter().find(|s| s.actor_id == "ana").unwrap();
        let benito = summaries.iter().find(|s| s.actor_id == "benito").unwrap();
        assert_eq!(ana.commission_cents, 0);
        assert_eq!(benito.commission_cents, 100);

        // Category scope matches through the lines.
        let rules = vec![rule(RateKind::Fixed, 100, CommissionScope::Category, Some("calzado"))];
        assert!(accrue(&sales, &rules).iter().all(|s| s.commission_cents == 0));
        let rules = vec![rule(RateKind::Fixed, 100, CommissionScope::Category, Some("ropa"))];
        assert!(accrue(&sales, &rules).iter().all(|s| s.commission_cents == 100));
    }

    #[test]
    fn window_excludes_out_of_range_sales() {
        let mut s = sale("ana", 10_000);
        s.completed_at = Utc::now() - chrono::Duration::days(30);
        let mut r = rule(RateKind::Fixed, 100, CommissionScope::All, None);
        r.valid_from = Some(Utc::now() - chrono::Duration::days(7));
        let summaries = accrue(&[s], &[r]);
        assert_eq!(summaries[0].commission_cents, 0);
        // The sale itself is still counted in the vendor totals.
        assert_eq!(summaries[0].sale_count, 1);
    }
}
