//! # Promotion Engine
//!
//! Validates a discount code against a candidate order and computes the
//! discount amount. Stateless: the caller supplies the code definition,
//! the order's lines, and the usage counters it read inside its own
//! transaction; this module only decides and computes.
//!
//! ## Validation Order
//! ```text
//! inactive? ──► window excludes now? ──► below minimum? ──► scope miss?
//!      ──► global cap reached? ──► per-customer cap reached? ──► amount
//! ```
//! The first failing check wins; the whole order is aborted by the caller
//! on any rejection.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, RateBps};
use crate::types::{DiscountCode, DiscountScope, RateKind};

/// The slice of an order line the engine needs for scope matching.
#[derive(Debug, Clone)]
pub struct PromotionLine {
    pub product_id: Option<String>,
    pub category_id: Option<String>,
    pub subtotal_cents: i64,
}

/// Usage counters for one code, read by the caller in the same
/// transaction that will record the new use.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeUsage {
    /// Total recorded uses of the code.
    pub total_uses: i64,
    /// Uses by this customer (0 when the order carries no customer key).
    pub customer_uses: i64,
}

/// Validates `code` against the order and returns the discount amount.
///
/// Guarantees `0 ≤ discount ≤ subtotal` on success:
/// - `percentage`: `subtotal × value bps`, rounded half-up, capped at
///   `max_discount_cents` when configured
/// - `fixed`: `min(value, subtotal)`
pub fn validate_code(
    code: &DiscountCode,
    subtotal: Money,
    lines: &[PromotionLine],
    usage: CodeUsage,
    now: DateTime<Utc>,
) -> CoreResult<Money> {
    if !code.is_active {
        return Err(CoreError::CodeInactive(code.code.clone()));
    }

    let before_window = code.valid_from.is_some_and(|from| now < from);
    let after_window = code.valid_until.is_some_and(|until| now > until);
    if before_window || after_window {
        return Err(CoreError::CodeExpired(code.code.clone()));
    }

    if let Some(minimum) = code.min_purchase_cents {
        if subtotal.cents() < minimum {
            return Err(CoreError::BelowMinimum {
                code: code.code.clone(),
                minimum_cents: minimum,
                subtotal_cents: subtotal.cents(),
            });
        }
    }

    if !scope_matches(code, lines) {
        return Err(CoreError::ScopeMismatch(code.code.clone()));
    }

    if let Some(cap) = code.max_uses {
        if usage.total_uses >= cap {
            return Err(CoreError::UsageExhausted(code.code.clone()));
        }
    }

    if let Some(cap) = code.max_uses_per_customer {
        if usage.customer_uses >= cap {
            return Err(CoreError::PerCustomerLimitReached(code.code.clone()));
        }
    }

    let amount = match code.kind {
        RateKind::Percentage => {
            let raw = RateBps::from_bps_i64(code.value).apply(subtotal);
            match code.max_discount_cents {
                Some(cap) => raw.min(Money::from_cents(cap)),
                None => raw,
            }
        }
        RateKind::Fixed => Money::from_cents(code.value).min(subtotal),
    };

    // The checks above cannot produce a negative amount, but the bound is
    // part of the engine's contract, so enforce it here too.
    Ok(amount.clamp_non_negative().min(subtotal))
}

/// Scope test: `all` always matches; `category`/`product` match when at
/// least one line falls under the code's reference set.
fn scope_matches(code: &DiscountCode, lines: &[PromotionLine]) -> bool {
    match code.scope {
        DiscountScope::All => true,
        DiscountScope::Category => lines.iter().any(|l| {
            l.category_id
                .as_deref()
                .is_some_and(|c| code.reference_ids.iter().any(|r| r == c))
        }),
        DiscountScope::Product => lines.iter().any(|l| {
            l.product_id
                .as_deref()
                .is_some_and(|p| code.reference_ids.iter().any(|r| r == p))
        }),
    }
}
