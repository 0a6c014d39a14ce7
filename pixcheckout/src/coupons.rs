//! Coupon eligibility and discount calculation.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::db::models::coupons::{Coupon, CouponType};
use crate::types::ProductId;

/// A coupon that passed validation, with the discount it grants on the given amount.
#[derive(Debug, Clone)]
pub struct AppliedCoupon {
    pub coupon: Coupon,
    pub discount: Decimal,
}

fn brl(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Discount for `amount`, rounded to cents. Fixed discounts never exceed the amount.
pub fn calculate_discount(coupon_type: CouponType, value: Decimal, amount: Decimal) -> Decimal {
    let discount = match coupon_type {
        CouponType::Percentage => amount * value / Decimal::ONE_HUNDRED,
        CouponType::Fixed => value.min(amount),
    };
    discount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Check a coupon (as loaded by code, `None` when no such code exists) against a purchase.
///
/// Returns the customer-facing rejection message on failure.
pub fn validate_coupon(
    coupon: Option<Coupon>,
    amount: Decimal,
    product_id: ProductId,
    now: DateTime<Utc>,
) -> Result<AppliedCoupon, String> {
    let coupon = match coupon {
        Some(c) if c.active => c,
        _ => return Err("Cupom inválido".to_string()),
    };

    if coupon.expires_at.is_some_and(|expires| expires < now) {
        return Err("Cupom expirado".to_string());
    }

    if coupon.max_uses.is_some_and(|max| coupon.current_uses >= max) {
        return Err("Cupom esgotado".to_string());
    }

    if let Some(min) = coupon.min_purchase_amount
        && amount < min
    {
        return Err(format!("Valor mínimo para este cupom: R$ {}", brl(min)));
    }

    if coupon.product_id.is_some_and(|p| p != product_id) {
        return Err("Cupom não válido para este produto".to_string());
    }

    let discount = calculate_discount(coupon.coupon_type, coupon.value, amount);
    Ok(AppliedCoupon { coupon, discount })
}
