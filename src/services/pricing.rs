//! Order pricing. All amounts are minor currency units; rates are basis points.

use chrono::{DateTime, Utc};

use crate::entity::coupons::{DiscountType, Model as CouponModel};

const BPS: i64 = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    pub currency: String,
    /// Subtotals at or above this ship free.
    pub free_shipping_threshold: i64,
    pub flat_shipping_fee: i64,
    pub tax_rate_bps: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            free_shipping_threshold: 50_000,
            flat_shipping_fee: 5_000,
            tax_rate_bps: 800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBreakdown {
    pub subtotal: i64,
    pub discount_amount: i64,
    pub shipping_cost: i64,
    pub tax_amount: i64,
    pub total_amount: i64,
}

/// Why a coupon code did not produce a discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponRejection {
    Inactive,
    NotYetValid,
    Expired,
    BelowMinimum,
    UsageExhausted,
}

pub fn subtotal<I>(lines: I) -> i64
where
    I: IntoIterator<Item = (i64, i32)>,
{
    lines
        .into_iter()
        .map(|(unit_price, quantity)| unit_price * i64::from(quantity))
        .sum()
}

pub fn check_coupon(
    coupon: &CouponModel,
    subtotal: i64,
    now: DateTime<Utc>,
) -> Result<(), CouponRejection> {
    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }
    if coupon.valid_from.is_some_and(|from| now < from) {
        return Err(CouponRejection::NotYetValid);
    }
    if coupon.valid_until.is_some_and(|until| now > until) {
        return Err(CouponRejection::Expired);
    }
    if coupon.min_order_amount.is_some_and(|min| subtotal < min) {
        return Err(CouponRejection::BelowMinimum);
    }
    if coupon
        .usage_limit
        .is_some_and(|limit| coupon.used_count >= limit)
    {
        return Err(CouponRejection::UsageExhausted);
    }
    Ok(())
}

/// Discount a usable coupon grants on `subtotal`, never more than the subtotal.
pub fn coupon_discount(coupon: &CouponModel, subtotal: i64) -> i64 {
    let raw = match coupon.discount_type {
        DiscountType::Percentage => {
            let pct = subtotal * coupon.discount_value / BPS;
            match coupon.max_discount {
                Some(cap) => pct.min(cap),
                None => pct,
            }
        }
        DiscountType::Fixed => coupon.discount_value,
    };
    raw.clamp(0, subtotal.max(0))
}

pub fn shipping_cost(config: &PricingConfig, subtotal: i64) -> i64 {
    if subtotal >= config.free_shipping_threshold {
        0
    } else {
        config.flat_shipping_fee
    }
}

/// Rounds half up.
pub fn tax(config: &PricingConfig, taxable: i64) -> i64 {
    let taxable = taxable.max(0);
    (taxable * config.tax_rate_bps + BPS / 2) / BPS
}

pub fn quote(config: &PricingConfig, subtotal: i64, discount_amount: i64) -> PriceBreakdown {
    let shipping_cost = shipping_cost(config, subtotal);
    let tax_amount = tax(config, subtotal - discount_amount);
    PriceBreakdown {
        subtotal,
        discount_amount,
        shipping_cost,
        tax_amount,
        total_amount: subtotal + tax_amount + shipping_cost - discount_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn coupon(kind: DiscountType, value: i64, cap: Option<i64>) -> CouponModel {
        CouponModel {
            id: Uuid::new_v4(),
            code: "SAVE10".into(),
            discount_type: kind,
            discount_value: value,
            max_discount: cap,
            min_order_amount: None,
            usage_limit: None,
            used_count: 0,
            is_active: true,
            valid_from: None,
            valid_until: None,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn percentage_discount_is_capped() {
        // 10% off, capped at ₹50, on ₹1000
        let c = coupon(DiscountType::Percentage, 1_000, Some(5_000));
        assert_eq!(coupon_discount(&c, 100_000), 5_000);
        // under the cap the plain percentage applies
        assert_eq!(coupon_discount(&c, 30_000), 3_000);
    }

    #[test]
    fn fixed_discount_never_exceeds_subtotal() {
        let c = coupon(DiscountType::Fixed, 20_000, None);
        assert_eq!(coupon_discount(&c, 50_000), 20_000);
        assert_eq!(coupon_discount(&c, 15_000), 15_000);
    }

    #[test]
    fn small_order_pays_flat_shipping_and_tax() {
        let config = PricingConfig::default();
        let q = quote(&config, 4_000, 0);
        assert_eq!(q.shipping_cost, config.flat_shipping_fee);
        assert_eq!(q.tax_amount, 320);
        assert_eq!(q.total_amount, 4_000 + 320 + 5_000);
    }

    #[test]
    fn large_order_ships_free() {
        let q = quote(&PricingConfig::default(), 100_000, 0);
        assert_eq!(q.shipping_cost, 0);
        assert_eq!(q.tax_amount, 8_000);
        assert_eq!(q.total_amount, 108_000);
    }

    #[test]
    fn total_is_always_the_sum_of_parts() {
        let config = PricingConfig::default();
        for subtotal in [0, 1, 99, 4_999, 49_999, 50_000, 123_457] {
            for discount in [0, 1, 333, subtotal / 2, subtotal] {
                let q = quote(&config, subtotal, discount);
                assert_eq!(
                    q.total_amount,
                    q.subtotal + q.tax_amount + q.shipping_cost - q.discount_amount
                );
                assert!(q.total_amount >= 0);
            }
        }
    }

    #[test]
    fn tax_rounds_half_up() {
        let config = PricingConfig {
            tax_rate_bps: 300,
            ..PricingConfig::default()
        };
        // 3% of 150 = 4.5 -> 5
        assert_eq!(tax(&config, 150), 5);
        // 3% of 149 = 4.47 -> 4
        assert_eq!(tax(&config, 149), 4);
    }

    #[test]
    fn coupon_window_and_limits() {
        let now = Utc::now();
        let mut c = coupon(DiscountType::Percentage, 1_000, None);
        assert_eq!(check_coupon(&c, 10_000, now), Ok(()));

        c.valid_until = Some((now - Duration::days(1)).into());
        assert_eq!(check_coupon(&c, 10_000, now), Err(CouponRejection::Expired));

        c.valid_until = None;
        c.valid_from = Some((now + Duration::days(1)).into());
        assert_eq!(check_coupon(&c, 10_000, now), Err(CouponRejection::NotYetValid));

        c.valid_from = None;
        c.usage_limit = Some(3);
        c.used_count = 3;
        assert_eq!(check_coupon(&c, 10_000, now), Err(CouponRejection::UsageExhausted));

        c.usage_limit = None;
        c.min_order_amount = Some(20_000);
        assert_eq!(check_coupon(&c, 10_000, now), Err(CouponRejection::BelowMinimum));

        c.min_order_amount = None;
        c.is_active = false;
        assert_eq!(check_coupon(&c, 10_000, now), Err(CouponRejection::Inactive));
    }

    #[test]
    fn subtotal_sums_lines() {
        assert_eq!(subtotal([(50_000, 2), (1_250, 3)]), 103_750);
        assert_eq!(subtotal(Vec::<(i64, i32)>::new()), 0);
    }
}
