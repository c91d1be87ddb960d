//! Vendor-scoped discount computation and remainder-to-last proration.
//!
//! The allocation rules here are the exact-cent heart of coupon handling. Every line but the
//! last receives a rounded proportional share; the last line receives whatever remains, so the
//! allocations always sum to exactly the vendor discount despite rounding.

use bcg_common::Money;
use thiserror::Error;

use crate::db_types::{Coupon, DiscountType};

#[derive(Debug, Clone, Error)]
pub enum AllocationError {
    #[error("Cannot allocate a discount over zero line items")]
    NoLines,
    #[error("Allocation remainder for the last line is negative ({0}); rounding drift exceeded the line value")]
    NegativeRemainder(Money),
}

/// The share of a coupon discount assigned to one order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAllocation {
    pub order_item_id: i64,
    pub amount: Money,
}

/// Computes the vendor-level discount for a coupon against the vendor's gross subtotal in the
/// order. The result is already quantized to cents (round-half-up) by the `Money` scaling ops.
///
/// - Percent: `vendor_gross × percent`, capped at `max_discount_amount` when set.
/// - Fixed: `min(amount_off, vendor_gross)` — a fixed coupon never discounts more than the
///   vendor's own lines are worth.
pub fn vendor_discount(coupon: &Coupon, vendor_gross: Money) -> Money {
    match coupon.discount_type {
        DiscountType::Percent => {
            let discount = vendor_gross.percent_bps(coupon.percent_off_bps.unwrap_or(0));
            match coupon.max_discount_amount {
                Some(cap) if discount > cap => cap,
                _ => discount,
            }
        },
        DiscountType::Fixed => std::cmp::min(coupon.amount_off.unwrap_or(Money::ZERO), vendor_gross),
    }
}

/// Prorates `discount` across the vendor's lines, given as `(order_item_id, line_gross)` pairs in
/// deterministic (item id) order.
///
/// Fixed coupons allocate `discount × line_gross / vendor_gross` per non-last line. Percent
/// coupons allocate `line_gross × percent` per non-last line — the percentage is applied to each
/// line directly, not re-derived from the (possibly capped) vendor discount. In both cases the
/// last line receives `discount − Σ(previous allocations)` so the rows sum to the discount
/// exactly.
pub fn allocate_lines(
    coupon: &Coupon,
    discount: Money,
    lines: &[(i64, Money)],
    vendor_gross: Money,
) -> Result<Vec<LineAllocation>, AllocationError> {
    let last = lines.len().checked_sub(1).ok_or(AllocationError::NoLines)?;
    let mut allocations = Vec::with_capacity(lines.len());
    let mut allocated = Money::ZERO;
    for (i, (item_id, line_gross)) in lines.iter().enumerate() {
        let amount = if i == last {
            let remainder = discount - allocated;
            if remainder.is_negative() {
                return Err(AllocationError::NegativeRemainder(remainder));
            }
            remainder
        } else {
            match coupon.discount_type {
                DiscountType::Fixed => discount.prorate(*line_gross, vendor_gross),
                DiscountType::Percent => line_gross.percent_bps(coupon.percent_off_bps.unwrap_or(0)),
            }
        };
        allocated += amount;
        allocations.push(LineAllocation { order_item_id: *item_id, amount });
    }
    Ok(allocations)
}
