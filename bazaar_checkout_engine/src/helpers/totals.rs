use bcg_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderItem};

/// The layered totals of an order: gross → discount → net → +shipping → payable.
///
/// [`OrderTotals::compute`] is a pure function of the line items and the shipping fee. It is the
/// single source of the `item_total*` and `amount_payable` values; no other code path derives
/// them. Calling it repeatedly over unchanged lines always yields the same result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub item_total: Money,
    pub item_discount_total: Money,
    pub item_total_net: Money,
    pub shipping_fee: Money,
    pub amount_payable: Money,
}

impl OrderTotals {
    pub fn compute(lines: &[OrderItem], shipping_fee: Money) -> Self {
        let item_total: Money = lines.iter().map(OrderItem::line_gross).sum();
        let item_discount_total: Money = lines.iter().map(|l| l.line_discount_total).sum();
        let item_total_net = std::cmp::max(item_total - item_discount_total, Money::ZERO);
        let amount_payable = item_total_net + shipping_fee;
        Self { item_total, item_discount_total, item_total_net, shipping_fee, amount_payable }
    }

    /// The totals an order currently carries, as stored.
    pub fn of_order(order: &Order) -> Self {
        Self {
            item_total: order.item_total,
            item_discount_total: order.item_discount_total,
            item_total_net: order.item_total_net,
            shipping_fee: order.shipping_fee,
            amount_payable: order.amount_payable,
        }
    }

    /// The invariant every mutating operation must leave in place.
    pub fn is_consistent(&self) -> bool {
        !self.item_total_net.is_negative() && self.amount_payable == self.item_total_net + self.shipping_fee
    }
}
