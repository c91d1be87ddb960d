use std::fmt::Debug;

use log::*;

use crate::{
    api::errors::CheckoutError,
    db_types::{CartOwner, NewOrder, NewOrderItem, Order, OrderId, OrderItem},
    helpers::{new_order_id, OrderTotals},
    traits::{RateOption, StorefrontDatabase},
};

/// `CheckoutApi` freezes a live cart into an immutable order snapshot and owns every totals
/// recompute thereafter. Downstream pricing operates only on the frozen line data; nothing is
/// ever re-derived from the catalog once the snapshot exists.
pub struct CheckoutApi<B> {
    db: B,
}

impl<B> Debug for CheckoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B> CheckoutApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> CheckoutApi<B>
where B: StorefrontDatabase
{
    /// Converts the identity's cart into an order snapshot.
    ///
    /// Each cart line becomes one order line with the unit price frozen from the variant's
    /// current sale price and the vendor attributed from the variant. The chosen courier rate is
    /// recorded and the totals are computed once, after all lines exist. The cart itself is
    /// retained (checkout can be resumed until payment succeeds).
    pub async fn begin_checkout(
        &self,
        owner: &CartOwner,
        buyer_id: i64,
        rate: &RateOption,
    ) -> Result<Order, CheckoutError> {
        let cart = self.db.fetch_cart(owner).await?.ok_or(CheckoutError::EmptyCart)?;
        let cart_items = self.db.fetch_cart_items(cart.id).await?;
        if cart_items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let mut lines = Vec::with_capacity(cart_items.len());
        for item in cart_items {
            let variant = self
                .db
                .fetch_variant(item.variant_id)
                .await?
                .ok_or(crate::traits::StorefrontDbError::VariantNotFound(item.variant_id))?;
            lines.push(NewOrderItem {
                variant_id: variant.id,
                vendor_id: variant.vendor_id,
                quantity: item.quantity,
                unit_price: variant.sale_price,
                selections: item.selections,
            });
        }
        let mut new_order = NewOrder::new(new_order_id(), buyer_id);
        new_order.shipping_fee = rate.amount;
        new_order.courier_name = rate.name.clone();
        new_order.courier_code = rate.code.clone();
        new_order.courier_mode = rate.mode().to_string();
        new_order.etd_days = rate.estimated_days;
        let order = self.db.insert_order_snapshot(new_order, lines).await?;
        info!(
            "📦️ Order [{}] snapshotted from cart #{} for buyer #{buyer_id}: payable {}",
            order.order_id, cart.id, order.amount_payable
        );
        Ok(order)
    }

    /// Replaces the order's courier selection and shipping fee, then recomputes the totals.
    pub async fn assign_shipping(&self, order_id: &OrderId, rate: &RateOption) -> Result<Order, CheckoutError> {
        let order = self.db.assign_shipping(order_id, rate).await.map_err(|e| match e {
            crate::traits::StorefrontDbError::OrderNotFound(id) => CheckoutError::OrderNotFound(id),
            e => CheckoutError::Database(e),
        })?;
        debug!("📦️ Order [{}] shipping set to {} ({})", order.order_id, order.courier_name, order.shipping_fee);
        Ok(order)
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, CheckoutError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| CheckoutError::OrderNotFound(order_id.clone()))
    }

    pub async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, CheckoutError> {
        let order = self.fetch_order(order_id).await?;
        Ok(self.db.fetch_order_items(order.id).await?)
    }

    /// The totals tuple the storefront surfaces after cart/coupon/shipping mutations.
    pub async fn order_totals(&self, order_id: &OrderId) -> Result<OrderTotals, CheckoutError> {
        let order = self.fetch_order(order_id).await?;
        Ok(OrderTotals::of_order(&order))
    }
}
