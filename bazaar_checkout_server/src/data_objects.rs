use bazaar_checkout_engine::{
    db_types::{Cart, CartItem, CartOwner, Order},
    helpers::OrderTotals,
    traits::RateOption,
};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

/// Cart identity as sent by clients: exactly one of `user_id` / `session_key`.
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerRef {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub session_key: Option<String>,
}

impl OwnerRef {
    pub fn to_owner(&self) -> Result<CartOwner, ServerError> {
        match (self.user_id, &self.session_key) {
            (Some(id), None) => Ok(CartOwner::User(id)),
            (None, Some(key)) if !key.is_empty() => Ok(CartOwner::Session(key.clone())),
            _ => Err(ServerError::InvalidRequestBody(
                "Provide exactly one of user_id or session_key".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddItemRequest {
    #[serde(flatten)]
    pub owner: OwnerRef,
    pub variant_id: i64,
    pub quantity: i64,
    #[serde(default)]
    pub override_quantity: bool,
    #[serde(default)]
    pub selections: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeCartRequest {
    pub session_key: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutStartRequest {
    #[serde(flatten)]
    pub owner: OwnerRef,
    pub buyer_id: i64,
    pub delivery_pincode: String,
    pub weight_kg: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyCouponRequest {
    pub code: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartPaymentRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

//--------------------------------------     Responses      ----------------------------------------------------------

/// The five-layer totals tuple, rendered as plain decimal strings.
#[derive(Debug, Clone, Serialize)]
pub struct TotalsResponse {
    pub item_total: String,
    pub item_discount_total: String,
    pub item_total_net: String,
    pub shipping_fee: String,
    pub amount_payable: String,
}

impl From<OrderTotals> for TotalsResponse {
    fn from(t: OrderTotals) -> Self {
        Self {
            item_total: t.item_total.to_amount_string(),
            item_discount_total: t.item_discount_total.to_amount_string(),
            item_total_net: t.item_total_net.to_amount_string(),
            shipping_fee: t.shipping_fee.to_amount_string(),
            amount_payable: t.amount_payable.to_amount_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CartItemResponse {
    pub cart_id: i64,
    pub variant_id: i64,
    pub quantity: i64,
    pub selections: Option<String>,
}

impl From<CartItem> for CartItemResponse {
    fn from(item: CartItem) -> Self {
        Self {
            cart_id: item.cart_id,
            variant_id: item.variant_id,
            quantity: item.quantity,
            selections: item.selections,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CartResponse {
    pub cart_id: i64,
    pub items: Vec<CartItemResponse>,
}

impl CartResponse {
    pub fn new(cart: &Cart, items: Vec<CartItem>) -> Self {
        Self { cart_id: cart.id, items: items.into_iter().map(CartItemResponse::from).collect() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub currency: String,
    pub payment_status: String,
    pub status: String,
    pub courier_name: String,
    pub courier_code: String,
    pub etd_days: Option<i64>,
    #[serde(flatten)]
    pub totals: TotalsResponse,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id.as_str().to_string(),
            currency: order.currency.clone(),
            payment_status: order.payment_status.to_string(),
            status: order.status.to_string(),
            courier_name: order.courier_name.clone(),
            courier_code: order.courier_code.clone(),
            etd_days: order.etd_days,
            totals: OrderTotals::of_order(order).into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutStartResponse {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub chosen_rate: RateOption,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartPaymentResponse {
    pub order_id: String,
    pub txn_id: String,
    pub checkout_url: String,
}
