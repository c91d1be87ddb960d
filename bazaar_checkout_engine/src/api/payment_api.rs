use std::fmt::Debug;

use log::*;
use serde_json::json;

use crate::{
    api::errors::PaymentApiError,
    db_types::{AuditKind, NewNotification, NotificationLevel, Order, OrderId, PaymentStatus},
    events::{EventProducers, OrderPaidEvent, PaymentFailedEvent},
    helpers::new_txn_id,
    traits::{
        GatewayCallback,
        GatewayClientError,
        PaymentGatewayClient,
        PaymentInitRequest,
        StorefrontDatabase,
        VerifiedStatus,
    },
};

/// Buyer identity fields forwarded to the gateway. The server sanitizes these (email fallback,
/// phone normalization) before they reach the engine.
#[derive(Debug, Clone)]
pub struct PayerDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// A successfully initiated gateway transaction: where to send the buyer next.
#[derive(Debug, Clone)]
pub struct PaymentInitiation {
    pub order: Order,
    pub txn_id: String,
    pub checkout_url: String,
}

/// What a reconciliation pass concluded about the order.
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// Verified success. `fresh` is true for the single call that won the PAID transition;
    /// racing duplicates observe `fresh == false` and change nothing.
    Paid { order: Order, fresh: bool },
    /// Verified failure. The order is marked Failed unless it was already Paid.
    Failed { order: Order, gateway_status: String },
    /// Verification was inconclusive (timeout, unreachable endpoints, unparseable response).
    /// Fail closed: the order is left exactly as it was; a later notification may still settle
    /// it.
    Unverified { order: Order },
}

/// `PaymentApi` reconciles an order's payment status from the three asynchronous entry points
/// (start, browser return, webhook), using gateway-side verification as the single source of
/// truth. Once Paid, an order stays Paid.
pub struct PaymentApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
}

impl<B, G> Debug for PaymentApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi")
    }
}

impl<B, G> PaymentApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B, G> PaymentApi<B, G>
where
    B: StorefrontDatabase,
    G: PaymentGatewayClient,
{
    /// Initiates a hosted-checkout transaction for the order.
    ///
    /// On gateway acceptance, the transaction id is persisted and the order moves to Pending.
    /// On gateway rejection the reason is surfaced to the caller and the order is left alone —
    /// only the raw exchange is recorded for audit.
    pub async fn start_payment(
        &self,
        order_id: &OrderId,
        payer: PayerDetails,
    ) -> Result<PaymentInitiation, PaymentApiError> {
        let order = self.fetch_order(order_id).await?;
        if order.payment_status == PaymentStatus::Paid {
            return Err(PaymentApiError::AlreadyPaid);
        }
        if !order.amount_payable.is_positive() {
            return Err(PaymentApiError::NothingPayable);
        }
        let txn_id = new_txn_id(&order.order_id);
        let request = PaymentInitRequest {
            txn_id: txn_id.clone(),
            amount: order.amount_payable,
            product_info: format!("Order {}", order.order_id.as_str()),
            payer_name: payer.name,
            payer_email: payer.email,
            payer_phone: payer.phone,
            order_id: order.order_id.clone(),
        };
        match self.gateway.initiate(request).await {
            Ok(response) => {
                self.db.append_payment_audit(order.id, AuditKind::Initiate, &response.raw).await?;
                let order =
                    self.db.record_payment_initiation(&order.order_id, self.gateway.provider(), &txn_id).await?;
                info!("💳️ Payment initiated for order [{}], txn {txn_id}", order.order_id);
                Ok(PaymentInitiation { order, txn_id, checkout_url: response.checkout_url })
            },
            Err(e) => {
                let audit = json!({ "error": e.to_string(), "txnid": txn_id });
                self.db.append_payment_audit(order.id, AuditKind::Initiate, &audit).await?;
                warn!("💳️ Payment initiation for order [{}] failed: {e}", order.order_id);
                Err(e.into())
            },
        }
    }

    /// Handles the synchronous browser redirect from the gateway.
    ///
    /// The redirect payload is untrusted input: whatever status it claims, the transaction is
    /// re-verified against the gateway's authoritative status endpoint before any state changes.
    pub async fn handle_return(&self, callback: &GatewayCallback) -> Result<ReconcileOutcome, PaymentApiError> {
        let order = self.order_for_callback(callback).await?;
        self.db.append_payment_audit(order.id, AuditKind::Return, &callback.raw).await?;
        self.verify_and_settle(order, callback).await
    }

    /// Handles the asynchronous server-to-server webhook.
    ///
    /// A payload whose gateway signature validated is treated as authoritative; anything else is
    /// re-verified exactly like a browser return.
    pub async fn handle_webhook(&self, callback: &GatewayCallback) -> Result<ReconcileOutcome, PaymentApiError> {
        let order = self.order_for_callback(callback).await?;
        self.db.append_payment_audit(order.id, AuditKind::Webhook, &callback.raw).await?;
        if callback.signature_valid {
            let status = callback.status.as_deref().unwrap_or("");
            return match classify_status(status) {
                Some(true) => self.settle_paid(order, callback.gateway_payment_id.clone()).await,
                Some(false) => self.settle_failed(order, status).await,
                None => {
                    debug!("💳️ Webhook for order [{}] carried indeterminate status {status:?}", order.order_id);
                    Ok(ReconcileOutcome::Unverified { order })
                },
            };
        }
        self.verify_and_settle(order, callback).await
    }

    async fn verify_and_settle(
        &self,
        order: Order,
        callback: &GatewayCallback,
    ) -> Result<ReconcileOutcome, PaymentApiError> {
        let txn_id = match callback.txn_id.clone().or_else(|| order.payment_txn_id.clone()) {
            Some(txn) => txn,
            None => {
                warn!("💳️ No transaction id known for order [{}]; cannot verify", order.order_id);
                return Ok(ReconcileOutcome::Unverified { order });
            },
        };
        let gateway_ref = callback.gateway_payment_id.as_deref();
        match self.gateway.verify_transaction(&txn_id, gateway_ref).await {
            Ok(VerifiedStatus::Success { gateway_payment_id, raw }) => {
                self.db.append_payment_audit(order.id, AuditKind::Verify, &raw).await?;
                self.settle_paid(order, gateway_payment_id).await
            },
            Ok(VerifiedStatus::Failure { gateway_status, raw }) => {
                self.db.append_payment_audit(order.id, AuditKind::Verify, &raw).await?;
                self.settle_failed(order, &gateway_status).await
            },
            Err(GatewayClientError::Inconclusive(reason)) => {
                // Fail closed: an unverifiable transaction never advances the order state.
                let audit = json!({ "error": reason, "txnid": txn_id });
                self.db.append_payment_audit(order.id, AuditKind::Verify, &audit).await?;
                warn!("💳️ Verification inconclusive for order [{}]: order left as {}", order.order_id, order.payment_status);
                Ok(ReconcileOutcome::Unverified { order })
            },
            Err(e) => Err(e.into()),
        }
    }

    /// The single transition rule both entry points converge on. The storage layer evaluates the
    /// `payment_status != Paid` guard atomically; only the winner runs the notification fan-out
    /// and publishes the paid event.
    async fn settle_paid(
        &self,
        order: Order,
        gateway_payment_id: Option<String>,
    ) -> Result<ReconcileOutcome, PaymentApiError> {
        let transition = self.db.mark_order_paid(&order.order_id, gateway_payment_id.as_deref()).await?;
        if transition.won {
            self.fan_out_notifications(&transition.order).await?;
            self.call_order_paid_hook(&transition.order).await;
        }
        Ok(ReconcileOutcome::Paid { order: transition.order, fresh: transition.won })
    }

    async fn settle_failed(&self, order: Order, gateway_status: &str) -> Result<ReconcileOutcome, PaymentApiError> {
        let order = self.db.mark_order_failed(&order.order_id).await?;
        if order.payment_status == PaymentStatus::Failed {
            self.call_payment_failed_hook(&order, gateway_status).await;
        }
        debug!("💳️ Order [{}] reconciled as failed ({gateway_status})", order.order_id);
        Ok(ReconcileOutcome::Failed { order, gateway_status: gateway_status.to_string() })
    }

    /// One notification to the buyer and one per vendor present in the order, each deduplicated
    /// by (recipient, title, order) in storage, so a racing duplicate transition cannot
    /// double-notify.
    async fn fan_out_notifications(&self, order: &Order) -> Result<(), PaymentApiError> {
        let buyer = NewNotification {
            recipient_id: order.buyer_id,
            ntype: "Order".to_string(),
            level: NotificationLevel::Success,
            title: "Order placed".to_string(),
            message: format!("Thanks! Your order {} has been placed.", order.order_id),
            order_pk: order.id,
        };
        self.db.notify_once(buyer).await?;
        for summary in self.db.vendor_summaries(order.id).await? {
            let vendor = NewNotification {
                recipient_id: summary.vendor_id,
                ntype: "Order".to_string(),
                level: NotificationLevel::Success,
                title: format!("New paid order {}", order.order_id),
                message: format!("{} item(s) • {} net for you.", summary.item_count, summary.net()),
                order_pk: order.id,
            };
            self.db.notify_once(vendor).await?;
        }
        Ok(())
    }

    async fn call_order_paid_hook(&self, order: &Order) {
        for producer in &self.producers.order_paid_producer {
            debug!("💳️ Notifying order-paid hook subscribers for [{}]", order.order_id);
            producer.publish_event(OrderPaidEvent::new(order.clone())).await;
        }
    }

    async fn call_payment_failed_hook(&self, order: &Order, gateway_status: &str) {
        for producer in &self.producers.payment_failed_producer {
            producer.publish_event(PaymentFailedEvent::new(order.clone(), gateway_status)).await;
        }
    }

    async fn order_for_callback(&self, callback: &GatewayCallback) -> Result<Order, PaymentApiError> {
        let order_id = callback.order_id.clone().ok_or(PaymentApiError::MissingOrderReference)?;
        self.fetch_order(&order_id).await
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, PaymentApiError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| PaymentApiError::OrderNotFound(order_id.clone()))
    }
}

/// Maps a gateway status string to success (`Some(true)`), failure (`Some(false)`) or
/// indeterminate (`None`). The accepted spellings follow the provider's documented variants.
pub fn classify_status(status: &str) -> Option<bool> {
    match status.to_lowercase().as_str() {
        "success" | "captured" | "success-verified" => Some(true),
        "failed" | "failure" | "tampered" | "bounced" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::classify_status;

    #[test]
    fn status_classification() {
        assert_eq!(classify_status("success"), Some(true));
        assert_eq!(classify_status("Captured"), Some(true));
        assert_eq!(classify_status("success-verified"), Some(true));
        assert_eq!(classify_status("failed"), Some(false));
        assert_eq!(classify_status("tampered"), Some(false));
        assert_eq!(classify_status("bounced"), Some(false));
        assert_eq!(classify_status("userCancelled"), None);
        assert_eq!(classify_status(""), None);
    }
}
