//! Payment reconciliation behaviour: verified transitions, sticky PAID, fail-closed
//! verification, and the deduplicated notification fan-out under racing entry points.
mod support;

use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
        Mutex,
    },
};

use bazaar_checkout_engine::{
    db_types::{CartOwner, FulfillmentStatus, Order, PaymentStatus},
    events::{EventHandler, EventProducers, OrderPaidEvent},
    traits::{
        GatewayCallback,
        GatewayClientError,
        PaymentGatewayClient,
        PaymentInitRequest,
        PaymentInitResponse,
        RateOption,
        VerifiedStatus,
    },
    CartApi,
    CheckoutApi,
    PayerDetails,
    PaymentApi,
    PaymentApiError,
    ReconcileOutcome,
    SqliteDatabase,
};
use bcg_common::Money;
use serde_json::json;
use support::{seed_variant, setup, tear_down};

const VENDOR_A: i64 = 7;
const VENDOR_B: i64 = 8;
const BUYER: i64 = 33;

/// Scripted gateway double. `verify_script` entries are consumed in order; once drained, every
/// further verification reports success.
#[derive(Clone, Default)]
struct MockGateway {
    reject_initiate: bool,
    verify_script: Arc<Mutex<VecDeque<Result<VerifiedStatus, GatewayClientError>>>>,
    verify_calls: Arc<AtomicU32>,
}

impl MockGateway {
    fn script(&self, result: Result<VerifiedStatus, GatewayClientError>) {
        self.verify_script.lock().unwrap().push_back(result);
    }

    fn success() -> Result<VerifiedStatus, GatewayClientError> {
        Ok(VerifiedStatus::Success {
            gateway_payment_id: Some("EZ123".to_string()),
            raw: json!({"status": "success"}),
        })
    }

    fn failure(status: &str) -> Result<VerifiedStatus, GatewayClientError> {
        Ok(VerifiedStatus::Failure { gateway_status: status.to_string(), raw: json!({ "status": status }) })
    }
}

impl PaymentGatewayClient for MockGateway {
    fn provider(&self) -> &str {
        "EZPAY"
    }

    async fn initiate(&self, request: PaymentInitRequest) -> Result<PaymentInitResponse, GatewayClientError> {
        if self.reject_initiate {
            return Err(GatewayClientError::Rejected("Parameter validation failed".to_string()));
        }
        Ok(PaymentInitResponse {
            checkout_url: format!("https://testpay.example.in/pay/{}", request.txn_id),
            raw: json!({"status": 1, "data": request.txn_id}),
        })
    }

    async fn verify_transaction(
        &self,
        _txn_id: &str,
        _gateway_ref: Option<&str>,
    ) -> Result<VerifiedStatus, GatewayClientError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verify_script.lock().unwrap().pop_front().unwrap_or_else(MockGateway::success)
    }
}

fn payer() -> PayerDetails {
    PayerDetails { name: "Asha".to_string(), email: "asha@example.com".to_string(), phone: "9999999999".to_string() }
}

fn callback(order: &Order, status: Option<&str>, signed: bool) -> GatewayCallback {
    GatewayCallback {
        order_id: Some(order.order_id.clone()),
        txn_id: order.payment_txn_id.clone(),
        gateway_payment_id: None,
        status: status.map(String::from),
        signature_valid: signed,
        raw: json!({ "udf1": order.order_id.as_str(), "status": status }),
    }
}

/// Two-vendor order, payment initiated (Pending).
async fn pending_order(db: &SqliteDatabase, gateway: &MockGateway) -> Order {
    let cart_api = CartApi::new(db.clone());
    let checkout = CheckoutApi::new(db.clone());
    let owner = CartOwner::User(BUYER);
    let v_a = seed_variant(db, "Kurta", VENDOR_A, Money::from_rupees(40), 10).await;
    let v_b = seed_variant(db, "Jutti", VENDOR_B, Money::from_rupees(60), 10).await;
    cart_api.add_item(&owner, v_a, 1, false, None).await.expect("add");
    cart_api.add_item(&owner, v_b, 1, false, None).await.expect("add");
    let rate = RateOption {
        name: "Delhivery Surface".to_string(),
        code: "DL-SF".to_string(),
        amount: Money::from_rupees(50),
        currency: "INR".to_string(),
        estimated_days: Some(4),
    };
    let order = checkout.begin_checkout(&owner, BUYER, &rate).await.expect("checkout");

    let api = PaymentApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let initiation = api.start_payment(&order.order_id, payer()).await.expect("Error initiating payment");
    assert_eq!(initiation.order.payment_status, PaymentStatus::Pending);
    assert!(initiation.checkout_url.contains(&initiation.txn_id));
    initiation.order
}

async fn notifications_for(
    db: &SqliteDatabase,
    recipient: i64,
    order_pk: i64,
) -> Vec<bazaar_checkout_engine::db_types::Notification> {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    bazaar_checkout_engine::sqlite::db::notifications::fetch_for_recipient(recipient, &mut conn)
        .await
        .expect("Error fetching notifications")
        .into_iter()
        .filter(|n| n.order_pk == order_pk)
        .collect()
}

async fn notification_count(db: &SqliteDatabase, recipient: i64, order_pk: i64) -> usize {
    notifications_for(db, recipient, order_pk).await.len()
}

async fn audit_kinds(db: &SqliteDatabase, order_pk: i64) -> Vec<String> {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    bazaar_checkout_engine::sqlite::db::payments::fetch_audit_trail(order_pk, &mut conn)
        .await
        .expect("Error fetching audit trail")
        .iter()
        .map(|e| e.kind.to_string())
        .collect()
}

#[tokio::test]
async fn start_records_txn_and_moves_to_pending() {
    let db = setup().await;
    let gateway = MockGateway::default();
    let order = pending_order(&db, &gateway).await;
    assert!(order.payment_txn_id.is_some());
    assert_eq!(order.payment_provider.as_deref(), Some("EZPAY"));
    assert_eq!(order.status, FulfillmentStatus::Pending);
    assert_eq!(audit_kinds(&db, order.id).await, vec!["Initiate"]);
    tear_down(db).await;
}

#[tokio::test]
async fn gateway_rejection_surfaces_without_advancing_the_order() {
    let db = setup().await;
    let accepting = MockGateway::default();
    let order = pending_order(&db, &accepting).await;

    let rejecting = MockGateway { reject_initiate: true, ..MockGateway::default() };
    let api = PaymentApi::new(db.clone(), rejecting, EventProducers::default());
    let err = api.start_payment(&order.order_id, payer()).await.expect_err("initiation should fail");
    assert!(matches!(err, PaymentApiError::Gateway(GatewayClientError::Rejected(_))));
    // Order state is untouched beyond the audit record of the exchange.
    let order = CheckoutApi::new(db.clone()).fetch_order(&order.order_id).await.expect("order");
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(audit_kinds(&db, order.id).await, vec!["Initiate", "Initiate"]);
    tear_down(db).await;
}

#[tokio::test]
async fn return_reverifies_and_ignores_the_claimed_status() {
    let db = setup().await;
    let gateway = MockGateway::default();
    let order = pending_order(&db, &gateway).await;
    let api = PaymentApi::new(db.clone(), gateway.clone(), EventProducers::default());

    // The redirect claims failure, but the authoritative status endpoint says success. The
    // verified answer wins.
    let outcome = api.handle_return(&callback(&order, Some("failed"), false)).await.expect("return");
    let order = match outcome {
        ReconcileOutcome::Paid { order, fresh } => {
            assert!(fresh);
            order
        },
        other => panic!("Expected Paid, got {other:?}"),
    };
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.status, FulfillmentStatus::Processing);
    assert_eq!(order.gateway_payment_id.as_deref(), Some("EZ123"));
    assert_eq!(gateway.verify_calls.load(Ordering::SeqCst), 1);

    // Fan-out: one buyer notification plus one per vendor, and a full audit trail of the
    // exchange (initiation, raw return payload, verification response).
    let buyer_notes = notifications_for(&db, BUYER, order.id).await;
    assert_eq!(buyer_notes.len(), 1);
    assert_eq!(buyer_notes[0].title, "Order placed");
    let vendor_notes = notifications_for(&db, VENDOR_A, order.id).await;
    assert_eq!(vendor_notes.len(), 1);
    assert!(vendor_notes[0].message.contains("net for you"));
    assert_eq!(notification_count(&db, VENDOR_B, order.id).await, 1);
    assert_eq!(audit_kinds(&db, order.id).await, vec!["Initiate", "Return", "Verify"]);
    tear_down(db).await;
}

#[tokio::test]
async fn paid_is_sticky_across_all_entry_points() {
    let db = setup().await;
    let gateway = MockGateway::default();
    let order = pending_order(&db, &gateway).await;
    let api = PaymentApi::new(db.clone(), gateway.clone(), EventProducers::default());

    api.handle_return(&callback(&order, Some("success"), false)).await.expect("first return");

    // A verified failure afterwards must not demote the order.
    gateway.script(MockGateway::failure("failed"));
    let outcome = api.handle_return(&callback(&order, Some("failed"), false)).await.expect("second return");
    match outcome {
        ReconcileOutcome::Failed { order, .. } => assert_eq!(order.payment_status, PaymentStatus::Paid),
        other => panic!("Expected Failed outcome with sticky Paid order, got {other:?}"),
    }

    // A signed failing webhook must not demote it either.
    let outcome = api.handle_webhook(&callback(&order, Some("failed"), true)).await.expect("webhook");
    match outcome {
        ReconcileOutcome::Failed { order, .. } => assert_eq!(order.payment_status, PaymentStatus::Paid),
        other => panic!("Expected Failed outcome with sticky Paid order, got {other:?}"),
    }

    // And a fresh start_payment call is refused outright.
    let err = api.start_payment(&order.order_id, payer()).await.expect_err("start on paid order");
    assert!(matches!(err, PaymentApiError::AlreadyPaid));
    tear_down(db).await;
}

#[tokio::test]
async fn inconclusive_verification_fails_closed() {
    let db = setup().await;
    let gateway = MockGateway::default();
    let order = pending_order(&db, &gateway).await;
    let api = PaymentApi::new(db.clone(), gateway.clone(), EventProducers::default());

    // Every status endpoint timed out: the order must stay Pending, not become Paid or Failed.
    gateway.script(Err(GatewayClientError::Inconclusive("all status endpoints timed out".to_string())));
    let outcome = api.handle_return(&callback(&order, Some("success"), false)).await.expect("return");
    let order = match outcome {
        ReconcileOutcome::Unverified { order } => order,
        other => panic!("Expected Unverified, got {other:?}"),
    };
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(notification_count(&db, BUYER, order.id).await, 0);

    // A later webhook whose verification succeeds still settles the order.
    let outcome = api.handle_webhook(&callback(&order, Some("success"), false)).await.expect("webhook");
    assert!(matches!(outcome, ReconcileOutcome::Paid { fresh: true, .. }));
    tear_down(db).await;
}

#[tokio::test]
async fn signed_webhook_failure_marks_failed_and_retry_can_recover() {
    let db = setup().await;
    let gateway = MockGateway::default();
    let order = pending_order(&db, &gateway).await;
    let api = PaymentApi::new(db.clone(), gateway.clone(), EventProducers::default());

    // A cryptographically signed webhook is authoritative; no status query is made.
    let outcome = api.handle_webhook(&callback(&order, Some("bounced"), true)).await.expect("webhook");
    let order = match outcome {
        ReconcileOutcome::Failed { order, gateway_status } => {
            assert_eq!(gateway_status, "bounced");
            order
        },
        other => panic!("Expected Failed, got {other:?}"),
    };
    assert_eq!(order.payment_status, PaymentStatus::Failed);
    assert_eq!(gateway.verify_calls.load(Ordering::SeqCst), 0);

    // FAILED is not terminal: the buyer may retry, which moves the order back to Pending.
    let initiation = api.start_payment(&order.order_id, payer()).await.expect("retry");
    assert_eq!(initiation.order.payment_status, PaymentStatus::Pending);
    tear_down(db).await;
}

#[tokio::test]
async fn racing_return_and_webhook_produce_one_transition_and_one_fanout() {
    let db = setup().await;
    let gateway = MockGateway::default();
    let order = pending_order(&db, &gateway).await;
    let api = Arc::new(PaymentApi::new(db.clone(), gateway.clone(), EventProducers::default()));

    let ret = {
        let api = Arc::clone(&api);
        let cb = callback(&order, Some("success"), false);
        tokio::spawn(async move { api.handle_return(&cb).await })
    };
    let hook = {
        let api = Arc::clone(&api);
        let cb = callback(&order, Some("success"), true);
        tokio::spawn(async move { api.handle_webhook(&cb).await })
    };
    let ret = ret.await.expect("join").expect("return");
    let hook = hook.await.expect("join").expect("webhook");

    let fresh = |o: &ReconcileOutcome| matches!(o, ReconcileOutcome::Paid { fresh: true, .. });
    let stale = |o: &ReconcileOutcome| matches!(o, ReconcileOutcome::Paid { fresh: false, .. });
    assert!(
        (fresh(&ret) && stale(&hook)) || (stale(&ret) && fresh(&hook)),
        "exactly one entry point must win the transition: {ret:?} / {hook:?}"
    );

    // Exactly one notification per recipient despite the race.
    assert_eq!(notification_count(&db, BUYER, order.id).await, 1);
    assert_eq!(notification_count(&db, VENDOR_A, order.id).await, 1);
    assert_eq!(notification_count(&db, VENDOR_B, order.id).await, 1);
    tear_down(db).await;
}

#[tokio::test]
async fn order_paid_hook_fires_once_for_the_winning_transition() {
    let db = setup().await;
    let gateway = MockGateway::default();
    let order = pending_order(&db, &gateway).await;

    let count = Arc::new(AtomicU32::new(0));
    let c2 = Arc::clone(&count);
    let handler = Arc::new(move |event: OrderPaidEvent| {
        let count = Arc::clone(&c2);
        Box::pin(async move {
            assert_eq!(event.order.payment_status, PaymentStatus::Paid);
            count.fetch_add(1, Ordering::SeqCst);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let event_handler = EventHandler::new(4, handler);
    let mut producers = EventProducers::default();
    producers.order_paid_producer.push(event_handler.subscribe());

    let api = PaymentApi::new(db.clone(), gateway.clone(), producers);
    api.handle_return(&callback(&order, Some("success"), false)).await.expect("return");
    // The duplicate delivery loses the guard and must not publish a second event.
    api.handle_webhook(&callback(&order, Some("success"), true)).await.expect("webhook");

    drop(api);
    event_handler.start_handler().await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
    tear_down(db).await;
}
