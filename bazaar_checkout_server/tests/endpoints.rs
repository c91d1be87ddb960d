//! End-to-end route behaviour against a throwaway database and a scripted gateway: the coupon
//! command pair, and the verified-state-only payment redirects.
use actix_web::{http::StatusCode, test, web, App};
use bazaar_checkout_engine::{
    db_types::{CartOwner, DiscountType},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{
        GatewayClientError,
        PaymentGatewayClient,
        PaymentInitRequest,
        PaymentInitResponse,
        RateOption,
        VerifiedStatus,
    },
    CartApi,
    CheckoutApi,
    SqliteDatabase,
};
use bazaar_checkout_server::{config::ServerConfig, routes, server::AppState};
use bcg_common::Money;
use ezpay_tools::CallbackPayload;
use serde_json::{json, Value};

/// Always-successful gateway double: initiation is accepted, verification reports success.
#[derive(Clone, Default)]
struct HappyGateway;

impl PaymentGatewayClient for HappyGateway {
    fn provider(&self) -> &str {
        "EZPAY"
    }

    async fn initiate(&self, request: PaymentInitRequest) -> Result<PaymentInitResponse, GatewayClientError> {
        Ok(PaymentInitResponse {
            checkout_url: format!("https://testpay.ezpay.in/pay/{}", request.txn_id),
            raw: json!({"status": 1, "data": request.txn_id}),
        })
    }

    async fn verify_transaction(
        &self,
        _txn_id: &str,
        _gateway_ref: Option<&str>,
    ) -> Result<VerifiedStatus, GatewayClientError> {
        Ok(VerifiedStatus::Success { gateway_payment_id: Some("EZ777".to_string()), raw: json!({"status": "success"}) })
    }
}

struct TestContext {
    db: SqliteDatabase,
    order_id: String,
}

async fn prepare() -> TestContext {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error opening database");

    // Catalog + coupon seeds.
    let variant: i64 = sqlx::query_scalar(
        "INSERT INTO variants (product_name, vendor_id, sale_price, stock_quantity, is_active) \
         VALUES ('Kurta', 7, $1, 10, 1) RETURNING id",
    )
    .bind(Money::from_rupees(40))
    .fetch_one(db.pool())
    .await
    .expect("Error seeding variant");
    sqlx::query(
        "INSERT INTO coupons (code, vendor_id, discount_type, amount_off, min_order_amount, is_active) \
         VALUES ('SAVE10', 7, $1, $2, 0, 1)",
    )
    .bind(DiscountType::Fixed)
    .bind(Money::from_rupees(10))
    .execute(db.pool())
    .await
    .expect("Error seeding coupon");
    sqlx::query(
        "INSERT INTO coupons (code, vendor_id, discount_type, amount_off, min_order_amount, is_active) \
         VALUES ('BIGMIN', 7, $1, $2, $3, 1)",
    )
    .bind(DiscountType::Fixed)
    .bind(Money::from_rupees(10))
    .bind(Money::from_rupees(500))
    .execute(db.pool())
    .await
    .expect("Error seeding coupon");

    // One order: ₹40 of items + ₹50 shipping.
    let owner = CartOwner::User(21);
    CartApi::new(db.clone()).add_item(&owner, variant, 1, false, None).await.expect("Error filling cart");
    let rate = RateOption {
        name: "Delhivery Surface".to_string(),
        code: "DL-SF".to_string(),
        amount: Money::from_rupees(50),
        currency: "INR".to_string(),
        estimated_days: Some(4),
    };
    let order = CheckoutApi::new(db.clone()).begin_checkout(&owner, 21, &rate).await.expect("Error checking out");
    TestContext { db, order_id: order.order_id.as_str().to_string() }
}

fn app_state(db: &SqliteDatabase) -> web::Data<AppState<HappyGateway>> {
    let config = ServerConfig::default();
    web::Data::new(AppState::new(db.clone(), HappyGateway, EventProducers::default(), &config))
}

#[actix_web::test]
async fn coupon_commands_return_the_totals_tuple() {
    let ctx = prepare().await;
    let app =
        test::init_service(App::new().app_data(app_state(&ctx.db)).configure(routes::configure::<HappyGateway>)).await;

    let req = test::TestRequest::post()
        .uri(&format!("/orders/{}/coupons", ctx.order_id))
        .set_json(json!({"code": "SAVE10", "user_id": 21}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["item_total"], "40.00");
    assert_eq!(body["item_discount_total"], "10.00");
    assert_eq!(body["item_total_net"], "30.00");
    assert_eq!(body["shipping_fee"], "50.00");
    assert_eq!(body["amount_payable"], "80.00");

    let req = test::TestRequest::delete().uri(&format!("/orders/{}/coupons/SAVE10", ctx.order_id)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["item_discount_total"], "0.00");
    assert_eq!(body["amount_payable"], "90.00");
}

#[actix_web::test]
async fn coupon_rejections_are_structured_422s() {
    let ctx = prepare().await;
    let app =
        test::init_service(App::new().app_data(app_state(&ctx.db)).configure(routes::configure::<HappyGateway>)).await;

    let req = test::TestRequest::post()
        .uri(&format!("/orders/{}/coupons", ctx.order_id))
        .set_json(json!({"code": "NOSUCH", "user_id": 21}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri(&format!("/orders/{}/coupons", ctx.order_id))
        .set_json(json!({"code": "BIGMIN", "user_id": 21}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    let reason = body["error"].as_str().expect("structured reason");
    assert!(reason.contains("Minimum order amount not met"), "{reason}");
}

#[actix_web::test]
async fn payment_flow_redirects_on_verified_state_only() {
    let ctx = prepare().await;
    let app =
        test::init_service(App::new().app_data(app_state(&ctx.db)).configure(routes::configure::<HappyGateway>)).await;

    // Initiate.
    let req = test::TestRequest::post()
        .uri(&format!("/payments/start/{}", ctx.order_id))
        .set_json(json!({"name": "Asha", "email": "asha@example.com", "phone": "9999999999"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let txn_id = body["txn_id"].as_str().expect("txn id").to_string();
    assert!(body["checkout_url"].as_str().expect("url").contains(&txn_id));

    // The browser return *claims* failure, but server-side verification says success — the buyer
    // lands on the thank-you page.
    let payload = CallbackPayload {
        txnid: txn_id,
        status: "failure".to_string(),
        udf1: ctx.order_id.clone(),
        ..CallbackPayload::default()
    };
    let req = test::TestRequest::post().uri("/payments/return").set_form(&payload).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let location = resp.headers().get("location").expect("location").to_str().expect("utf8");
    assert_eq!(location, &format!("/payments/thank-you/{}", ctx.order_id));

    // A duplicate webhook is acknowledged without changing anything.
    let req = test::TestRequest::post()
        .uri("/payments/webhook")
        .set_json(json!({"udf1": ctx.order_id, "status": "success"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["ok"], true);

    // And the order reads back as paid/processing.
    let req = test::TestRequest::get().uri(&format!("/orders/{}", ctx.order_id)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["payment_status"], "Paid");
    assert_eq!(body["status"], "Processing");
}
