//! Route handlers. Handlers stay thin: decode the request, call the engine API, shape the
//! response. All money/state decisions live in the engine; redirect targets for the payment
//! return are decided solely from server-verified state.
use actix_web::{http::header, web, HttpResponse};
use bazaar_checkout_engine::{
    db_types::OrderId,
    traits::{choose_rate, GatewayCallback, PaymentGatewayClient, ShippingRateResolver},
    ReconcileOutcome,
};
use ezpay_tools::{verify_response_hash, CallbackPayload};
use log::*;
use serde_json::Value;

use crate::{
    data_objects::{
        AddItemRequest,
        ApplyCouponRequest,
        CartResponse,
        CheckoutStartRequest,
        CheckoutStartResponse,
        MergeCartRequest,
        OrderResponse,
        OwnerRef,
        StartPaymentRequest,
        StartPaymentResponse,
        TotalsResponse,
    },
    errors::ServerError,
    helpers::sanitize_payer,
    server::AppState,
};

pub fn configure<G>(cfg: &mut web::ServiceConfig)
where G: PaymentGatewayClient + 'static {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/cart").route(web::delete().to(abandon_cart::<G>)))
        .service(web::resource("/cart/items").route(web::post().to(add_cart_item::<G>)))
        .service(web::resource("/cart/merge").route(web::post().to(merge_cart::<G>)))
        .service(web::resource("/checkout/start").route(web::post().to(checkout_start::<G>)))
        .service(web::resource("/orders/{order_id}").route(web::get().to(get_order::<G>)))
        .service(web::resource("/orders/{order_id}/coupons").route(web::post().to(apply_coupon::<G>)))
        .service(web::resource("/orders/{order_id}/coupons/{code}").route(web::delete().to(remove_coupon::<G>)))
        .service(web::resource("/payments/start/{order_id}").route(web::post().to(start_payment::<G>)))
        .service(
            web::resource("/payments/return")
                .route(web::get().to(payment_return_get::<G>))
                .route(web::post().to(payment_return_post::<G>)),
        )
        .service(web::resource("/payments/webhook").route(web::post().to(payment_webhook::<G>)))
        .service(web::resource("/payments/thank-you/{order_id}").route(web::get().to(thank_you::<G>)))
        .service(web::resource("/payments/failed/{order_id}").route(web::get().to(payment_failed::<G>)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "👍️" }))
}

//----------------------------------------- Cart routes -----------------------------------------

async fn add_cart_item<G: PaymentGatewayClient>(
    state: web::Data<AppState<G>>,
    body: web::Json<AddItemRequest>,
) -> Result<HttpResponse, ServerError> {
    let owner = body.owner.to_owner()?;
    state
        .carts
        .add_item(&owner, body.variant_id, body.quantity, body.override_quantity, body.selections.clone())
        .await?;
    let cart = state.carts.cart_for_owner(&owner).await?;
    let items = state.carts.items(cart.id).await?;
    Ok(HttpResponse::Ok().json(CartResponse::new(&cart, items)))
}

async fn merge_cart<G: PaymentGatewayClient>(
    state: web::Data<AppState<G>>,
    body: web::Json<MergeCartRequest>,
) -> Result<HttpResponse, ServerError> {
    state.carts.merge_on_login(&body.session_key, body.user_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true })))
}

async fn abandon_cart<G: PaymentGatewayClient>(
    state: web::Data<AppState<G>>,
    body: web::Json<OwnerRef>,
) -> Result<HttpResponse, ServerError> {
    let owner = body.to_owner()?;
    state.carts.abandon(&owner).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true })))
}

//--------------------------------------- Checkout routes ---------------------------------------

async fn checkout_start<G: PaymentGatewayClient>(
    state: web::Data<AppState<G>>,
    body: web::Json<CheckoutStartRequest>,
) -> Result<HttpResponse, ServerError> {
    let owner = body.owner.to_owner()?;
    let options = state
        .shipping
        .rates(&state.pickup_pincode, &body.delivery_pincode, body.weight_kg)
        .await?;
    let rate = choose_rate(&options, &state.preferred_courier)
        .ok_or_else(|| ServerError::ShippingUnavailable("No courier options returned".to_string()))?
        .clone();
    let order = state.checkout.begin_checkout(&owner, body.buyer_id, &rate).await?;
    Ok(HttpResponse::Ok().json(CheckoutStartResponse { order: OrderResponse::from(&order), chosen_rate: rate }))
}

async fn get_order<G: PaymentGatewayClient>(
    state: web::Data<AppState<G>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let order = state.checkout.fetch_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(&order)))
}

//---------------------------------------- Coupon routes ----------------------------------------

async fn apply_coupon<G: PaymentGatewayClient>(
    state: web::Data<AppState<G>>,
    path: web::Path<String>,
    body: web::Json<ApplyCouponRequest>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let applied = state.coupons.apply_with_policy(&order_id, &body.code, body.user_id, state.policy).await?;
    debug!("🎟️ {} granted {} on order {order_id}", applied.code, applied.discount);
    Ok(HttpResponse::Ok().json(TotalsResponse::from(applied.totals)))
}

async fn remove_coupon<G: PaymentGatewayClient>(
    state: web::Data<AppState<G>>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ServerError> {
    let (order_id, code) = path.into_inner();
    let totals = state.coupons.remove(&OrderId(order_id), &code).await?;
    Ok(HttpResponse::Ok().json(TotalsResponse::from(totals)))
}

//--------------------------------------- Payment routes ----------------------------------------

async fn start_payment<G: PaymentGatewayClient>(
    state: web::Data<AppState<G>>,
    path: web::Path<String>,
    body: web::Json<StartPaymentRequest>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let payer = sanitize_payer(&body.name, &body.email, &body.phone, &order_id);
    let initiation = state.payments.start_payment(&order_id, payer).await?;
    Ok(HttpResponse::Ok().json(StartPaymentResponse {
        order_id: initiation.order.order_id.as_str().to_string(),
        txn_id: initiation.txn_id,
        checkout_url: initiation.checkout_url,
    }))
}

async fn payment_return_get<G: PaymentGatewayClient>(
    state: web::Data<AppState<G>>,
    query: web::Query<CallbackPayload>,
) -> Result<HttpResponse, ServerError> {
    payment_return(state, query.into_inner()).await
}

async fn payment_return_post<G: PaymentGatewayClient>(
    state: web::Data<AppState<G>>,
    form: web::Form<CallbackPayload>,
) -> Result<HttpResponse, ServerError> {
    payment_return(state, form.into_inner()).await
}

/// The browser redirect back from the hosted checkout. The payload's claimed status is ignored;
/// the engine re-verifies against the gateway and the buyer is routed on the verified outcome
/// only. Unverifiable transactions land on the failure page with the order still settleable by
/// a later webhook.
async fn payment_return<G: PaymentGatewayClient>(
    state: web::Data<AppState<G>>,
    payload: CallbackPayload,
) -> Result<HttpResponse, ServerError> {
    let callback = to_gateway_callback(&payload, &state);
    let outcome = state.payments.handle_return(&callback).await?;
    let (order_id, destination) = match &outcome {
        ReconcileOutcome::Paid { order, .. } => (order.order_id.as_str(), "thank-you"),
        ReconcileOutcome::Failed { order, .. } => (order.order_id.as_str(), "failed"),
        ReconcileOutcome::Unverified { order } => (order.order_id.as_str(), "failed"),
    };
    Ok(HttpResponse::SeeOther()
        .insert_header((header::LOCATION, format!("/payments/{destination}/{order_id}")))
        .finish())
}

/// The asynchronous server-to-server notification. Signed payloads are authoritative; unsigned
/// ones go through the same re-verification as a browser return. The raw body is accepted as
/// JSON or form-urlencoded, as the provider sends both.
async fn payment_webhook<G: PaymentGatewayClient>(
    state: web::Data<AppState<G>>,
    body: web::Bytes,
) -> Result<HttpResponse, ServerError> {
    let payload: CallbackPayload = serde_json::from_slice(&body)
        .or_else(|_| serde_urlencoded::from_bytes(&body))
        .map_err(|e| ServerError::InvalidRequestBody(format!("Unparseable webhook payload: {e}")))?;
    let callback = to_gateway_callback(&payload, &state);
    let outcome = state.payments.handle_webhook(&callback).await?;
    let settled = matches!(outcome, ReconcileOutcome::Paid { .. } | ReconcileOutcome::Failed { .. });
    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true, "settled": settled })))
}

async fn thank_you<G: PaymentGatewayClient>(
    state: web::Data<AppState<G>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let order = state.checkout.fetch_order(&OrderId(path.into_inner())).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": format!("Thanks! Your order {} has been placed.", order.order_id),
        "order": OrderResponse::from(&order),
    })))
}

async fn payment_failed<G: PaymentGatewayClient>(
    state: web::Data<AppState<G>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let order = state.checkout.fetch_order(&OrderId(path.into_inner())).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": format!("Payment for order {} was not completed. You can try again.", order.order_id),
        "order": OrderResponse::from(&order),
    })))
}

/// Normalizes a provider payload into the engine's gateway callback, checking the reverse hash
/// when signature checks are enabled. An unsigned payload is merely untrusted, not rejected —
/// the engine re-verifies it against the status API.
fn to_gateway_callback<G: PaymentGatewayClient>(payload: &CallbackPayload, state: &AppState<G>) -> GatewayCallback {
    let signature_valid = state.signature_checks && verify_response_hash(payload, state.salt.reveal());
    GatewayCallback {
        order_id: payload.order_reference().map(|s| OrderId(s.to_string())),
        txn_id: (!payload.txnid.is_empty()).then(|| payload.txnid.clone()),
        gateway_payment_id: (!payload.ezpay_id.is_empty()).then(|| payload.ezpay_id.clone()),
        status: (!payload.status.is_empty()).then(|| payload.status.clone()),
        signature_valid,
        raw: serde_json::to_value(payload).unwrap_or(Value::Null),
    }
}
