use actix_web::{web, App, HttpServer};
use bazaar_checkout_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    traits::PaymentGatewayClient,
    CartApi,
    CheckoutApi,
    CouponApi,
    CouponPolicy,
    PaymentApi,
    SqliteDatabase,
};
use bcg_common::Secret;
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{ezpay::EzPayGateway, shipquick::ShipQuickClient},
    routes,
};

/// Everything the route handlers need, behind one `web::Data`. Generic over the gateway client
/// so tests can drive the payment routes with a scripted double.
pub struct AppState<G: PaymentGatewayClient> {
    pub carts: CartApi<SqliteDatabase>,
    pub checkout: CheckoutApi<SqliteDatabase>,
    pub coupons: CouponApi<SqliteDatabase>,
    pub payments: PaymentApi<SqliteDatabase, G>,
    pub shipping: ShipQuickClient,
    pub policy: CouponPolicy,
    pub pickup_pincode: String,
    pub preferred_courier: String,
    /// Shared gateway salt, needed to check callback signatures.
    pub salt: Secret<String>,
    pub signature_checks: bool,
}

impl<G: PaymentGatewayClient> AppState<G> {
    pub fn new(db: SqliteDatabase, gateway: G, producers: EventProducers, config: &ServerConfig) -> Self {
        Self {
            carts: CartApi::new(db.clone()),
            checkout: CheckoutApi::new(db.clone()),
            coupons: CouponApi::new(db.clone()),
            payments: PaymentApi::new(db, gateway, producers),
            shipping: ShipQuickClient::new(config.courier.clone()),
            policy: config.policy,
            pickup_pincode: config.courier.pickup_pincode.clone(),
            preferred_courier: config.courier.preferred.clone(),
            salt: config.ezpay.api.salt.clone(),
            signature_checks: config.ezpay.signature_checks,
        }
    }
}

/// Default event wiring: paid and failed orders are logged. Delivery transports (mail, push)
/// subscribe here in deployments that have them.
pub fn default_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(|event| {
        Box::pin(async move {
            info!("📬️ Order [{}] is paid. Payable was {}.", event.order.order_id, event.order.amount_payable);
        })
    });
    hooks.on_payment_failed(|event| {
        Box::pin(async move {
            info!("📬️ Payment for order [{}] failed ({}).", event.order.order_id, event.gateway_status);
        })
    });
    EventHandlers::new(128, hooks)
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let database_url = if config.database_url.is_empty() {
        bazaar_checkout_engine::sqlite::db::db_url()
    } else {
        config.database_url.clone()
    };
    let db = SqliteDatabase::new_with_url(&database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;

    let handlers = default_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let gateway = EzPayGateway::new(config.ezpay.api.clone(), &config.ezpay.return_url)?;
    let state = web::Data::new(AppState::new(db, gateway, producers, &config));

    let (host, port) = (config.host.clone(), config.port);
    info!("🚀️ Starting checkout server on {host}:{port}");
    HttpServer::new(move || App::new().app_data(state.clone()).configure(routes::configure::<EzPayGateway>))
        .bind((host.as_str(), port))?
        .run()
        .await?;
    info!("🚀️ Checkout server has stopped");
    Ok(())
}
