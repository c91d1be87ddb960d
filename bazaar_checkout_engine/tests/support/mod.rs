//! Shared setup for the engine's behavioral test suites: a throwaway migrated SQLite database
//! plus seed helpers for the catalog and coupon tables the engine itself never writes.
#![allow(dead_code)]

use bazaar_checkout_engine::{db_types::DiscountType, SqliteDatabase, StorefrontDatabase};
use bcg_common::Money;
use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub fn random_db_path() -> String {
    format!("sqlite://{}/bazaar_engine_test_{}.db", std::env::temp_dir().display(), rand::random::<u64>())
}

pub async fn setup() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = random_db_path();
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
    Sqlite::create_database(&url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    db
}

pub async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.expect("Error dropping test database");
}

pub async fn seed_variant(db: &SqliteDatabase, name: &str, vendor_id: i64, price: Money, stock: i64) -> i64 {
    seed_variant_full(db, name, vendor_id, price, stock, true).await
}

pub async fn seed_variant_full(
    db: &SqliteDatabase,
    name: &str,
    vendor_id: i64,
    price: Money,
    stock: i64,
    is_active: bool,
) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO variants (product_name, vendor_id, sale_price, stock_quantity, is_active) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(name)
    .bind(vendor_id)
    .bind(price)
    .bind(stock)
    .bind(is_active)
    .fetch_one(db.pool())
    .await
    .expect("Error seeding variant")
}

/// Seed spec for coupons; only the fields a test cares about need to differ from the defaults.
#[derive(Debug, Clone)]
pub struct CouponSeed {
    pub code: String,
    pub vendor_id: i64,
    pub discount_type: DiscountType,
    pub percent_off_bps: Option<i64>,
    pub amount_off: Option<Money>,
    pub max_discount_amount: Option<Money>,
    pub min_order_amount: Money,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub usage_limit_total: Option<i64>,
    pub usage_limit_per_user: Option<i64>,
    pub is_active: bool,
}

impl CouponSeed {
    pub fn fixed(code: &str, vendor_id: i64, amount: Money) -> Self {
        Self {
            code: code.to_string(),
            vendor_id,
            discount_type: DiscountType::Fixed,
            percent_off_bps: None,
            amount_off: Some(amount),
            max_discount_amount: None,
            min_order_amount: Money::ZERO,
            starts_at: None,
            ends_at: None,
            usage_limit_total: None,
            usage_limit_per_user: None,
            is_active: true,
        }
    }

    pub fn percent(code: &str, vendor_id: i64, bps: i64) -> Self {
        Self {
            code: code.to_string(),
            vendor_id,
            discount_type: DiscountType::Percent,
            percent_off_bps: Some(bps),
            amount_off: None,
            max_discount_amount: None,
            min_order_amount: Money::ZERO,
            starts_at: None,
            ends_at: None,
            usage_limit_total: None,
            usage_limit_per_user: None,
            is_active: true,
        }
    }

    pub fn with_min_order(mut self, min: Money) -> Self {
        self.min_order_amount = min;
        self
    }

    pub fn with_cap(mut self, cap: Money) -> Self {
        self.max_discount_amount = Some(cap);
        self
    }

    pub fn with_usage_limits(mut self, total: Option<i64>, per_user: Option<i64>) -> Self {
        self.usage_limit_total = total;
        self.usage_limit_per_user = per_user;
        self
    }

    pub fn with_window(mut self, starts_at: Option<DateTime<Utc>>, ends_at: Option<DateTime<Utc>>) -> Self {
        self.starts_at = starts_at;
        self.ends_at = ends_at;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

pub async fn seed_coupon(db: &SqliteDatabase, seed: CouponSeed) -> i64 {
    sqlx::query_scalar::<_, i64>(
        r#"
            INSERT INTO coupons (
                code, vendor_id, discount_type, percent_off_bps, amount_off, max_discount_amount,
                min_order_amount, starts_at, ends_at, usage_limit_total, usage_limit_per_user, is_active
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id;
        "#,
    )
    .bind(seed.code)
    .bind(seed.vendor_id)
    .bind(seed.discount_type)
    .bind(seed.percent_off_bps)
    .bind(seed.amount_off)
    .bind(seed.max_discount_amount)
    .bind(seed.min_order_amount)
    .bind(seed.starts_at)
    .bind(seed.ends_at)
    .bind(seed.usage_limit_total)
    .bind(seed.usage_limit_per_user)
    .bind(seed.is_active)
    .fetch_one(db.pool())
    .await
    .expect("Error seeding coupon")
}
