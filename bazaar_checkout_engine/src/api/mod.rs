//! The engine's public API: stateless services over a [`StorefrontDatabase`] backend. All
//! mutation happens through explicit calls on these services; the row types in
//! [`crate::db_types`] carry no behaviour of their own.
pub mod cart_api;
pub mod checkout_api;
pub mod coupon_api;
pub mod errors;
pub mod payment_api;
