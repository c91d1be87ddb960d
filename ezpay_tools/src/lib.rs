//! # EzPay gateway client
//!
//! EzPay is a hosted-checkout payment gateway: the merchant initiates a transaction server-side,
//! redirects the buyer to the hosted payment page, and learns the outcome through a browser
//! return, a webhook, and an authoritative transaction-status API. Requests are authenticated
//! with a SHA-512 hash over a fixed, pipe-delimited field sequence and a shared salt — the field
//! order and the empty placeholders for unused slots are part of the signature and must be
//! reproduced byte for byte.
//!
//! This crate is transport-only: it knows the wire protocol and nothing about orders or
//! storefront state.
mod api;
mod config;
mod data_objects;
mod error;
mod hash;

pub use api::{EzPayApi, StatusVerdict};
pub use config::{EzPayConfig, EzPayEnv};
pub use data_objects::{CallbackPayload, InitiateRequest, InitiateResponse};
pub use error::EzPayApiError;
pub use hash::{request_hash, request_hash_input, response_hash, status_hash, verify_response_hash};
