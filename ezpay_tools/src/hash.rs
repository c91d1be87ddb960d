//! The EzPay hash scheme: SHA-512 over pipe-delimited field sequences with the shared salt.
//!
//! The sequences are fixed. Every optional field occupies its slot as an empty string; dropping
//! a slot changes the pipe count and the gateway rejects the signature. The input builders are
//! exposed separately from the digests so the byte layout itself is testable.
use sha2::{Digest, Sha512};

use crate::data_objects::{CallbackPayload, InitiateRequest};

fn sha512_hex(input: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Request hash input:
/// `key|txnid|amount|productinfo|firstname|email|udf1|…|udf10|SALT`.
pub fn request_hash_input(request: &InitiateRequest, key: &str, salt: &str) -> String {
    let fields = [
        key,
        &request.txnid,
        &request.amount,
        &request.productinfo,
        &request.firstname,
        &request.email,
        &request.udf1,
        &request.udf2,
        &request.udf3,
        &request.udf4,
        &request.udf5,
        "", // udf6..udf10 are reserved and always empty
        "",
        "",
        "",
        "",
        salt,
    ];
    fields.join("|")
}

pub fn request_hash(request: &InitiateRequest, key: &str, salt: &str) -> String {
    sha512_hex(&request_hash_input(request, key, salt))
}

/// Reverse (response) hash input:
/// `SALT|status|udf10|udf9|udf8|udf7|udf6|udf5|udf4|udf3|udf2|udf1|email|firstname|productinfo|amount|txnid|key`.
/// Slots udf10–udf6 are reserved and stay empty; the field order is the initiate sequence
/// reversed.
pub fn response_hash_input(payload: &CallbackPayload, salt: &str) -> String {
    let fields = [
        salt,
        &payload.status,
        "", // udf10..udf6 are reserved and always empty
        "",
        "",
        "",
        "",
        &payload.udf5,
        &payload.udf4,
        &payload.udf3,
        &payload.udf2,
        &payload.udf1,
        &payload.email,
        &payload.firstname,
        &payload.productinfo,
        &payload.amount,
        &payload.txnid,
        &payload.key,
    ];
    fields.join("|")
}

pub fn response_hash(payload: &CallbackPayload, salt: &str) -> String {
    sha512_hex(&response_hash_input(payload, salt))
}

/// True iff the payload carries a hash and it matches the computed reverse hash. A payload
/// without a hash is simply unverified, not invalid.
pub fn verify_response_hash(payload: &CallbackPayload, salt: &str) -> bool {
    !payload.hash.is_empty() && payload.hash.eq_ignore_ascii_case(&response_hash(payload, salt))
}

/// The short hash for transaction-status calls: `key|txnid|SALT`.
pub fn status_hash(key: &str, txnid: &str, salt: &str) -> String {
    sha512_hex(&format!("{key}|{txnid}|{salt}"))
}
