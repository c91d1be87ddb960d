use rand::Rng;

use crate::db_types::OrderId;

/// A candidate public order id: 8 decimal digits, zero padded. Uniqueness is enforced by the
/// orders table; the storage layer retries with a fresh candidate on collision.
pub fn new_order_id() -> OrderId {
    let n = rand::thread_rng().gen_range(0..100_000_000u32);
    OrderId(format!("{n:08}"))
}

/// A gateway transaction id for an order. Gateways are picky: alphanumeric only, at most 25
/// characters. The random suffix keeps retried payment attempts for one order distinguishable.
pub fn new_txn_id(order_id: &OrderId) -> String {
    let base: String = format!("ORD{}", order_id.as_str())
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(18)
        .collect();
    let suffix: u32 = rand::thread_rng().gen_range(0..0x100_0000);
    let txnid = format!("{base}{suffix:06x}");
    txnid.chars().take(25).collect()
}
