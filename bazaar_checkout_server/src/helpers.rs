use bazaar_checkout_engine::{db_types::OrderId, PayerDetails};
use regex::Regex;

/// Normalizes buyer identity fields into the shape Indian payment gateways validate strictly:
/// a non-empty name (≤50 chars), a syntactically plausible email (with a deterministic fallback
/// address when the account has none), and a 6–12 digit numeric phone.
pub fn sanitize_payer(name: &str, email: &str, phone: &str, order_id: &OrderId) -> PayerDetails {
    let name = name.trim();
    let name = if name.is_empty() { "Customer".to_string() } else { name.chars().take(50).collect() };

    let email_re = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid");
    let email = email.trim();
    let email = if email_re.is_match(email) {
        email.to_string()
    } else {
        format!("noemail+{}@example.com", order_id.as_str())
    };

    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    let phone = if digits.len() < 6 { "9999999999".to_string() } else { digits.chars().take(12).collect() };

    PayerDetails { name, email, phone }
}
